use std::path::PathBuf;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::debug;

/// How old a session may grow before [`crate::Tcms`] replaces it.
///
/// Long-lived encrypted connections to the server intermittently fail at
/// the transport layer after a few minutes of idle time; sessions are
/// refreshed proactively instead of retrying on failure.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(240);

/// Section in the config file that holds our keys.
const SECTION: &str = "tcms";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file '{}' not found", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },
    #[error("no url found in {}", .0.display())]
    MissingUrl(PathBuf),
    #[error("username/password required in {}", .0.display())]
    MissingCredentials(PathBuf),
    #[error("invalid boolean '{value}' for use_kerberos in {}", .path.display())]
    InvalidBool { path: PathBuf, value: String },
}

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// XML-RPC endpoint URL.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_kerberos: bool,
    /// Maximum session age before the connection is replaced.
    pub refresh_interval: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        ClientConfig {
            // The server exposes json-rpc and xml-rpc at matching paths;
            // we always speak the XML flavour.
            url: url.into().replace("json-rpc", "xml-rpc"),
            username: None,
            password: None,
            use_kerberos: false,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_kerberos(mut self) -> Self {
        self.use_kerberos = true;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Resolve configuration from explicit arguments, falling back per key
    /// to the first config file found on the default search path.
    pub fn resolve(
        url: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, ConfigError> {
        Self::resolve_with_paths(url, username, password, &default_search_paths())
    }

    /// Same as [`ClientConfig::resolve`] with an explicit search path.
    ///
    /// Explicit arguments always win; the config file only fills in keys
    /// that were not provided.
    pub fn resolve_with_paths(
        url: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
        search_path: &[PathBuf],
    ) -> Result<Self, ConfigError> {
        let existing = search_path.iter().find(|path| path.exists());
        let consulted = existing
            .or(search_path.last())
            .cloned()
            .unwrap_or_default();

        let mut file_url = None;
        let mut file_username = None;
        let mut file_password = None;
        let mut use_kerberos = false;

        if let Some(path) = existing {
            debug!("reading configuration from {}", path.display());
            let conf = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            if let Some(section) = conf.section(Some(SECTION)) {
                file_url = section.get("url").map(str::to_owned);
                file_username = section.get("username").map(str::to_owned);
                file_password = section.get("password").map(str::to_owned);
                if let Some(raw) = section.get("use_kerberos") {
                    use_kerberos = parse_bool(raw).ok_or_else(|| ConfigError::InvalidBool {
                        path: path.clone(),
                        value: raw.to_owned(),
                    })?;
                }
            }
        } else if url.is_none() {
            return Err(ConfigError::NotFound(consulted));
        }

        let url = url
            .map(str::to_owned)
            .or(file_url)
            .ok_or_else(|| ConfigError::MissingUrl(consulted.clone()))?;

        // ClientConfig::new performs the json-rpc to xml-rpc rewrite.
        let mut config = ClientConfig::new(url);
        config.username = username.map(str::to_owned).or(file_username);
        config.password = password.map(str::to_owned).or(file_password);
        config.use_kerberos = use_kerberos;

        if !config.use_kerberos && (config.username.is_none() || config.password.is_none()) {
            return Err(ConfigError::MissingCredentials(consulted));
        }
        Ok(config)
    }
}

/// `~/.tcms.conf`, then the system-wide locations.
fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".tcms.conf"));
    }
    paths.push(PathBuf::from("/etc/tcms.conf"));
    paths.push(PathBuf::from("c:/tcms.conf"));
    paths
}

/// Boolean-like strings accepted for `use_kerberos`, after
/// `distutils.util.strtobool`.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}
