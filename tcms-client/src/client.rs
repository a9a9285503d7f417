// Authenticated XML-RPC session and the user-facing connection handle.

use std::time::Instant;

use tracing::{debug, trace};
use url::Url;

use crate::config::ClientConfig;
use crate::error::Error;
use tcms_core::{decode_response, encode_request, RpcError, Value};
use tcms_transport::CookieTransport;

/// One authenticated session against the XML-RPC endpoint.
///
/// Password mode calls the `Auth.login` remote procedure once at session
/// start; Kerberos mode obtains the session cookie from the browser-facing
/// login endpoint instead. Either way, the session cookie rides on every
/// subsequent request.
#[derive(Debug)]
pub struct RpcClient {
    transport: CookieTransport,
}

impl RpcClient {
    /// Validate the configuration, open a transport and authenticate.
    pub fn connect(config: &ClientConfig) -> Result<Self, Error> {
        let url = endpoint_url(config)?;

        if config.use_kerberos {
            #[cfg(feature = "gssapi")]
            {
                let mut transport = CookieTransport::with_connection_close(url)?;
                let login_url = login_endpoint(config)?;
                tcms_transport::negotiate::kerberos_login(&mut transport, &login_url)?;
                return Ok(RpcClient { transport });
            }
            #[cfg(not(feature = "gssapi"))]
            return Err(Error::KerberosUnavailable);
        }

        let (Some(username), Some(password)) = (config.username.clone(), config.password.clone())
        else {
            return Err(Error::MissingCredentials);
        };

        let mut client = RpcClient {
            transport: CookieTransport::new(url)?,
        };
        debug!("logging in as {}", username);
        client.call(
            "Auth.login",
            vec![Value::from(username), Value::from(password)],
        )?;
        Ok(client)
    }

    /// Forward one remote procedure call verbatim.
    ///
    /// `method` is the dotted server-side name, e.g. `TestCase.filter`;
    /// arguments are positional and not validated locally.
    pub fn call(&mut self, method: &str, params: Vec<Value>) -> Result<Value, Error> {
        debug!("calling {} with {} argument(s)", method, params.len());
        let body = encode_request(method, &params).map_err(RpcError::from)?;
        let response = self.transport.send(body)?;
        let value = decode_response(&response)?;
        trace!("{} returned {:?}", method, value);
        Ok(value)
    }
}

struct Conn {
    client: RpcClient,
    established: Instant,
}

/// Connection handle to a TCMS server.
///
/// Owns its session outright (no process-wide state), connects lazily on
/// the first [`Tcms::invoke`], and replaces the session wholesale whenever
/// it is older than [`ClientConfig::refresh_interval`].
pub struct Tcms {
    config: ClientConfig,
    conn: Option<Conn>,
}

impl Tcms {
    /// Connect using the configuration file search path only.
    pub fn new() -> Result<Self, Error> {
        Self::with_credentials(None, None, None)
    }

    /// Connect with explicit credentials; anything left `None` falls back
    /// to the configuration file.
    pub fn with_credentials(
        url: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, Error> {
        let config = ClientConfig::resolve(url, username, password)?;
        Self::with_config(config)
    }

    /// Use an already resolved configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self, Error> {
        // Fail fast on bad URLs and mode mismatches, before any network I/O.
        endpoint_url(&config)?;
        Ok(Tcms { config, conn: None })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Dispatch a remote procedure call on the live session, establishing
    /// or refreshing it first when needed.
    pub fn invoke(&mut self, method: &str, args: Vec<Value>) -> Result<Value, Error> {
        self.connection()?.call(method, args)
    }

    fn connection(&mut self) -> Result<&mut RpcClient, Error> {
        let live = match self.conn.take() {
            Some(conn) if conn.established.elapsed() < self.config.refresh_interval => conn,
            stale => {
                // Replace rather than reuse: long-lived encrypted
                // connections to the server intermittently fail after a
                // few minutes of idle time.
                if stale.is_some() {
                    debug!("session older than {:?}, reconnecting", self.config.refresh_interval);
                }
                drop(stale);
                Conn {
                    client: RpcClient::connect(&self.config)?,
                    established: Instant::now(),
                }
            }
        };
        Ok(&mut self.conn.insert(live).client)
    }
}

impl std::fmt::Debug for Tcms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tcms")
            .field("url", &self.config.url)
            .field("use_kerberos", &self.config.use_kerberos)
            .field("connected", &self.conn.is_some())
            .finish()
    }
}

/// Parse and sanity-check the endpoint URL for the selected auth mode.
fn endpoint_url(config: &ClientConfig) -> Result<Url, Error> {
    let url = Url::parse(&config.url).map_err(|source| Error::InvalidUrl {
        url: config.url.clone(),
        source,
    })?;
    match url.scheme() {
        "https" => {}
        "http" if !config.use_kerberos => {}
        // Security invariant, not a soft warning
        "http" => return Err(Error::KerberosRequiresTls(config.url.clone())),
        other => return Err(Error::UnsupportedScheme(other.to_owned())),
    }
    if config.use_kerberos && cfg!(not(feature = "gssapi")) {
        return Err(Error::KerberosUnavailable);
    }
    if !config.use_kerberos && (config.username.is_none() || config.password.is_none()) {
        return Err(Error::MissingCredentials);
    }
    Ok(url)
}

/// The browser-facing Kerberos login URL, derived from the RPC URL by
/// path-segment substitution.
#[cfg(feature = "gssapi")]
fn login_endpoint(config: &ClientConfig) -> Result<Url, Error> {
    let raw = config.url.replace("xml-rpc", "login/kerberos");
    Url::parse(&raw).map_err(|source| Error::InvalidUrl { url: raw, source })
}
