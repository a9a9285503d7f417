use reqwest::blocking::Client as HttpClient;
use reqwest::{header, StatusCode};
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP error {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[cfg(feature = "gssapi")]
    #[error("Kerberos negotiation failed: {0}")]
    Negotiate(String),
    #[cfg(feature = "gssapi")]
    #[error("login endpoint did not set the {0} cookie")]
    MissingSessionCookie(&'static str),
}

/// A blocking HTTP transport that remembers session cookies.
///
/// Every `Set-Cookie` received from the server is stored and attached as a
/// `Cookie` header on all later requests, which is how the server's login
/// exchange turns into an authenticated session.
#[derive(Debug)]
pub struct CookieTransport {
    http: HttpClient,
    url: Url,
    cookies: Vec<String>,
    close_connections: bool,
}

impl CookieTransport {
    /// Transport for password-mode sessions over http or https.
    pub fn new(url: Url) -> Result<Self, TransportError> {
        Self::build(url, false)
    }

    /// Transport that sends `Connection: close` and never pools
    /// connections. The server does not support persistent connections
    /// reliably, so Kerberos sessions open a fresh connection per request.
    pub fn with_connection_close(url: Url) -> Result<Self, TransportError> {
        Self::build(url, true)
    }

    fn build(url: Url, close_connections: bool) -> Result<Self, TransportError> {
        let mut builder = HttpClient::builder();
        if close_connections {
            builder = builder.pool_max_idle_per_host(0);
        }
        let http = builder.build().map_err(TransportError::Client)?;
        Ok(CookieTransport {
            http,
            url,
            cookies: Vec::new(),
            close_connections,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Seed a cookie obtained out of band, e.g. from the Kerberos login
    /// endpoint.
    pub fn push_cookie(&mut self, cookie: String) {
        self.cookies.push(cookie);
    }

    /// POST one XML-RPC request body and return the raw response body.
    pub fn send(&mut self, body: String) -> Result<String, TransportError> {
        let mut request = self
            .http
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, "text/xml")
            .body(body);
        if !self.cookies.is_empty() {
            request = request.header(header::COOKIE, self.cookies.join("; "));
        }
        if self.close_connections {
            request = request.header(header::CONNECTION, "close");
        }

        debug!("POST {}", self.url);
        let response = request.send()?;

        for raw in response.headers().get_all(header::SET_COOKIE) {
            if let Some(cookie) = raw.to_str().ok().and_then(|raw| raw.split(';').next()) {
                trace!("captured cookie {}", cookie);
                self.cookies.push(cookie.trim().to_owned());
            }
        }

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(TransportError::Http { status, body: text });
        }
        Ok(text)
    }
}
