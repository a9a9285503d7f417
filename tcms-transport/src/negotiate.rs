//! Kerberos/SPNEGO negotiation against the browser-facing login endpoint.
//!
//! The server authenticates Kerberos users on its interactive login URL,
//! not on the XML-RPC endpoint itself: a GET carrying an
//! `Authorization: Negotiate <token>` header answers 200 and sets the
//! `sessionid` cookie, which is then replayed on every RPC request.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cross_krb5::{ClientCtx, InitiateFlags};
use reqwest::blocking::Client as HttpClient;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{header, StatusCode};
use tracing::debug;
use url::Url;

use crate::transport::{CookieTransport, TransportError};

/// Name of the session cookie issued by the Kerberos login endpoint.
pub const SESSION_COOKIE: &str = "sessionid";

/// Build an `Authorization` header value holding the initial SPNEGO token
/// for the `HTTP@<hostname>` service principal.
pub fn negotiate_header(hostname: &str) -> Result<String, TransportError> {
    let spn = format!("HTTP/{hostname}");
    let (_pending, token) = ClientCtx::new(InitiateFlags::empty(), None, &spn, None)
        .map_err(|err| TransportError::Negotiate(err.to_string()))?;
    Ok(format!("Negotiate {}", BASE64.encode(&*token)))
}

/// Authenticate against the login endpoint and seed the resulting session
/// cookie into `transport`.
pub fn kerberos_login(
    transport: &mut CookieTransport,
    login_url: &Url,
) -> Result<(), TransportError> {
    let hostname = login_url
        .host_str()
        .ok_or_else(|| TransportError::Negotiate(format!("no hostname in {login_url}")))?;
    let authorization = negotiate_header(hostname)?;
    let session = fetch_session_cookie(login_url, authorization)?;
    transport.push_cookie(session);
    Ok(())
}

/// GET the login endpoint and return the `sessionid` cookie.
///
/// The endpoint may redirect after authenticating and set the cookie on an
/// intermediate hop, so cookies are collected in a jar spanning the whole
/// redirect chain rather than read off the final response.
fn fetch_session_cookie(login_url: &Url, authorization: String) -> Result<String, TransportError> {
    debug!("negotiating Kerberos session via {}", login_url);
    let jar = Arc::new(Jar::default());
    let http = HttpClient::builder()
        .cookie_provider(Arc::clone(&jar))
        .build()
        .map_err(TransportError::Client)?;
    let response = http
        .get(login_url.clone())
        .header(header::AUTHORIZATION, authorization)
        .send()?;

    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().unwrap_or_default();
        return Err(TransportError::Http { status, body });
    }

    let prefix = format!("{SESSION_COOKIE}=");
    jar.cookies(login_url)
        .and_then(|header| header.to_str().ok().map(str::to_owned))
        .and_then(|cookies| {
            cookies
                .split(';')
                .map(str::trim)
                .find(|cookie| cookie.starts_with(&prefix))
                .map(str::to_owned)
        })
        .ok_or(TransportError::MissingSessionCookie(SESSION_COOKIE))
}
