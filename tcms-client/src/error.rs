use thiserror::Error;

use crate::config::ConfigError;
use tcms_core::RpcError;
use tcms_transport::TransportError;

/// Top-level error type for the client crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid server URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("unrecognized URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("encrypted https communication required for Kerberos authentication, URL provided: {0}")]
    KerberosRequiresTls(String),
    #[error("Kerberos support is not compiled in; enable the `gssapi` feature of tcms-client")]
    KerberosUnavailable,
    #[error("username and password are required for password authentication")]
    MissingCredentials,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}
