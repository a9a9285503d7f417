use thiserror::Error;

/// Errors produced while encoding or decoding XML-RPC documents.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("XML escape error: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected element <{0}>")]
    Unexpected(String),
    #[error("invalid {kind} value: {text}")]
    InvalidScalar { kind: &'static str, text: String },
    #[error("malformed fault payload")]
    MalformedFault,
    #[error("truncated document")]
    Truncated,
}

impl CodecError {
    pub(crate) fn invalid(kind: &'static str, text: impl Into<String>) -> Self {
        CodecError::InvalidScalar {
            kind,
            text: text.into(),
        }
    }
}

/// A `<fault>` returned by the server in place of a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("server fault {code}: {message}")]
pub struct Fault {
    pub code: i32,
    pub message: String,
}

impl Fault {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Fault {
            code,
            message: message.into(),
        }
    }
}

/// Anything that can go wrong with a single remote call once the request
/// reaches the wire: a server-side fault or an undecodable response.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Fault(#[from] Fault),
    #[error(transparent)]
    Codec(#[from] CodecError),
}
