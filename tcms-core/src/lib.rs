// XML-RPC core for the TCMS client
// Implements the value model and wire codec shared by the transport and
// client crates: <methodCall> encoding, <methodResponse> decoding and
// server fault reporting.

pub mod codec;
pub mod error;
pub mod value;

pub use codec::{decode_response, encode_request};
pub use error::{CodecError, Fault, RpcError};
pub use value::Value;
