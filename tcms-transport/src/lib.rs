// HTTP transports for the TCMS XML-RPC client.
//
// `CookieTransport` carries the session cookie issued by the server's login
// exchange; the optional `negotiate` module obtains that cookie through a
// Kerberos/SPNEGO handshake instead of a password.

pub mod transport;
#[cfg(feature = "gssapi")]
pub mod negotiate;

pub use transport::{CookieTransport, TransportError};
