//! Client for the Kiwi TCMS test case management server, speaking XML-RPC
//! over HTTP/HTTPS with either password or Kerberos authentication.
//!
//! Credentials and the server URL come from constructor arguments, or from
//! a `[tcms]` section in the first config file found on the search path
//! (`~/.tcms.conf`, then `/etc/tcms.conf`, then `C:/tcms.conf`):
//!
//! ```ini
//! [tcms]
//! url = https://tcms.example.com/xml-rpc/
//! username = your-username
//! password = your-password
//! ```
//!
//! For Kerberos set `use_kerberos = true` instead of username/password and
//! build with the `gssapi` cargo feature.
//!
//! Remote methods are invoked by their dotted server-side name:
//!
//! ```no_run
//! use tcms_client::{Tcms, Value};
//!
//! # fn main() -> Result<(), tcms_client::Error> {
//! let mut tcms = Tcms::new()?;
//! let filter = Value::from_pairs([("pk", Value::from(46490))]);
//! let cases = tcms.invoke("TestCase.filter", vec![filter])?;
//! # Ok(())
//! # }
//! ```
//!
//! The handle connects lazily and replaces its session whenever it grows
//! older than [`ClientConfig::refresh_interval`]; long-lived encrypted
//! connections to the server intermittently fail after a few minutes idle.

pub mod client;
pub mod config;
pub mod error;

pub use client::{RpcClient, Tcms};
pub use config::{ClientConfig, ConfigError, DEFAULT_REFRESH_INTERVAL};
pub use error::Error;

// Re-export the wire-level types callers need to build arguments and
// inspect results.
pub use tcms_core::{Fault, RpcError, Value};
