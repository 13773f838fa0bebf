//! Enode Bridge – value translation and command dispatch between an
//! embedded script runtime and a distributed Erlang-style node
//!
//! The crate implements:
//! - A script-side value model with explicit atom/string/tuple boxing markers
//! - A total bidirectional codec between script values and actor terms,
//!   including the proplist-folding and array/hash ambiguity rules
//! - A primitive external-term-format reader/writer over raw buffers
//! - A synchronous command dispatcher for `stop`/`exec`/`call` messages
//! - An outbound call bridge letting script code perform blocking remote calls
//!
//! The node transport and the script language engine stay behind small
//! traits; the core is runtime- and transport-agnostic.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bridge;
pub mod codec;
pub mod engine;
pub mod error;
pub mod session;
pub mod term;
pub mod transport;
pub mod value;
pub mod wire;

pub use bridge::RpcBridge;
pub use engine::ScriptEngine;
pub use session::Session;
pub use term::{Pid, Term};
pub use transport::{Transport, TransportEvent};
pub use value::{Key, MarkerKind, OpaqueKind, ScriptValue, Table};

/// Current version of the bridge crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
