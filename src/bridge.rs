//! Outbound call bridge
//!
//! Lets script code invoke an arbitrary remote module/function while a
//! message is being processed. The bridge shares the session's transport
//! handle; the session is single-threaded, so a plain `Rc<RefCell<..>>`
//! carries it.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;

use crate::codec;
use crate::error::BridgeError;
use crate::term::Term;
use crate::transport::Transport;
use crate::value::ScriptValue;
use crate::wire::{TermReader, TermWriter};

/// Module used when the caller names none.
const DEFAULT_MODULE: &str = "erlang";
/// Function used for the zero-argument liveness probe.
const DEFAULT_FUNCTION: &str = "is_alive";

/// Synchronous remote-call bridge handed to the script runtime.
pub struct RpcBridge {
    transport: Rc<RefCell<dyn Transport>>,
}

impl RpcBridge {
    /// Wrap a shared transport handle.
    pub fn new(transport: Rc<RefCell<dyn Transport>>) -> Self {
        Self { transport }
    }

    /// Perform a blocking remote call on behalf of script code.
    ///
    /// With no arguments this is a liveness probe of the default module.
    /// One argument names a function in the default module; two or more
    /// name module and function, with the rest encoded as call arguments.
    pub fn call(&self, args: &[ScriptValue]) -> Result<ScriptValue, BridgeError> {
        let (module, function, call_args) = match args {
            [] => (DEFAULT_MODULE, DEFAULT_FUNCTION, &[][..]),
            [function] => (DEFAULT_MODULE, name_arg(function, 1)?, &[][..]),
            [module, function, rest @ ..] => {
                (name_arg(module, 1)?, name_arg(function, 2)?, rest)
            }
        };

        let mut writer = TermWriter::new();
        let encoded: Vec<_> = call_args.iter().map(codec::encode).collect();
        writer.term(&Term::list(encoded)).map_err(BridgeError::Args)?;

        let reply = self
            .transport
            .borrow_mut()
            .remote_call(module, function, writer.as_slice())
            .map_err(|source| {
                warn!(module, function, %source, "remote call failed");
                BridgeError::Call {
                    module: module.to_string(),
                    function: function.to_string(),
                    source,
                }
            })?;

        let mut reader = TermReader::new(&reply);
        let term = reader.read_term()?;
        Ok(codec::decode(&term))
    }
}

fn name_arg(value: &ScriptValue, position: usize) -> Result<&str, BridgeError> {
    value
        .as_str()
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .ok_or(BridgeError::NameNotString { position })
}
