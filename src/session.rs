//! Command dispatcher and receive loop
//!
//! One inbound message is fully decoded, executed and replied to before the
//! next is read. Messages are 4-tuples `(Action, CallerPid, Payload, Extra)`
//! where the action atom is one of `stop`, `exec` or `call`. Success replies
//! are `{lua, ok | [Result, ...]}`; failures are `{error, Reason}` with the
//! reason as a charlist.
//!
//! Malformed envelopes are dropped before a caller pid is known and answered
//! with an error tuple afterwards. A receive error triggers exactly one
//! reconnect attempt; failing to reconnect, or failing to deliver a computed
//! reply, is fatal.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::codec;
use crate::engine::ScriptEngine;
use crate::error::{SessionError, SessionResult, WireError};
use crate::term::{Pid, Term};
use crate::transport::{Transport, TransportEvent};
use crate::value::ScriptValue;
use crate::wire::{TermReader, TermWriter};

/// A single-threaded dispatch session over one transport and one script
/// runtime.
pub struct Session<E: ScriptEngine> {
    transport: Rc<RefCell<dyn Transport>>,
    engine: E,
}

enum Disposition {
    Continue,
    Stop,
}

enum CallArgs {
    /// STRING_EXT payload: one integer per byte.
    Bytes(Vec<u8>),
    /// Proper list payload: one decoded value per element.
    Terms(Vec<Term>),
}

impl<E: ScriptEngine> Session<E> {
    /// Create a session over a shared transport handle and a script engine.
    pub fn new(transport: Rc<RefCell<dyn Transport>>, engine: E) -> Self {
        Self { transport, engine }
    }

    /// Run the receive loop until a `stop` command, an unlink, or a fatal
    /// transport failure.
    pub fn run(&mut self) -> SessionResult<()> {
        info!("session started");
        loop {
            let event = self.transport.borrow_mut().recv();
            match event {
                Err(err) => {
                    warn!(%err, "error in receive; reconnecting");
                    let outcome = self.transport.borrow_mut().reconnect();
                    if let Err(err) = outcome {
                        return Err(SessionError::Reconnect(err));
                    }
                    info!("reconnected");
                }
                Ok(TransportEvent::Tick) => debug!("tick"),
                Ok(TransportEvent::Link) => debug!("peer linked"),
                Ok(TransportEvent::Unlink) => {
                    info!("peer unlinked; terminating");
                    break;
                }
                Ok(TransportEvent::Message(buffer)) => {
                    if let Disposition::Stop = self.handle_message(&buffer)? {
                        break;
                    }
                }
            }
        }
        info!("session stopped");
        Ok(())
    }

    fn handle_message(&mut self, buffer: &[u8]) -> SessionResult<Disposition> {
        let mut reader = TermReader::new(buffer);

        if let Err(err) = reader.read_version() {
            warn!(%err, "ignoring malformed message (bad version)");
            return Ok(Disposition::Continue);
        }
        let arity = match reader.read_tuple_header() {
            Ok(arity) => arity,
            Err(err) => {
                warn!(%err, "ignoring malformed message (not a tuple)");
                return Ok(Disposition::Continue);
            }
        };
        if arity != 4 {
            warn!(arity, "ignoring malformed message (not a 4-arity tuple)");
            return Ok(Disposition::Continue);
        }
        let action = match reader.read_atom() {
            Ok(action) => action,
            Err(err) => {
                warn!(%err, "ignoring malformed message (first tuple element not an atom)");
                return Ok(Disposition::Continue);
            }
        };
        let caller = match reader.read_pid() {
            Ok(pid) => pid,
            Err(err) => {
                warn!(%err, "ignoring malformed message (second tuple element not a pid)");
                return Ok(Disposition::Continue);
            }
        };

        match action.as_str() {
            "stop" => {
                info!("stopping normally");
                Ok(Disposition::Stop)
            }
            "exec" => {
                let reply = self.handle_exec(&mut reader);
                self.send_reply(&caller, &reply)?;
                Ok(Disposition::Continue)
            }
            "call" => {
                let reply = self.handle_call(&mut reader);
                self.send_reply(&caller, &reply)?;
                Ok(Disposition::Continue)
            }
            other => {
                warn!(
                    action = other,
                    "ignoring malformed message (unknown action atom)"
                );
                self.send_reply(
                    &caller,
                    &error_reply("First tuple element is not the atom 'stop', 'exec' or 'call'."),
                )?;
                Ok(Disposition::Continue)
            }
        }
    }

    fn handle_exec(&mut self, reader: &mut TermReader<'_>) -> Term {
        let source = match reader.read_term() {
            Ok(Term::Binary(bytes)) => bytes,
            _ => {
                warn!("ignoring malformed message ('exec' payload not a binary)");
                return error_reply("Third tuple element is not a binary.");
            }
        };
        match self.engine.run(&source) {
            Err(err) => {
                warn!(%err, "script execution failed");
                error_reply(&err.message)
            }
            Ok(()) => success_reply(&self.collect_results()),
        }
    }

    fn handle_call(&mut self, reader: &mut TermReader<'_>) -> Term {
        let name = match reader.read_term() {
            Ok(Term::Atom(name)) => name,
            _ => {
                warn!("ignoring malformed message ('call' payload not an atom)");
                return error_reply("Third tuple element is not an atom.");
            }
        };
        let args = match reader.read_term() {
            Ok(Term::CharList(bytes)) => CallArgs::Bytes(bytes),
            Ok(Term::List { elements, .. }) => CallArgs::Terms(elements),
            _ => {
                warn!("ignoring malformed message ('call' arguments not a list)");
                return error_reply("Fourth tuple element is not a list.");
            }
        };
        let arity = match &args {
            CallArgs::Bytes(bytes) => bytes.len(),
            CallArgs::Terms(terms) => terms.len(),
        };
        if !self.engine.check_stack(arity + 1) {
            warn!(slots = arity + 1, "insufficient script stack space");
            return error_reply("Insufficient Lua Stack space.");
        }

        self.engine.get_global(&name);
        match args {
            CallArgs::Bytes(bytes) => {
                for byte in bytes {
                    self.engine.push(ScriptValue::Int(byte as i64));
                }
            }
            CallArgs::Terms(terms) => {
                for term in &terms {
                    self.engine.push(codec::decode(term));
                }
            }
        }
        match self.engine.call(arity) {
            Err(err) => {
                warn!(%err, function = %name, "script call failed");
                error_reply(&err.message)
            }
            Ok(()) => success_reply(&self.collect_results()),
        }
    }

    fn collect_results(&mut self) -> Vec<ScriptValue> {
        let count = self.engine.stack_size();
        let values = (1..=count).map(|slot| self.engine.value_at(slot)).collect();
        self.engine.pop(count);
        values
    }

    fn send_reply(&mut self, caller: &Pid, reply: &Term) -> SessionResult<()> {
        let buffer = match encode_reply(reply) {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!(%err, "reply encoding failed");
                match encode_reply(&error_reply(&err.to_string())) {
                    Ok(buffer) => buffer,
                    Err(err) => {
                        warn!(%err, "error reply encoding failed; dropping reply");
                        return Ok(());
                    }
                }
            }
        };
        self.transport
            .borrow_mut()
            .send(caller, &buffer)
            .map_err(SessionError::ReplySend)
    }
}

fn encode_reply(reply: &Term) -> Result<Vec<u8>, WireError> {
    let mut writer = TermWriter::new();
    writer.version();
    writer.term(reply)?;
    Ok(writer.into_bytes())
}

fn success_reply(results: &[ScriptValue]) -> Term {
    let payload = if results.is_empty() {
        Term::atom("ok")
    } else {
        Term::list(results.iter().map(codec::encode).collect())
    };
    Term::Tuple(vec![Term::atom("lua"), payload])
}

fn error_reply(reason: &str) -> Term {
    Term::Tuple(vec![
        Term::atom("error"),
        Term::CharList(reason.as_bytes().to_vec()),
    ])
}
