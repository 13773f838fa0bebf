//! Node transport interface
//!
//! Connection setup, handshake and socket plumbing live outside the core;
//! the session only needs synchronous receive, send, reconnect and a
//! blocking remote-call primitive over raw term buffers.
//!
//! Buffer conventions: inbound message buffers and outbound reply buffers
//! carry the version magic; `remote_call` argument and reply buffers carry
//! a bare term, no version prefix.

use crate::error::TransportError;
use crate::term::Pid;

/// One event delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Keep-alive probe; no payload.
    Tick,
    /// The peer linked to this node.
    Link,
    /// The peer unlinked or exited; the session terminates.
    Unlink,
    /// A raw inbound message buffer.
    Message(Vec<u8>),
}

/// Synchronous node transport used by the session and the outbound bridge.
pub trait Transport {
    /// Block until the next event arrives.
    fn recv(&mut self) -> Result<TransportEvent, TransportError>;

    /// Send a raw reply buffer to a process.
    fn send(&mut self, target: &Pid, buffer: &[u8]) -> Result<(), TransportError>;

    /// Re-establish the connection after a receive error.
    fn reconnect(&mut self) -> Result<(), TransportError>;

    /// Blocking remote call; `args` holds the encoded argument list and the
    /// returned buffer holds the single reply term.
    fn remote_call(
        &mut self,
        module: &str,
        function: &str,
        args: &[u8],
    ) -> Result<Vec<u8>, TransportError>;
}
