//! Error types for the bridge
//!
//! One thiserror enum per failure domain, with conversions at the control
//! boundaries. The session keeps most of these local: malformed input and
//! script failures become error replies, and only transport failures on
//! reconnect or on sending a computed reply escape as fatal.

use thiserror::Error;

pub use crate::value::ValueError;

/// Malformed or unrepresentable term buffer.
#[derive(Debug, Error, PartialEq)]
pub enum WireError {
    /// Buffer ended mid-term.
    #[error("term buffer truncated at byte {at}")]
    Truncated {
        /// Cursor position where data ran out.
        at: usize,
    },

    /// Version magic missing or wrong.
    #[error("bad version magic: {0}")]
    BadVersion(u8),

    /// A specific term kind was required at the cursor.
    #[error("expected {expected} term, found tag {found}")]
    UnexpectedTag {
        /// Required term kind.
        expected: &'static str,
        /// Tag byte actually present.
        found: u8,
    },

    /// Tag byte outside the supported term set.
    #[error("unsupported term tag {0}")]
    UnsupportedTag(u8),

    /// Atom name exceeds the wire limit.
    #[error("atom name of {0} bytes exceeds the atom length limit")]
    AtomTooLong(usize),

    /// String payload exceeds the u16 length field.
    #[error("string of {0} bytes exceeds the string length limit")]
    StringTooLong(usize),

    /// Big integer does not fit a 64-bit signed value.
    #[error("integer does not fit in 64 bits")]
    IntegerOverflow,

    /// Atom name was not valid UTF-8.
    #[error("atom name is not valid UTF-8")]
    InvalidAtomName,

    /// Legacy float text did not parse.
    #[error("malformed float term")]
    InvalidFloat,

    /// Ports, references and funs have no encoding here.
    #[error("term kind cannot be encoded")]
    Unencodable,
}

/// Convenience result alias for wire operations.
pub type WireResult<T> = std::result::Result<T, WireError>;

/// Failure reported by the script runtime.
#[derive(Debug, Error, PartialEq)]
#[error("{message}")]
pub struct ScriptError {
    /// Runtime-supplied error text.
    pub message: String,
}

impl ScriptError {
    /// Wrap runtime error text.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure reported by the transport collaborator.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message} ({code})")]
pub struct TransportError {
    /// Numeric error code from the transport.
    pub code: i32,
    /// Human-readable reason.
    pub message: String,
}

impl TransportError {
    /// Build a transport error from a code and reason.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Failure of an outbound remote call, surfaced to script code.
#[derive(Debug, Error, PartialEq)]
pub enum BridgeError {
    /// A module or function name argument was not a string.
    #[error("bad argument #{position} to 'erl_rpc' (string expected)")]
    NameNotString {
        /// 1-based argument position.
        position: usize,
    },

    /// The remote round-trip failed.
    #[error("erl_rpc({module}, {function}, ...) call error: {source}")]
    Call {
        /// Remote module name.
        module: String,
        /// Remote function name.
        function: String,
        /// Underlying transport failure with its numeric code.
        source: TransportError,
    },

    /// An argument could not be encoded for the wire.
    #[error("erl_rpc argument encoding failed: {0}")]
    Args(WireError),

    /// The reply buffer could not be decoded.
    #[error("erl_rpc reply value error (unable to decode value)")]
    Reply(#[from] WireError),
}

impl From<BridgeError> for ScriptError {
    fn from(err: BridgeError) -> Self {
        ScriptError::new(err.to_string())
    }
}

/// Fatal session failure; everything recoverable stays inside the loop.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reconnect after a receive error failed.
    #[error("reconnect failed: {0}")]
    Reconnect(TransportError),

    /// A computed reply could not be delivered.
    #[error("reply send failed: {0}")]
    ReplySend(TransportError),
}

/// Convenience result alias for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;
