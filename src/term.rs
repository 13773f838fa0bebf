//! Actor-side term model
//!
//! `Term` is the in-memory tree the wire layer reads and writes. Lists keep
//! an optional improper tail; the canonical empty list is a `List` with no
//! elements and no tail. Pids carry enough structure to address a reply;
//! ports, references and funs are opaque and only exist so a decoder can
//! skip over them.

/// Maximum byte length of an atom name.
pub const MAX_ATOM_LEN: usize = 255;

/// A remote process identifier, used to address replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pid {
    /// Name of the node the process lives on.
    pub node: String,
    /// Process id.
    pub id: u32,
    /// Serial counter disambiguating reused ids.
    pub serial: u32,
    /// Node incarnation.
    pub creation: u32,
}

/// An actor term.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// An interned name. `nil`, `true` and `false` carry reserved meaning.
    Atom(String),
    /// A signed integer.
    Int(i64),
    /// A double-precision float.
    Float(f64),
    /// A raw byte sequence.
    Binary(Vec<u8>),
    /// A byte sequence rendered on the wire as a list of codes.
    CharList(Vec<u8>),
    /// A fixed-arity ordered sequence.
    Tuple(Vec<Term>),
    /// An ordered sequence, proper unless `tail` is present.
    List {
        /// The list elements.
        elements: Vec<Term>,
        /// Non-nil improper tail, if any.
        tail: Option<Box<Term>>,
    },
    /// A process identifier.
    Pid(Pid),
    /// An opaque port term.
    Port,
    /// An opaque reference term.
    Ref,
    /// An opaque fun term.
    Fun,
}

impl Term {
    /// Build an atom term.
    pub fn atom(name: impl Into<String>) -> Self {
        Term::Atom(name.into())
    }

    /// The canonical empty list.
    pub fn nil_list() -> Self {
        Term::List {
            elements: Vec::new(),
            tail: None,
        }
    }

    /// Build a proper list from elements.
    pub fn list(elements: Vec<Term>) -> Self {
        Term::List {
            elements,
            tail: None,
        }
    }

    /// True for the canonical empty list.
    pub fn is_empty_list(&self) -> bool {
        matches!(
            self,
            Term::List { elements, tail: None } if elements.is_empty()
        )
    }
}
