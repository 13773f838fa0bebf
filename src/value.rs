//! Script-side value model
//!
//! `ScriptValue` is the in-memory tree the codec translates to and from
//! actor terms. Tables keep their entries in insertion order so the
//! array-part/hash-part split of the encoding rules falls out of a single
//! enumeration pass. The three boxing constructors replace the original
//! hidden marker keys with explicit tagged variants.

use thiserror::Error;

/// Error raised by the boxing constructors when the argument has the
/// wrong underlying kind.
#[derive(Debug, Error, PartialEq)]
pub enum ValueError {
    /// `boxed_atom` called on a non-string value.
    #[error("bad argument #1 to 'erl_atom' (string expected)")]
    AtomBoxNotString,
    /// `boxed_string` called on a non-string value.
    #[error("bad argument #1 to 'erl_string' (string expected)")]
    StringBoxNotString,
    /// `boxed_tuple` called on a non-table value.
    #[error("bad argument #1 to 'erl_tuple' (table expected)")]
    TupleBoxNotTable,
}

/// Opaque script-runtime kinds that cannot be translated and encode as
/// tag atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpaqueKind {
    /// A script function value.
    Function,
    /// A host-owned heavy handle.
    NativeHandle,
    /// A coroutine/thread handle.
    Thread,
    /// A host-owned light pointer handle.
    LightHandle,
}

impl OpaqueKind {
    /// Atom name this kind encodes to.
    pub fn atom_name(self) -> &'static str {
        match self {
            OpaqueKind::Function => "function",
            OpaqueKind::NativeHandle => "userdata",
            OpaqueKind::Thread => "thread",
            OpaqueKind::LightHandle => "lightuserdata",
        }
    }
}

/// Boxing marker carried by a value, as reported by
/// [`ScriptValue::marker_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// No marker; ordinary value.
    None,
    /// Encode as an atom.
    Atom,
    /// Encode as a list-of-codes string.
    String,
    /// Encode as a fixed-arity tuple.
    Tuple,
}

/// A table key. Non-integer, non-string keys carry the full value.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// Integer key; keys `1..n` form the array part.
    Int(i64),
    /// Raw byte-string key.
    Str(Vec<u8>),
    /// Any other value used as a key.
    Value(Box<ScriptValue>),
}

/// Ordered key/value mapping with Lua-style array semantics.
///
/// Entries are kept in insertion order. The contiguous run of integer
/// keys `1..n` is the array part; everything else is the hash part.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    entries: Vec<(Key, ScriptValue)>,
    // cached length of the contiguous 1..n prefix
    contiguous: usize,
}

impl Table {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` at the next free array index.
    pub fn push(&mut self, value: ScriptValue) {
        let next = self.contiguous as i64 + 1;
        self.entries.push((Key::Int(next), value));
        self.contiguous += 1;
    }

    /// Set `key` to `value`, replacing an existing entry for the same key.
    pub fn set(&mut self, key: Key, value: ScriptValue) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
            return;
        }
        let filled_next = matches!(&key, Key::Int(i) if *i == self.contiguous as i64 + 1);
        self.entries.push((key, value));
        if filled_next {
            self.contiguous += 1;
            // an earlier out-of-order set may have parked keys past the gap
            while self.get(&Key::Int(self.contiguous as i64 + 1)).is_some() {
                self.contiguous += 1;
            }
        }
    }

    /// Look up the value stored under `key`.
    pub fn get(&self, key: &Key) -> Option<&ScriptValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(Key, ScriptValue)> {
        self.entries.iter()
    }

    /// Number of entries, array and hash parts together.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Length of the contiguous array part: the largest `n` such that
    /// keys `1..=n` are all present.
    pub fn array_len(&self) -> usize {
        self.contiguous
    }

    /// Clone of the array part, in positional order.
    pub fn array_part(&self) -> Vec<ScriptValue> {
        (1..=self.array_len() as i64)
            .map(|i| self.get(&Key::Int(i)).cloned().unwrap_or(ScriptValue::Nil))
            .collect()
    }
}

impl FromIterator<ScriptValue> for Table {
    fn from_iter<I: IntoIterator<Item = ScriptValue>>(iter: I) -> Self {
        let mut table = Table::new();
        for value in iter {
            table.push(value);
        }
        table
    }
}

/// A dynamically-typed script value.
///
/// Strings are raw byte sequences; numbers are split into the integer
/// and float subkinds at construction via [`ScriptValue::number`]. The
/// three `Boxed*` variants are the explicit markers requesting
/// atom/string/tuple wire semantics.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// The nil value.
    Nil,
    /// A boolean.
    Bool(bool),
    /// An exactly-representable integer number.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A raw byte string.
    Str(Vec<u8>),
    /// An ordered table.
    Table(Table),
    /// Marker requesting atom encoding of the boxed string.
    BoxedAtom(Vec<u8>),
    /// Marker requesting list-of-codes string encoding of the boxed string.
    BoxedString(Vec<u8>),
    /// Marker requesting tuple encoding of the boxed positional sequence.
    BoxedTuple(Vec<ScriptValue>),
    /// An untranslatable runtime value.
    Opaque(OpaqueKind),
}

impl ScriptValue {
    /// Build a string value from text.
    pub fn str(text: impl AsRef<[u8]>) -> Self {
        ScriptValue::Str(text.as_ref().to_vec())
    }

    /// Classify a raw number into the integer or float subkind.
    ///
    /// A number is an integer iff truncating it toward zero and
    /// converting back losslessly reproduces the same value.
    pub fn number(n: f64) -> Self {
        let truncated = n.trunc();
        if truncated == n && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
            ScriptValue::Int(truncated as i64)
        } else {
            ScriptValue::Float(n)
        }
    }

    /// Box a string value for atom encoding.
    pub fn boxed_atom(value: ScriptValue) -> Result<Self, ValueError> {
        match value {
            ScriptValue::Str(bytes) => Ok(ScriptValue::BoxedAtom(bytes)),
            _ => Err(ValueError::AtomBoxNotString),
        }
    }

    /// Box a string value for list-of-codes string encoding.
    pub fn boxed_string(value: ScriptValue) -> Result<Self, ValueError> {
        match value {
            ScriptValue::Str(bytes) => Ok(ScriptValue::BoxedString(bytes)),
            _ => Err(ValueError::StringBoxNotString),
        }
    }

    /// Box a table's positional sequence for tuple encoding.
    pub fn boxed_tuple(value: ScriptValue) -> Result<Self, ValueError> {
        match value {
            ScriptValue::Table(table) => Ok(ScriptValue::BoxedTuple(table.array_part())),
            _ => Err(ValueError::TupleBoxNotTable),
        }
    }

    /// Report which boxing marker, if any, this value carries.
    pub fn marker_kind(&self) -> MarkerKind {
        match self {
            ScriptValue::BoxedAtom(_) => MarkerKind::Atom,
            ScriptValue::BoxedString(_) => MarkerKind::String,
            ScriptValue::BoxedTuple(_) => MarkerKind::Tuple,
            _ => MarkerKind::None,
        }
    }

    /// Borrow the string bytes if this is a string value.
    pub fn as_str(&self) -> Option<&[u8]> {
        match self {
            ScriptValue::Str(bytes) => Some(bytes),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_classification() {
        assert_eq!(ScriptValue::number(5.0), ScriptValue::Int(5));
        assert_eq!(ScriptValue::number(-3.0), ScriptValue::Int(-3));
        assert_eq!(ScriptValue::number(5.5), ScriptValue::Float(5.5));
        assert_eq!(ScriptValue::number(-0.25), ScriptValue::Float(-0.25));
    }

    #[test]
    fn table_array_and_hash_parts() {
        let mut t = Table::new();
        t.push(ScriptValue::Int(10));
        t.push(ScriptValue::Int(20));
        t.set(Key::Str(b"x".to_vec()), ScriptValue::Int(30));
        assert_eq!(t.array_len(), 2);
        assert_eq!(t.len(), 3);
        assert_eq!(t.get(&Key::Str(b"x".to_vec())), Some(&ScriptValue::Int(30)));
    }

    #[test]
    fn out_of_order_integer_keys_extend_the_array_part() {
        let mut t = Table::new();
        t.set(Key::Int(2), ScriptValue::Int(20));
        assert_eq!(t.array_len(), 0);
        t.set(Key::Int(1), ScriptValue::Int(10));
        assert_eq!(t.array_len(), 2);
    }

    #[test]
    fn push_skips_hash_entries() {
        let mut t = Table::new();
        t.set(Key::Str(b"k".to_vec()), ScriptValue::Nil);
        t.push(ScriptValue::Bool(true));
        assert_eq!(t.get(&Key::Int(1)), Some(&ScriptValue::Bool(true)));
    }

    #[test]
    fn boxing_validates_kind() {
        assert!(ScriptValue::boxed_atom(ScriptValue::str("ok")).is_ok());
        assert_eq!(
            ScriptValue::boxed_atom(ScriptValue::Int(1)),
            Err(ValueError::AtomBoxNotString)
        );
        assert_eq!(
            ScriptValue::boxed_string(ScriptValue::Nil),
            Err(ValueError::StringBoxNotString)
        );
        assert_eq!(
            ScriptValue::boxed_tuple(ScriptValue::str("no")),
            Err(ValueError::TupleBoxNotTable)
        );
    }

    #[test]
    fn boxed_tuple_takes_positional_sequence_only() {
        let mut t = Table::new();
        t.push(ScriptValue::Int(1));
        t.push(ScriptValue::Int(2));
        t.set(Key::Str(b"ignored".to_vec()), ScriptValue::Int(3));
        let boxed = ScriptValue::boxed_tuple(ScriptValue::Table(t)).unwrap();
        assert_eq!(
            boxed,
            ScriptValue::BoxedTuple(vec![ScriptValue::Int(1), ScriptValue::Int(2)])
        );
        assert_eq!(boxed.marker_kind(), MarkerKind::Tuple);
    }
}
