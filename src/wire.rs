//! Primitive term-buffer codec
//!
//! Reader/writer pair over the Erlang external term format. The writer
//! appends to a growable buffer; the reader walks a borrowed buffer with a
//! cursor. Both operate tag-by-tag so the dispatcher can decode an envelope
//! incrementally, and both offer whole-term operations for payloads.
//!
//! Ports, references and funs are decoded structurally so the cursor moves
//! past them, but they surface as opaque terms and can never be written.

use crate::error::{WireError, WireResult};
use crate::term::{MAX_ATOM_LEN, Pid, Term};

/// Version magic prefixing every distribution message.
pub const VERSION_MAGIC: u8 = 131;

/// Small integer (0-255)
pub const SMALL_INTEGER_EXT: u8 = 97;
/// Integer (32-bit signed)
pub const INTEGER_EXT: u8 = 98;
/// Float (legacy 31-byte decimal string)
pub const FLOAT_EXT: u8 = 99;
/// New float (IEEE 754, 8 bytes)
pub const NEW_FLOAT_EXT: u8 = 70;
/// Atom (legacy, length u16)
pub const ATOM_EXT: u8 = 100;
/// Small atom (legacy, length u8)
pub const SMALL_ATOM_EXT: u8 = 115;
/// Atom UTF-8 (length u16)
pub const ATOM_UTF8_EXT: u8 = 118;
/// Small atom UTF-8 (length u8)
pub const SMALL_ATOM_UTF8_EXT: u8 = 119;
/// Small tuple (arity u8)
pub const SMALL_TUPLE_EXT: u8 = 104;
/// Large tuple (arity u32)
pub const LARGE_TUPLE_EXT: u8 = 105;
/// Nil (empty list)
pub const NIL_EXT: u8 = 106;
/// String (list of bytes, length u16)
pub const STRING_EXT: u8 = 107;
/// List (length u32 plus tail term)
pub const LIST_EXT: u8 = 108;
/// Binary (length u32)
pub const BINARY_EXT: u8 = 109;
/// Small big integer (byte count u8)
pub const SMALL_BIG_EXT: u8 = 110;
/// Large big integer (byte count u32)
pub const LARGE_BIG_EXT: u8 = 111;
/// Pid (legacy, u8 creation)
pub const PID_EXT: u8 = 103;
/// New pid (u32 creation)
pub const NEW_PID_EXT: u8 = 88;
/// Port (legacy, u8 creation)
pub const PORT_EXT: u8 = 102;
/// New port (u32 creation)
pub const NEW_PORT_EXT: u8 = 89;
/// V4 port (u64 id)
pub const V4_PORT_EXT: u8 = 120;
/// Reference (legacy single word)
pub const REFERENCE_EXT: u8 = 101;
/// New reference (u8 creation)
pub const NEW_REFERENCE_EXT: u8 = 114;
/// Newer reference (u32 creation)
pub const NEWER_REFERENCE_EXT: u8 = 90;
/// New fun (self-sizing)
pub const NEW_FUN_EXT: u8 = 112;
/// Export fun (module/function/arity)
pub const EXPORT_EXT: u8 = 113;

/// Growable output buffer with encode primitives.
#[derive(Debug, Default)]
pub struct TermWriter {
    buf: Vec<u8>,
}

impl TermWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer and return the buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Append the version magic.
    pub fn version(&mut self) {
        self.buf.push(VERSION_MAGIC);
    }

    /// Append an atom. Names longer than [`MAX_ATOM_LEN`] bytes are
    /// rejected.
    pub fn atom(&mut self, name: &str) -> WireResult<()> {
        if name.len() > MAX_ATOM_LEN {
            return Err(WireError::AtomTooLong(name.len()));
        }
        self.buf.push(SMALL_ATOM_UTF8_EXT);
        self.buf.push(name.len() as u8);
        self.buf.extend_from_slice(name.as_bytes());
        Ok(())
    }

    /// Append a signed integer in its smallest wire form.
    pub fn integer(&mut self, value: i64) {
        if (0..=255).contains(&value) {
            self.buf.push(SMALL_INTEGER_EXT);
            self.buf.push(value as u8);
        } else if value >= i32::MIN as i64 && value <= i32::MAX as i64 {
            self.buf.push(INTEGER_EXT);
            self.buf.extend_from_slice(&(value as i32).to_be_bytes());
        } else {
            let (sign, magnitude) = if value < 0 {
                (1u8, (value as i128).unsigned_abs() as u64)
            } else {
                (0u8, value as u64)
            };
            let le = magnitude.to_le_bytes();
            let len = le.iter().rposition(|b| *b != 0).map_or(1, |p| p + 1);
            self.buf.push(SMALL_BIG_EXT);
            self.buf.push(len as u8);
            self.buf.push(sign);
            self.buf.extend_from_slice(&le[..len]);
        }
    }

    /// Append a float.
    pub fn float(&mut self, value: f64) {
        self.buf.push(NEW_FLOAT_EXT);
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Append a binary.
    pub fn binary(&mut self, bytes: &[u8]) {
        self.buf.push(BINARY_EXT);
        self.buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(bytes);
    }

    /// Append a list-of-codes string. Limited to u16 lengths by the format.
    pub fn charlist(&mut self, bytes: &[u8]) -> WireResult<()> {
        if bytes.len() > u16::MAX as usize {
            return Err(WireError::StringTooLong(bytes.len()));
        }
        self.buf.push(STRING_EXT);
        self.buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Append a tuple header for `arity` elements.
    pub fn tuple_header(&mut self, arity: usize) {
        if arity <= 255 {
            self.buf.push(SMALL_TUPLE_EXT);
            self.buf.push(arity as u8);
        } else {
            self.buf.push(LARGE_TUPLE_EXT);
            self.buf.extend_from_slice(&(arity as u32).to_be_bytes());
        }
    }

    /// Append a list header for `len` elements. A tail term (or the empty
    /// list) must follow the elements.
    pub fn list_header(&mut self, len: usize) {
        self.buf.push(LIST_EXT);
        self.buf.extend_from_slice(&(len as u32).to_be_bytes());
    }

    /// Append the empty list.
    pub fn empty_list(&mut self) {
        self.buf.push(NIL_EXT);
    }

    /// Append a pid.
    pub fn pid(&mut self, pid: &Pid) -> WireResult<()> {
        self.buf.push(NEW_PID_EXT);
        self.atom(&pid.node)?;
        self.buf.extend_from_slice(&pid.id.to_be_bytes());
        self.buf.extend_from_slice(&pid.serial.to_be_bytes());
        self.buf.extend_from_slice(&pid.creation.to_be_bytes());
        Ok(())
    }

    /// Append a whole term tree.
    pub fn term(&mut self, term: &Term) -> WireResult<()> {
        match term {
            Term::Atom(name) => self.atom(name),
            Term::Int(value) => {
                self.integer(*value);
                Ok(())
            }
            Term::Float(value) => {
                self.float(*value);
                Ok(())
            }
            Term::Binary(bytes) => {
                self.binary(bytes);
                Ok(())
            }
            Term::CharList(bytes) => self.charlist(bytes),
            Term::Tuple(elements) => {
                self.tuple_header(elements.len());
                for element in elements {
                    self.term(element)?;
                }
                Ok(())
            }
            Term::List { elements, tail } => {
                if elements.is_empty() && tail.is_none() {
                    self.empty_list();
                    return Ok(());
                }
                self.list_header(elements.len());
                for element in elements {
                    self.term(element)?;
                }
                match tail {
                    Some(tail) => self.term(tail),
                    None => {
                        self.empty_list();
                        Ok(())
                    }
                }
            }
            Term::Pid(pid) => self.pid(pid),
            Term::Port | Term::Ref | Term::Fun => Err(WireError::Unencodable),
        }
    }
}

/// Cursor over an incoming term buffer with decode primitives.
#[derive(Debug)]
pub struct TermReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> TermReader<'a> {
    /// Wrap a raw buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Tag byte at the cursor, without advancing.
    pub fn peek_tag(&self) -> WireResult<u8> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or(WireError::Truncated { at: self.pos })
    }

    fn take(&mut self, n: usize) -> WireResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(WireError::Truncated { at: self.pos })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> WireResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16_be(&mut self) -> WireResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32_be(&mut self) -> WireResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn i32_be(&mut self) -> WireResult<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn f64_be(&mut self) -> WireResult<f64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_be_bytes(raw))
    }

    /// Expect and consume the version magic.
    pub fn read_version(&mut self) -> WireResult<()> {
        let found = self.u8()?;
        if found == VERSION_MAGIC {
            Ok(())
        } else {
            Err(WireError::BadVersion(found))
        }
    }

    /// Expect and consume a tuple header, returning its arity.
    pub fn read_tuple_header(&mut self) -> WireResult<usize> {
        let tag = self.u8()?;
        match tag {
            SMALL_TUPLE_EXT => Ok(self.u8()? as usize),
            LARGE_TUPLE_EXT => Ok(self.u32_be()? as usize),
            other => Err(WireError::UnexpectedTag {
                expected: "tuple",
                found: other,
            }),
        }
    }

    /// Expect and consume an atom, returning its name.
    pub fn read_atom(&mut self) -> WireResult<String> {
        let tag = self.u8()?;
        let len = match tag {
            ATOM_EXT | ATOM_UTF8_EXT => self.u16_be()? as usize,
            SMALL_ATOM_EXT | SMALL_ATOM_UTF8_EXT => self.u8()? as usize,
            other => {
                return Err(WireError::UnexpectedTag {
                    expected: "atom",
                    found: other,
                });
            }
        };
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidAtomName)
    }

    /// Expect and consume a pid in either wire form.
    pub fn read_pid(&mut self) -> WireResult<Pid> {
        let tag = self.u8()?;
        match tag {
            PID_EXT => {
                let node = self.read_atom()?;
                let id = self.u32_be()?;
                let serial = self.u32_be()?;
                let creation = self.u8()? as u32;
                Ok(Pid {
                    node,
                    id,
                    serial,
                    creation,
                })
            }
            NEW_PID_EXT => {
                let node = self.read_atom()?;
                let id = self.u32_be()?;
                let serial = self.u32_be()?;
                let creation = self.u32_be()?;
                Ok(Pid {
                    node,
                    id,
                    serial,
                    creation,
                })
            }
            other => Err(WireError::UnexpectedTag {
                expected: "pid",
                found: other,
            }),
        }
    }

    fn read_big(&mut self, len: usize) -> WireResult<i64> {
        let sign = self.u8()?;
        let bytes = self.take(len)?;
        let mut magnitude: u128 = 0;
        for (i, byte) in bytes.iter().enumerate() {
            if *byte != 0 && i >= 16 {
                return Err(WireError::IntegerOverflow);
            }
            if i < 16 {
                magnitude |= (*byte as u128) << (8 * i);
            }
        }
        let signed = if sign == 0 {
            i64::try_from(magnitude).map_err(|_| WireError::IntegerOverflow)?
        } else {
            let neg = (magnitude as i128).checked_neg().ok_or(WireError::IntegerOverflow)?;
            i64::try_from(neg).map_err(|_| WireError::IntegerOverflow)?
        };
        Ok(signed)
    }

    /// Decode one whole term at the cursor.
    pub fn read_term(&mut self) -> WireResult<Term> {
        let tag = self.u8()?;
        match tag {
            SMALL_INTEGER_EXT => Ok(Term::Int(self.u8()? as i64)),
            INTEGER_EXT => Ok(Term::Int(self.i32_be()? as i64)),
            SMALL_BIG_EXT => {
                let len = self.u8()? as usize;
                Ok(Term::Int(self.read_big(len)?))
            }
            LARGE_BIG_EXT => {
                let len = self.u32_be()? as usize;
                Ok(Term::Int(self.read_big(len)?))
            }
            NEW_FLOAT_EXT => Ok(Term::Float(self.f64_be()?)),
            FLOAT_EXT => {
                let bytes = self.take(31)?;
                let end = bytes.iter().position(|b| *b == 0).unwrap_or(31);
                let text =
                    std::str::from_utf8(&bytes[..end]).map_err(|_| WireError::InvalidFloat)?;
                text.trim()
                    .parse::<f64>()
                    .map(Term::Float)
                    .map_err(|_| WireError::InvalidFloat)
            }
            ATOM_EXT | ATOM_UTF8_EXT => {
                let len = self.u16_be()? as usize;
                let bytes = self.take(len)?;
                String::from_utf8(bytes.to_vec())
                    .map(Term::Atom)
                    .map_err(|_| WireError::InvalidAtomName)
            }
            SMALL_ATOM_EXT | SMALL_ATOM_UTF8_EXT => {
                let len = self.u8()? as usize;
                let bytes = self.take(len)?;
                String::from_utf8(bytes.to_vec())
                    .map(Term::Atom)
                    .map_err(|_| WireError::InvalidAtomName)
            }
            STRING_EXT => {
                let len = self.u16_be()? as usize;
                Ok(Term::CharList(self.take(len)?.to_vec()))
            }
            BINARY_EXT => {
                let len = self.u32_be()? as usize;
                Ok(Term::Binary(self.take(len)?.to_vec()))
            }
            NIL_EXT => Ok(Term::nil_list()),
            LIST_EXT => {
                let len = self.u32_be()? as usize;
                let mut elements = Vec::with_capacity(len.min(4096));
                for _ in 0..len {
                    elements.push(self.read_term()?);
                }
                let tail = self.read_term()?;
                let tail = if tail.is_empty_list() {
                    None
                } else {
                    Some(Box::new(tail))
                };
                Ok(Term::List { elements, tail })
            }
            SMALL_TUPLE_EXT => {
                let arity = self.u8()? as usize;
                let mut elements = Vec::with_capacity(arity);
                for _ in 0..arity {
                    elements.push(self.read_term()?);
                }
                Ok(Term::Tuple(elements))
            }
            LARGE_TUPLE_EXT => {
                let arity = self.u32_be()? as usize;
                let mut elements = Vec::with_capacity(arity.min(4096));
                for _ in 0..arity {
                    elements.push(self.read_term()?);
                }
                Ok(Term::Tuple(elements))
            }
            PID_EXT | NEW_PID_EXT => {
                self.pos -= 1;
                Ok(Term::Pid(self.read_pid()?))
            }
            PORT_EXT => {
                self.read_atom()?;
                self.u32_be()?;
                self.u8()?;
                Ok(Term::Port)
            }
            NEW_PORT_EXT => {
                self.read_atom()?;
                self.u32_be()?;
                self.u32_be()?;
                Ok(Term::Port)
            }
            V4_PORT_EXT => {
                self.read_atom()?;
                self.take(8)?;
                self.u32_be()?;
                Ok(Term::Port)
            }
            REFERENCE_EXT => {
                self.read_atom()?;
                self.u32_be()?;
                self.u8()?;
                Ok(Term::Ref)
            }
            NEW_REFERENCE_EXT => {
                let words = self.u16_be()? as usize;
                self.read_atom()?;
                self.u8()?;
                self.take(4 * words)?;
                Ok(Term::Ref)
            }
            NEWER_REFERENCE_EXT => {
                let words = self.u16_be()? as usize;
                self.read_atom()?;
                self.u32_be()?;
                self.take(4 * words)?;
                Ok(Term::Ref)
            }
            NEW_FUN_EXT => {
                let size = self.u32_be()? as usize;
                // size counts everything after the tag, itself included
                let rest = size
                    .checked_sub(4)
                    .ok_or(WireError::Truncated { at: self.pos })?;
                self.take(rest)?;
                Ok(Term::Fun)
            }
            EXPORT_EXT => {
                self.read_term()?;
                self.read_term()?;
                self.read_term()?;
                Ok(Term::Fun)
            }
            other => Err(WireError::UnsupportedTag(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(term: &Term) -> Term {
        let mut writer = TermWriter::new();
        writer.term(term).unwrap();
        let bytes = writer.into_bytes();
        let mut reader = TermReader::new(&bytes);
        let decoded = reader.read_term().unwrap();
        assert_eq!(reader.position(), bytes.len());
        decoded
    }

    #[test]
    fn integers_pick_smallest_form() {
        let mut writer = TermWriter::new();
        writer.integer(7);
        writer.integer(1000);
        writer.integer(i64::MAX);
        let bytes = writer.into_bytes();
        assert_eq!(bytes[0], SMALL_INTEGER_EXT);
        assert_eq!(bytes[2], INTEGER_EXT);
        assert_eq!(bytes[7], SMALL_BIG_EXT);
    }

    #[test]
    fn integer_round_trips() {
        for value in [0i64, 255, 256, -1, i32::MAX as i64 + 1, i64::MAX, i64::MIN] {
            assert_eq!(round_trip(&Term::Int(value)), Term::Int(value));
        }
    }

    #[test]
    fn atom_and_legacy_atom_decode() {
        assert_eq!(round_trip(&Term::atom("ok")), Term::atom("ok"));

        // legacy ATOM_EXT with u16 length
        let mut bytes = vec![ATOM_EXT, 0, 2];
        bytes.extend_from_slice(b"ok");
        let mut reader = TermReader::new(&bytes);
        assert_eq!(reader.read_term().unwrap(), Term::atom("ok"));
    }

    #[test]
    fn atom_too_long_rejected() {
        let name = "a".repeat(MAX_ATOM_LEN + 1);
        let mut writer = TermWriter::new();
        assert!(matches!(writer.atom(&name), Err(WireError::AtomTooLong(_))));
    }

    #[test]
    fn float_round_trips_and_legacy_decodes() {
        assert_eq!(round_trip(&Term::Float(2.5)), Term::Float(2.5));

        let mut bytes = vec![FLOAT_EXT];
        let mut text = [0u8; 31];
        text[..19].copy_from_slice(b"3.14000000000000e+0");
        bytes.extend_from_slice(&text);
        let mut reader = TermReader::new(&bytes);
        assert_eq!(reader.read_term().unwrap(), Term::Float(3.14));
    }

    #[test]
    fn binary_and_charlist_round_trip() {
        assert_eq!(
            round_trip(&Term::Binary(b"abc".to_vec())),
            Term::Binary(b"abc".to_vec())
        );
        assert_eq!(
            round_trip(&Term::CharList(vec![97, 98, 99])),
            Term::CharList(vec![97, 98, 99])
        );
    }

    #[test]
    fn proper_and_improper_lists_round_trip() {
        let proper = Term::list(vec![Term::Int(1), Term::atom("two")]);
        assert_eq!(round_trip(&proper), proper);

        let improper = Term::List {
            elements: vec![Term::Int(1)],
            tail: Some(Box::new(Term::Int(2))),
        };
        assert_eq!(round_trip(&improper), improper);

        assert_eq!(round_trip(&Term::nil_list()), Term::nil_list());
    }

    #[test]
    fn tuples_round_trip() {
        let tuple = Term::Tuple(vec![Term::atom("a"), Term::Int(1)]);
        assert_eq!(round_trip(&tuple), tuple);
    }

    #[test]
    fn pid_round_trips_in_new_form() {
        let pid = Pid {
            node: "node@host".to_string(),
            id: 42,
            serial: 7,
            creation: 3,
        };
        let mut writer = TermWriter::new();
        writer.pid(&pid).unwrap();
        let bytes = writer.into_bytes();
        let mut reader = TermReader::new(&bytes);
        assert_eq!(reader.read_pid().unwrap(), pid);
    }

    #[test]
    fn envelope_primitives() {
        let mut writer = TermWriter::new();
        writer.version();
        writer.tuple_header(2);
        writer.atom("stop").unwrap();
        writer.integer(1);
        let bytes = writer.into_bytes();

        let mut reader = TermReader::new(&bytes);
        reader.read_version().unwrap();
        assert_eq!(reader.peek_tag().unwrap(), SMALL_TUPLE_EXT);
        assert_eq!(reader.read_tuple_header().unwrap(), 2);
        assert_eq!(reader.read_atom().unwrap(), "stop");
    }

    #[test]
    fn truncated_buffers_error() {
        let mut writer = TermWriter::new();
        writer.binary(b"abcdef");
        let bytes = writer.into_bytes();
        let mut reader = TermReader::new(&bytes[..4]);
        assert!(matches!(
            reader.read_term(),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn bad_version_reported() {
        let mut reader = TermReader::new(&[130, 0]);
        assert!(matches!(
            reader.read_version(),
            Err(WireError::BadVersion(130))
        ));
    }

    #[test]
    fn opaque_terms_are_skipped_not_written() {
        // port: node atom, id, creation
        let mut bytes = vec![NEW_PORT_EXT, SMALL_ATOM_UTF8_EXT, 1, b'n'];
        bytes.extend_from_slice(&5u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.push(SMALL_INTEGER_EXT);
        bytes.push(9);
        let mut reader = TermReader::new(&bytes);
        assert_eq!(reader.read_term().unwrap(), Term::Port);
        assert_eq!(reader.read_term().unwrap(), Term::Int(9));

        let mut writer = TermWriter::new();
        assert!(matches!(writer.term(&Term::Ref), Err(WireError::Unencodable)));
    }
}
