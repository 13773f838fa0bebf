//! Bidirectional value/term translation
//!
//! Both directions are total over the in-memory trees: every script value
//! has a defined target term, and every term has a defined script value.
//! Malformed input is a property of the wire layer, not of this module.
//!
//! The decode direction is context-sensitive: a 2-tuple found directly is
//! an ordinary positional table, but a 2-tuple found as a list element may
//! fold into the enclosing table's hash part when its first component looks
//! like a short atom name. That heuristic is inherited from the wire
//! format's proplist convention and is deliberately lossy.

use crate::term::{MAX_ATOM_LEN, Term};
use crate::value::{Key, ScriptValue, Table};

/// Translate a script value into an actor term.
///
/// Booleans and nil become the reserved atoms; strings always become
/// binaries; unmarked tables become lists with proplist-style 2-tuples for
/// their hash part. Encoding never fails.
pub fn encode(value: &ScriptValue) -> Term {
    match value {
        ScriptValue::Nil => Term::atom("nil"),
        ScriptValue::Bool(true) => Term::atom("true"),
        ScriptValue::Bool(false) => Term::atom("false"),
        ScriptValue::Int(n) => Term::Int(*n),
        ScriptValue::Float(n) => Term::Float(*n),
        ScriptValue::Str(bytes) => Term::Binary(bytes.clone()),
        ScriptValue::BoxedAtom(name) => {
            Term::Atom(String::from_utf8_lossy(name).into_owned())
        }
        ScriptValue::BoxedString(bytes) => Term::CharList(bytes.clone()),
        ScriptValue::BoxedTuple(elements) => {
            Term::Tuple(elements.iter().map(encode).collect())
        }
        ScriptValue::Table(table) => encode_table(table),
        ScriptValue::Opaque(kind) => Term::atom(kind.atom_name()),
    }
}

fn encode_table(table: &Table) -> Term {
    let mut elements = Vec::with_capacity(table.len());
    let mut next_index = 1i64;
    for (key, value) in table.iter() {
        if matches!(key, Key::Int(i) if *i == next_index) {
            elements.push(encode(value));
            next_index += 1;
        } else {
            elements.push(Term::Tuple(vec![encode_key(key), encode(value)]));
        }
    }
    Term::list(elements)
}

fn encode_key(key: &Key) -> Term {
    match key {
        Key::Str(bytes) if bytes.len() <= MAX_ATOM_LEN => {
            Term::Atom(String::from_utf8_lossy(bytes).into_owned())
        }
        Key::Str(bytes) => Term::Binary(bytes.clone()),
        Key::Int(n) => Term::Int(*n),
        Key::Value(value) => encode(value),
    }
}

/// Translate an actor term into a script value.
///
/// This is the non-list-context entry point: a 2-tuple at this level is an
/// ordinary positional table, never a proplist pair. Unusable terms (pid,
/// port, reference, fun) become nil.
pub fn decode(term: &Term) -> ScriptValue {
    match term {
        Term::Atom(name) => match name.as_str() {
            "nil" => ScriptValue::Nil,
            "true" => ScriptValue::Bool(true),
            "false" => ScriptValue::Bool(false),
            other => ScriptValue::Str(other.as_bytes().to_vec()),
        },
        Term::Int(n) => ScriptValue::Int(*n),
        Term::Float(n) => ScriptValue::Float(*n),
        Term::Binary(bytes) => ScriptValue::Str(bytes.clone()),
        Term::CharList(bytes) => {
            let mut table = Table::new();
            for byte in bytes {
                table.push(ScriptValue::Int(*byte as i64));
            }
            ScriptValue::Table(table)
        }
        Term::Tuple(elements) => {
            ScriptValue::Table(elements.iter().map(decode).collect())
        }
        Term::List { elements, tail } => {
            let mut table = Table::new();
            for element in elements {
                decode_list_element(element, &mut table);
            }
            if let Some(tail) = tail {
                if !tail.is_empty_list() {
                    // improper tail stays positional, never folds
                    table.push(decode(tail));
                }
            }
            ScriptValue::Table(table)
        }
        Term::Pid(_) | Term::Port | Term::Ref | Term::Fun => ScriptValue::Nil,
    }
}

/// Decode one list element into the table under construction.
///
/// A 2-tuple whose first component decodes to a string no longer than the
/// atom length limit is a proplist pair and merges into the hash part;
/// every other element appends at the next array index.
fn decode_list_element(term: &Term, out: &mut Table) {
    if let Term::Tuple(elements) = term {
        if elements.len() == 2 {
            let first = decode(&elements[0]);
            if let ScriptValue::Str(key) = &first {
                if key.len() <= MAX_ATOM_LEN {
                    let value = decode(&elements[1]);
                    out.set(Key::Str(key.clone()), value);
                    return;
                }
            }
            let mut pair = Table::new();
            pair.push(first);
            pair.push(decode(&elements[1]));
            out.push(ScriptValue::Table(pair));
            return;
        }
    }
    out.push(decode(term));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_atoms_decode_to_core_values() {
        assert_eq!(decode(&Term::atom("nil")), ScriptValue::Nil);
        assert_eq!(decode(&Term::atom("true")), ScriptValue::Bool(true));
        assert_eq!(decode(&Term::atom("false")), ScriptValue::Bool(false));
        assert_eq!(decode(&Term::atom("other")), ScriptValue::str("other"));
    }

    #[test]
    fn long_string_key_encodes_as_binary() {
        let long = vec![b'k'; MAX_ATOM_LEN + 1];
        let mut table = Table::new();
        table.set(Key::Str(long.clone()), ScriptValue::Int(1));
        let encoded = encode(&ScriptValue::Table(table));
        assert_eq!(
            encoded,
            Term::list(vec![Term::Tuple(vec![
                Term::Binary(long),
                Term::Int(1)
            ])])
        );
    }

    #[test]
    fn non_string_key_uses_general_rule() {
        let mut table = Table::new();
        table.set(
            Key::Value(Box::new(ScriptValue::Bool(true))),
            ScriptValue::Int(1),
        );
        let encoded = encode(&ScriptValue::Table(table));
        assert_eq!(
            encoded,
            Term::list(vec![Term::Tuple(vec![
                Term::atom("true"),
                Term::Int(1)
            ])])
        );
    }

    #[test]
    fn long_tuple_key_does_not_fold_on_decode() {
        let long_key = Term::Binary(vec![b'k'; MAX_ATOM_LEN + 1]);
        let list = Term::list(vec![Term::Tuple(vec![long_key, Term::Int(1)])]);
        let decoded = decode(&list);
        let ScriptValue::Table(table) = decoded else {
            panic!("expected table");
        };
        assert_eq!(table.array_len(), 1);
    }

    #[test]
    fn improper_tail_appends_positionally() {
        let list = Term::List {
            elements: vec![Term::Int(1), Term::Int(2)],
            tail: Some(Box::new(Term::Int(3))),
        };
        let ScriptValue::Table(table) = decode(&list) else {
            panic!("expected table");
        };
        assert_eq!(table.array_len(), 3);
        assert_eq!(table.get(&Key::Int(3)), Some(&ScriptValue::Int(3)));
    }

    #[test]
    fn pair_like_improper_tail_stays_positional() {
        let pair = Term::Tuple(vec![Term::atom("k"), Term::Int(1)]);
        let list = Term::List {
            elements: vec![Term::Int(1)],
            tail: Some(Box::new(pair)),
        };
        let ScriptValue::Table(table) = decode(&list) else {
            panic!("expected table");
        };
        assert_eq!(table.get(&Key::Str(b"k".to_vec())), None);
        let ScriptValue::Table(inner) = table.get(&Key::Int(2)).unwrap() else {
            panic!("expected positional pair table");
        };
        assert_eq!(inner.get(&Key::Int(1)), Some(&ScriptValue::str("k")));
    }

    #[test]
    fn opaque_kinds_encode_as_tag_atoms() {
        use crate::value::OpaqueKind;
        for (kind, name) in [
            (OpaqueKind::Function, "function"),
            (OpaqueKind::NativeHandle, "userdata"),
            (OpaqueKind::Thread, "thread"),
            (OpaqueKind::LightHandle, "lightuserdata"),
        ] {
            assert_eq!(encode(&ScriptValue::Opaque(kind)), Term::atom(name));
        }
    }

    #[test]
    fn unusable_terms_decode_to_nil() {
        use crate::term::Pid;
        let pid = Term::Pid(Pid {
            node: "n@h".into(),
            id: 1,
            serial: 0,
            creation: 0,
        });
        for term in [pid, Term::Port, Term::Ref, Term::Fun] {
            assert_eq!(decode(&term), ScriptValue::Nil);
        }
    }
}
