//! Field values and the comparison operators predicates dispatch on.

use std::{
    cmp::Ordering,
    io::{Cursor, Read, Write},
};

use crate::error::SmallError;

/// Logical width of a fixed-width string field, in bytes, as declared
/// in a `TupleDesc`. On disk this is a 4-byte big-endian length
/// prefix followed by `STRING_PAYLOAD_LEN` zero-padded payload bytes;
/// the two together make up `STRING_FIELD_LEN` bytes, so a string
/// field's declared width and its serialized width agree. See
/// DESIGN.md for the reasoning behind this split.
pub const STRING_FIELD_LEN: usize = 128;
const STRING_LEN_PREFIX: usize = 4;
pub const STRING_PAYLOAD_LEN: usize = STRING_FIELD_LEN - STRING_LEN_PREFIX;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Type {
    Int,
    Str,
}

impl Type {
    /// Width in bytes of a field of this type, as stored in a tuple.
    pub fn len(&self) -> usize {
        match self {
            Type::Int => 4,
            Type::Str => STRING_FIELD_LEN,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Op {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEq,
    GreaterThan,
    GreaterThanOrEq,
    Like,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Str(_) => Type::Str,
        }
    }

    /// Six-way comparison against another field. Fields of different
    /// kinds never compare equal; ordering comparisons across kinds
    /// are an error.
    pub fn compare(&self, op: Op, other: &Field) -> Result<bool, SmallError> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => Ok(compare_ord(op, a.cmp(b))),
            (Field::Str(a), Field::Str(b)) => match op {
                Op::Like => Ok(a.contains(b.as_str())),
                _ => Ok(compare_ord(op, a.cmp(b))),
            },
            _ => match op {
                Op::Equals => Ok(false),
                Op::NotEquals => Ok(true),
                Op::Like => Err(SmallError::illegal_argument(
                    "LIKE is only defined between two string fields",
                )),
                _ => Err(SmallError::illegal_argument(format!(
                    "cannot order {:?} against {:?}",
                    self.field_type(),
                    other.field_type()
                ))),
            },
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), SmallError> {
        match self {
            Field::Int(v) => {
                w.write_all(&v.to_be_bytes())?;
            }
            Field::Str(s) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(STRING_PAYLOAD_LEN) as u32;
                w.write_all(&len.to_be_bytes())?;
                let mut payload = [0u8; STRING_PAYLOAD_LEN];
                payload[..len as usize].copy_from_slice(&bytes[..len as usize]);
                w.write_all(&payload)?;
            }
        }
        Ok(())
    }

    pub fn read_from(cursor: &mut Cursor<&[u8]>, t: Type) -> Result<Field, SmallError> {
        match t {
            Type::Int => {
                let mut buf = [0u8; 4];
                cursor.read_exact(&mut buf)?;
                Ok(Field::Int(i32::from_be_bytes(buf)))
            }
            Type::Str => {
                let mut len_buf = [0u8; STRING_LEN_PREFIX];
                cursor.read_exact(&mut len_buf)?;
                let len = u32::from_be_bytes(len_buf) as usize;
                let mut payload = [0u8; STRING_PAYLOAD_LEN];
                cursor.read_exact(&mut payload)?;
                let len = len.min(STRING_PAYLOAD_LEN);
                let s = String::from_utf8_lossy(&payload[..len]).into_owned();
                Ok(Field::Str(s))
            }
        }
    }
}

fn compare_ord(op: Op, ord: Ordering) -> bool {
    match op {
        Op::Equals => ord == Ordering::Equal,
        Op::NotEquals => ord != Ordering::Equal,
        Op::LessThan => ord == Ordering::Less,
        Op::LessThanOrEq => ord != Ordering::Greater,
        Op::GreaterThan => ord == Ordering::Greater,
        Op::GreaterThanOrEq => ord != Ordering::Less,
        Op::Like => false,
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_comparisons() {
        let a = Field::Int(3);
        let b = Field::Int(5);
        assert!(a.compare(Op::LessThan, &b).unwrap());
        assert!(!a.compare(Op::Equals, &b).unwrap());
        assert!(a.compare(Op::LessThanOrEq, &a).unwrap());
    }

    #[test]
    fn string_like() {
        let haystack = Field::Str("hello world".to_string());
        let needle = Field::Str("lo wo".to_string());
        assert!(haystack.compare(Op::Like, &needle).unwrap());
    }

    #[test]
    fn mixed_kind_equality_is_false_ordering_is_error() {
        let a = Field::Int(1);
        let b = Field::Str("1".to_string());
        assert!(!a.compare(Op::Equals, &b).unwrap());
        assert!(a.compare(Op::NotEquals, &b).unwrap());
        assert!(a.compare(Op::LessThan, &b).is_err());
    }

    #[test]
    fn round_trip_serialization() {
        let f = Field::Str("hi".to_string());
        let mut bytes = Vec::new();
        f.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), STRING_FIELD_LEN);
        let mut cursor = Cursor::new(bytes.as_slice());
        let back = Field::read_from(&mut cursor, Type::Str).unwrap();
        assert_eq!(f, back);
    }
}
