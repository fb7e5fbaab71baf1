//! Explicit CBOR layout of an outer link.
//!
//! | Index | Field                   | CBOR type                        |
//! |-------|-------------------------|----------------------------------|
//! | 0     | version                 | uint                             |
//! | 1     | seqno                   | uint                             |
//! | 2     | prev                    | bytes, or null on a chain start  |
//! | 3     | curr                    | bytes                            |
//! | 4     | link type               | uint                             |
//! | 5     | seq type                | uint                             |
//! | 6     | ignore if unsupported   | bool                             |
//! | 7     | skip (optional)         | `[target]` or `[target, hash]`   |
//!
//! A link without a skip pointer is a 7-element array. The seqno-only legacy
//! pointer omits the hash element entirely rather than writing null.

use crate::{LinkId, OuterLink, Seqno, SkipPointer};
use ciborium::value::Value;

pub(crate) const BASE_FIELDS: usize = 7;
pub(crate) const WITH_SKIP_FIELDS: usize = 8;

/// Map an outer link to its CBOR item.
pub(crate) fn to_value(link: &OuterLink) -> Value {
    let mut items = Vec::with_capacity(WITH_SKIP_FIELDS);
    items.push(uint_value(link.version));
    items.push(uint_value(link.seqno.get()));
    items.push(
        link.prev
            .as_ref()
            .map_or(Value::Null, |prev| Value::Bytes(prev.as_bytes().to_vec())),
    );
    items.push(Value::Bytes(link.curr.as_bytes().to_vec()));
    items.push(uint_value(link.link_type.code()));
    items.push(uint_value(link.seq_type.code()));
    items.push(Value::Bool(link.ignore_if_unsupported));

    match &link.skip {
        SkipPointer::Absent => {}
        SkipPointer::SeqnoOnly(target) => {
            items.push(Value::Array(vec![uint_value(target.get())]));
        }
        SkipPointer::Full { target, hash } => {
            items.push(Value::Array(vec![
                uint_value(target.get()),
                Value::Bytes(hash.as_bytes().to_vec()),
            ]));
        }
    }

    Value::Array(items)
}

/// Write a CBOR item to bytes.
pub(crate) fn write(value: &Value) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).map_err(|err| format!("{err:?}"))?;
    Ok(out)
}

/// Shape errors found while reading the CBOR item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("outer link must be an array")]
    NotAnArray,
    #[error("outer link has {0} fields, expected 7 or 8")]
    Arity(usize),
    #[error("field {0} must be an unsigned integer")]
    NotAnInteger(&'static str),
    #[error("field {0} must be a non-empty byte string")]
    NotBytes(&'static str),
    #[error("field {0} must be a boolean")]
    NotABool(&'static str),
    #[error("skip pointer must be an array of 1 or 2 fields")]
    SkipShape,
}

/// Fields as read off the wire, before semantic checks.
pub(crate) struct RawLink {
    pub version: u64,
    pub seqno: Seqno,
    pub prev: Option<LinkId>,
    pub curr: LinkId,
    pub link_type: u64,
    pub seq_type: u64,
    pub ignore_if_unsupported: bool,
    pub skip: SkipPointer,
}

pub(crate) fn from_value(value: Value) -> Result<RawLink, ShapeError> {
    let Value::Array(items) = value else {
        return Err(ShapeError::NotAnArray);
    };
    if items.len() != BASE_FIELDS && items.len() != WITH_SKIP_FIELDS {
        return Err(ShapeError::Arity(items.len()));
    }

    let mut items = items.into_iter();
    let mut next = || items.next().unwrap_or(Value::Null);

    let version = uint(next(), "version")?;
    let seqno = Seqno(uint(next(), "seqno")?);
    let prev = match next() {
        Value::Null => None,
        other => Some(hash(other, "prev")?),
    };
    let curr = hash(next(), "curr")?;
    let link_type = uint(next(), "link_type")?;
    let seq_type = uint(next(), "seq_type")?;
    let ignore_if_unsupported = match next() {
        Value::Bool(flag) => flag,
        _ => return Err(ShapeError::NotABool("ignore_if_unsupported")),
    };
    let skip = match items.next() {
        None => SkipPointer::Absent,
        Some(value) => skip(value)?,
    };

    Ok(RawLink {
        version,
        seqno,
        prev,
        curr,
        link_type,
        seq_type,
        ignore_if_unsupported,
        skip,
    })
}

fn skip(value: Value) -> Result<SkipPointer, ShapeError> {
    let Value::Array(parts) = value else {
        return Err(ShapeError::SkipShape);
    };
    let mut parts = parts.into_iter();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(target), None, None) => Ok(SkipPointer::SeqnoOnly(Seqno(uint(target, "skip.target")?))),
        (Some(target), Some(bytes), None) => Ok(SkipPointer::Full {
            target: Seqno(uint(target, "skip.target")?),
            hash: hash(bytes, "skip.hash")?,
        }),
        _ => Err(ShapeError::SkipShape),
    }
}

fn uint_value(n: u64) -> Value {
    Value::Integer(n.into())
}

fn uint(value: Value, field: &'static str) -> Result<u64, ShapeError> {
    match value {
        Value::Integer(n) => u64::try_from(n).map_err(|_| ShapeError::NotAnInteger(field)),
        _ => Err(ShapeError::NotAnInteger(field)),
    }
}

fn hash(value: Value, field: &'static str) -> Result<LinkId, ShapeError> {
    match value {
        Value::Bytes(bytes) => LinkId::new(bytes).ok_or(ShapeError::NotBytes(field)),
        _ => Err(ShapeError::NotBytes(field)),
    }
}
