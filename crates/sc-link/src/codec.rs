//! Generic CBOR codec for ordinary host types.
//!
//! This is the validation-unaware path: it reflects over any `serde` type.
//! Outer links refuse it (see [`crate::guard`]); everything else round-trips.
//! Inner failure messages are kept as the suffix of the decorated error, so a
//! caller can always tell a [`GuardViolation`] apart from a syntax error.

use crate::guard::{violation_in, GuardViolation};
use crate::probe;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors from the generic codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("cbor encode: {0}")]
    Encode(String),
    #[error("cbor decode: {0}")]
    Decode(String),
}

impl CodecError {
    /// The guard violation behind this error, if that is what it was.
    #[must_use]
    pub fn guard_violation(&self) -> Option<GuardViolation> {
        match self {
            Self::Encode(message) | Self::Decode(message) => violation_in(message),
        }
    }
}

/// Encode any serde value as CBOR.
///
/// # Errors
/// Returns `CodecError::Encode` if serialization fails, including when `value`
/// holds a self-managed type anywhere inside it.
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).map_err(|err| match err {
        ciborium::ser::Error::Io(io) => CodecError::Encode(io.to_string()),
        ciborium::ser::Error::Value(message) => CodecError::Encode(message),
    })?;
    Ok(out)
}

/// Decode CBOR into any serde type.
///
/// Types whose shape contains a self-managed type are refused before `bytes`
/// is read, whatever `bytes` holds.
///
/// # Errors
/// Returns `CodecError::Decode` if `T` is refused or `bytes` does not decode.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    probe::check_shape::<T>().map_err(|violation| CodecError::Decode(violation.to_string()))?;

    ciborium::de::from_reader(bytes).map_err(|err| match err {
        ciborium::de::Error::Io(io) => CodecError::Decode(io.to_string()),
        ciborium::de::Error::Syntax(offset) => {
            CodecError::Decode(format!("syntax error at offset {offset}"))
        }
        ciborium::de::Error::Semantic(_, message) => CodecError::Decode(message),
        ciborium::de::Error::RecursionLimitExceeded => {
            CodecError::Decode("recursion limit exceeded".to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn ordinary_values_roundtrip() {
        let mut value = BTreeMap::new();
        value.insert("seqno".to_string(), vec![1u64, 2, 3]);
        let bytes = to_vec(&value).expect("encode");
        let decoded: BTreeMap<String, Vec<u64>> = from_slice(&bytes).expect("decode");
        assert_eq!(decoded, value);
    }

    #[test]
    fn syntax_errors_are_not_guard_violations() {
        let err = from_slice::<u64>(&[0xff]).expect_err("truncated input");
        assert!(err.to_string().starts_with("cbor decode: "));
        assert_eq!(err.guard_violation(), None);
    }
}
