//! Keeps outer links away from generic serialization.
//!
//! A generic structural codec will happily write or read any struct, which
//! would let a look-alike record skip linkage and hash validation. Types
//! deriving [`GuardedCodec`](crate::GuardedCodec) implement
//! [`SelfManagedCodec`] and serde impls that fail with a [`GuardViolation`].
//! Serde's derived impls pass that failure up from any depth, and
//! [`crate::codec::from_slice`] probes the target shape before reading, so a
//! container that merely declares an outer link field is refused too.

use std::fmt::Display;

/// Marker for types whose bytes are produced and consumed only by their own
/// explicit encoder and decoder. Implemented by `#[derive(GuardedCodec)]`.
pub trait SelfManagedCodec {}

/// A self-managed type was handed to the generic codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GuardViolation {
    #[error("codec: CodecEncodeSelf called on a self-managed sigchain type")]
    EncodeSelfCalled,
    #[error("codec: CodecDecodeSelf called on a self-managed sigchain type")]
    DecodeSelfCalled,
}

impl GuardViolation {
    /// Recover the violation from error text that may carry any amount of
    /// decoration in front of it.
    #[must_use]
    pub fn from_message(message: &str) -> Option<Self> {
        [Self::EncodeSelfCalled, Self::DecodeSelfCalled]
            .into_iter()
            .find(|violation| message.ends_with(&violation.to_string()))
    }
}

/// Body of every generated `Serialize::serialize` for a self-managed type.
///
/// # Errors
/// Always returns [`GuardViolation::EncodeSelfCalled`] wrapped in `E`.
pub fn reject_encode<E, T>(type_name: &'static str) -> Result<T, E>
where
    E: serde::ser::Error,
{
    tracing::warn!(type_name, "generic encode attempted on self-managed type");
    Err(E::custom(GuardViolation::EncodeSelfCalled))
}

/// Body of every generated `Deserialize::deserialize` for a self-managed type.
///
/// Fails before reading anything, so the decoder never produces a zero-valued
/// or partially populated record.
///
/// # Errors
/// Always returns [`GuardViolation::DecodeSelfCalled`] wrapped in `E`.
pub fn reject_decode<E, T>(type_name: &'static str) -> Result<T, E>
where
    E: serde::de::Error,
{
    tracing::warn!(type_name, "generic decode attempted on self-managed type");
    Err(E::custom(GuardViolation::DecodeSelfCalled))
}

pub(crate) fn violation_in<M: Display>(message: M) -> Option<GuardViolation> {
    GuardViolation::from_message(&message.to_string())
}
