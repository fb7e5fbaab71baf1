//! Sigchain outer links.
//!
//! Each entry of a sigchain is wrapped in an unsigned outer link that commits
//! to its predecessor by hash and sequence number, and optionally to an older
//! ancestor through a high-skip pointer. This crate owns the record format:
//!
//! - [`OuterLink`] and [`SkipPointer`], the data model.
//! - [`LinkEncoder`] and [`decode_outer_link`], the only sanctioned way to
//!   produce or consume the wire bytes.
//! - [`OuterLink::assert_fields`], which checks a decoded link against
//!   independently derived expectations, including the legacy skip shapes.
//! - [`guard`], which makes the generic [`codec`] refuse outer links outright.

// Lets `#[derive(GuardedCodec)]` expand to `::sc_link::...` inside this crate.
extern crate self as sc_link;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

pub mod chain;
pub mod codec;
pub mod features;
pub mod guard;

mod decode;
mod encode;
mod ids;
mod link;
mod probe;
mod verify;
mod wire;

pub use chain::{check_chain, check_successor, ChainError};
pub use decode::{decode_outer_link, DecodeError};
pub use encode::{encode_with_gates, EncodeError, LinkDraft, LinkEncoder};
pub use features::{Feature, FeatureFlags, HighSkipGates, StaticFeatures};
pub use guard::GuardViolation;
pub use ids::{IdError, LinkId, Seqno};
pub use link::{
    LinkType, OuterLink, OuterLinkWithMetadata, SeqType, SkipPointer, UnknownLinkType, UnknownSeqType,
    OUTER_LINK_VERSION,
};
pub use sc_link_derive::GuardedCodec;
pub use verify::{skip_pointer_matches, ExpectedFields, FieldMismatch, LinkField, SkipMismatch};
pub use wire::ShapeError;

#[doc(hidden)]
pub mod __private {
    pub use serde;
}

/// Error type for base64url decoding failures
#[derive(Debug, thiserror::Error)]
#[error("invalid base64url encoding: {0}")]
pub struct Base64Error(#[from] base64::DecodeError);

/// Encode bytes as base64url (RFC 4648) without padding.
#[must_use]
pub fn encode_base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode an unpadded base64url string (RFC 4648) to bytes.
///
/// # Errors
/// Returns `Base64Error` if the input is not valid base64url
pub fn decode_base64url(encoded: &str) -> Result<Vec<u8>, Base64Error> {
    URL_SAFE_NO_PAD.decode(encoded).map_err(Base64Error::from)
}
