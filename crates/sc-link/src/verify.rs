//! Field-wise verification of a decoded link.
//!
//! The caller derives every expected value independently (from the inner
//! payload, the previous link, its own chain state). Comparing a link with
//! values read back from the same link proves nothing.

use crate::{LinkId, LinkType, OuterLink, SeqType, Seqno, SkipPointer};
use std::fmt;

/// What a link is expected to contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedFields {
    pub version: u64,
    pub seqno: Seqno,
    pub prev: Option<LinkId>,
    pub curr: LinkId,
    pub link_type: LinkType,
    pub seq_type: SeqType,
    pub ignore_if_unsupported: bool,
    /// `Absent` for links written before skip pointers existed, or whenever
    /// none should be present.
    pub skip: SkipPointer,
}

/// Names the field that failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkField {
    Version,
    Seqno,
    Prev,
    Curr,
    LinkType,
    SeqType,
    IgnoreIfUnsupported,
    Skip,
}

impl LinkField {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Seqno => "seqno",
            Self::Prev => "prev",
            Self::Curr => "curr",
            Self::LinkType => "link_type",
            Self::SeqType => "seq_type",
            Self::IgnoreIfUnsupported => "ignore_if_unsupported",
            Self::Skip => "skip",
        }
    }
}

impl fmt::Display for LinkField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded link disagrees with its expectation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("outer link field mismatch: {field}: expected {expected}, got {actual}")]
pub struct FieldMismatch {
    pub field: LinkField,
    pub expected: String,
    pub actual: String,
    /// Set when `field` is `Skip`.
    pub skip: Option<SkipMismatch>,
}

/// Why two skip pointers are incompatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SkipMismatch {
    #[error("link carries a skip pointer that was not expected")]
    Unexpected,
    #[error("expected a skip pointer but the link has none")]
    Missing,
    #[error("skip pointer targets a different seqno")]
    TargetDiffers,
    #[error("skip pointer hash differs")]
    HashDiffers,
}

/// Decide whether a decoded skip pointer satisfies the expected one.
///
/// A seqno-only expectation never looks at the hash, so expectations recorded
/// before hashes existed keep accepting links that now carry one. A full
/// expectation needs the same target and the same hash.
///
/// # Errors
/// Returns the `SkipMismatch` describing the disagreement.
pub fn skip_pointer_matches(expected: &SkipPointer, decoded: &SkipPointer) -> Result<(), SkipMismatch> {
    match (expected, decoded) {
        (SkipPointer::Absent, SkipPointer::Absent) => Ok(()),
        (SkipPointer::Absent, _) => Err(SkipMismatch::Unexpected),
        (_, SkipPointer::Absent) => Err(SkipMismatch::Missing),
        (
            SkipPointer::SeqnoOnly(want),
            SkipPointer::SeqnoOnly(got) | SkipPointer::Full { target: got, .. },
        ) => {
            if want == got {
                Ok(())
            } else {
                Err(SkipMismatch::TargetDiffers)
            }
        }
        (SkipPointer::Full { target: want, .. }, SkipPointer::SeqnoOnly(got)) => {
            if want == got {
                Err(SkipMismatch::HashDiffers)
            } else {
                Err(SkipMismatch::TargetDiffers)
            }
        }
        (
            SkipPointer::Full {
                target: want,
                hash: want_hash,
            },
            SkipPointer::Full {
                target: got,
                hash: got_hash,
            },
        ) => {
            if want != got {
                Err(SkipMismatch::TargetDiffers)
            } else if want_hash != got_hash {
                Err(SkipMismatch::HashDiffers)
            } else {
                Ok(())
            }
        }
    }
}

fn check<T: PartialEq + fmt::Debug>(field: LinkField, expected: &T, actual: &T) -> Result<(), FieldMismatch> {
    if expected == actual {
        return Ok(());
    }
    Err(FieldMismatch {
        field,
        expected: format!("{expected:?}"),
        actual: format!("{actual:?}"),
        skip: None,
    })
}

impl OuterLink {
    /// Check every field against `expected`, in wire order.
    ///
    /// # Errors
    /// Returns a `FieldMismatch` for the first field that disagrees.
    pub fn assert_fields(&self, expected: &ExpectedFields) -> Result<(), FieldMismatch> {
        self.assert_fields_inner(expected).inspect_err(|mismatch| {
            tracing::debug!(
                seqno = %self.seqno,
                field = %mismatch.field,
                expected = %mismatch.expected,
                actual = %mismatch.actual,
                "outer link verification failed"
            );
        })
    }

    fn assert_fields_inner(&self, expected: &ExpectedFields) -> Result<(), FieldMismatch> {
        check(LinkField::Version, &expected.version, &self.version)?;
        check(LinkField::Seqno, &expected.seqno, &self.seqno)?;
        check(LinkField::Prev, &expected.prev, &self.prev)?;
        check(LinkField::Curr, &expected.curr, &self.curr)?;
        check(LinkField::LinkType, &expected.link_type, &self.link_type)?;
        check(LinkField::SeqType, &expected.seq_type, &self.seq_type)?;
        check(
            LinkField::IgnoreIfUnsupported,
            &expected.ignore_if_unsupported,
            &self.ignore_if_unsupported,
        )?;
        skip_pointer_matches(&expected.skip, &self.skip).map_err(|reason| FieldMismatch {
            field: LinkField::Skip,
            expected: expected.skip.to_string(),
            actual: self.skip.to_string(),
            skip: Some(reason),
        })
    }

    /// Check only version and seqno, for stubbed links whose inner payload
    /// was withheld and whose other fields cannot be derived.
    ///
    /// # Errors
    /// Returns a `FieldMismatch` for the first field that disagrees.
    pub fn assert_some_fields(&self, version: u64, seqno: Seqno) -> Result<(), FieldMismatch> {
        check(LinkField::Version, &version, &self.version)?;
        check(LinkField::Seqno, &seqno, &self.seqno)
    }
}
