//! Sequence numbers and link hashes.
//!
//! A [`LinkId`] is the hash a link is known by: SHA-256 of a link's raw outer
//! bytes when it is the target of `prev`, SHA-256 of the inner signed payload
//! when it is `curr`. Skip pointers may carry hashes of other lengths recorded
//! by older clients, so the bytes are not length-checked here.

use crate::{decode_base64url, encode_base64url};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Position of a link within its chain. The first link is seqno 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Seqno(pub u64);

impl Seqno {
    /// The seqno of the first link of every chain.
    pub const FIRST: Self = Self(1);

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The immediately preceding seqno, or `None` for the first link (and 0).
    #[must_use]
    pub const fn prev(self) -> Option<Self> {
        match self.0 {
            0 | 1 => None,
            n => Some(Self(n - 1)),
        }
    }

    /// The immediately following seqno, or `None` on overflow.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }
}

impl From<u64> for Seqno {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Seqno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-empty hash bytes identifying a link or payload.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LinkId(Vec<u8>);

/// Error returned when a string is not a valid link id.
#[derive(Debug, thiserror::Error)]
#[error("invalid link id: {reason}")]
pub struct IdError {
    reason: &'static str,
}

impl LinkId {
    /// Wrap raw hash bytes. Empty input means "no hash" and yields `None`.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Option<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            None
        } else {
            Some(Self(bytes))
        }
    }

    /// SHA-256 of `payload`.
    #[must_use]
    pub fn of_payload(payload: &[u8]) -> Self {
        Self(Sha256::digest(payload).to_vec())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for LinkId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for LinkId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_base64url(s).map_err(|_| IdError {
            reason: "not unpadded base64url",
        })?;
        Self::new(bytes).ok_or(IdError { reason: "empty" })
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_base64url(&self.0))
    }
}

impl fmt::Debug for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bytes_are_no_id() {
        assert!(LinkId::new(Vec::new()).is_none());
        assert!(LinkId::new(vec![0u8]).is_some());
    }

    #[test]
    fn of_payload_is_sha256() {
        let id = LinkId::of_payload(b"");
        // SHA-256 of the empty string
        assert_eq!(
            id.to_string(),
            "47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU"
        );
        assert_eq!(id.as_bytes().len(), 32);
    }

    #[test]
    fn from_str_roundtrips_display() {
        let id = LinkId::of_payload(b"inner");
        let parsed: LinkId = id.to_string().parse().expect("valid");
        assert_eq!(id, parsed);
    }

    #[test]
    fn from_str_rejects_bad_input() {
        assert!("".parse::<LinkId>().is_err());
        assert!("not base64!".parse::<LinkId>().is_err());
    }

    #[test]
    fn seqno_neighbours() {
        assert_eq!(Seqno::FIRST.prev(), None);
        assert_eq!(Seqno(0).prev(), None);
        assert_eq!(Seqno(20).prev(), Some(Seqno(19)));
        assert_eq!(Seqno(20).next(), Some(Seqno(21)));
        assert_eq!(Seqno(u64::MAX).next(), None);
    }
}
