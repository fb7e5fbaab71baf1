//! Linkage checks across consecutive decoded links.

use crate::{LinkId, OuterLink, OuterLinkWithMetadata, Seqno, SkipPointer};

/// A run of links that does not form a chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("first link at seqno {0} carries no prev but is not a chain start")]
    MissingPrev(Seqno),
    #[error("link {actual} follows {previous}, expected seqno {expected}")]
    SeqnoGap {
        previous: Seqno,
        expected: Seqno,
        actual: Seqno,
    },
    #[error("link {seqno} has prev {actual:?}, expected {expected}")]
    PrevMismatch {
        seqno: Seqno,
        expected: LinkId,
        actual: Option<LinkId>,
    },
    #[error("link {seqno} skips to {target} with hash {actual}, expected {expected}")]
    SkipHashMismatch {
        seqno: Seqno,
        target: Seqno,
        expected: LinkId,
        actual: LinkId,
    },
}

/// Check that `next` directly extends `previous`.
///
/// # Errors
/// Returns `ChainError::SeqnoGap` unless `next` is the following seqno and
/// `ChainError::PrevMismatch` unless its `prev` is the id of `previous`.
pub fn check_successor(previous: &OuterLinkWithMetadata, next: &OuterLink) -> Result<(), ChainError> {
    let previous_seqno = previous.link().seqno;
    let expected = previous_seqno.next();
    if expected != Some(next.seqno) {
        return Err(ChainError::SeqnoGap {
            previous: previous_seqno,
            expected: expected.unwrap_or(previous_seqno),
            actual: next.seqno,
        });
    }

    let id = previous.link_id();
    if next.prev.as_ref() != Some(&id) {
        return Err(ChainError::PrevMismatch {
            seqno: next.seqno,
            expected: id,
            actual: next.prev.clone(),
        });
    }
    Ok(())
}

/// Check a contiguous run of decoded links.
///
/// The run may start mid-chain, in which case its first link only needs a
/// `prev`. Full skip pointers whose target falls inside the run must carry
/// that link's id; seqno-only pointers and targets before the run are not
/// checked here.
///
/// # Errors
/// Returns the first `ChainError` found, in chain order.
pub fn check_chain(links: &[OuterLinkWithMetadata]) -> Result<(), ChainError> {
    let Some(first) = links.first() else {
        return Ok(());
    };
    // A chain start never carries a prev; decoding already refuses one.
    let first = first.link();
    if first.seqno != Seqno::FIRST && first.prev.is_none() {
        return Err(ChainError::MissingPrev(first.seqno));
    }

    for pair in links.windows(2) {
        if let [previous, next] = pair {
            check_successor(previous, next.link())?;
        }
    }

    let start = first.seqno.get();
    for entry in links {
        let link = entry.link();
        let SkipPointer::Full { target, hash } = &link.skip else {
            continue;
        };
        let Some(index) = target.get().checked_sub(start) else {
            continue;
        };
        let Some(ancestor) = usize::try_from(index).ok().and_then(|i| links.get(i)) else {
            continue;
        };
        let expected = ancestor.link_id();
        if &expected != hash {
            tracing::debug!(seqno = %link.seqno, target = %target, "skip hash does not match ancestor");
            return Err(ChainError::SkipHashMismatch {
                seqno: link.seqno,
                target: *target,
                expected,
                actual: hash.clone(),
            });
        }
    }
    Ok(())
}
