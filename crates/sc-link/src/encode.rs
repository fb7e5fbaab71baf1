use crate::features::{FeatureFlags, HighSkipGates};
use crate::{wire, LinkId, LinkType, OuterLink, SeqType, Seqno, SkipPointer, OUTER_LINK_VERSION};

/// Caller-supplied contents of a link about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDraft {
    pub link_type: LinkType,
    pub seqno: Seqno,
    /// Id of the link at `seqno - 1`; `None` only when starting a chain.
    pub prev: Option<LinkId>,
    /// Hash of the inner signed payload.
    pub curr: LinkId,
    pub seq_type: SeqType,
    pub ignore_if_unsupported: bool,
    /// Candidate skip pointer. Dropped when the feature is off.
    pub skip: SkipPointer,
}

/// Reasons the encoder refuses a draft.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("seqno 0 is not a valid link position")]
    ZeroSeqno,
    #[error("link {0} starts a chain but carries a prev")]
    UnexpectedPrev(Seqno),
    #[error("link type code {0} does not name an unsupported link type")]
    InvalidLinkType(u64),
    #[error("unsupported link type {0} without ignore_if_unsupported")]
    UnsupportedLinkType(u64),
    #[error("high skip pointers are required for link {0} but none was supplied")]
    MissingRequiredSkipPointer(Seqno),
    #[error("skip pointer to {target} is not an ancestor older than the predecessor of {seqno}")]
    InvalidSkipPointer { seqno: Seqno, target: Seqno },
    #[error("writing outer link failed: {0}")]
    Write(String),
}

/// Writes outer links for one subject under its current feature gates.
pub struct LinkEncoder<'a, F: FeatureFlags + ?Sized> {
    flags: &'a F,
    subject: &'a str,
}

impl<'a, F: FeatureFlags + ?Sized> LinkEncoder<'a, F> {
    pub const fn new(flags: &'a F, subject: &'a str) -> Self {
        Self { flags, subject }
    }

    /// Produce the canonical bytes for `draft`.
    ///
    /// Both feature gates are read once, up front, and that snapshot governs
    /// the whole call.
    ///
    /// # Errors
    /// Returns `EncodeError::MissingRequiredSkipPointer` when pointers are
    /// required and none was supplied, `EncodeError::InvalidSkipPointer` for a
    /// pointer that does not skip past the predecessor,
    /// `EncodeError::ZeroSeqno` for seqno 0, `EncodeError::UnexpectedPrev` for a
    /// chain start with a `prev`, and `EncodeError::InvalidLinkType` /
    /// `EncodeError::UnsupportedLinkType` for link types a decoder would not
    /// read back as written.
    pub fn encode(&self, draft: &LinkDraft) -> Result<Vec<u8>, EncodeError> {
        let gates = HighSkipGates::snapshot(self.flags, self.subject);
        encode_with_gates(gates, draft)
    }
}

/// Encode `draft` under an explicit gate snapshot.
///
/// # Errors
/// See [`LinkEncoder::encode`].
pub fn encode_with_gates(gates: HighSkipGates, draft: &LinkDraft) -> Result<Vec<u8>, EncodeError> {
    if draft.seqno.get() == 0 {
        return Err(EncodeError::ZeroSeqno);
    }
    if draft.seqno == Seqno::FIRST && draft.prev.is_some() {
        return Err(EncodeError::UnexpectedPrev(draft.seqno));
    }
    if let LinkType::Unsupported(code) = draft.link_type {
        // Known codes and 0 would decode as something else.
        if LinkType::from_code(code) != Some(draft.link_type) {
            return Err(EncodeError::InvalidLinkType(code));
        }
        if !draft.ignore_if_unsupported {
            return Err(EncodeError::UnsupportedLinkType(code));
        }
    }

    let skip = if gates.allow {
        draft.skip.clone()
    } else {
        if !draft.skip.is_absent() {
            tracing::debug!(
                seqno = %draft.seqno,
                skip = %draft.skip,
                "high skips not allowed, omitting skip pointer"
            );
        }
        SkipPointer::Absent
    };

    match skip.target() {
        // Links 1 and 2 have no ancestor older than their predecessor.
        None if gates.requires() && draft.seqno.get() > 2 => {
            return Err(EncodeError::MissingRequiredSkipPointer(draft.seqno));
        }
        Some(target) if !skip.fits(draft.seqno) => {
            return Err(EncodeError::InvalidSkipPointer {
                seqno: draft.seqno,
                target,
            });
        }
        _ => {}
    }

    let link = OuterLink {
        version: OUTER_LINK_VERSION,
        seqno: draft.seqno,
        prev: draft.prev.clone(),
        curr: draft.curr.clone(),
        link_type: draft.link_type,
        seq_type: draft.seq_type,
        ignore_if_unsupported: draft.ignore_if_unsupported,
        skip,
    };

    tracing::debug!(
        seqno = %link.seqno,
        link_type = %link.link_type,
        skip = %link.skip,
        "encoding outer link"
    );
    wire::write(&wire::to_value(&link)).map_err(EncodeError::Write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode_outer_link, Feature, StaticFeatures};

    fn draft(skip: SkipPointer) -> LinkDraft {
        LinkDraft {
            link_type: LinkType::TeamLeave,
            seqno: Seqno(20),
            prev: None,
            curr: LinkId::of_payload(b""),
            seq_type: SeqType::Public,
            ignore_if_unsupported: false,
            skip,
        }
    }

    fn allow() -> StaticFeatures {
        StaticFeatures::none().with(Feature::AllowHighSkips)
    }

    #[test]
    fn disallowed_skip_is_omitted() {
        let flags = StaticFeatures::none();
        let bytes = LinkEncoder::new(&flags, "alice")
            .encode(&draft(SkipPointer::new(Seqno(3), vec![1, 2, 3])))
            .expect("encode");
        assert_eq!(bytes[0], 0x87, "7-element array");
        let decoded = decode_outer_link(&bytes).expect("decode");
        assert!(decoded.link().skip.is_absent());
    }

    #[test]
    fn allowed_skip_is_embedded() {
        let flags = allow();
        let bytes = LinkEncoder::new(&flags, "alice")
            .encode(&draft(SkipPointer::SeqnoOnly(Seqno(3))))
            .expect("encode");
        assert_eq!(bytes[0], 0x88, "8-element array");
        // ... and the seqno-only pointer is a one-element array holding 3.
        assert_eq!(&bytes[bytes.len() - 2..], &[0x81, 0x03]);
    }

    #[test]
    fn required_skip_must_be_supplied() {
        let flags = allow().with(Feature::RequireHighSkips);
        let encoder = LinkEncoder::new(&flags, "alice");
        assert_eq!(
            encoder.encode(&draft(SkipPointer::Absent)),
            Err(EncodeError::MissingRequiredSkipPointer(Seqno(20)))
        );
        assert!(encoder.encode(&draft(SkipPointer::SeqnoOnly(Seqno(3)))).is_ok());
    }

    #[test]
    fn required_skip_is_waived_at_chain_start() {
        let flags = allow().with(Feature::RequireHighSkips);
        let mut first = draft(SkipPointer::Absent);
        first.seqno = Seqno(1);
        assert!(LinkEncoder::new(&flags, "alice").encode(&first).is_ok());
    }

    #[test]
    fn require_without_allow_does_not_fail() {
        let flags = StaticFeatures::none().with(Feature::RequireHighSkips);
        assert!(LinkEncoder::new(&flags, "alice")
            .encode(&draft(SkipPointer::Absent))
            .is_ok());
    }

    #[test]
    fn redundant_skip_is_rejected() {
        let flags = allow();
        assert_eq!(
            LinkEncoder::new(&flags, "alice").encode(&draft(SkipPointer::SeqnoOnly(Seqno(19)))),
            Err(EncodeError::InvalidSkipPointer {
                seqno: Seqno(20),
                target: Seqno(19)
            })
        );
    }

    #[test]
    fn zero_seqno_is_rejected() {
        let mut zero = draft(SkipPointer::Absent);
        zero.seqno = Seqno(0);
        assert_eq!(
            encode_with_gates(HighSkipGates::default(), &zero),
            Err(EncodeError::ZeroSeqno)
        );
    }

    #[test]
    fn chain_start_must_not_carry_prev() {
        let mut first = draft(SkipPointer::Absent);
        first.seqno = Seqno::FIRST;
        first.prev = LinkId::new(vec![1]);
        assert_eq!(
            encode_with_gates(HighSkipGates::default(), &first),
            Err(EncodeError::UnexpectedPrev(Seqno::FIRST))
        );

        first.prev = None;
        assert!(encode_with_gates(HighSkipGates::default(), &first).is_ok());
    }

    #[test]
    fn unsupported_link_types_must_read_back_as_written() {
        let cases = [
            (99, false, Err(EncodeError::UnsupportedLinkType(99)), "unknown code without ignore flag"),
            (3, true, Err(EncodeError::InvalidLinkType(3)), "code of a known type"),
            (0, true, Err(EncodeError::InvalidLinkType(0)), "code 0"),
        ];
        for (code, ignore, expected, desc) in cases {
            let mut input = draft(SkipPointer::Absent);
            input.link_type = LinkType::Unsupported(code);
            input.ignore_if_unsupported = ignore;
            assert_eq!(
                encode_with_gates(HighSkipGates::default(), &input),
                expected,
                "case '{desc}'"
            );
        }

        let mut ignorable = draft(SkipPointer::Absent);
        ignorable.link_type = LinkType::Unsupported(99);
        ignorable.ignore_if_unsupported = true;
        let bytes = encode_with_gates(HighSkipGates::default(), &ignorable).expect("encode");
        let decoded = decode_outer_link(&bytes).expect("decode");
        assert_eq!(decoded.link().link_type, LinkType::Unsupported(99));
    }

    #[test]
    fn encoding_is_deterministic() {
        let flags = allow();
        let encoder = LinkEncoder::new(&flags, "alice");
        let input = draft(SkipPointer::new(Seqno(3), vec![0, 6, 2, 42, 123]));
        assert_eq!(encoder.encode(&input), encoder.encode(&input));
    }

    #[test]
    fn gates_are_per_subject() {
        let flags = |feature: Feature, subject: &str| {
            feature == Feature::AllowHighSkips && subject == "team-a"
        };
        let input = draft(SkipPointer::SeqnoOnly(Seqno(3)));
        let for_team = LinkEncoder::new(&flags, "team-a").encode(&input).expect("encode");
        let for_other = LinkEncoder::new(&flags, "team-b").encode(&input).expect("encode");
        assert_eq!(for_team[0], 0x88);
        assert_eq!(for_other[0], 0x87);
    }
}
