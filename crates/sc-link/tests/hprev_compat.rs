//! High-skip pointers across link generations: links without one, links with
//! the seqno-only shape, links with a full pointer, checked against old and
//! new expectations.

use proptest::prelude::*;
use sc_link::{
    decode_outer_link, skip_pointer_matches, EncodeError, ExpectedFields, Feature, LinkDraft, LinkEncoder, LinkField,
    LinkId, LinkType, SeqType, Seqno, SkipMismatch, SkipPointer, StaticFeatures, OUTER_LINK_VERSION,
};

const HASH: [u8; 5] = [0, 6, 2, 42, 123];

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

fn expected(skip: SkipPointer) -> ExpectedFields {
    ExpectedFields {
        version: OUTER_LINK_VERSION,
        seqno: Seqno(20),
        prev: None,
        curr: LinkId::of_payload(b""),
        link_type: LinkType::TeamLeave,
        seq_type: SeqType::Public,
        ignore_if_unsupported: false,
        skip,
    }
}

fn full(target: u64, hash: &[u8]) -> SkipPointer {
    SkipPointer::new(Seqno(target), hash.to_vec())
}

#[test]
fn link_without_skip_verifies_against_none() {
    let flags = StaticFeatures::none().with(Feature::AllowHighSkips);
    let bytes = LinkEncoder::new(&flags, "team")
        .encode(&draft(SkipPointer::Absent))
        .expect("encode");
    let decoded = decode_outer_link(&bytes).expect("decode");

    assert!(decoded.link().skip.is_absent());
    assert_eq!(decoded.link().assert_fields(&expected(SkipPointer::Absent)), Ok(()));
}

#[test]
fn link_with_full_skip_verifies_only_against_matching_expectations() {
    let flags = StaticFeatures::none().with(Feature::AllowHighSkips);
    let bytes = LinkEncoder::new(&flags, "team")
        .encode(&draft(full(3, &HASH)))
        .expect("encode");
    let decoded = decode_outer_link(&bytes).expect("decode");
    let link = decoded.link();

    assert_eq!(link.skip.target(), Some(Seqno(3)));
    assert_eq!(link.skip.hash().map(LinkId::as_bytes), Some(&HASH[..]));

    assert_eq!(link.assert_fields(&expected(full(3, &HASH))), Ok(()));
    assert_eq!(
        link.assert_fields(&expected(SkipPointer::SeqnoOnly(Seqno(3)))),
        Ok(()),
        "legacy seqno-only expectation never compares hashes"
    );

    let wrong_hash = link.assert_fields(&expected(full(3, &[0, 5, 2]))).expect_err("hash");
    assert_eq!(wrong_hash.field, LinkField::Skip);
    assert_eq!(wrong_hash.skip, Some(SkipMismatch::HashDiffers));

    let wrong_target = link.assert_fields(&expected(full(4, &HASH))).expect_err("target");
    assert_eq!(wrong_target.skip, Some(SkipMismatch::TargetDiffers));

    let not_expected = link.assert_fields(&expected(SkipPointer::Absent)).expect_err("absent");
    assert_eq!(not_expected.skip, Some(SkipMismatch::Unexpected));
}

#[test]
fn compatibility_matrix() {
    let cases = [
        (SkipPointer::Absent, SkipPointer::Absent, true, "none / none"),
        (SkipPointer::Absent, SkipPointer::SeqnoOnly(Seqno(3)), false, "none / present"),
        (SkipPointer::SeqnoOnly(Seqno(3)), full(3, &[7, 7]), true, "seqno-only / any hash"),
        (SkipPointer::SeqnoOnly(Seqno(3)), SkipPointer::SeqnoOnly(Seqno(3)), true, "seqno-only / seqno-only"),
        (full(3, &[0, 5, 2]), full(3, &[0, 5, 2]), true, "same hash"),
        (full(3, &[0, 5, 2]), full(3, &[9, 9, 9]), false, "different hash"),
        (full(3, &[0, 5, 2]), full(4, &[0, 5, 2]), false, "different seqno"),
        (full(3, &[0, 5, 2]), SkipPointer::Absent, false, "present / none"),
    ];

    for (expected, decoded, accept, desc) in cases {
        assert_eq!(
            skip_pointer_matches(&expected, &decoded).is_ok(),
            accept,
            "case '{desc}'"
        );
    }
}

#[test]
fn gates_decide_the_wire_shape() {
    let off = StaticFeatures::none();
    let on = StaticFeatures::none().with(Feature::AllowHighSkips);
    let strict = on.clone().with(Feature::RequireHighSkips);

    let dropped = LinkEncoder::new(&off, "team").encode(&draft(full(3, &HASH))).expect("encode");
    assert!(decode_outer_link(&dropped).expect("decode").link().skip.is_absent());

    let kept = LinkEncoder::new(&on, "team").encode(&draft(full(3, &HASH))).expect("encode");
    assert_ne!(dropped, kept);

    assert_eq!(
        LinkEncoder::new(&strict, "team").encode(&draft(SkipPointer::Absent)),
        Err(EncodeError::MissingRequiredSkipPointer(Seqno(20)))
    );
}

#[test]
fn seqno_only_and_absent_differ_on_the_wire() {
    let on = StaticFeatures::none().with(Feature::AllowHighSkips);
    let encoder = LinkEncoder::new(&on, "team");
    let absent = encoder.encode(&draft(SkipPointer::Absent)).expect("encode");
    let legacy = encoder.encode(&draft(SkipPointer::SeqnoOnly(Seqno(3)))).expect("encode");
    let with_hash = encoder.encode(&draft(full(3, &HASH))).expect("encode");

    assert_eq!(absent.len() + 2, legacy.len(), "[3] adds a one-element array");
    assert!(with_hash.len() > legacy.len());
    assert_eq!(
        decode_outer_link(&legacy).expect("decode").link().skip,
        SkipPointer::SeqnoOnly(Seqno(3))
    );
}

fn link_type() -> impl Strategy<Value = LinkType> {
    prop_oneof![
        (1u64..=15).prop_map(|code| LinkType::from_code(code).unwrap()),
        (33u64..=46).prop_map(|code| LinkType::from_code(code).unwrap()),
    ]
}

fn seq_type() -> impl Strategy<Value = SeqType> {
    prop_oneof![Just(SeqType::Public), Just(SeqType::Private), Just(SeqType::Semiprivate)]
}

fn hash() -> impl Strategy<Value = LinkId> {
    prop::collection::vec(any::<u8>(), 1..40).prop_map(|bytes| LinkId::new(bytes).unwrap())
}

fn any_draft() -> impl Strategy<Value = LinkDraft> {
    (1u64..1_000_000)
        .prop_flat_map(|seqno| {
            let skip = if seqno > 2 {
                prop_oneof![
                    Just(SkipPointer::Absent),
                    (1..seqno - 1).prop_map(|target| SkipPointer::SeqnoOnly(Seqno(target))),
                    (1..seqno - 1, hash()).prop_map(|(target, hash)| SkipPointer::Full {
                        target: Seqno(target),
                        hash,
                    }),
                ]
                .boxed()
            } else {
                Just(SkipPointer::Absent).boxed()
            };
            // A chain start must not carry a prev.
            let prev = if seqno == 1 {
                Just(None::<LinkId>).boxed()
            } else {
                prop::option::of(hash()).boxed()
            };
            (
                Just(seqno),
                link_type(),
                prev,
                hash(),
                seq_type(),
                any::<bool>(),
                skip,
            )
        })
        .prop_map(|(seqno, link_type, prev, curr, seq_type, ignore, skip)| LinkDraft {
            link_type,
            seqno: Seqno(seqno),
            prev,
            curr,
            seq_type,
            ignore_if_unsupported: ignore,
            skip,
        })
}

proptest! {
    /// Every valid draft survives encode then decode, and verifies against
    /// expectations built from the draft itself.
    #[test]
    fn roundtrip_under_allow(draft in any_draft()) {
        let flags = StaticFeatures::none().with(Feature::AllowHighSkips);
        let bytes = LinkEncoder::new(&flags, "subject").encode(&draft).unwrap();
        let decoded = decode_outer_link(&bytes).unwrap();
        let link = decoded.link();

        prop_assert_eq!(link.seqno, draft.seqno);
        prop_assert_eq!(&link.skip, &draft.skip);
        prop_assert_eq!(decoded.raw(), &bytes[..]);

        let wanted = ExpectedFields {
            version: OUTER_LINK_VERSION,
            seqno: draft.seqno,
            prev: draft.prev.clone(),
            curr: draft.curr.clone(),
            link_type: draft.link_type,
            seq_type: draft.seq_type,
            ignore_if_unsupported: draft.ignore_if_unsupported,
            skip: draft.skip.clone(),
        };
        prop_assert!(link.assert_fields(&wanted).is_ok());
    }

    /// With pointers disallowed the output never carries one.
    #[test]
    fn disallowed_never_emits_skip(draft in any_draft()) {
        let bytes = LinkEncoder::new(&StaticFeatures::none(), "subject").encode(&draft).unwrap();
        prop_assert!(decode_outer_link(&bytes).unwrap().link().skip.is_absent());
    }

    /// A single flipped byte never yields a link with the same id.
    #[test]
    fn tampering_changes_or_breaks_the_link(draft in any_draft(), index in any::<prop::sample::Index>()) {
        let flags = StaticFeatures::none().with(Feature::AllowHighSkips);
        let mut bytes = LinkEncoder::new(&flags, "subject").encode(&draft).unwrap();
        let original = LinkId::of_payload(&bytes);
        let at = index.index(bytes.len());
        bytes[at] ^= 0x01;
        if let Ok(decoded) = decode_outer_link(&bytes) {
            prop_assert_ne!(decoded.link_id(), original);
        }
    }
}
