use crate::wire::{self, ShapeError};
use crate::{LinkType, OuterLink, OuterLinkWithMetadata, SeqType, Seqno, OUTER_LINK_VERSION};
use ciborium::value::Value;

/// Reasons the explicit decoder refuses bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed cbor: {0}")]
    Cbor(String),
    #[error("trailing bytes after outer link")]
    TrailingBytes,
    #[error("malformed outer link: {0}")]
    Shape(#[from] ShapeError),
    #[error("unsupported outer link version {0}")]
    UnsupportedVersion(u64),
    #[error("seqno 0 is not a valid link position")]
    ZeroSeqno,
    #[error("link {0} starts a chain but carries a prev")]
    UnexpectedPrev(Seqno),
    #[error("link type 0 is not valid")]
    InvalidLinkType,
    #[error("unsupported link type {0} without ignore_if_unsupported")]
    UnsupportedLinkType(u64),
    #[error("unknown seq type {0}")]
    UnknownSeqType(u64),
    #[error("skip pointer to {target} is not an ancestor older than the predecessor of {seqno}")]
    SkipOutOfRange { seqno: Seqno, target: Seqno },
    #[error("outer link is not canonically encoded")]
    NonCanonical,
}

/// Decode and validate one outer link.
///
/// This is the only way to obtain an [`OuterLink`] from bytes. The input must
/// be exactly one canonical CBOR item in the layout written by
/// [`crate::LinkEncoder`]; the raw bytes are kept so the link's own id can be
/// derived for the next link's `prev` check.
///
/// # Errors
/// Returns a `DecodeError` naming the first problem found.
pub fn decode_outer_link(bytes: &[u8]) -> Result<OuterLinkWithMetadata, DecodeError> {
    let mut rest = bytes;
    let value: Value = ciborium::de::from_reader(&mut rest).map_err(|err| match err {
        ciborium::de::Error::Io(io) => DecodeError::Cbor(io.to_string()),
        ciborium::de::Error::Syntax(offset) => {
            DecodeError::Cbor(format!("syntax error at offset {offset}"))
        }
        ciborium::de::Error::Semantic(_, message) => DecodeError::Cbor(message),
        ciborium::de::Error::RecursionLimitExceeded => {
            DecodeError::Cbor("recursion limit exceeded".to_string())
        }
    })?;
    if !rest.is_empty() {
        return Err(DecodeError::TrailingBytes);
    }

    let raw = wire::from_value(value)?;

    if raw.version != OUTER_LINK_VERSION {
        return Err(DecodeError::UnsupportedVersion(raw.version));
    }
    if raw.seqno.get() == 0 {
        return Err(DecodeError::ZeroSeqno);
    }
    if raw.seqno == Seqno::FIRST && raw.prev.is_some() {
        return Err(DecodeError::UnexpectedPrev(raw.seqno));
    }
    let link_type = LinkType::from_code(raw.link_type).ok_or(DecodeError::InvalidLinkType)?;
    if !link_type.is_supported() && !raw.ignore_if_unsupported {
        return Err(DecodeError::UnsupportedLinkType(raw.link_type));
    }
    let seq_type = SeqType::from_code(raw.seq_type).ok_or(DecodeError::UnknownSeqType(raw.seq_type))?;
    if let Some(target) = raw.skip.target() {
        if !raw.skip.fits(raw.seqno) {
            return Err(DecodeError::SkipOutOfRange {
                seqno: raw.seqno,
                target,
            });
        }
    }

    let link = OuterLink {
        version: raw.version,
        seqno: raw.seqno,
        prev: raw.prev,
        curr: raw.curr,
        link_type,
        seq_type,
        ignore_if_unsupported: raw.ignore_if_unsupported,
        skip: raw.skip,
    };

    // One record, one byte string: reject non-minimal integers, indefinite
    // lengths and anything else the encoder would not have written.
    let canonical = wire::write(&wire::to_value(&link)).map_err(|_| DecodeError::NonCanonical)?;
    if canonical != bytes {
        return Err(DecodeError::NonCanonical);
    }

    Ok(OuterLinkWithMetadata::new(link, bytes.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LinkId, SkipPointer};
    use ciborium::value::Integer;

    fn base_items() -> Vec<Value> {
        vec![
            Value::Integer(Integer::from(2u64)),
            Value::Integer(Integer::from(20u64)),
            Value::Null,
            Value::Bytes(LinkId::of_payload(b"").into_bytes()),
            Value::Integer(Integer::from(37u64)),
            Value::Integer(Integer::from(1u64)),
            Value::Bool(false),
        ]
    }

    fn bytes_of(items: Vec<Value>) -> Vec<u8> {
        wire::write(&Value::Array(items)).expect("write")
    }

    #[test]
    fn decodes_minimal_link() {
        let decoded = decode_outer_link(&bytes_of(base_items())).expect("decode");
        let link = decoded.link();
        assert_eq!(link.seqno, Seqno(20));
        assert_eq!(link.link_type, LinkType::TeamLeave);
        assert_eq!(link.seq_type, SeqType::Public);
        assert_eq!(link.prev, None);
        assert!(link.skip.is_absent());
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = bytes_of(base_items());
        bytes.push(0x00);
        assert_eq!(decode_outer_link(&bytes), Err(DecodeError::TrailingBytes));
    }

    #[test]
    fn rejects_wrong_version() {
        let mut items = base_items();
        items[0] = Value::Integer(Integer::from(1u64));
        assert_eq!(
            decode_outer_link(&bytes_of(items)),
            Err(DecodeError::UnsupportedVersion(1))
        );
    }

    #[test]
    fn rejects_prev_on_chain_start() {
        let mut items = base_items();
        items[1] = Value::Integer(Integer::from(1u64));
        items[2] = Value::Bytes(vec![1]);
        assert_eq!(
            decode_outer_link(&bytes_of(items.clone())),
            Err(DecodeError::UnexpectedPrev(Seqno(1)))
        );

        items[2] = Value::Null;
        assert!(decode_outer_link(&bytes_of(items)).is_ok());
    }

    #[test]
    fn rejects_wrong_arity() {
        let mut items = base_items();
        items.pop();
        assert_eq!(
            decode_outer_link(&bytes_of(items)),
            Err(DecodeError::Shape(ShapeError::Arity(6)))
        );
    }

    #[test]
    fn null_hash_in_skip_is_not_the_seqno_only_shape() {
        let mut items = base_items();
        items.push(Value::Array(vec![Value::Integer(Integer::from(3u64)), Value::Null]));
        assert_eq!(
            decode_outer_link(&bytes_of(items)),
            Err(DecodeError::Shape(ShapeError::NotBytes("skip.hash")))
        );
    }

    #[test]
    fn unsupported_link_type_needs_ignore_flag() {
        let mut items = base_items();
        items[4] = Value::Integer(Integer::from(99u64));
        assert_eq!(
            decode_outer_link(&bytes_of(items.clone())),
            Err(DecodeError::UnsupportedLinkType(99))
        );

        items[6] = Value::Bool(true);
        let decoded = decode_outer_link(&bytes_of(items)).expect("ignorable");
        assert_eq!(decoded.link().link_type, LinkType::Unsupported(99));
    }

    #[test]
    fn rejects_redundant_skip_pointer() {
        let mut items = base_items();
        items.push(Value::Array(vec![Value::Integer(Integer::from(19u64))]));
        assert_eq!(
            decode_outer_link(&bytes_of(items)),
            Err(DecodeError::SkipOutOfRange {
                seqno: Seqno(20),
                target: Seqno(19)
            })
        );
    }

    #[test]
    fn rejects_non_minimal_integer_encoding() {
        let mut bytes = bytes_of(base_items());
        // seqno 20 is written as the single byte 0x14; spell it as 0x18 0x14.
        assert_eq!(bytes[2], 0x14);
        bytes.splice(2..3, [0x18, 0x14]);
        assert_eq!(decode_outer_link(&bytes), Err(DecodeError::NonCanonical));
    }

    #[test]
    fn keeps_raw_bytes_for_link_id() {
        let bytes = bytes_of(base_items());
        let decoded = decode_outer_link(&bytes).expect("decode");
        assert_eq!(decoded.raw(), &bytes[..]);
        assert_eq!(decoded.link_id(), LinkId::of_payload(&bytes));
    }

    #[test]
    fn decodes_both_skip_shapes() {
        let mut items = base_items();
        items.push(Value::Array(vec![Value::Integer(Integer::from(3u64))]));
        let decoded = decode_outer_link(&bytes_of(items)).expect("seqno only");
        assert_eq!(decoded.link().skip, SkipPointer::SeqnoOnly(Seqno(3)));

        let mut items = base_items();
        items.push(Value::Array(vec![
            Value::Integer(Integer::from(3u64)),
            Value::Bytes(vec![0, 6, 2, 42, 123]),
        ]));
        let decoded = decode_outer_link(&bytes_of(items)).expect("full");
        assert_eq!(decoded.link().skip, SkipPointer::new(Seqno(3), vec![0, 6, 2, 42, 123]));
    }
}
