//! Subcommand implementations. Each returns its output as a value so `main`
//! owns all printing.

use crate::config::FeatureConfig;
use sc_link::{
    check_chain, decode_base64url, decode_outer_link, encode_base64url, Base64Error, ChainError, DecodeError,
    EncodeError, ExpectedFields, FieldMismatch, LinkDraft, LinkEncoder, LinkId, LinkType,
    OuterLinkWithMetadata, SeqType, Seqno, SkipPointer, OUTER_LINK_VERSION,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Errors surfaced by the subcommands.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid argument: {0}")]
    Argument(String),
    #[error(transparent)]
    Base64(#[from] Base64Error),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("link {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: DecodeError,
    },
    #[error(transparent)]
    Mismatch(#[from] FieldMismatch),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outer link fields given on the command line.
#[derive(Debug, Clone, clap::Args)]
pub struct FieldArgs {
    /// Position of the link in its chain, starting at 1
    #[arg(long)]
    pub seqno: u64,

    /// Link type, by name (`team.leave`) or wire code (`37`)
    #[arg(long, value_parser = parse_link_type)]
    pub link_type: LinkType,

    /// The inner statement revokes keys; promotes revocable link types
    #[arg(long)]
    pub has_revokes: bool,

    /// Id of the previous link (base64url); omit on a chain start
    #[arg(long)]
    pub prev: Option<LinkId>,

    /// Hash of the inner payload (base64url)
    #[arg(long, conflicts_with = "payload")]
    pub curr: Option<LinkId>,

    /// Inner payload text; its SHA-256 becomes the link's curr
    #[arg(long)]
    pub payload: Option<String>,

    /// Chain visibility: public, private or semiprivate
    #[arg(long, default_value = "public")]
    pub seq_type: SeqType,

    /// Let readers that do not know the link type skip it
    #[arg(long)]
    pub ignore_if_unsupported: bool,

    /// Seqno of the ancestor the skip pointer targets
    #[arg(long)]
    pub skip_seqno: Option<u64>,

    /// Id of that ancestor (base64url); omit for a seqno-only pointer
    #[arg(long, requires = "skip_seqno")]
    pub skip_hash: Option<LinkId>,
}

fn parse_link_type(s: &str) -> Result<LinkType, String> {
    if let Ok(code) = s.parse::<u64>() {
        return LinkType::from_code(code).ok_or_else(|| "link type 0 is not valid".to_string());
    }
    s.parse().map_err(|err: sc_link::UnknownLinkType| err.to_string())
}

impl FieldArgs {
    fn curr(&self) -> Result<LinkId, ToolError> {
        match (&self.curr, &self.payload) {
            (Some(curr), _) => Ok(curr.clone()),
            (None, Some(payload)) => Ok(LinkId::of_payload(payload.as_bytes())),
            (None, None) => Err(ToolError::Argument("one of --curr or --payload is required".into())),
        }
    }

    fn link_type(&self) -> LinkType {
        self.link_type.with_revokes(self.has_revokes)
    }

    fn skip(&self) -> SkipPointer {
        match (self.skip_seqno, &self.skip_hash) {
            (None, _) => SkipPointer::Absent,
            (Some(target), None) => SkipPointer::SeqnoOnly(Seqno(target)),
            (Some(target), Some(hash)) => SkipPointer::Full {
                target: Seqno(target),
                hash: hash.clone(),
            },
        }
    }

    fn draft(&self) -> Result<LinkDraft, ToolError> {
        Ok(LinkDraft {
            link_type: self.link_type(),
            seqno: Seqno(self.seqno),
            prev: self.prev.clone(),
            curr: self.curr()?,
            seq_type: self.seq_type,
            ignore_if_unsupported: self.ignore_if_unsupported,
            skip: self.skip(),
        })
    }

    fn expected(&self, version: u64) -> Result<ExpectedFields, ToolError> {
        Ok(ExpectedFields {
            version,
            seqno: Seqno(self.seqno),
            prev: self.prev.clone(),
            curr: self.curr()?,
            link_type: self.link_type(),
            seq_type: self.seq_type,
            ignore_if_unsupported: self.ignore_if_unsupported,
            skip: self.skip(),
        })
    }
}

/// JSON rendering of a decoded link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkView {
    pub link_id: String,
    pub version: u64,
    pub seqno: u64,
    pub prev: Option<String>,
    pub curr: String,
    pub link_type: String,
    pub link_type_code: u64,
    pub seq_type: String,
    pub ignore_if_unsupported: bool,
    pub skip: Option<SkipView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipView {
    pub seqno: u64,
    pub hash: Option<String>,
}

impl From<&OuterLinkWithMetadata> for LinkView {
    fn from(decoded: &OuterLinkWithMetadata) -> Self {
        let link = decoded.link();
        Self {
            link_id: decoded.link_id().to_string(),
            version: link.version,
            seqno: link.seqno.get(),
            prev: link.prev.as_ref().map(ToString::to_string),
            curr: link.curr.to_string(),
            link_type: link.link_type.to_string(),
            link_type_code: link.link_type.code(),
            seq_type: link.seq_type.to_string(),
            ignore_if_unsupported: link.ignore_if_unsupported,
            skip: link.skip.target().map(|target| SkipView {
                seqno: target.get(),
                hash: link.skip.hash().map(ToString::to_string),
            }),
        }
    }
}

/// Encode a link for `subject` under its configured gates. Returns base64url.
///
/// # Errors
/// Returns `ToolError` if the arguments are incomplete or the encoder refuses
/// the draft.
pub fn encode(features: &FeatureConfig, subject: &str, fields: &FieldArgs) -> Result<String, ToolError> {
    let draft = fields.draft()?;
    let bytes = LinkEncoder::new(features, subject).encode(&draft)?;
    tracing::info!(subject, seqno = %draft.seqno, bytes = bytes.len(), "encoded outer link");
    Ok(encode_base64url(&bytes))
}

fn decode_one(index: usize, encoded: &str) -> Result<OuterLinkWithMetadata, ToolError> {
    let bytes = decode_base64url(encoded.trim())?;
    decode_outer_link(&bytes).map_err(|source| ToolError::Decode { index, source })
}

/// Decode one base64url link.
///
/// # Errors
/// Returns `ToolError` if the input is not base64url or not a valid link.
pub fn decode(encoded: &str) -> Result<LinkView, ToolError> {
    decode_one(0, encoded).map(|decoded| LinkView::from(&decoded))
}

/// Decode a link and check it against expected fields.
///
/// # Errors
/// Returns `ToolError::Mismatch` naming the first field that disagrees.
pub fn verify(encoded: &str, version: u64, fields: &FieldArgs) -> Result<LinkView, ToolError> {
    let decoded = decode_one(0, encoded)?;
    decoded.link().assert_fields(&fields.expected(version)?)?;
    tracing::info!(seqno = %decoded.link().seqno, "outer link verified");
    Ok(LinkView::from(&decoded))
}

/// Decode a run of links and check that they chain.
///
/// # Errors
/// Returns `ToolError` for the first link that fails to decode or link up.
pub fn check_links<S: AsRef<str>>(encoded: &[S]) -> Result<usize, ToolError> {
    let links = encoded
        .iter()
        .enumerate()
        .map(|(index, link)| decode_one(index, link.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    check_chain(&links)?;
    tracing::info!(links = links.len(), "chain verified");
    Ok(links.len())
}

/// Read links from a file, one base64url link per line. Blank lines and
/// lines starting with `#` are skipped.
///
/// # Errors
/// Returns `ToolError::Io` if the file cannot be read.
pub fn read_links(path: &Path) -> Result<Vec<String>, ToolError> {
    let text = std::fs::read_to_string(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Default version expected by `verify`.
pub const DEFAULT_VERSION: u64 = OUTER_LINK_VERSION;
