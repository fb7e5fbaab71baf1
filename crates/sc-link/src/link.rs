use crate::{GuardedCodec, LinkId, Seqno};
use std::fmt;
use std::str::FromStr;

/// Outer format version written by this crate and the only one it accepts.
pub const OUTER_LINK_VERSION: u64 = 2;

macro_rules! link_types {
    ($($variant:ident = $code:literal, $name:literal;)*) => {
        /// Statement kind of a link, with its stable wire code.
        ///
        /// `Unsupported` keeps codes this build does not recognise. Such links
        /// only decode when they are marked `ignore_if_unsupported`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum LinkType {
            $($variant,)*
            Unsupported(u64),
        }

        impl LinkType {
            /// Wire code of this link type.
            #[must_use]
            pub const fn code(self) -> u64 {
                match self {
                    $(Self::$variant => $code,)*
                    Self::Unsupported(code) => code,
                }
            }

            /// Look up a wire code. Unknown non-zero codes map to `Unsupported`;
            /// 0 is never a valid link type.
            #[must_use]
            pub const fn from_code(code: u64) -> Option<Self> {
                match code {
                    0 => None,
                    $($code => Some(Self::$variant),)*
                    other => Some(Self::Unsupported(other)),
                }
            }

            /// The statement type name used in inner payloads.
            #[must_use]
            pub const fn name(self) -> Option<&'static str> {
                match self {
                    $(Self::$variant => Some($name),)*
                    Self::Unsupported(_) => None,
                }
            }
        }

        impl FromStr for LinkType {
            type Err = UnknownLinkType;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)*
                    _ => Err(UnknownLinkType(s.to_string())),
                }
            }
        }
    };
}

link_types! {
    Eldest = 1, "eldest";
    WebServiceBinding = 2, "web_service_binding";
    Track = 3, "track";
    Untrack = 4, "untrack";
    Revoke = 5, "revoke";
    Cryptocurrency = 6, "cryptocurrency";
    Announcement = 7, "announcement";
    Device = 8, "device";
    WebServiceBindingWithRevoke = 9, "web_service_binding_with_revoke";
    CryptocurrencyWithRevoke = 10, "cryptocurrency_with_revoke";
    Sibkey = 11, "sibkey";
    Subkey = 12, "subkey";
    PgpUpdate = 13, "pgp_update";
    PerUserKey = 14, "per_user_key";
    WalletStellar = 15, "wallet.stellar";
    TeamRoot = 33, "team.root";
    TeamNewSubteam = 34, "team.new_subteam";
    TeamChangeMembership = 35, "team.change_membership";
    TeamRotateKey = 36, "team.rotate_key";
    TeamLeave = 37, "team.leave";
    TeamSubteamHead = 38, "team.subteam_head";
    TeamRenameSubteam = 39, "team.rename_subteam";
    TeamInvite = 40, "team.invite";
    TeamRenameUpPointer = 41, "team.rename_up_pointer";
    TeamDeleteRoot = 42, "team.delete_root";
    TeamDeleteSubteam = 43, "team.delete_subteam";
    TeamDeleteUpPointer = 44, "team.delete_up_pointer";
    TeamKbfsSettings = 45, "team.kbfs";
    TeamSettings = 46, "team.settings";
}

/// Error returned when a link type name is not recognised.
#[derive(Debug, thiserror::Error)]
#[error("unknown link type: {0}")]
pub struct UnknownLinkType(String);

impl LinkType {
    /// Promote a statement that also revokes keys to its "with revoke" kind.
    ///
    /// Only web service bindings and cryptocurrency statements have one; every
    /// other type is returned unchanged.
    #[must_use]
    pub const fn with_revokes(self, has_revokes: bool) -> Self {
        match (self, has_revokes) {
            (Self::WebServiceBinding, true) => Self::WebServiceBindingWithRevoke,
            (Self::Cryptocurrency, true) => Self::CryptocurrencyWithRevoke,
            (other, _) => other,
        }
    }

    #[must_use]
    pub const fn is_supported(self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "unsupported({})", self.code()),
        }
    }
}

/// Visibility class of the chain a link belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeqType {
    Public,
    Private,
    Semiprivate,
}

impl SeqType {
    #[must_use]
    pub const fn code(self) -> u64 {
        match self {
            Self::Public => 1,
            Self::Private => 2,
            Self::Semiprivate => 3,
        }
    }

    #[must_use]
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::Public),
            2 => Some(Self::Private),
            3 => Some(Self::Semiprivate),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Semiprivate => "semiprivate",
        }
    }
}

impl fmt::Display for SeqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SeqType {
    type Err = UnknownSeqType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "semiprivate" => Ok(Self::Semiprivate),
            _ => Err(UnknownSeqType(s.to_string())),
        }
    }
}

/// Error returned when a seq type name is not recognised.
#[derive(Debug, thiserror::Error)]
#[error("unknown seq type: {0}")]
pub struct UnknownSeqType(String);

/// High-skip pointer to a non-adjacent ancestor.
///
/// `SeqnoOnly` is the transitional shape written before skip hashes were
/// recorded. It is a distinct state, not a `Full` pointer with a missing hash,
/// and the verifier treats it differently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SkipPointer {
    #[default]
    Absent,
    SeqnoOnly(Seqno),
    Full { target: Seqno, hash: LinkId },
}

impl SkipPointer {
    /// Build a pointer from a target and possibly-empty hash bytes.
    ///
    /// Empty bytes produce the seqno-only shape.
    #[must_use]
    pub fn new(target: Seqno, hash: impl Into<Vec<u8>>) -> Self {
        match LinkId::new(hash) {
            Some(hash) => Self::Full { target, hash },
            None => Self::SeqnoOnly(target),
        }
    }

    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    #[must_use]
    pub const fn target(&self) -> Option<Seqno> {
        match self {
            Self::Absent => None,
            Self::SeqnoOnly(target) | Self::Full { target, .. } => Some(*target),
        }
    }

    #[must_use]
    pub const fn hash(&self) -> Option<&LinkId> {
        match self {
            Self::Full { hash, .. } => Some(hash),
            Self::Absent | Self::SeqnoOnly(_) => None,
        }
    }

    /// Whether this pointer may appear on the link at `seqno`: the target must
    /// be an ancestor older than the immediate predecessor.
    #[must_use]
    pub fn fits(&self, seqno: Seqno) -> bool {
        self.target()
            .map_or(true, |target| target.get() >= 1 && target.get() < seqno.get().saturating_sub(1))
    }
}

impl fmt::Display for SkipPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("none"),
            Self::SeqnoOnly(target) => write!(f, "{target}"),
            Self::Full { target, hash } => write!(f, "{target}:{hash}"),
        }
    }
}

/// The outer header of one sigchain link.
///
/// Never serialized through serde: see [`crate::guard`]. Bytes come from
/// [`crate::LinkEncoder`] and go back through [`crate::decode_outer_link`].
#[derive(Debug, Clone, PartialEq, Eq, GuardedCodec)]
pub struct OuterLink {
    pub version: u64,
    pub seqno: Seqno,
    pub prev: Option<LinkId>,
    pub curr: LinkId,
    pub link_type: LinkType,
    pub seq_type: SeqType,
    pub ignore_if_unsupported: bool,
    pub skip: SkipPointer,
}

/// A decoded outer link together with the exact bytes it came from.
#[derive(Debug, Clone, PartialEq, Eq, GuardedCodec)]
pub struct OuterLinkWithMetadata {
    link: OuterLink,
    raw: Vec<u8>,
}

impl OuterLinkWithMetadata {
    pub(crate) const fn new(link: OuterLink, raw: Vec<u8>) -> Self {
        Self { link, raw }
    }

    #[must_use]
    pub const fn link(&self) -> &OuterLink {
        &self.link
    }

    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Hash of the raw outer bytes; what the next link's `prev` must equal.
    #[must_use]
    pub fn link_id(&self) -> LinkId {
        LinkId::of_payload(&self.raw)
    }

    #[must_use]
    pub fn into_link(self) -> OuterLink {
        self.link
    }
}
