//! Feature gates consulted when writing links.

use std::collections::HashSet;
use std::fmt;

/// Rollout switches for high-skip pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    AllowHighSkips,
    RequireHighSkips,
}

impl Feature {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AllowHighSkips => "allow_high_skips",
            Self::RequireHighSkips => "require_high_skips",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only feature oracle, asked per subject (the user or team whose chain
/// is being extended).
pub trait FeatureFlags {
    fn is_enabled(&self, feature: Feature, subject: &str) -> bool;
}

impl<F> FeatureFlags for F
where
    F: Fn(Feature, &str) -> bool,
{
    fn is_enabled(&self, feature: Feature, subject: &str) -> bool {
        self(feature, subject)
    }
}

/// A fixed set of enabled features, the same for every subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticFeatures(HashSet<Feature>);

impl StaticFeatures {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, feature: Feature) -> Self {
        self.0.insert(feature);
        self
    }
}

impl FromIterator<Feature> for StaticFeatures {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FeatureFlags for StaticFeatures {
    fn is_enabled(&self, feature: Feature, _subject: &str) -> bool {
        self.0.contains(&feature)
    }
}

/// Both high-skip gates, read together from one oracle snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighSkipGates {
    pub allow: bool,
    pub require: bool,
}

impl HighSkipGates {
    /// Read both gates for `subject`, once each.
    pub fn snapshot<F: FeatureFlags + ?Sized>(flags: &F, subject: &str) -> Self {
        let gates = Self {
            allow: flags.is_enabled(Feature::AllowHighSkips, subject),
            require: flags.is_enabled(Feature::RequireHighSkips, subject),
        };
        if gates.require && !gates.allow {
            tracing::warn!(
                subject,
                "require_high_skips is on but allow_high_skips is off; skip pointers stay disabled"
            );
        }
        gates
    }

    /// Whether a missing skip pointer is an error. Never true while pointers
    /// are disallowed.
    #[must_use]
    pub const fn requires(self) -> bool {
        self.allow && self.require
    }
}
