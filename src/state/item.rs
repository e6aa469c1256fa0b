use std::{
    fmt,
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::diff::PhaseCategory;

/// Opaque identifier of a tracked item (a match on the external source).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TrackedItemId(String);

impl TrackedItemId {
    /// Wrap a raw identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier understood by the external source.
    ///
    /// Collector pages prefix row ids (`g_1_AbCd1234`); only the trailing segment addresses the
    /// match itself.
    pub fn source_key(&self) -> &str {
        self.0.rsplit('_').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for TrackedItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackedItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TrackedItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One side of a scoreline: either not yet known or a non-negative count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Score {
    /// Placeholder shown while no score is available (`-`).
    #[default]
    Unset,
    /// A parsed score value.
    Value(u32),
}

impl Score {
    /// Wire marker used for [`Score::Unset`].
    pub const UNSET_MARKER: &'static str = "-";

    /// Parse an extracted score, returning `None` when the text is neither the unset marker nor a
    /// non-negative integer.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed == Self::UNSET_MARKER {
            return Some(Self::Unset);
        }
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        trimmed.parse::<u32>().ok().map(Self::Value)
    }

    /// Whether this side carries a real value.
    pub fn is_set(self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str(Self::UNSET_MARKER),
            Self::Value(value) => write!(f, "{value}"),
        }
    }
}

/// Home/away score pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScorePair {
    /// Home side.
    pub home: Score,
    /// Away side.
    pub away: Score,
}

impl ScorePair {
    /// Build a pair from both sides.
    pub fn new(home: Score, away: Score) -> Self {
        Self { home, away }
    }

    /// Both sides unset.
    pub fn unset() -> Self {
        Self::default()
    }

    /// True when neither side is a placeholder.
    pub fn is_complete(&self) -> bool {
        self.home.is_set() && self.away.is_set()
    }
}

/// Attributes that rarely change for a given item and are eligible for caching.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StaticFields {
    /// Country or region of the competition (first half of the grouping key).
    pub group_country: String,
    /// Competition name, possibly including the round.
    pub group_name: String,
    /// Key used to group and order items (`"{country}: {competition}"`).
    pub group_key: String,
    /// Absolute link to the competition page, empty when unknown.
    pub group_nav_ref: String,
    /// Home participant name.
    pub home_name: String,
    /// Away participant name.
    pub away_name: String,
    /// Home participant image reference.
    pub home_image: String,
    /// Away participant image reference.
    pub away_image: String,
}

/// Attributes re-fetched on every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VolatileFields {
    /// Current scoreline.
    pub scores: ScorePair,
    /// Phase or clock text as shown by the source (`"20:45"`, `"67"`, `"Descanso"`).
    pub phase_text: String,
}

/// Result of one fetch for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSnapshot {
    /// Item the snapshot belongs to.
    pub item_id: TrackedItemId,
    /// Static attributes, either freshly extracted or served from the cache.
    pub static_fields: StaticFields,
    /// Freshly extracted volatile attributes.
    pub volatile: VolatileFields,
}

/// Authoritative per-item record held by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemState {
    /// Item identifier.
    pub item_id: TrackedItemId,
    /// Static attributes from the last successful fetch.
    pub static_fields: StaticFields,
    /// Current scoreline.
    pub scores: ScorePair,
    /// Raw phase/clock text.
    pub phase_text: String,
    /// Category derived from `phase_text`.
    pub phase_category: PhaseCategory,
    /// End of the "score changed" alert window, if one was ever opened.
    pub alert_expires_at: Option<SystemTime>,
    /// End of the "phase changed" alert window, if one was ever opened.
    pub phase_alert_expires_at: Option<SystemTime>,
    /// When this record was last rebuilt from a fetch.
    pub updated_at: SystemTime,
}

impl ItemState {
    /// Whether the rendering layer should use its emphasis color.
    pub fn is_emphasized(&self) -> bool {
        self.phase_category.is_emphasized()
    }

    /// Whether the score alert window is still open at `now`.
    pub fn alert_active(&self, now: SystemTime) -> bool {
        self.alert_expires_at.is_some_and(|expires| now < expires)
    }

    /// Whether the phase alert window is still open at `now`.
    pub fn phase_alert_active(&self, now: SystemTime) -> bool {
        self.phase_alert_expires_at
            .is_some_and(|expires| now < expires)
    }
}

/// Convert a timestamp to milliseconds since the Unix epoch, saturating on pre-epoch values.
pub fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_parse_accepts_marker_and_integers() {
        assert_eq!(Score::parse("-"), Some(Score::Unset));
        assert_eq!(Score::parse(" 3 "), Some(Score::Value(3)));
        assert_eq!(Score::parse("0"), Some(Score::Value(0)));
    }

    #[test]
    fn score_parse_rejects_garbage() {
        assert_eq!(Score::parse(""), None);
        assert_eq!(Score::parse("-1"), None);
        assert_eq!(Score::parse("1.5"), None);
        assert_eq!(Score::parse("(2)"), None);
    }

    #[test]
    fn score_display_round_trips_marker() {
        assert_eq!(Score::Unset.to_string(), "-");
        assert_eq!(Score::Value(12).to_string(), "12");
    }

    #[test]
    fn source_key_strips_collector_prefix() {
        assert_eq!(TrackedItemId::from("g_1_AbCd1234").source_key(), "AbCd1234");
        assert_eq!(TrackedItemId::from("AbCd1234").source_key(), "AbCd1234");
    }
}
