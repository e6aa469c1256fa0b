use serde::{Deserialize, Serialize};

/// Which part of an item the collaborator should extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionScope {
    /// Static and volatile attributes (cache miss).
    Full,
    /// Scores and phase only (static attributes served from the cache).
    VolatileOnly,
}

impl ExtractionScope {
    /// Query-string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::VolatileOnly => "volatile_only",
        }
    }
}

/// One breadcrumb entry on the item page (`Football > Spain > LaLiga - Round 25`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Visible text.
    pub text: String,
    /// Link target, usually site-relative.
    #[serde(default)]
    pub href: Option<String>,
}

/// Raw text for the slowly-changing attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawStatics {
    /// Breadcrumb trail; entries 1 and 2 are country and competition.
    pub breadcrumbs: Vec<Breadcrumb>,
    /// `og:description` meta content (`"SPAIN: LaLiga - Round 25"`), used when breadcrumbs are missing.
    pub og_description: Option<String>,
    /// Home participant name.
    pub home_name: Option<String>,
    /// Away participant name.
    pub away_name: Option<String>,
    /// Home participant image URL.
    pub home_image: Option<String>,
    /// Away participant image URL.
    pub away_image: Option<String>,
}

/// Everything the collaborator could read from the item page, unnormalised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawExtraction {
    /// Present only for [`ExtractionScope::Full`].
    pub statics: Option<RawStatics>,
    /// Spans of the detailed score block (`["2", "-", "1"]`).
    pub score_spans: Vec<String>,
    /// Compact score text (`"2 - 1"`), used when the detailed block is missing.
    pub score_text: Option<String>,
    /// Spans of the status block (`["2nd half", "52"]`).
    pub status_spans: Vec<String>,
    /// Whole status block text.
    pub status_text: Option<String>,
    /// Scheduled start text for matches that have not begun.
    pub start_time: Option<String>,
}
