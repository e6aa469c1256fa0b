//! Normalisation of raw collaborator output into typed item fields.

use crate::{
    source::{RawExtraction, RawStatics},
    state::item::{Score, ScorePair, StaticFields, VolatileFields},
};

/// Participant name used when the page does not expose one.
pub const DEFAULT_HOME_NAME: &str = "Home";
/// Participant name used when the page does not expose one.
pub const DEFAULT_AWAY_NAME: &str = "Away";

/// Whether both raw score texts of `raw` pass the validity predicate.
///
/// Missing score blocks count as valid: they mean the match has no score yet.
pub fn has_valid_scores(raw: &RawExtraction) -> bool {
    match raw_scores(raw) {
        Some((home, away)) => Score::parse(&home).is_some() && Score::parse(&away).is_some(),
        None => true,
    }
}

/// Volatile attributes of `raw`; scores failing the predicate degrade to unset.
pub fn volatile_fields(raw: &RawExtraction) -> VolatileFields {
    let scores = raw_scores(raw)
        .map(|(home, away)| {
            match (Score::parse(&home), Score::parse(&away)) {
                (Some(home), Some(away)) => ScorePair::new(home, away),
                _ => ScorePair::unset(),
            }
        })
        .unwrap_or_default();

    VolatileFields {
        scores,
        phase_text: phase_text(raw),
    }
}

/// Static attributes of `raw`, or `None` when the collaborator returned no static block.
pub fn static_fields(raw: &RawExtraction, origin: &str) -> Option<StaticFields> {
    raw.statics
        .as_ref()
        .map(|statics| normalize_statics(statics, origin))
}

fn normalize_statics(statics: &RawStatics, origin: &str) -> StaticFields {
    let (group_country, group_name, group_nav_ref) = group_of(statics, origin);
    let group_key = group_key(&group_country, &group_name);

    StaticFields {
        group_country,
        group_name,
        group_key,
        group_nav_ref,
        home_name: non_empty(statics.home_name.as_deref())
            .unwrap_or(DEFAULT_HOME_NAME)
            .to_string(),
        away_name: non_empty(statics.away_name.as_deref())
            .unwrap_or(DEFAULT_AWAY_NAME)
            .to_string(),
        home_image: non_empty(statics.home_image.as_deref())
            .unwrap_or_default()
            .to_string(),
        away_image: non_empty(statics.away_image.as_deref())
            .unwrap_or_default()
            .to_string(),
    }
}

/// Country, competition and absolute competition link.
fn group_of(statics: &RawStatics, origin: &str) -> (String, String, String) {
    if let [_, country, competition, ..] = statics.breadcrumbs.as_slice() {
        let nav_ref = competition
            .href
            .as_deref()
            .and_then(|href| non_empty(Some(href)))
            .map(|href| absolute_link(origin, href))
            .unwrap_or_default();
        return (
            country.text.trim().to_string(),
            competition.text.trim().to_string(),
            nav_ref,
        );
    }

    match statics
        .og_description
        .as_deref()
        .and_then(|text| text.split_once(':'))
    {
        Some((country, competition)) => (
            country.trim().to_string(),
            competition.trim().to_string(),
            String::new(),
        ),
        None => (String::new(), String::new(), String::new()),
    }
}

/// Grouping and ordering key (`"SPAIN: LaLiga"`).
pub fn group_key(country: &str, competition: &str) -> String {
    match (country.is_empty(), competition.is_empty()) {
        (false, false) => format!("{country}: {competition}"),
        (false, true) => country.to_string(),
        (true, _) => competition.to_string(),
    }
}

fn absolute_link(origin: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    let origin = origin.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{origin}{href}")
    } else {
        format!("{origin}/{href}")
    }
}

/// Raw home/away score texts, preferring the detailed block over the compact one.
fn raw_scores(raw: &RawExtraction) -> Option<(String, String)> {
    if raw.score_spans.len() >= 3 {
        return Some((
            raw.score_spans[0].trim().to_string(),
            raw.score_spans[2].trim().to_string(),
        ));
    }

    let text = raw.score_text.as_deref()?.trim();
    if !text.contains('-') {
        return None;
    }
    let mut parts = text.split('-');
    let home = parts.next().unwrap_or_default().trim();
    let away = parts.next().unwrap_or_default().trim();
    // A bare `-` is how the source renders a match that has not started.
    if home.is_empty() && away.is_empty() {
        return Some((
            Score::UNSET_MARKER.to_string(),
            Score::UNSET_MARKER.to_string(),
        ));
    }
    Some((home.to_string(), away.to_string()))
}

/// Phase text, falling back through status spans, whole status text and start time.
pub fn phase_text(raw: &RawExtraction) -> String {
    let spans: Vec<&str> = raw
        .status_spans
        .iter()
        .map(|span| span.trim())
        .filter(|span| !span.is_empty())
        .collect();

    if spans.is_empty() {
        return non_empty(raw.status_text.as_deref())
            .or_else(|| non_empty(raw.start_time.as_deref()))
            .unwrap_or_default()
            .to_string();
    }

    match spans.as_slice() {
        [_, minute] if is_integer(minute) => return (*minute).to_string(),
        [single] if is_integer(single.trim_end_matches('\'')) => {
            return single.trim_end_matches('\'').to_string();
        }
        _ => {}
    }

    let joined = spans.join(" ");
    match joined.split_whitespace().last() {
        Some(last) if is_integer(last.trim_end_matches('\'')) => {
            last.trim_end_matches('\'').to_string()
        }
        _ => joined,
    }
}

fn is_integer(text: &str) -> bool {
    text.parse::<i64>().is_ok()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Breadcrumb;

    const ORIGIN: &str = "https://www.flashscore.es";

    fn spans(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn detailed_score_block_wins() {
        let raw = RawExtraction {
            score_spans: spans(&["2", "-", "1"]),
            score_text: Some("9-9".into()),
            ..RawExtraction::default()
        };
        let fields = volatile_fields(&raw);
        assert_eq!(
            fields.scores,
            ScorePair::new(Score::Value(2), Score::Value(1))
        );
    }

    #[test]
    fn compact_score_text_is_split_on_dash() {
        let raw = RawExtraction {
            score_text: Some("0 - 3".into()),
            ..RawExtraction::default()
        };
        assert_eq!(
            volatile_fields(&raw).scores,
            ScorePair::new(Score::Value(0), Score::Value(3))
        );
        assert!(has_valid_scores(&raw));
    }

    #[test]
    fn bare_dash_means_not_started() {
        let raw = RawExtraction {
            score_text: Some(" - ".into()),
            start_time: Some("21:00".into()),
            ..RawExtraction::default()
        };
        assert!(has_valid_scores(&raw));
        assert_eq!(volatile_fields(&raw).scores, ScorePair::unset());
        assert_eq!(phase_text(&raw), "21:00");
    }

    #[test]
    fn malformed_scores_fail_validation_and_degrade_to_unset() {
        let raw = RawExtraction {
            score_spans: spans(&["2", "-", "?"]),
            ..RawExtraction::default()
        };
        assert!(!has_valid_scores(&raw));
        assert_eq!(volatile_fields(&raw).scores, ScorePair::unset());
    }

    #[test]
    fn phase_prefers_numeric_second_span() {
        let raw = RawExtraction {
            status_spans: spans(&["2nd half", "52"]),
            ..RawExtraction::default()
        };
        assert_eq!(phase_text(&raw), "52");
    }

    #[test]
    fn phase_strips_minute_mark() {
        let raw = RawExtraction {
            status_spans: spans(&["45'"]),
            ..RawExtraction::default()
        };
        assert_eq!(phase_text(&raw), "45");

        let raw = RawExtraction {
            status_spans: spans(&["Extra time", "105'"]),
            ..RawExtraction::default()
        };
        assert_eq!(phase_text(&raw), "105");
    }

    #[test]
    fn phase_joins_non_numeric_spans() {
        let raw = RawExtraction {
            status_spans: spans(&["Descanso", ""]),
            ..RawExtraction::default()
        };
        assert_eq!(phase_text(&raw), "Descanso");
    }

    #[test]
    fn phase_falls_back_to_status_then_start_time() {
        let raw = RawExtraction {
            status_text: Some("  ".into()),
            start_time: Some("21:00".into()),
            ..RawExtraction::default()
        };
        assert_eq!(phase_text(&raw), "21:00");
        assert_eq!(phase_text(&RawExtraction::default()), "");
    }

    #[test]
    fn group_comes_from_breadcrumbs_with_absolute_link() {
        let statics = RawStatics {
            breadcrumbs: vec![
                Breadcrumb {
                    text: "Football".into(),
                    href: Some("/football/".into()),
                },
                Breadcrumb {
                    text: "Spain".into(),
                    href: None,
                },
                Breadcrumb {
                    text: " LaLiga - Round 25 ".into(),
                    href: Some("/football/spain/laliga/".into()),
                },
            ],
            home_name: Some("Betis".into()),
            ..RawStatics::default()
        };
        let raw = RawExtraction {
            statics: Some(statics),
            ..RawExtraction::default()
        };

        let fields = static_fields(&raw, ORIGIN).unwrap();
        assert_eq!(fields.group_key, "Spain: LaLiga - Round 25");
        assert_eq!(
            fields.group_nav_ref,
            "https://www.flashscore.es/football/spain/laliga/"
        );
        assert_eq!(fields.home_name, "Betis");
        assert_eq!(fields.away_name, DEFAULT_AWAY_NAME);
        assert_eq!(fields.home_image, "");
    }

    #[test]
    fn group_falls_back_to_og_description() {
        let raw = RawExtraction {
            statics: Some(RawStatics {
                og_description: Some("SPAIN: LaLiga Hypermotion - Round 25".into()),
                ..RawStatics::default()
            }),
            ..RawExtraction::default()
        };
        let fields = static_fields(&raw, ORIGIN).unwrap();
        assert_eq!(fields.group_country, "SPAIN");
        assert_eq!(fields.group_name, "LaLiga Hypermotion - Round 25");
        assert_eq!(fields.group_nav_ref, "");
    }

    #[test]
    fn volatile_only_extraction_has_no_statics() {
        assert!(static_fields(&RawExtraction::default(), ORIGIN).is_none());
    }
}
