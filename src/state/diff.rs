//! Per-item change detection: phase classification and the score/phase alert windows.

use std::time::{Duration, SystemTime};

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::item::{ItemState, RawSnapshot};

/// Default length of both alert windows.
pub const DEFAULT_ALERT_WINDOW: Duration = Duration::from_secs(10);

/// Exact phase texts meaning half-time.
const HALFTIME_EXACT: &[&str] = &["HT"];
/// Lower-cased fragments meaning half-time or a break in play.
const HALFTIME_WORDS: &[&str] = &["descanso", "half-time", "halftime", "break"];
/// Exact phase texts meaning the item has finished.
const FINISHED_EXACT: &[&str] = &["F", "FT"];
/// Lower-cased fragments meaning finished, ended or postponed.
const FINISHED_WORDS: &[&str] = &["fin", "ended", "post"];

/// Coarse classification of the phase/clock text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PhaseCategory {
    /// Kick-off time such as `20:45`.
    Scheduled,
    /// Running clock.
    Live,
    /// Half-time or another break.
    Halftime,
    /// Final, ended or postponed.
    Finished,
    /// Text present but not recognised.
    Other,
    /// No phase text at all.
    Empty,
}

impl PhaseCategory {
    /// Classify a phase text. The rules are checked in a fixed order so a text matching several
    /// of them always lands in the same category.
    pub fn classify(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        if trimmed.contains(':') {
            return Self::Scheduled;
        }

        let lower = trimmed.to_lowercase();
        if HALFTIME_EXACT.contains(&trimmed) || HALFTIME_WORDS.iter().any(|w| lower.contains(w)) {
            return Self::Halftime;
        }
        if FINISHED_EXACT.contains(&trimmed) || FINISHED_WORDS.iter().any(|w| lower.contains(w)) {
            return Self::Finished;
        }
        if trimmed.chars().any(|c| c.is_ascii_digit()) {
            return Self::Live;
        }
        Self::Other
    }

    /// Live play and half-time drive the emphasis color.
    pub fn is_emphasized(self) -> bool {
        matches!(self, Self::Live | Self::Halftime)
    }
}

/// Merge a fresh snapshot into the previous record for the same item.
///
/// Alert windows only ever move forward: when no new change is detected the previous expiry is
/// carried over so an in-flight alert finishes its window even if the fetch briefly produced
/// placeholder scores.
pub fn reconcile(
    previous: Option<&ItemState>,
    fresh: RawSnapshot,
    now: SystemTime,
    window: Duration,
) -> ItemState {
    let RawSnapshot {
        item_id,
        static_fields,
        volatile,
    } = fresh;
    let phase_category = PhaseCategory::classify(&volatile.phase_text);

    let (alert_expires_at, phase_alert_expires_at) = match previous {
        Some(prev) => {
            // Placeholder scores on either side never count as a change.
            let score_changed = prev.scores.is_complete()
                && volatile.scores.is_complete()
                && prev.scores != volatile.scores;
            let alert = if score_changed {
                Some(now + window)
            } else {
                prev.alert_expires_at
            };

            let phase_changed =
                prev.phase_category != PhaseCategory::Empty && prev.phase_category != phase_category;
            let phase_alert = if phase_changed {
                Some(now + window)
            } else {
                prev.phase_alert_expires_at
            };
            (alert, phase_alert)
        }
        None => (None, None),
    };

    ItemState {
        item_id,
        static_fields,
        scores: volatile.scores,
        phase_text: volatile.phase_text,
        phase_category,
        alert_expires_at,
        phase_alert_expires_at,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::item::{Score, ScorePair, StaticFields, VolatileFields};

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn snapshot(home: Score, away: Score, phase: &str) -> RawSnapshot {
        RawSnapshot {
            item_id: "g_1_abc".into(),
            static_fields: StaticFields::default(),
            volatile: VolatileFields {
                scores: ScorePair::new(home, away),
                phase_text: phase.to_string(),
            },
        }
    }

    fn first(home: Score, away: Score, phase: &str) -> ItemState {
        reconcile(None, snapshot(home, away, phase), at(100), DEFAULT_ALERT_WINDOW)
    }

    #[test]
    fn classify_covers_every_category() {
        assert_eq!(PhaseCategory::classify("20:45"), PhaseCategory::Scheduled);
        assert_eq!(PhaseCategory::classify("HT"), PhaseCategory::Halftime);
        assert_eq!(PhaseCategory::classify("Descanso"), PhaseCategory::Halftime);
        assert_eq!(PhaseCategory::classify("Finalizado"), PhaseCategory::Finished);
        assert_eq!(PhaseCategory::classify("FT"), PhaseCategory::Finished);
        assert_eq!(PhaseCategory::classify("Aplazado (post.)"), PhaseCategory::Finished);
        assert_eq!(PhaseCategory::classify("67"), PhaseCategory::Live);
        assert_eq!(PhaseCategory::classify("90+3"), PhaseCategory::Live);
        assert_eq!(PhaseCategory::classify("  "), PhaseCategory::Empty);
        assert_eq!(PhaseCategory::classify("Penaltis"), PhaseCategory::Other);
    }

    #[test]
    fn emphasis_only_for_live_and_halftime() {
        assert!(PhaseCategory::Live.is_emphasized());
        assert!(PhaseCategory::Halftime.is_emphasized());
        assert!(!PhaseCategory::Scheduled.is_emphasized());
        assert!(!PhaseCategory::Finished.is_emphasized());
    }

    #[test]
    fn first_snapshot_opens_no_alerts() {
        let state = first(Score::Value(1), Score::Value(0), "12");
        assert_eq!(state.alert_expires_at, None);
        assert_eq!(state.phase_alert_expires_at, None);
        assert_eq!(state.phase_category, PhaseCategory::Live);
    }

    #[test]
    fn unset_scores_never_raise_an_alert() {
        let prev = first(Score::Unset, Score::Unset, "");
        let next = reconcile(
            Some(&prev),
            snapshot(Score::Unset, Score::Unset, ""),
            at(110),
            DEFAULT_ALERT_WINDOW,
        );
        assert_eq!(next.alert_expires_at, prev.alert_expires_at);

        let live = first(Score::Value(1), Score::Value(0), "30");
        let blip = reconcile(
            Some(&live),
            snapshot(Score::Unset, Score::Unset, "30"),
            at(110),
            DEFAULT_ALERT_WINDOW,
        );
        assert_eq!(blip.alert_expires_at, None);
    }

    #[test]
    fn score_change_opens_alert_window() {
        let prev = first(Score::Value(1), Score::Value(0), "30");
        let next = reconcile(
            Some(&prev),
            snapshot(Score::Value(2), Score::Value(0), "31"),
            at(110),
            DEFAULT_ALERT_WINDOW,
        );
        assert_eq!(next.alert_expires_at, Some(at(120)));
        assert!(next.alert_active(at(119)));
        assert!(!next.alert_active(at(120)));
    }

    #[test]
    fn in_flight_alert_survives_placeholder_fetch() {
        let prev = first(Score::Value(1), Score::Value(0), "30");
        let scored = reconcile(
            Some(&prev),
            snapshot(Score::Value(1), Score::Value(1), "31"),
            at(110),
            DEFAULT_ALERT_WINDOW,
        );
        let blip = reconcile(
            Some(&scored),
            snapshot(Score::Unset, Score::Unset, "31"),
            at(112),
            DEFAULT_ALERT_WINDOW,
        );
        assert_eq!(blip.alert_expires_at, Some(at(120)));
    }

    #[test]
    fn phase_transition_opens_phase_alert() {
        let prev = first(Score::Value(2), Score::Value(1), "90");
        let next = reconcile(
            Some(&prev),
            snapshot(Score::Value(2), Score::Value(1), "Finalizado"),
            at(110),
            DEFAULT_ALERT_WINDOW,
        );
        assert_eq!(next.phase_category, PhaseCategory::Finished);
        assert_eq!(next.phase_alert_expires_at, Some(at(120)));
    }

    #[test]
    fn same_phase_keeps_previous_phase_alert() {
        let prev = first(Score::Value(0), Score::Value(0), "44");
        let next = reconcile(
            Some(&prev),
            snapshot(Score::Value(0), Score::Value(0), "45"),
            at(110),
            DEFAULT_ALERT_WINDOW,
        );
        assert_eq!(next.phase_alert_expires_at, None);
    }

    #[test]
    fn leaving_empty_phase_is_not_a_transition() {
        let prev = first(Score::Unset, Score::Unset, "");
        let next = reconcile(
            Some(&prev),
            snapshot(Score::Unset, Score::Unset, "20:45"),
            at(110),
            DEFAULT_ALERT_WINDOW,
        );
        assert_eq!(next.phase_alert_expires_at, None);
    }
}
