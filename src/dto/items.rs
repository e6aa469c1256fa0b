use std::{collections::HashMap, time::SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dto::{format_system_time, validation::validate_item_id},
    state::{
        diff::PhaseCategory,
        item::{ItemState, TrackedItemId, epoch_millis},
    },
};

/// Rendered state of one tracked item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ItemView {
    #[serde(rename = "matchId")]
    #[schema(value_type = String)]
    pub match_id: TrackedItemId,
    pub home_name: String,
    pub away_name: String,
    pub home_image: String,
    pub away_image: String,
    /// Score text, `-` while unset.
    pub home_score: String,
    /// Score text, `-` while unset.
    pub away_score: String,
    pub phase_text: String,
    pub phase_category: PhaseCategory,
    /// True while the item is live or at half-time.
    pub emphasized: bool,
    /// Score alert expiry in epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_expires_at: Option<u64>,
    pub alert_active: bool,
    /// Phase alert expiry in epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_alert_expires_at: Option<u64>,
    pub phase_alert_active: bool,
    /// RFC 3339 timestamp of the fetch that produced this state.
    pub updated_at: String,
}

impl ItemView {
    /// Render `state` as observed at `now`.
    pub fn from_state(state: &ItemState, now: SystemTime) -> Self {
        let fields = &state.static_fields;
        Self {
            match_id: state.item_id.clone(),
            home_name: fields.home_name.clone(),
            away_name: fields.away_name.clone(),
            home_image: fields.home_image.clone(),
            away_image: fields.away_image.clone(),
            home_score: state.scores.home.to_string(),
            away_score: state.scores.away.to_string(),
            phase_text: state.phase_text.clone(),
            phase_category: state.phase_category,
            emphasized: state.is_emphasized(),
            alert_expires_at: state.alert_expires_at.map(epoch_millis),
            alert_active: state.alert_active(now),
            phase_alert_expires_at: state.phase_alert_expires_at.map(epoch_millis),
            phase_alert_active: state.phase_alert_active(now),
            updated_at: format_system_time(state.updated_at),
        }
    }
}

/// Items sharing one grouping key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct GroupView {
    /// Grouping key (`"SPAIN: LaLiga"`).
    pub key: String,
    pub country: String,
    pub name: String,
    /// Absolute link to the competition page, empty when unknown.
    pub nav_ref: String,
    pub items: Vec<ItemView>,
}

/// Full rendered item list pushed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ItemsPayload {
    /// Groups in first-appearance order of the tracked set.
    pub groups: Vec<GroupView>,
    /// Tracked ids without a successful fetch yet.
    #[schema(value_type = Vec<String>)]
    pub pending: Vec<TrackedItemId>,
    /// RFC 3339 timestamp when the payload was rendered.
    pub generated_at: String,
}

impl ItemsPayload {
    /// Group `states` by their static grouping key following the order of `tracked`.
    ///
    /// States whose id is no longer tracked are skipped.
    pub fn build(tracked: &[TrackedItemId], states: Vec<ItemState>, now: SystemTime) -> Self {
        let mut by_id: HashMap<TrackedItemId, ItemState> = states
            .into_iter()
            .map(|state| (state.item_id.clone(), state))
            .collect();

        let mut groups: IndexMap<String, GroupView> = IndexMap::new();
        let mut pending = Vec::new();

        for item_id in tracked {
            let Some(state) = by_id.remove(item_id) else {
                pending.push(item_id.clone());
                continue;
            };

            let fields = &state.static_fields;
            groups
                .entry(fields.group_key.clone())
                .or_insert_with(|| GroupView {
                    key: fields.group_key.clone(),
                    country: fields.group_country.clone(),
                    name: fields.group_name.clone(),
                    nav_ref: fields.group_nav_ref.clone(),
                    items: Vec::new(),
                })
                .items
                .push(ItemView::from_state(&state, now));
        }

        Self {
            groups: groups.into_values().collect(),
            pending,
            generated_at: format_system_time(now),
        }
    }

    /// Number of rendered items across all groups.
    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|group| group.items.len()).sum()
    }
}

/// Path parameter naming one item.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Path)]
pub struct ItemPath {
    /// Item identifier.
    #[validate(custom(function = "validate_item_id"))]
    pub id: String,
}

/// Result of a REST add or removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ItemMutationResponse {
    #[serde(rename = "matchId")]
    #[schema(value_type = String)]
    pub match_id: TrackedItemId,
    /// Whether the id is in the effective tracked set after the call.
    pub tracked: bool,
    /// Whether the effective tracked set changed.
    pub changed: bool,
}

/// Answer to a manual cycle trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CycleTriggerResponse {
    /// True when a cycle was running and the new one will start right after it.
    pub deferred: bool,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::state::item::{Score, ScorePair, StaticFields};

    fn state(id: &str, group: &str, now: SystemTime) -> ItemState {
        ItemState {
            item_id: id.into(),
            static_fields: StaticFields {
                group_key: group.into(),
                home_name: format!("{id}-home"),
                away_name: format!("{id}-away"),
                ..StaticFields::default()
            },
            scores: ScorePair::new(Score::Value(1), Score::Unset),
            phase_text: "67".into(),
            phase_category: PhaseCategory::Live,
            alert_expires_at: Some(now + Duration::from_secs(5)),
            phase_alert_expires_at: None,
            updated_at: now,
        }
    }

    #[test]
    fn groups_follow_first_appearance_and_skip_untracked() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let tracked: Vec<TrackedItemId> = ["a", "b", "c", "d"].map(TrackedItemId::from).to_vec();
        let states = vec![
            state("c", "Spain: LaLiga", now),
            state("a", "England: Premier League", now),
            state("b", "Spain: LaLiga", now),
            state("gone", "Italy: Serie A", now),
        ];

        let payload = ItemsPayload::build(&tracked, states, now);

        let keys: Vec<&str> = payload.groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, ["England: Premier League", "Spain: LaLiga"]);
        let spain: Vec<&str> = payload.groups[1]
            .items
            .iter()
            .map(|item| item.match_id.as_str())
            .collect();
        assert_eq!(spain, ["b", "c"]);
        assert_eq!(payload.pending, vec![TrackedItemId::from("d")]);
        assert_eq!(payload.item_count(), 3);
    }

    #[test]
    fn view_exposes_markers_and_alert_flags() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let view = ItemView::from_state(&state("a", "k", now), now);
        assert_eq!(view.home_score, "1");
        assert_eq!(view.away_score, "-");
        assert!(view.emphasized);
        assert!(view.alert_active);
        assert_eq!(view.alert_expires_at, Some(1_005_000));
        assert!(!view.phase_alert_active);
    }
}
