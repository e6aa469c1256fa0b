use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        items::ItemsPayload,
        validation::{validate_item_id, validate_item_ids},
    },
    error::TransportError,
    state::item::TrackedItemId,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
/// Control messages accepted from sync clients.
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Replace the sender's whole declared set.
    Sync {
        /// Every id the client currently tracks locally.
        ids: Vec<String>,
    },
    /// Start tracking one id.
    Add {
        /// Item to add.
        #[serde(rename = "matchId")]
        match_id: String,
    },
    /// Explicitly remove one id.
    Remove {
        /// Item to remove.
        #[serde(rename = "matchId")]
        match_id: String,
    },
}

impl ClientMessage {
    /// Decode and validate a text frame; any failure is a [`TransportError::MalformedMessage`].
    pub fn from_json_str(raw: &str) -> Result<Self, TransportError> {
        let message = serde_json::from_str::<Self>(raw)?;
        message.validate()?;
        Ok(message)
    }
}

impl Validate for ClientMessage {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match self {
            Self::Sync { ids } => {
                if let Err(e) = validate_item_ids(ids) {
                    errors.add("ids", e);
                }
            }
            Self::Add { match_id } | Self::Remove { match_id } => {
                if let Err(e) = validate_item_id(match_id) {
                    errors.add("matchId", e);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Messages pushed to sync clients.
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Full rendered item list, grouped.
    Items(ItemsPayload),
    /// Out-of-band removal the client must apply to its local copy.
    Remove {
        /// Removed item.
        #[serde(rename = "matchId")]
        #[schema(value_type = String)]
        match_id: TrackedItemId,
    },
}

impl ServerMessage {
    /// Removal notice for `item_id`.
    pub fn remove(item_id: &TrackedItemId) -> Self {
        Self::Remove {
            match_id: item_id.clone(),
        }
    }
}

/// Query parameters of the push endpoint.
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct WsParams {
    /// Stable client key reused across reconnects.
    #[validate(custom(function = "validate_item_id"))]
    pub client: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_each_action() {
        assert_eq!(
            ClientMessage::from_json_str(r#"{"action":"sync","ids":["a","b"]}"#).unwrap(),
            ClientMessage::Sync {
                ids: vec!["a".into(), "b".into()]
            }
        );
        assert_eq!(
            ClientMessage::from_json_str(r#"{"action":"add","matchId":"g_1_X"}"#).unwrap(),
            ClientMessage::Add {
                match_id: "g_1_X".into()
            }
        );
        assert_eq!(
            ClientMessage::from_json_str(r#"{"action":"remove","matchId":"X"}"#).unwrap(),
            ClientMessage::Remove {
                match_id: "X".into()
            }
        );
    }

    #[test]
    fn unknown_action_is_malformed() {
        let err = ClientMessage::from_json_str(r#"{"action":"explode"}"#).unwrap_err();
        assert!(matches!(err, TransportError::MalformedMessage(_)));
    }

    #[test]
    fn missing_field_is_malformed() {
        let err = ClientMessage::from_json_str(r#"{"action":"add"}"#).unwrap_err();
        assert!(matches!(err, TransportError::MalformedMessage(_)));
    }

    #[test]
    fn invalid_ids_are_malformed() {
        let err =
            ClientMessage::from_json_str(r#"{"action":"sync","ids":["ok","not ok"]}"#).unwrap_err();
        assert!(matches!(err, TransportError::MalformedMessage(_)));

        let err = ClientMessage::from_json_str(r#"{"action":"remove","matchId":""}"#).unwrap_err();
        assert!(matches!(err, TransportError::MalformedMessage(_)));
    }

    #[test]
    fn removal_notice_shape() {
        let json = serde_json::to_value(ServerMessage::remove(&TrackedItemId::from("X"))).unwrap();
        assert_eq!(json, serde_json::json!({"action": "remove", "matchId": "X"}));
    }
}
