use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::state::session::TeamColor;

/// HSV color payload shared by requests and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TeamColorDto {
    /// Hue in degrees.
    pub hue: f32,
    /// Saturation, 0..=1.
    pub saturation: f32,
    /// Value, 0..=1.
    pub value: f32,
}

impl Validate for TeamColorDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !(0.0..=1.0).contains(&self.saturation) {
            let mut err = ValidationError::new("saturation_range");
            err.message = Some("saturation must be within 0..=1".into());
            errors.add("saturation", err);
        }

        if !(0.0..=1.0).contains(&self.value) {
            let mut err = ValidationError::new("value_range");
            err.message = Some("value must be within 0..=1".into());
            errors.add("value", err);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl From<TeamColor> for TeamColorDto {
    fn from(value: TeamColor) -> Self {
        Self {
            hue: value.h,
            saturation: value.s,
            value: value.v,
        }
    }
}

impl From<TeamColorDto> for TeamColor {
    fn from(value: TeamColorDto) -> Self {
        Self {
            h: value.hue,
            s: value.saturation,
            v: value.value,
        }
    }
}

/// Role a mutation request claims to act as. Authentication is handled
/// upstream; the server only checks the claimed role against the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// The session host driving the card sequence.
    Host,
    /// A joined participant.
    Player,
}

/// Identity a mutation request acts under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Actor {
    /// Claimed role.
    pub role: ActorRole,
    /// Roster id, required when `role` is `player`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<Uuid>,
}

impl Actor {
    /// Host actor shorthand.
    pub fn host() -> Self {
        Self {
            role: ActorRole::Host,
            player_id: None,
        }
    }

    /// Player actor shorthand.
    pub fn player(player_id: Uuid) -> Self {
        Self {
            role: ActorRole::Player,
            player_id: Some(player_id),
        }
    }
}
