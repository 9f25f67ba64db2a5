//! Activity log model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Action recorded against an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Create,
    Read,
    Update,
    Remove,
    Login,
    Logout,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Create => "create",
            ActivityAction::Read => "read",
            ActivityAction::Update => "update",
            ActivityAction::Remove => "remove",
            ActivityAction::Login => "login",
            ActivityAction::Logout => "logout",
        }
    }
}

impl FromStr for ActivityAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(ActivityAction::Create),
            "read" => Ok(ActivityAction::Read),
            "update" => Ok(ActivityAction::Update),
            "remove" => Ok(ActivityAction::Remove),
            "login" => Ok(ActivityAction::Login),
            "logout" => Ok(ActivityAction::Logout),
            other => Err(format!("unknown activity action `{}`", other)),
        }
    }
}

/// Activity to append
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    /// Who performed the action, when known
    pub actor: Option<Uuid>,
    pub action: ActivityAction,
    /// The account the action applied to
    pub reference_id: Uuid,
}

/// Stored activity entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: Uuid,
    pub actor: Option<Uuid>,
    pub action: ActivityAction,
    pub reference_id: Uuid,
    pub created_at: DateTime<Utc>,
}
