//! Authenticated caller attached to a request

use serde::Serialize;
use uuid::Uuid;

use super::user::{PublicUser, User, UserType};

/// Who is calling, as resolved from a session token
#[derive(Debug, Clone)]
pub enum Identity {
    /// The token subject is a stored user
    User(User),
    /// The token is valid but its subject has no user record
    Actor(Actor),
}

/// Token-only identity: what the claims say and nothing more
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserType,
}

impl Identity {
    pub fn id(&self) -> Uuid {
        match self {
            Identity::User(user) => user.id,
            Identity::Actor(actor) => actor.id,
        }
    }

    pub fn role(&self) -> UserType {
        match self {
            Identity::User(user) => user.user_type,
            Identity::Actor(actor) => actor.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role().is_admin()
    }

    pub fn view(&self) -> IdentityView {
        match self {
            Identity::User(user) => IdentityView::User(user.to_public()),
            Identity::Actor(actor) => IdentityView::Actor(actor.clone()),
        }
    }
}

/// Serializable form of an [`Identity`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdentityView {
    User(PublicUser),
    Actor(Actor),
}
