//! User lifecycle service
//!
//! Registration, login, profile reads and updates, deletion, search and the
//! inactivity sweep. Handlers and the scheduler call into this type; it only
//! talks to storage through the [`UserStore`] and [`ActivityStore`] traits.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{UserError, UserResult},
    jwt::JwtService,
    messages,
    models::{
        ActivityAction, Actor, Identity, IdentityView, LoginSummary, NewActivity, NewUser,
        PublicUser, SearchHit, UserChanges, UserStatus, UserType,
    },
    password,
    query::{Comparison, Filter, GetParams, ListParams, Scalar, UserField},
    repositories::{ActivityStore, SEARCH_LIMIT, UserStore},
    validation,
};

/// Registration input
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registration {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    /// Role for the new account; not accepted from request bodies
    #[serde(skip)]
    pub user_type: Option<UserType>,
}

/// Login input
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Profile update input; absent or empty fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub username: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub status: Option<UserStatus>,
    #[serde(rename = "type")]
    pub user_type: Option<UserType>,
}

/// Successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: LoginSummary,
    pub token: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
}

/// Result of one inactivity sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub deactivated: u64,
    pub archived: u64,
}

/// How long an account may stay idle before the sweep acts on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityThresholds {
    pub deactivate_after_months: u32,
    pub archive_after_years: u32,
}

impl Default for InactivityThresholds {
    fn default() -> Self {
        Self {
            deactivate_after_months: 6,
            archive_after_years: 1,
        }
    }
}

impl InactivityThresholds {
    /// Deactivation and archival cutoffs relative to `now`, using calendar
    /// months
    pub fn cutoffs(&self, now: DateTime<Utc>) -> UserResult<(DateTime<Utc>, DateTime<Utc>)> {
        let deactivate = now
            .checked_sub_months(Months::new(self.deactivate_after_months))
            .ok_or_else(|| UserError::Internal("Deactivation cutoff out of range".to_string()))?;
        let archive = now
            .checked_sub_months(Months::new(self.archive_after_years.saturating_mul(12)))
            .ok_or_else(|| UserError::Internal("Archive cutoff out of range".to_string()))?;

        Ok((deactivate, archive))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

/// User lifecycle service
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    activity: Arc<dyn ActivityStore>,
    tokens: JwtService,
    thresholds: InactivityThresholds,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        activity: Arc<dyn ActivityStore>,
        tokens: JwtService,
        thresholds: InactivityThresholds,
    ) -> Self {
        Self {
            users,
            activity,
            tokens,
            thresholds,
        }
    }

    /// Append to the activity log; a failed write is logged and otherwise
    /// ignored
    async fn record(&self, actor: Option<Uuid>, action: ActivityAction, reference_id: Uuid) {
        let activity = NewActivity {
            actor,
            action,
            reference_id,
        };

        if let Err(e) = self.activity.record(activity).await {
            warn!(error = %e, action = action.as_str(), %reference_id, "Failed to record activity");
        }
    }

    /// Create an account with status `active`
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: Registration) -> UserResult<PublicUser> {
        validation::validate_registration(
            &input.email,
            &input.password,
            &input.username,
            &input.firstname,
            &input.lastname,
        )
        .map_err(UserError::Validation)?;

        if self.users.find_by_email(&input.email).await?.is_some() {
            return Err(UserError::AlreadyExists);
        }

        let new_user = NewUser {
            password_hash: password::hash_password(&input.password)?,
            username: input.username,
            firstname: input.firstname,
            lastname: input.lastname,
            email: input.email,
            user_type: input.user_type.unwrap_or_default(),
        };

        // The unique index still guards against a concurrent registration
        let user = self.users.create(new_user).await.map_err(|e| {
            if e.is_unique_violation() {
                UserError::AlreadyExists
            } else {
                UserError::Database(e)
            }
        })?;

        info!(user_id = %user.id, "User registered");
        self.record(Some(user.id), ActivityAction::Create, user.id)
            .await;

        Ok(user.to_public())
    }

    /// Check credentials, refresh `lastActive` and issue a session token
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginRequest) -> UserResult<LoginOutcome> {
        if input.email.is_empty() || input.password.is_empty() {
            return Err(UserError::Validation(messages::REQUIRED_FIELDS.to_string()));
        }

        let user = self
            .users
            .find_by_email(&input.email)
            .await?
            .ok_or(UserError::NoAccount)?;

        if !user.status.can_authenticate() {
            info!(user_id = %user.id, status = %user.status, "Login refused for swept account");
            return Err(UserError::Deactivated);
        }

        if !password::verify_password(&input.password, &user.password_hash)? {
            return Err(UserError::InvalidCredentials);
        }

        self.users.touch_last_active(user.id, Utc::now()).await?;
        let token = self.tokens.issue(&user)?;

        info!(user_id = %user.id, "User logged in");
        self.record(Some(user.id), ActivityAction::Login, user.id)
            .await;

        Ok(LoginOutcome {
            user: user.summary(),
            token,
            expires_in: self.tokens.expiry_for(user.user_type),
        })
    }

    /// Resolve a session token into the caller's identity
    ///
    /// A valid token whose subject has no user record resolves to a bare
    /// [`Actor`].
    pub async fn resolve_identity(&self, token: &str) -> UserResult<Identity> {
        let claims = self.tokens.validate(token)?;

        Ok(match self.users.find_by_id(claims.sub).await? {
            Some(user) => Identity::User(user),
            None => Identity::Actor(Actor {
                id: claims.sub,
                role: claims.role,
            }),
        })
    }

    /// Profile of the signed-in user
    pub fn current_user(&self, identity: Option<&Identity>) -> UserResult<PublicUser> {
        match identity {
            None => Err(UserError::Unauthorized),
            Some(Identity::Actor(_)) => Err(UserError::IncompleteIdentity),
            Some(Identity::User(user)) => Ok(user.to_public()),
        }
    }

    /// One user, shaped by `select`
    pub async fn get_user(&self, id: Uuid, params: &GetParams) -> UserResult<Value> {
        let projection = params.projection()?;
        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound)?;

        Ok(projection.apply(&user.to_public()))
    }

    /// Users matching a listing query
    pub async fn list_users(&self, params: ListParams) -> UserResult<Vec<Value>> {
        let (query, projection) = params.into_query()?;
        let users = self.users.find_many(&query).await?;

        Ok(users
            .iter()
            .map(|user| projection.apply(&user.to_public()))
            .collect())
    }

    /// Update the caller's own profile
    ///
    /// Only admins may change `status` or `type`.
    #[instrument(skip(self, identity, update))]
    pub async fn update_profile(
        &self,
        identity: Option<&Identity>,
        update: ProfileUpdate,
    ) -> UserResult<PublicUser> {
        let identity = identity.ok_or(UserError::Unauthorized)?;

        let email = non_empty(update.email);
        if let Some(email) = &email {
            validation::validate_email(email).map_err(UserError::Validation)?;
        }

        if (update.status.is_some() || update.user_type.is_some()) && !identity.is_admin() {
            return Err(UserError::Forbidden);
        }

        let password_hash = match non_empty(update.password) {
            Some(password) => {
                validation::validate_password(&password).map_err(UserError::Validation)?;
                Some(password::hash_password(&password)?)
            }
            None => None,
        };

        let changes = UserChanges {
            username: non_empty(update.username),
            firstname: non_empty(update.firstname),
            lastname: non_empty(update.lastname),
            email,
            password_hash,
            status: update.status,
            user_type: update.user_type,
        };

        let user = match self.users.update(identity.id(), &changes).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(UserError::NotFound),
            Err(e) if e.is_unique_violation() => return Err(UserError::EmailTaken),
            Err(e) => return Err(UserError::UpdateFailed(e)),
        };

        info!(user_id = %user.id, "Profile updated");
        self.record(Some(identity.id()), ActivityAction::Update, user.id)
            .await;

        Ok(user.to_public())
    }

    /// Delete a user and return the removed record
    #[instrument(skip(self, actor))]
    pub async fn delete_user(&self, actor: Option<&Identity>, id: Uuid) -> UserResult<PublicUser> {
        if self.users.find_by_id(id).await?.is_none() {
            return Err(UserError::NotFound);
        }

        let user = self.users.delete(id).await?.ok_or(UserError::NotFound)?;

        info!(user_id = %user.id, "User deleted");
        self.record(actor.map(Identity::id), ActivityAction::Remove, user.id)
            .await;

        Ok(user.to_public())
    }

    /// Full-text search; blank input finds nothing
    pub async fn search_users(&self, text: &str) -> UserResult<Vec<SearchHit>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let hits = self.users.search(text, SEARCH_LIMIT).await?;
        Ok(hits
            .into_iter()
            .map(|(user, score)| SearchHit {
                user: user.to_public(),
                score,
            })
            .collect())
    }

    /// End a session; returns who was signed in, if anyone
    pub async fn logout(&self, identity: Option<Identity>) -> Option<IdentityView> {
        let identity = identity?;
        self.record(Some(identity.id()), ActivityAction::Logout, identity.id())
            .await;
        Some(identity.view())
    }

    /// Deactivate and archive accounts that have been idle too long
    ///
    /// Accounts idle past the archive cutoff are archived directly, even if
    /// they were never deactivated. Accounts that never logged in are left
    /// alone. Running the sweep twice with the same `now` changes nothing
    /// the second time.
    #[instrument(skip(self))]
    pub async fn cleanup_inactive_users(&self, now: DateTime<Utc>) -> UserResult<SweepReport> {
        let (deactivate_cutoff, archive_cutoff) = self.thresholds.cutoffs(now)?;

        let to_deactivate = Filter::And(vec![
            Filter::compare(
                UserField::LastActive,
                Comparison::Lt,
                Scalar::Time(deactivate_cutoff),
            ),
            Filter::compare(
                UserField::LastActive,
                Comparison::Gte,
                Scalar::Time(archive_cutoff),
            ),
            Filter::not_in(
                UserField::Status,
                vec![
                    Scalar::Text(UserStatus::Deactivated.as_str().to_string()),
                    Scalar::Text(UserStatus::Archived.as_str().to_string()),
                ],
            ),
        ]);
        let ids = self.users.find_ids(&to_deactivate).await?;
        let deactivated = if ids.is_empty() {
            info!("{}", messages::NO_USERS_TO_DEACTIVATE);
            0
        } else {
            let count = self.users.set_status(&ids, UserStatus::Deactivated).await?;
            info!("Deactivated {} users", count);
            count
        };

        let to_archive = Filter::And(vec![
            Filter::compare(
                UserField::LastActive,
                Comparison::Lt,
                Scalar::Time(archive_cutoff),
            ),
            Filter::compare(
                UserField::Status,
                Comparison::Ne,
                Scalar::Text(UserStatus::Archived.as_str().to_string()),
            ),
        ]);
        let ids = self.users.find_ids(&to_archive).await?;
        let archived = if ids.is_empty() {
            info!("{}", messages::NO_USERS_TO_ARCHIVE);
            0
        } else {
            let count = self.users.set_status(&ids, UserStatus::Archived).await?;
            info!("Archived {} users", count);
            count
        };

        Ok(SweepReport {
            deactivated,
            archived,
        })
    }

    pub async fn health_check(&self) -> bool {
        self.users.health_check().await
    }
}
