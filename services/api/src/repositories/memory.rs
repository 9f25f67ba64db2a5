//! In-memory stores for tests and local development

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ActivityStore, UserStore};
use crate::{
    models::{ActivityEntry, NewActivity, NewUser, User, UserChanges, UserStatus},
    query::{Filter, UserQuery},
};

const EMAIL_CONSTRAINT: &str = "users_email_key";

/// User store kept in insertion order
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<Vec<User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn search_terms(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Number of query terms found among the user's name, username and email
/// words
fn search_score(user: &User, terms: &[String]) -> f32 {
    let email = user.email.to_lowercase();
    let mut words: Vec<String> = [&user.username, &user.firstname, &user.lastname]
        .iter()
        .flat_map(|field| search_terms(field))
        .collect();
    words.push(email);

    terms
        .iter()
        .filter(|term| words.iter().any(|word| word == *term))
        .count() as f32
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, new_user: NewUser) -> DatabaseResult<User> {
        let mut users = self.users.write().await;

        if users.iter().any(|user| user.email == new_user.email) {
            return Err(DatabaseError::UniqueViolation(EMAIL_CONSTRAINT.to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            firstname: new_user.firstname,
            lastname: new_user.lastname,
            email: new_user.email,
            password_hash: new_user.password_hash,
            status: UserStatus::default(),
            user_type: new_user.user_type,
            last_active: None,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|user| user.email == email).cloned())
    }

    async fn find_many(&self, query: &UserQuery) -> DatabaseResult<Vec<User>> {
        let users = self.users.read().await;

        let mut matched: Vec<User> = users
            .iter()
            .filter(|user| query.filter.matches(user))
            .cloned()
            .collect();
        matched.sort_by(|a, b| query.sort.compare(a, b));
        matched.truncate(usize::try_from(query.limit).unwrap_or(0));

        Ok(matched)
    }

    async fn find_ids(&self, filter: &Filter) -> DatabaseResult<Vec<Uuid>> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .filter(|user| filter.matches(user))
            .map(|user| user.id)
            .collect())
    }

    async fn update(&self, id: Uuid, changes: &UserChanges) -> DatabaseResult<Option<User>> {
        let mut users = self.users.write().await;

        if let Some(email) = &changes.email {
            if users.iter().any(|user| user.id != id && &user.email == email) {
                return Err(DatabaseError::UniqueViolation(EMAIL_CONSTRAINT.to_string()));
            }
        }

        let Some(user) = users.iter_mut().find(|user| user.id == id) else {
            return Ok(None);
        };
        changes.apply_to(user);
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn touch_last_active(&self, id: Uuid, at: DateTime<Utc>) -> DatabaseResult<()> {
        let mut users = self.users.write().await;
        if let Some(user) = users.iter_mut().find(|user| user.id == id) {
            user.last_active = Some(at);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_status(&self, ids: &[Uuid], status: UserStatus) -> DatabaseResult<u64> {
        let mut users = self.users.write().await;
        let now = Utc::now();
        let mut changed = 0;

        for user in users.iter_mut().filter(|user| ids.contains(&user.id)) {
            user.status = status;
            user.updated_at = now;
            changed += 1;
        }

        Ok(changed)
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users
            .iter()
            .position(|user| user.id == id)
            .map(|index| users.remove(index)))
    }

    async fn delete_many(&self, ids: &[Uuid]) -> DatabaseResult<u64> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|user| !ids.contains(&user.id));
        Ok((before - users.len()) as u64)
    }

    async fn search(&self, text: &str, limit: i64) -> DatabaseResult<Vec<(User, f32)>> {
        let terms = search_terms(text);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let users = self.users.read().await;
        let mut hits: Vec<(User, f32)> = users
            .iter()
            .map(|user| (user.clone(), search_score(user, &terms)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        hits.sort_by(|(_, a), (_, b)| b.total_cmp(a));
        hits.truncate(usize::try_from(limit).unwrap_or(0));

        Ok(hits)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Activity log kept in memory
#[derive(Clone, Default)]
pub struct InMemoryActivityStore {
    entries: Arc<RwLock<Vec<ActivityEntry>>>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, oldest first
    pub async fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl ActivityStore for InMemoryActivityStore {
    async fn record(&self, activity: NewActivity) -> DatabaseResult<ActivityEntry> {
        let entry = ActivityEntry {
            id: Uuid::new_v4(),
            actor: activity.actor,
            action: activity.action,
            reference_id: activity.reference_id,
            created_at: Utc::now(),
        };
        self.entries.write().await.push(entry.clone());
        Ok(entry)
    }
}
