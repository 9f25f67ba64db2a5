//! Storage ports for users and activity records
//!
//! The lifecycle service only sees these traits. `PgUserStore` and
//! `PgActivityStore` back them with PostgreSQL; the in-memory stores back
//! them for tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseResult;
use uuid::Uuid;

use crate::{
    models::{ActivityEntry, NewActivity, NewUser, User, UserChanges, UserStatus},
    query::{Filter, UserQuery},
};

pub mod activity;
pub mod memory;
pub mod user;

pub use activity::PgActivityStore;
pub use memory::{InMemoryActivityStore, InMemoryUserStore};
pub use user::PgUserStore;

/// Most results a text search returns
pub const SEARCH_LIMIT: i64 = 20;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; a taken email is a `UniqueViolation`
    async fn create(&self, new_user: NewUser) -> DatabaseResult<User>;

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>>;

    /// Users matching the query, sorted and capped at its limit
    async fn find_many(&self, query: &UserQuery) -> DatabaseResult<Vec<User>>;

    /// Ids of every user matching the filter, without a limit
    async fn find_ids(&self, filter: &Filter) -> DatabaseResult<Vec<Uuid>>;

    /// Apply a partial update and return the new state, `None` if absent
    async fn update(&self, id: Uuid, changes: &UserChanges) -> DatabaseResult<Option<User>>;

    async fn touch_last_active(&self, id: Uuid, at: DateTime<Utc>) -> DatabaseResult<()>;

    /// Set the status of many users at once, returning how many changed
    async fn set_status(&self, ids: &[Uuid], status: UserStatus) -> DatabaseResult<u64>;

    /// Remove a user and return what was removed
    async fn delete(&self, id: Uuid) -> DatabaseResult<Option<User>>;

    /// Remove many users at once, returning how many were removed
    async fn delete_many(&self, ids: &[Uuid]) -> DatabaseResult<u64>;

    /// Full-text search over names and email, best match first
    async fn search(&self, text: &str, limit: i64) -> DatabaseResult<Vec<(User, f32)>>;

    async fn health_check(&self) -> bool;
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn record(&self, activity: NewActivity) -> DatabaseResult<ActivityEntry>;
}
