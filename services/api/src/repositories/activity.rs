//! PostgreSQL activity log

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::ActivityStore;
use crate::models::{ActivityEntry, NewActivity};

/// Activity store backed by the `activity_logs` table
#[derive(Clone)]
pub struct PgActivityStore {
    pool: PgPool,
}

impl PgActivityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityStore for PgActivityStore {
    async fn record(&self, activity: NewActivity) -> DatabaseResult<ActivityEntry> {
        let row = sqlx::query(
            r#"
            INSERT INTO activity_logs (id, actor, action, reference_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, actor, action, reference_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(activity.actor)
        .bind(activity.action.as_str())
        .bind(activity.reference_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        let action: String = row.get("action");

        Ok(ActivityEntry {
            id: row.get("id"),
            actor: row.get("actor"),
            action: action.parse().map_err(DatabaseError::CorruptRow)?,
            reference_id: row.get("reference_id"),
            created_at: row.get("created_at"),
        })
    }
}
