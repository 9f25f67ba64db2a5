//! PostgreSQL user store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    database,
    error::{DatabaseError, DatabaseResult},
};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use tracing::{debug, info};
use uuid::Uuid;

use super::UserStore;
use crate::{
    models::{NewUser, User, UserChanges, UserStatus},
    query::{Filter, UserQuery},
};

const USER_COLUMNS: &str = "id, username, firstname, lastname, email, password_hash, status, \
                            user_type, last_active, created_at, updated_at";

/// User store backed by the `users` table
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> DatabaseResult<User> {
    let status: String = row.try_get("status").map_err(DatabaseError::Query)?;
    let user_type: String = row.try_get("user_type").map_err(DatabaseError::Query)?;

    Ok(User {
        id: row.try_get("id").map_err(DatabaseError::Query)?,
        username: row.try_get("username").map_err(DatabaseError::Query)?,
        firstname: row.try_get("firstname").map_err(DatabaseError::Query)?,
        lastname: row.try_get("lastname").map_err(DatabaseError::Query)?,
        email: row.try_get("email").map_err(DatabaseError::Query)?,
        password_hash: row.try_get("password_hash").map_err(DatabaseError::Query)?,
        status: status.parse().map_err(DatabaseError::CorruptRow)?,
        user_type: user_type.parse().map_err(DatabaseError::CorruptRow)?,
        last_active: row.try_get("last_active").map_err(DatabaseError::Query)?,
        created_at: row.try_get("created_at").map_err(DatabaseError::Query)?,
        updated_at: row.try_get("updated_at").map_err(DatabaseError::Query)?,
    })
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new_user: NewUser) -> DatabaseResult<User> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, username, firstname, lastname, email, password_hash, status, user_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.username)
        .bind(&new_user.firstname)
        .bind(&new_user.lastname)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(UserStatus::default().as_str())
        .bind(new_user.user_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        let user = user_from_row(&row)?;
        info!(user_id = %user.id, "Created user");
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_many(&self, query: &UserQuery) -> DatabaseResult<Vec<User>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users WHERE "));
        query.filter.push_sql(&mut qb);
        query.sort.push_sql(&mut qb);
        qb.push(" LIMIT ").push_bind(query.limit);

        debug!(sql = qb.sql(), "Listing users");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        rows.iter().map(user_from_row).collect()
    }

    async fn find_ids(&self, filter: &Filter) -> DatabaseResult<Vec<Uuid>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM users WHERE ");
        filter.push_sql(&mut qb);

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        rows.iter()
            .map(|row| row.try_get("id").map_err(DatabaseError::Query))
            .collect()
    }

    async fn update(&self, id: Uuid, changes: &UserChanges) -> DatabaseResult<Option<User>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(username) = &changes.username {
                set.push("username = ").push_bind_unseparated(username.clone());
            }
            if let Some(firstname) = &changes.firstname {
                set.push("firstname = ").push_bind_unseparated(firstname.clone());
            }
            if let Some(lastname) = &changes.lastname {
                set.push("lastname = ").push_bind_unseparated(lastname.clone());
            }
            if let Some(email) = &changes.email {
                set.push("email = ").push_bind_unseparated(email.clone());
            }
            if let Some(password_hash) = &changes.password_hash {
                set.push("password_hash = ")
                    .push_bind_unseparated(password_hash.clone());
            }
            if let Some(status) = changes.status {
                set.push("status = ").push_bind_unseparated(status.as_str());
            }
            if let Some(user_type) = changes.user_type {
                set.push("user_type = ").push_bind_unseparated(user_type.as_str());
            }
            set.push("updated_at = NOW()");
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(USER_COLUMNS);

        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn touch_last_active(&self, id: Uuid, at: DateTime<Utc>) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET last_active = $1, updated_at = NOW() WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(())
    }

    async fn set_status(&self, ids: &[Uuid], status: UserStatus) -> DatabaseResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result =
            sqlx::query("UPDATE users SET status = $1, updated_at = NOW() WHERE id = ANY($2)")
                .bind(status.as_str())
                .bind(ids)
                .execute(&self.pool)
                .await
                .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn delete_many(&self, ids: &[Uuid]) -> DatabaseResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM users WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected())
    }

    async fn search(&self, text: &str, limit: i64) -> DatabaseResult<Vec<(User, f32)>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {USER_COLUMNS}, ts_rank(search_vector, terms)::REAL AS score
            FROM users, plainto_tsquery('simple', $1) AS terms
            WHERE search_vector @@ terms
            ORDER BY score DESC, created_at ASC
            LIMIT $2
            "#
        ))
        .bind(text)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.iter()
            .map(|row| {
                let score: f32 = row.try_get("score").map_err(DatabaseError::Query)?;
                Ok((user_from_row(row)?, score))
            })
            .collect()
    }

    async fn health_check(&self) -> bool {
        database::health_check(&self.pool).await
    }
}
