//! PostgreSQL store tests
//!
//! These need a running database and are ignored by default:
//! `DATABASE_URL=... cargo test -p hms-api -- --ignored`

use chrono::{Duration, Utc};
use common::database::{DatabaseConfig, init_pool};
use hms_api::{
    models::{ActivityAction, NewActivity, NewUser, UserChanges, UserStatus, UserType},
    query::{Filter, ListParams},
    repositories::{ActivityStore, PgActivityStore, PgUserStore, UserStore},
};
use serial_test::serial;
use sqlx::PgPool;
use uuid::Uuid;

async fn pool() -> PgPool {
    let config = DatabaseConfig::from_env().unwrap();
    let pool = init_pool(&config).await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    sqlx::query("TRUNCATE users, activity_logs")
        .execute(&pool)
        .await
        .unwrap();
    pool
}

fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        firstname: "Mary".to_string(),
        lastname: "Seacole".to_string(),
        email: format!("{}@hospital.example", username),
        password_hash: "$argon2id$v=19$placeholder".to_string(),
        user_type: UserType::User,
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_create_and_find() {
    let store = PgUserStore::new(pool().await);

    let user = store.create(new_user("mseacole")).await.unwrap();
    assert_eq!(user.status, UserStatus::Active);
    assert_eq!(user.last_active, None);

    let by_email = store
        .find_by_email("mseacole@hospital.example")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email.id, user.id);

    let err = store.create(new_user("mseacole")).await.unwrap_err();
    assert!(err.is_unique_violation());
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_update_and_delete() {
    let store = PgUserStore::new(pool().await);
    let user = store.create(new_user("mseacole")).await.unwrap();
    store.create(new_user("other")).await.unwrap();

    let changes = UserChanges {
        firstname: Some("Mother".to_string()),
        status: Some(UserStatus::Suspended),
        ..Default::default()
    };
    let updated = store.update(user.id, &changes).await.unwrap().unwrap();
    assert_eq!(updated.firstname, "Mother");
    assert_eq!(updated.status, UserStatus::Suspended);
    assert!(updated.updated_at >= user.updated_at);

    let clash = UserChanges {
        email: Some("other@hospital.example".to_string()),
        ..Default::default()
    };
    assert!(store.update(user.id, &clash).await.unwrap_err().is_unique_violation());

    assert!(store.update(Uuid::new_v4(), &changes).await.unwrap().is_none());

    let removed = store.delete(user.id).await.unwrap().unwrap();
    assert_eq!(removed.id, user.id);
    assert!(store.find_by_id(user.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_find_many_with_filters() {
    let store = PgUserStore::new(pool().await);
    for name in ["carol", "alice", "bob"] {
        store.create(new_user(name)).await.unwrap();
    }
    let alice = store.find_by_email("alice@hospital.example").await.unwrap().unwrap();
    store
        .touch_last_active(alice.id, Utc::now() - Duration::days(1))
        .await
        .unwrap();

    let params = ListParams {
        query: Some(r#"{"$or": [{"username": "alice"}, {"username": "carol"}]}"#.to_string()),
        sort: Some("-username".to_string()),
        ..Default::default()
    };
    let (query, _) = params.into_query().unwrap();
    let users = store.find_many(&query).await.unwrap();
    let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["carol", "alice"]);

    let params = ListParams {
        query: Some(format!(
            r#"{{"lastActive": {{"$lt": "{}"}}}}"#,
            Utc::now().to_rfc3339()
        )),
        ..Default::default()
    };
    let (query, _) = params.into_query().unwrap();
    let users = store.find_many(&query).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, alice.id);

    let all = store.find_ids(&Filter::all()).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_bulk_status_and_delete() {
    let store = PgUserStore::new(pool().await);
    let a = store.create(new_user("a")).await.unwrap();
    let b = store.create(new_user("b")).await.unwrap();
    let c = store.create(new_user("c")).await.unwrap();

    let changed = store
        .set_status(&[a.id, b.id], UserStatus::Deactivated)
        .await
        .unwrap();
    assert_eq!(changed, 2);
    assert_eq!(
        store.find_by_id(a.id).await.unwrap().unwrap().status,
        UserStatus::Deactivated
    );

    assert_eq!(store.delete_many(&[a.id, c.id]).await.unwrap(), 2);
    assert!(store.find_by_id(b.id).await.unwrap().is_some());
    assert_eq!(store.set_status(&[], UserStatus::Archived).await.unwrap(), 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_search_ranks_matches() {
    let store = PgUserStore::new(pool().await);
    store.create(new_user("mseacole")).await.unwrap();
    let mut other = new_user("fnightingale");
    other.firstname = "Florence".to_string();
    other.lastname = "Nightingale".to_string();
    store.create(other).await.unwrap();

    let hits = store.search("seacole", 20).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0.username, "mseacole");
    assert!(hits[0].1 > 0.0);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_activity_log() {
    let pool = pool().await;
    let store = PgActivityStore::new(pool);
    let reference_id = Uuid::new_v4();

    let entry = store
        .record(NewActivity {
            actor: None,
            action: ActivityAction::Remove,
            reference_id,
        })
        .await
        .unwrap();

    assert_eq!(entry.action, ActivityAction::Remove);
    assert_eq!(entry.reference_id, reference_id);
    assert_eq!(entry.actor, None);
}
