//! Shared fixtures for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use hms_api::{
    AppState,
    config::{AppConfig, SweepConfig},
    jwt::{JwtConfig, JwtService},
    models::{ActivityEntry, NewActivity},
    repositories::{ActivityStore, InMemoryActivityStore, InMemoryUserStore},
    scheduler::DEFAULT_SCHEDULE,
    service::{InactivityThresholds, LoginRequest, Registration, UserService},
    session::SessionCookieConfig,
};
use std::sync::Arc;

pub const PASSWORD: &str = "s3cure-passw0rd";

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "integration-test-secret".to_string(),
        expires_in: 3600,
        admin_expires_in: 86400,
    }
}

pub fn app_config() -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        jwt: jwt_config(),
        session: SessionCookieConfig {
            name: "jwt".to_string(),
            secure: false,
        },
        sweep: SweepConfig {
            schedule: DEFAULT_SCHEDULE.to_string(),
            thresholds: InactivityThresholds::default(),
            run_on_startup: false,
        },
    }
}

/// Service wired to in-memory stores, with handles to inspect them
pub struct Harness {
    pub service: UserService,
    pub users: InMemoryUserStore,
    pub activity: InMemoryActivityStore,
}

pub fn harness() -> Harness {
    let users = InMemoryUserStore::new();
    let activity = InMemoryActivityStore::new();
    let service = UserService::new(
        Arc::new(users.clone()),
        Arc::new(activity.clone()),
        JwtService::new(jwt_config()),
        InactivityThresholds::default(),
    );

    Harness {
        service,
        users,
        activity,
    }
}

pub fn app_state(harness: &Harness) -> AppState {
    AppState::new(Arc::new(app_config()), harness.service.clone())
}

pub fn registration(username: &str) -> Registration {
    Registration {
        email: format!("{}@hospital.example", username),
        password: PASSWORD.to_string(),
        username: username.to_string(),
        firstname: "Test".to_string(),
        lastname: "User".to_string(),
        user_type: None,
    }
}

pub fn credentials(username: &str) -> LoginRequest {
    LoginRequest {
        email: format!("{}@hospital.example", username),
        password: PASSWORD.to_string(),
    }
}

/// Activity store whose writes always fail
pub struct BrokenActivityStore;

#[async_trait]
impl ActivityStore for BrokenActivityStore {
    async fn record(&self, _activity: NewActivity) -> DatabaseResult<ActivityEntry> {
        Err(DatabaseError::Configuration("activity log offline".to_string()))
    }
}
