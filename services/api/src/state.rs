//! Application state shared across handlers

use std::sync::Arc;

use crate::{config::AppConfig, service::UserService, session::SessionCookies};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: UserService,
    pub cookies: SessionCookies,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, users: UserService) -> Self {
        let cookies = SessionCookies::new(config.session.clone());
        Self {
            config,
            users,
            cookies,
        }
    }
}
