//! Hospital management API: user accounts, sessions and the inactivity sweep
//!
//! The HTTP surface lives in [`routes`]. Business rules live in
//! [`service::UserService`], which reaches storage only through the
//! [`repositories::UserStore`] and [`repositories::ActivityStore`] traits, so
//! the same service runs against PostgreSQL in production and in-memory
//! stores in tests.

pub mod config;
pub mod error;
pub mod extract;
pub mod jwt;
pub mod messages;
pub mod middleware;
pub mod models;
pub mod password;
pub mod query;
pub mod repositories;
pub mod routes;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod state;
pub mod validation;

pub use state::AppState;
