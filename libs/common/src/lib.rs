//! Common library for the hospital management backend
//!
//! This crate provides the pieces shared by the services in the workspace:
//! PostgreSQL connectivity and the storage error type.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, init_pool, health_check};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     println!("Database reachable: {}", health_check(&pool).await);
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod error;
