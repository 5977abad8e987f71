//! # stableyard
//!
//! Management of a riding stable: the horse registry, veterinary checks,
//! the grooms' daily checklists and booking of training classes.
//!
//! Five roles share one account system. A user may hold several of them and
//! picks the one whose dashboard is shown:
//!
//! | Role | Works on |
//! |---|---|
//! | Veterinarian | checks of every active horse |
//! | Groom | one care checklist per horse and day |
//! | Administrator | users, their roles, horses |
//! | Client | booking and cancelling classes |
//! | Trainer | completing, cancelling and rescheduling own classes |
//!
//! ## Crates
//!
//! - [`core`]: domain types, validation and the class scheduler
//! - [`conf`]: layered settings
//! - [`db`]: SQLite pool, migrations and the repository
//! - [`auth`]: password hashing and login
//! - [`http`]: request/response, router, sessions, server
//! - [`views`]: the pages and their URLs
//!
//! ## Quick Start
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! let settings = stableyard::conf::Settings::load()?;
//! let app = stableyard::build_app(&settings).await?;
//! let addr = settings.bind_address.parse()?;
//! stableyard::http::HttpServer::new(std::sync::Arc::new(app))
//! 	.listen(addr)
//! 	.await?;
//! # Ok(())
//! # }
//! ```

pub mod commands;

use std::sync::Arc;

pub use stableyard_auth as auth;
pub use stableyard_conf as conf;
pub use stableyard_core as core;
pub use stableyard_db as db;
pub use stableyard_http as http;
pub use stableyard_views as views;

use stableyard_conf::Settings;
use stableyard_core::Result;
use stableyard_db::{PoolConfig, SqliteRepository, connect, migrate};
use stableyard_http::{MiddlewareChain, SessionConfig};
use stableyard_views::{AppState, application};

/// Opens the configured database, applies migrations and assembles the
/// request handler.
pub async fn build_app(settings: &Settings) -> Result<MiddlewareChain> {
	let pool = connect(&settings.database_url, &PoolConfig::from(&settings.pool)).await?;
	migrate(&pool).await?;
	let repo = Arc::new(SqliteRepository::new(pool));
	let state = AppState::from_settings(repo, settings)?;
	application(
		Arc::new(state),
		SessionConfig::from_settings(&settings.session),
	)
}
