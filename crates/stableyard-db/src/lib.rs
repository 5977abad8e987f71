//! # stableyard-db
//!
//! Persistence for the stable on SQLite through `sqlx`.
//!
//! ```no_run
//! use stableyard_db::{PoolConfig, SqliteRepository, connect, migrate};
//!
//! # async fn run() -> stableyard_core::Result<()> {
//! let pool = connect("sqlite://stableyard.db", &PoolConfig::default()).await?;
//! migrate(&pool).await?;
//! let repo = SqliteRepository::new(pool);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod pool;
pub mod repository;
pub mod sqlite;

pub use pool::{PoolConfig, connect, connect_in_memory, migrate};
pub use repository::{
	BOOKING_CONFLICT, DUPLICATE_USERNAME, GROOM_TASK_EXISTS, RESCHEDULE_CONFLICT, StableRepository,
};
pub use sqlite::SqliteRepository;
