//! notecollab-store: storage seams for collaborative note sharing
//!
//! This crate provides:
//! - The `NoteStore` and `GrantStore` traits the collaboration core consumes
//! - An in-memory implementation for standalone runs and tests
//! - A PostgreSQL implementation via sqlx, with embedded migrations
//!
//! # Usage
//!
//! ```rust,ignore
//! use notecollab_store::{GrantStore, PgStore, StoreConfig};
//!
//! let config = StoreConfig::from_env()?;
//! let store = PgStore::connect(config).await?;
//!
//! store.insert_grant(&grant).await?;
//! let grant = store.find_grant(&token).await?;
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod repository;
pub mod schema;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use models::{NoteRow, ShareGrantRow};
pub use repository::{GrantStore, NoteStore};
pub use store::{PgStore, StoreConfig};

// Re-export notecollab-core for downstream crates
pub use notecollab_core;
