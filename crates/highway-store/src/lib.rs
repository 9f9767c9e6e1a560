//! SQLite persistence, JSON files, TOML configuration and asset loading for
//! highway-core tables.

pub mod assets;
pub mod config;
pub mod error;
pub mod json_bridge;
pub mod schema;
pub mod store;

pub use assets::build_system;
pub use config::{AssetsConfig, HighwayConfig, StorageBackend, StorageConfig};
pub use error::{Result, StoreError};
pub use store::Store;
