//! SkillVerse core types and utilities
//!
//! Shared building blocks for the client crates: error conventions, the
//! persistent key-value store, UI preferences, settings and tracing setup.

pub mod config;
pub mod error;
pub mod preferences;
pub mod storage;
pub mod tracing;

pub use config::{ApiConfig, Environment, RealtimeConfig, Settings, StorageConfig};
pub use error::{CoreError, CoreResult, ErrorContext, Retryable};
pub use preferences::{Theme, UiPreferences};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
