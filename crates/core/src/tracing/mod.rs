//! Tracing setup shared by SkillVerse binaries
//!
//! Library crates only emit events through the `tracing` macros; installing
//! a subscriber is left to the binary via [`init::init_tracing`].

pub mod config;
pub mod init;

pub use config::InstrumentationConfig;
pub use init::{init_default, init_tracing};
