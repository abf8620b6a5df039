//! SkillVerse HTTP client
//!
//! Typed access to the SkillVerse REST API with bearer authentication and
//! single-flight token refresh, plus the session state built on top of it.

pub mod client;
pub mod session;
pub mod types;
pub mod validation;

pub use client::error::{ClientError, TransportError};
pub use client::fallback::{FallbackTransport, FixtureTransport};
pub use client::navigator::{Navigator, NoopNavigator};
pub use client::refresh::RefreshCoordinator;
pub use client::tokens::TokenStorage;
pub use client::transport::{ApiRequest, ApiResponse, HttpTransport, RequestBody, Transport};
pub use client::{SkillverseClient, SkillverseClientBuilder};
pub use session::SessionStore;
pub use validation::Validate;
