//! SkillVerse live updates
//!
//! A [`RealtimeBridge`] holds the live channel for the signed-in user and
//! turns server events into [`QueryCache`] invalidations and
//! [`NotificationCenter`] entries.

pub mod bridge;
pub mod cache;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod notifications;
pub mod transport;

pub use bridge::{BridgeConfig, Connection, ConnectionState, RealtimeBridge, RealtimeBridgeBuilder};
pub use cache::{CacheInvalidator, CacheKey, QueryCache};
pub use dispatch::{DispatchTable, HandlerContext};
pub use error::{RealtimeError, Result};
pub use event::{Envelope, EventName};
pub use notifications::{
    MAX_NOTIFICATIONS, NewNotification, Notification, NotificationCenter, NotificationId,
    NotificationKind,
};
pub use transport::{
    ChannelServer, ChannelTransport, LiveConnection, LiveTransport, WebSocketTransport,
};
