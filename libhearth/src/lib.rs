//! Hearth - client tools for a federated social home
//!
//! This library provides the client side of a federated social-networking
//! server: a normalized content store for streams, a publisher for posts
//! and replies, and a live-update channel over WebSocket.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod live;
pub mod logging;
pub mod notify;
pub mod publisher;
pub mod store;
pub mod streams;
pub mod types;

// Re-export commonly used types
pub use client::HearthClient;
pub use config::Config;
pub use error::{ApiError, HearthError, Result};
pub use live::{LiveChannel, LiveEvent};
pub use publisher::{PublishForm, PublishOutcome, Publisher};
pub use store::{Action, Store, StreamState};
pub use streams::{StreamDescriptor, StreamName};
pub use types::{Content, ContentId, ContentType, Profile, ProfileId, Visibility};
