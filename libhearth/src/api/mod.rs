//! REST boundary
//!
//! The [`Api`] trait is everything the store and the publisher need from
//! the server. [`http::HttpApi`] talks to a real server; [`mock::MockApi`]
//! serves canned data for tests and offline use.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::streams::StreamRequest;
use crate::types::{Content, ContentId, Profile, Visibility};

pub mod http;

// Mock API is available for all builds (not just tests) to support integration tests
pub mod mock;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[async_trait]
pub trait Api: Send + Sync {
    /// Fetch one page of a stream, or the ids listed in `accept_ids`
    async fn fetch_stream(&self, request: &StreamRequest) -> ApiResult<Vec<Content>>;

    async fn fetch_content(&self, id: &str) -> ApiResult<Content>;

    async fn fetch_replies(&self, id: &str) -> ApiResult<Vec<Content>>;

    async fn fetch_shares(&self, id: &str) -> ApiResult<Vec<Content>>;

    async fn share(&self, id: &str) -> ApiResult<()>;

    async fn unshare(&self, id: &str) -> ApiResult<()>;

    async fn fetch_profile(&self, id: &str) -> ApiResult<Profile>;

    async fn follow(&self, profile_id: &str) -> ApiResult<()>;

    async fn unfollow(&self, profile_id: &str) -> ApiResult<()>;

    /// Ask the server to re-fetch a remote profile
    async fn schedule_profile_update(&self, profile_id: &str) -> ApiResult<()>;

    async fn create_content(&self, payload: &ContentPayload) -> ApiResult<Content>;

    async fn update_content(&self, id: &str, payload: &ContentPayload) -> ApiResult<Content>;
}

/// Body of a create or update request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPayload {
    pub text: String,
    pub visibility: Visibility,
    pub pinned: bool,
    pub federate: bool,
    pub show_preview: bool,
    /// Comma separated handles, only meaningful for limited visibility
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub recipients: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent: Option<ContentId>,
}
