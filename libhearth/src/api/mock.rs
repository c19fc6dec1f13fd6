//! Mock API implementation for testing
//!
//! Serves contents from memory and can be told to fail for specific ids or
//! for every request. Clones share state, so a test can keep a handle to
//! inspect recorded calls after handing an `Arc<dyn Api>` to a store.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use super::{Api, ApiResult, ContentPayload};
use crate::error::ApiError;
use crate::streams::StreamRequest;
use crate::types::{Content, Profile};

#[derive(Default)]
struct MockState {
    /// Stream contents, newest first
    stream: Vec<Content>,
    replies: HashMap<String, Vec<Content>>,
    shares: HashMap<String, Vec<Content>>,
    profiles: HashMap<String, Profile>,
    page_size: Option<usize>,
    failing_ids: HashSet<String>,
    failure: Option<ApiError>,
    delay: Duration,
    calls: Vec<(String, String)>,
    payloads: Vec<ContentPayload>,
    next_id: u64,
}

#[derive(Clone, Default)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock serving the given stream contents, newest first
    pub fn with_stream(contents: Vec<Content>) -> Self {
        let api = Self::new();
        api.state.lock().unwrap().stream = contents;
        api
    }

    /// Limit stream pages to `size` items
    pub fn set_page_size(&self, size: usize) {
        self.state.lock().unwrap().page_size = Some(size);
    }

    pub fn push_stream(&self, content: Content) {
        self.state.lock().unwrap().stream.push(content);
    }

    /// Make content available to `accept_ids` requests without it being
    /// part of the paged stream yet (it was just announced live)
    pub fn announce(&self, content: Content) {
        self.state.lock().unwrap().stream.insert(0, content);
    }

    pub fn set_replies(&self, parent_id: &str, replies: Vec<Content>) {
        self.state
            .lock()
            .unwrap()
            .replies
            .insert(parent_id.to_string(), replies);
    }

    pub fn set_shares(&self, parent_id: &str, shares: Vec<Content>) {
        self.state
            .lock()
            .unwrap()
            .shares
            .insert(parent_id.to_string(), shares);
    }

    pub fn set_profile(&self, profile: Profile) {
        self.state
            .lock()
            .unwrap()
            .profiles
            .insert(profile.id.clone(), profile);
    }

    /// Requests touching these ids fail with a network error
    pub fn fail_ids(&self, ids: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.failing_ids.extend(ids.iter().map(|id| id.to_string()));
    }

    /// Every request fails with `error` until `clear_failures` is called
    pub fn fail_with(&self, error: ApiError) {
        self.state.lock().unwrap().failure = Some(error);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.failure = None;
        state.failing_ids.clear();
    }

    /// Delay every response (simulates network latency)
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    /// Recorded calls as `(method, argument)` pairs
    pub fn calls(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    /// Payloads received by create/update
    pub fn payloads(&self) -> Vec<ContentPayload> {
        self.state.lock().unwrap().payloads.clone()
    }

    /// Record a call and decide whether it fails
    async fn begin(&self, method: &str, arg: &str, ids: &[&str]) -> ApiResult<()> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.calls.push((method.to_string(), arg.to_string()));
            if let Some(error) = &state.failure {
                return Err(error.clone());
            }
            if let Some(id) = ids.iter().find(|id| state.failing_ids.contains(**id)) {
                return Err(ApiError::Network(format!("mock failure for {}", id)));
            }
            state.delay
        };

        if !delay.is_zero() {
            sleep(delay).await;
        }
        Ok(())
    }

    fn find_content(state: &MockState, id: &str) -> Option<Content> {
        state
            .stream
            .iter()
            .chain(state.replies.values().flatten())
            .chain(state.shares.values().flatten())
            .find(|c| c.id == id)
            .cloned()
    }

    fn update_content_in_place(state: &mut MockState, id: &str, f: impl Fn(&mut Content)) {
        for content in state
            .stream
            .iter_mut()
            .chain(state.replies.values_mut().flatten())
            .chain(state.shares.values_mut().flatten())
            .filter(|c| c.id == id)
        {
            f(content);
        }
    }
}

#[async_trait]
impl Api for MockApi {
    async fn fetch_stream(&self, request: &StreamRequest) -> ApiResult<Vec<Content>> {
        let ids: Vec<&str> = request.accept_ids.iter().map(String::as_str).collect();
        self.begin("fetch_stream", &request.accept_ids.join(","), &ids)
            .await?;

        let state = self.state.lock().unwrap();
        if !request.accept_ids.is_empty() {
            return Ok(state
                .stream
                .iter()
                .filter(|c| request.accept_ids.contains(&c.id))
                .cloned()
                .collect());
        }

        let start = match &request.last_id {
            Some(cursor) => state
                .stream
                .iter()
                .position(|c| c.cursor() == cursor)
                .map(|i| i + 1)
                .unwrap_or(state.stream.len()),
            None => 0,
        };
        let page_size = state.page_size.unwrap_or(usize::MAX);

        Ok(state.stream.iter().skip(start).take(page_size).cloned().collect())
    }

    async fn fetch_content(&self, id: &str) -> ApiResult<Content> {
        self.begin("fetch_content", id, &[id]).await?;
        let state = self.state.lock().unwrap();
        Self::find_content(&state, id).ok_or_else(|| ApiError::Server {
            status: 404,
            message: "Not found.".to_string(),
        })
    }

    async fn fetch_replies(&self, id: &str) -> ApiResult<Vec<Content>> {
        self.begin("fetch_replies", id, &[id]).await?;
        let state = self.state.lock().unwrap();
        Ok(state.replies.get(id).cloned().unwrap_or_default())
    }

    async fn fetch_shares(&self, id: &str) -> ApiResult<Vec<Content>> {
        self.begin("fetch_shares", id, &[id]).await?;
        let state = self.state.lock().unwrap();
        Ok(state.shares.get(id).cloned().unwrap_or_default())
    }

    async fn share(&self, id: &str) -> ApiResult<()> {
        self.begin("share", id, &[id]).await?;
        let mut state = self.state.lock().unwrap();
        Self::update_content_in_place(&mut state, id, |c| c.user_has_shared = true);
        Ok(())
    }

    async fn unshare(&self, id: &str) -> ApiResult<()> {
        self.begin("unshare", id, &[id]).await?;
        let mut state = self.state.lock().unwrap();
        Self::update_content_in_place(&mut state, id, |c| c.user_has_shared = false);
        Ok(())
    }

    async fn fetch_profile(&self, id: &str) -> ApiResult<Profile> {
        self.begin("fetch_profile", id, &[id]).await?;
        let state = self.state.lock().unwrap();
        state.profiles.get(id).cloned().ok_or_else(|| ApiError::Server {
            status: 404,
            message: "Not found.".to_string(),
        })
    }

    async fn follow(&self, profile_id: &str) -> ApiResult<()> {
        self.begin("follow", profile_id, &[profile_id]).await
    }

    async fn unfollow(&self, profile_id: &str) -> ApiResult<()> {
        self.begin("unfollow", profile_id, &[profile_id]).await
    }

    async fn schedule_profile_update(&self, profile_id: &str) -> ApiResult<()> {
        self.begin("schedule_profile_update", profile_id, &[profile_id])
            .await
    }

    async fn create_content(&self, payload: &ContentPayload) -> ApiResult<Content> {
        self.begin("create_content", &payload.text, &[]).await?;

        let mut state = self.state.lock().unwrap();
        state.payloads.push(payload.clone());
        state.next_id += 1;
        let id = format!("new-{}", state.next_id);

        let author = Profile::new("me", "me@hearth.local");
        let mut content = Content::new(id, author, payload.text.clone());
        content.text = Some(payload.text.clone());
        content.visibility = payload.visibility;
        content.pinned = payload.pinned;
        content.user_is_author = true;
        if let Some(parent) = &payload.parent {
            content = content.reply_to(parent.clone());
        }
        Ok(content)
    }

    async fn update_content(&self, id: &str, payload: &ContentPayload) -> ApiResult<Content> {
        self.begin("update_content", id, &[id]).await?;

        let mut state = self.state.lock().unwrap();
        state.payloads.push(payload.clone());
        let mut content = Self::find_content(&state, id).ok_or_else(|| ApiError::Server {
            status: 404,
            message: "Not found.".to_string(),
        })?;
        content.text = Some(payload.text.clone());
        content.rendered = payload.text.clone();
        content.visibility = payload.visibility;
        content.pinned = payload.pinned;
        content.edited = true;
        Ok(content)
    }
}
