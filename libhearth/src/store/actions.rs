//! Store actions
//!
//! Front-ends dispatch [`Action`]s. The store performs the API calls and
//! commits the outcome to its state through the reducer. Failures are
//! reported on the notifier and leave the state as it was.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::reducer::{reduce, Mutation};
use super::state::{Resource, StreamState};
use crate::api::Api;
use crate::error::{ApiError, HearthError, Result};
use crate::notify::Notifier;
use crate::streams::{select, StreamDescriptor, StreamFetch, StreamRequest};
use crate::types::{Content, ContentId, ProfileId};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Show another stream, dropping the current state
    SwitchStream(StreamDescriptor),

    /// Fetch the first page of the current stream
    FetchStream,

    /// Fetch the page after the last visible content
    LoadMore,

    FetchReplies(ContentId),

    FetchShares(ContentId),

    Share(ContentId),

    Unshare(ContentId),

    /// New content announced on the live channel
    LiveAnnouncement {
        id: ContentId,
        parent_id: Option<ContentId>,
    },

    /// Merge the unfetched buffer into the visible feed
    AcknowledgeNewContent,

    FetchProfile(ProfileId),

    Follow(ProfileId),

    Unfollow(ProfileId),

    ScheduleProfileUpdate(ProfileId),

    /// Content created or edited through the publisher
    ContentPublished(Content),
}

/// Outcome of an acknowledgement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcknowledgeSummary {
    pub merged: Vec<ContentId>,
    pub requeued: Vec<ContentId>,
    pub dropped: Vec<ContentId>,
}

pub struct Store {
    state: StreamState,
    api: Arc<dyn Api>,
    notifier: Notifier,
}

impl Store {
    pub fn new(stream: StreamDescriptor, api: Arc<dyn Api>, notifier: Notifier) -> Self {
        Self {
            state: StreamState::new(stream),
            api,
            notifier,
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    fn commit(&mut self, mutation: Mutation) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, mutation);
    }

    /// Report a failed request and hand the error back to the caller
    fn fail(&mut self, resource: Option<Resource>, context: &str, error: ApiError) -> HearthError {
        if let Some(resource) = resource {
            self.commit(Mutation::RequestFailed(resource));
        }
        warn!(error = %error, "{} failed", context);
        self.notifier.error(user_message(context, &error));
        error.into()
    }

    /// Run an action against the API and commit its outcome
    #[instrument(skip(self), fields(stream = %self.state.stream))]
    pub async fn dispatch(&mut self, action: Action) -> Result<()> {
        match action {
            Action::SwitchStream(stream) => {
                self.commit(Mutation::StreamSwitched(stream));
                Ok(())
            }
            Action::FetchStream => self.fetch_stream(None, None).await,
            // The detail view has no further pages
            Action::LoadMore if self.state.stream.single => Ok(()),
            Action::LoadMore => {
                let marker = self.state.load_more_marker().cloned();
                let cursor = self.state.last_cursor();
                self.fetch_stream(cursor, marker).await
            }
            Action::FetchReplies(id) => self.fetch_replies(id).await,
            Action::FetchShares(id) => self.fetch_shares(id).await,
            Action::Share(id) => self.toggle_share(id, true).await,
            Action::Unshare(id) => self.toggle_share(id, false).await,
            Action::LiveAnnouncement { id, parent_id } => {
                debug!(id = %id, parent_id = ?parent_id, "live announcement");
                self.commit(Mutation::ContentAnnounced { id, parent_id });
                Ok(())
            }
            Action::AcknowledgeNewContent => self.acknowledge_new_content().await.map(|_| ()),
            Action::FetchProfile(id) => self.fetch_profile(id).await,
            Action::Follow(id) => self.toggle_follow(id, true).await,
            Action::Unfollow(id) => self.toggle_follow(id, false).await,
            Action::ScheduleProfileUpdate(id) => match self.api.schedule_profile_update(&id).await
            {
                Ok(()) => {
                    self.notifier.info("Profile update scheduled");
                    Ok(())
                }
                Err(e) => Err(self.fail(None, "Scheduling the profile update", e)),
            },
            Action::ContentPublished(content) => {
                self.commit(Mutation::ContentPublished(content));
                Ok(())
            }
        }
    }

    /// Fetch a page; `marker` is the load-more marker this page replaces,
    /// cleared only once the page has arrived
    async fn fetch_stream(
        &mut self,
        last_id: Option<String>,
        marker: Option<ContentId>,
    ) -> Result<()> {
        let fetch = select(&self.state.stream, last_id)?;
        self.commit(Mutation::RequestStarted(Resource::Contents));

        match fetch {
            StreamFetch::Feed(request) => match self.api.fetch_stream(&request).await {
                Ok(batch) => {
                    info!(count = batch.len(), "stream page fetched");
                    if let Some(marker) = marker {
                        self.commit(Mutation::LoadMoreDisabled(marker));
                    }
                    self.commit(Mutation::ContentsFetched(batch));
                    Ok(())
                }
                Err(e) => Err(self.fail(Some(Resource::Contents), "Loading the stream", e)),
            },
            StreamFetch::Single(id) => {
                match self.api.fetch_content(&id).await {
                    Ok(content) => {
                        self.commit(Mutation::ContentsFetched(vec![content]));
                        self.fetch_replies(id).await
                    }
                    Err(e) => Err(self.fail(Some(Resource::Contents), "Loading the content", e)),
                }
            }
        }
    }

    async fn fetch_replies(&mut self, parent_id: ContentId) -> Result<()> {
        self.commit(Mutation::RequestStarted(Resource::Replies));
        match self.api.fetch_replies(&parent_id).await {
            Ok(replies) => {
                self.commit(Mutation::RepliesFetched { parent_id, replies });
                Ok(())
            }
            Err(e) => Err(self.fail(Some(Resource::Replies), "Loading replies", e)),
        }
    }

    async fn fetch_shares(&mut self, parent_id: ContentId) -> Result<()> {
        self.commit(Mutation::RequestStarted(Resource::Shares));
        match self.api.fetch_shares(&parent_id).await {
            Ok(shares) => {
                self.commit(Mutation::SharesFetched { parent_id, shares });
                Ok(())
            }
            Err(e) => Err(self.fail(Some(Resource::Shares), "Loading shares", e)),
        }
    }

    async fn toggle_share(&mut self, id: ContentId, shared: bool) -> Result<()> {
        let result = if shared {
            self.api.share(&id).await
        } else {
            self.api.unshare(&id).await
        };

        match result {
            Ok(()) => {
                self.commit(Mutation::ShareToggled { id, shared });
                Ok(())
            }
            Err(e) if shared => Err(self.fail(None, "Sharing", e)),
            Err(e) => Err(self.fail(None, "Unsharing", e)),
        }
    }

    async fn fetch_profile(&mut self, id: ProfileId) -> Result<()> {
        self.commit(Mutation::RequestStarted(Resource::Profile));
        match self.api.fetch_profile(&id).await {
            Ok(profile) => {
                self.commit(Mutation::ProfileFetched(profile));
                Ok(())
            }
            Err(e) => Err(self.fail(Some(Resource::Profile), "Loading the profile", e)),
        }
    }

    async fn toggle_follow(&mut self, profile_id: ProfileId, following: bool) -> Result<()> {
        let result = if following {
            self.api.follow(&profile_id).await
        } else {
            self.api.unfollow(&profile_id).await
        };

        match result {
            Ok(()) => {
                self.commit(Mutation::FollowToggled {
                    profile_id,
                    following,
                });
                Ok(())
            }
            Err(e) if following => Err(self.fail(None, "Following", e)),
            Err(e) => Err(self.fail(None, "Unfollowing", e)),
        }
    }

    /// Merge the unfetched buffer into the visible feed
    ///
    /// Each buffered id is re-fetched on its own; the requests run
    /// concurrently and every one is allowed to fail independently. Ids
    /// whose request failed go back into the buffer for the next
    /// acknowledgement. Ids the server did not return are dropped.
    pub async fn acknowledge_new_content(&mut self) -> Result<AcknowledgeSummary> {
        let acknowledged = self.state.unfetched_content_ids.clone();
        if acknowledged.is_empty() {
            return Ok(AcknowledgeSummary::default());
        }

        let to_fetch: Vec<ContentId> = acknowledged
            .iter()
            .filter(|id| !self.state.is_visible(id))
            .cloned()
            .collect();

        let base = match select(&self.state.stream, None)? {
            StreamFetch::Feed(request) => request,
            // The detail view has no feed endpoint, re-fetch each content directly
            StreamFetch::Single(_) => StreamRequest::default(),
        };
        let single = self.state.stream.single;

        self.commit(Mutation::RequestStarted(Resource::NewContent));

        let api = Arc::clone(&self.api);
        let requests = to_fetch.iter().map(|id| {
            let api = Arc::clone(&api);
            let request = base.accepting(vec![id.clone()]);
            let id = id.clone();
            async move {
                let result = if single {
                    api.fetch_content(&id).await.map(|c| vec![c])
                } else {
                    api.fetch_stream(&request).await
                };
                (id, result)
            }
        });
        let results = join_all(requests).await;

        let mut accepted: Vec<Content> = Vec::new();
        let mut summary = AcknowledgeSummary::default();
        for (id, result) in results {
            match result {
                Ok(contents) => {
                    if contents.iter().any(|c| c.id == id) {
                        summary.merged.push(id);
                    } else {
                        debug!(id = %id, "announced content not returned by the server");
                        summary.dropped.push(id);
                    }
                    accepted.extend(contents);
                }
                Err(e) => {
                    debug!(id = %id, error = %e, "re-fetch failed, keeping in buffer");
                    summary.requeued.push(id);
                }
            }
        }

        self.commit(Mutation::NewContentMerged {
            acknowledged,
            accepted,
            failed: summary.requeued.clone(),
        });

        if !summary.requeued.is_empty() {
            self.notifier.warning(format!(
                "{} new item(s) could not be loaded, try again",
                summary.requeued.len()
            ));
        }
        info!(
            merged = summary.merged.len(),
            requeued = summary.requeued.len(),
            "new content acknowledged"
        );

        Ok(summary)
    }
}

/// Message shown to the user when an action fails
fn user_message(context: &str, error: &ApiError) -> String {
    match error {
        ApiError::NotAuthenticated(_) => format!("{} requires you to be logged in", context),
        ApiError::Network(_) => format!("{} failed: the server could not be reached", context),
        ApiError::Validation { message, .. } => format!("{} failed: {}", context, message),
        ApiError::Server { status, .. } => {
            format!("{} failed: the server answered {}", context, status)
        }
        ApiError::Decode(_) => format!("{} failed: unexpected response", context),
    }
}
