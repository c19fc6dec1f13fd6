//! Reducer for stream state
//!
//! `reduce` takes the state by value and returns the next state. It never
//! performs I/O; the store calls the API and then commits the outcome as a
//! [`Mutation`].

use tracing::debug;

use super::state::{Resource, StreamState};
use crate::streams::StreamDescriptor;
use crate::types::{Content, ContentId, Profile, ProfileId};

/// Number of items from the end of a batch that carries the load-more marker
const LOAD_MORE_OFFSET: usize = 5;

#[derive(Debug, Clone)]
pub enum Mutation {
    /// Start over on another stream
    StreamSwitched(StreamDescriptor),

    RequestStarted(Resource),

    RequestFailed(Resource),

    /// A page of the stream arrived
    ContentsFetched(Vec<Content>),

    /// Pagination was triggered from this item
    LoadMoreDisabled(ContentId),

    RepliesFetched {
        parent_id: ContentId,
        replies: Vec<Content>,
    },

    SharesFetched {
        parent_id: ContentId,
        shares: Vec<Content>,
    },

    /// The live channel announced new content
    ContentAnnounced {
        id: ContentId,
        parent_id: Option<ContentId>,
    },

    /// Outcome of acknowledging the unfetched buffer
    NewContentMerged {
        /// Buffer snapshot the acknowledgement started from
        acknowledged: Vec<ContentId>,
        /// Contents returned by the re-fetches
        accepted: Vec<Content>,
        /// Ids whose re-fetch failed; they go back into the buffer
        failed: Vec<ContentId>,
    },

    ShareToggled {
        id: ContentId,
        shared: bool,
    },

    /// Content created or edited by the user
    ContentPublished(Content),

    ProfileFetched(Profile),

    FollowToggled {
        profile_id: ProfileId,
        following: bool,
    },
}

pub fn reduce(mut state: StreamState, mutation: Mutation) -> StreamState {
    match mutation {
        Mutation::StreamSwitched(stream) => StreamState::new(stream),

        Mutation::RequestStarted(resource) => {
            state.pending.set(resource, true);
            state
        }

        Mutation::RequestFailed(resource) => {
            state.pending.set(resource, false);
            state
        }

        Mutation::ContentsFetched(batch) => {
            state.pending.set(Resource::Contents, false);
            let ids: Vec<ContentId> = batch.iter().map(|c| c.id.clone()).collect();

            // Only the newest page carries a marker
            for content in state.contents.values_mut() {
                content.has_load_more = false;
            }

            for mut content in batch {
                content.has_load_more = false;
                let id = content.id.clone();
                upsert_content(&mut state, content);
                if let Some(stored) = state.contents.get_mut(&id) {
                    stored.has_load_more = false;
                }
                if !state.current_content_ids.contains(&id) {
                    state.current_content_ids.push(id);
                }
            }

            if let Some(marker) = load_more_index(ids.len()).map(|i| &ids[i]) {
                if let Some(content) = state.contents.get_mut(marker) {
                    content.has_load_more = true;
                }
            }
            state
        }

        Mutation::LoadMoreDisabled(id) => {
            if let Some(content) = state.contents.get_mut(&id) {
                content.has_load_more = false;
            }
            state
        }

        Mutation::RepliesFetched { parent_id, replies } => {
            state.pending.set(Resource::Replies, false);
            let ids = upsert_children(&mut state, replies);
            if let Some(parent) = state.contents.get_mut(&parent_id) {
                merge_ids(&mut parent.reply_ids, ids);
                parent.reply_count = parent.reply_ids.len() as u32;
            } else {
                debug!(parent_id = %parent_id, "replies fetched for unknown content");
            }
            state
        }

        Mutation::SharesFetched { parent_id, shares } => {
            state.pending.set(Resource::Shares, false);
            let ids = upsert_children(&mut state, shares);
            if let Some(parent) = state.contents.get_mut(&parent_id) {
                merge_ids(&mut parent.share_ids, ids);
                parent.shares_count = parent.share_ids.len() as u32;
            } else {
                debug!(parent_id = %parent_id, "shares fetched for unknown content");
            }
            state
        }

        Mutation::ContentAnnounced { id, parent_id } => {
            match parent_id {
                Some(parent_id) => match state.contents.get_mut(&parent_id) {
                    Some(parent) => parent.reply_count += 1,
                    None => debug!(id = %id, parent_id = %parent_id, "reply to unknown content ignored"),
                },
                None => {
                    if !state.unfetched_content_ids.contains(&id) && !state.is_visible(&id) {
                        state.unfetched_content_ids.insert(0, id);
                    }
                }
            }
            state
        }

        Mutation::NewContentMerged {
            acknowledged,
            accepted,
            failed,
        } => {
            state.pending.set(Resource::NewContent, false);
            state
                .unfetched_content_ids
                .retain(|id| !acknowledged.contains(id));

            let accepted_ids: Vec<ContentId> = accepted.iter().map(|c| c.id.clone()).collect();
            for content in accepted {
                upsert_content(&mut state, content);
            }

            let mut front: Vec<ContentId> = Vec::new();
            for id in &acknowledged {
                if accepted_ids.contains(id) && !state.is_visible(id) && !front.contains(id) {
                    front.push(id.clone());
                }
            }
            front.append(&mut state.current_content_ids);
            state.current_content_ids = front;

            for id in failed {
                if !state.unfetched_content_ids.contains(&id) && !state.is_visible(&id) {
                    state.unfetched_content_ids.push(id);
                }
            }
            state
        }

        Mutation::ShareToggled { id, shared } => {
            if let Some(content) = state.contents.get_mut(&id) {
                if content.user_has_shared != shared {
                    content.user_has_shared = shared;
                    content.shares_count = if shared {
                        content.shares_count + 1
                    } else {
                        content.shares_count.saturating_sub(1)
                    };
                }
            }
            state
        }

        Mutation::ContentPublished(content) => {
            let id = content.id.clone();
            let parent_id = content.parent.clone();
            let is_new = upsert_content(&mut state, content);

            if is_new {
                match parent_id {
                    Some(parent_id) => {
                        if let Some(parent) = state.contents.get_mut(&parent_id) {
                            if !parent.reply_ids.contains(&id) {
                                parent.reply_ids.push(id);
                                parent.reply_count += 1;
                            }
                        }
                    }
                    None => {
                        if !state.is_visible(&id) {
                            state.current_content_ids.insert(0, id);
                        }
                    }
                }
            }
            state
        }

        Mutation::ProfileFetched(profile) => {
            state.pending.set(Resource::Profile, false);
            for content in state.contents.values_mut() {
                if content.author.id == profile.id {
                    content.author = profile.clone();
                }
            }
            state.profiles.insert(profile.id.clone(), profile);
            state
        }

        Mutation::FollowToggled {
            profile_id,
            following,
        } => {
            if let Some(profile) = state.profiles.get_mut(&profile_id) {
                profile.user_following = following;
            }
            for content in state.contents.values_mut() {
                if content.author.id == profile_id {
                    content.author.user_following = following;
                }
            }
            state
        }
    }
}

/// Index within a batch of the item that gets the load-more marker
fn load_more_index(len: usize) -> Option<usize> {
    match len {
        0 => None,
        n if n < LOAD_MORE_OFFSET => Some(n - 1),
        n => Some(n - LOAD_MORE_OFFSET),
    }
}

/// Insert or refresh a content; returns true when the id was new
fn upsert_content(state: &mut StreamState, content: Content) -> bool {
    state
        .profiles
        .insert(content.author.id.clone(), content.author.clone());

    match state.contents.get_mut(&content.id) {
        Some(existing) => {
            existing.refresh_from(content);
            false
        }
        None => {
            state.all_content_ids.push(content.id.clone());
            state.contents.insert(content.id.clone(), content);
            true
        }
    }
}

fn upsert_children(state: &mut StreamState, children: Vec<Content>) -> Vec<ContentId> {
    children
        .into_iter()
        .map(|child| {
            let id = child.id.clone();
            upsert_content(state, child);
            id
        })
        .collect()
}

fn merge_ids(target: &mut Vec<ContentId>, ids: Vec<ContentId>) {
    for id in ids {
        if !target.contains(&id) {
            target.push(id);
        }
    }
}
