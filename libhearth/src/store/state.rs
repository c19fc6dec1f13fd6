//! Stream state
//!
//! Normalized content and profiles keyed by id, plus the ordered id lists
//! the views are derived from. All changes go through the reducer (see
//! `reducer.rs`).

use std::collections::HashMap;

use crate::streams::StreamDescriptor;
use crate::types::{Content, ContentId, Profile, ProfileId};

#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// Stream being shown
    pub stream: StreamDescriptor,

    /// Every content ever fetched, keyed by id
    pub contents: HashMap<ContentId, Content>,

    pub profiles: HashMap<ProfileId, Profile>,

    /// Ids of everything fetched, including replies and shares
    pub all_content_ids: Vec<ContentId>,

    /// Visible feed order
    pub current_content_ids: Vec<ContentId>,

    /// Announced live but not yet merged into the feed, newest first
    pub unfetched_content_ids: Vec<ContentId>,

    pub pending: PendingState,
}

/// In-flight requests per resource kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingState {
    pub contents: bool,
    pub replies: bool,
    pub shares: bool,
    pub new_content: bool,
    pub profile: bool,
}

/// Resource kinds with their own pending flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Contents,
    Replies,
    Shares,
    NewContent,
    Profile,
}

impl PendingState {
    pub(crate) fn set(&mut self, resource: Resource, value: bool) {
        match resource {
            Resource::Contents => self.contents = value,
            Resource::Replies => self.replies = value,
            Resource::Shares => self.shares = value,
            Resource::NewContent => self.new_content = value,
            Resource::Profile => self.profile = value,
        }
    }

    pub fn any(&self) -> bool {
        self.contents || self.replies || self.shares || self.new_content || self.profile
    }
}

impl StreamState {
    pub fn new(stream: StreamDescriptor) -> Self {
        Self {
            stream,
            ..Default::default()
        }
    }

    pub fn content(&self, id: &str) -> Option<&Content> {
        self.contents.get(id)
    }

    /// Visible feed, in order
    pub fn current_contents(&self) -> Vec<&Content> {
        self.current_content_ids
            .iter()
            .filter_map(|id| self.contents.get(id))
            .collect()
    }

    pub fn replies_of(&self, id: &str) -> Vec<&Content> {
        self.children(id, |c| &c.reply_ids)
    }

    pub fn shares_of(&self, id: &str) -> Vec<&Content> {
        self.children(id, |c| &c.share_ids)
    }

    fn children(&self, id: &str, ids: impl Fn(&Content) -> &Vec<ContentId>) -> Vec<&Content> {
        self.contents
            .get(id)
            .map(|parent| {
                ids(parent)
                    .iter()
                    .filter_map(|child| self.contents.get(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn new_content_count(&self) -> usize {
        self.unfetched_content_ids.len()
    }

    pub fn has_new_content(&self) -> bool {
        !self.unfetched_content_ids.is_empty()
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.current_content_ids.iter().any(|c| c == id)
    }

    /// Cursor for the next page: the last visible content's through
    /// reference, or its id
    pub fn last_cursor(&self) -> Option<String> {
        self.current_content_ids
            .last()
            .and_then(|id| self.contents.get(id))
            .map(|c| c.cursor().to_string())
    }

    /// Content currently carrying the load-more marker
    pub fn load_more_marker(&self) -> Option<&ContentId> {
        self.current_content_ids
            .iter()
            .find(|id| self.contents.get(*id).map_or(false, |c| c.has_load_more))
    }
}
