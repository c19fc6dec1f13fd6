//! Stream selection
//!
//! Maps a logical stream (public, followed, tag, profile, ...) to the REST
//! request that fetches it and to the key of its live-update channel.
//! Everything here is pure; no I/O happens in this module.

use serde::{Deserialize, Serialize};

use crate::error::{HearthError, Result};
use crate::types::ContentId;

/// Logical stream names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamName {
    Public,
    Followed,
    Local,
    Tag,
    ProfileAll,
    ProfilePinned,
    /// A single piece of content with its replies
    Content,
}

impl StreamName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Followed => "followed",
            Self::Local => "local",
            Self::Tag => "tag",
            Self::ProfileAll => "profile-all",
            Self::ProfilePinned => "profile-pinned",
            Self::Content => "content",
        }
    }

    /// Whether this stream needs a scoping id (tag name, profile id, content id)
    pub fn requires_scope(&self) -> bool {
        matches!(
            self,
            Self::Tag | Self::ProfileAll | Self::ProfilePinned | Self::Content
        )
    }
}

impl std::str::FromStr for StreamName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "public" => Ok(Self::Public),
            "followed" => Ok(Self::Followed),
            "local" => Ok(Self::Local),
            "tag" => Ok(Self::Tag),
            "profile-all" => Ok(Self::ProfileAll),
            "profile-pinned" => Ok(Self::ProfilePinned),
            "content" => Ok(Self::Content),
            _ => Err(format!(
                "Invalid stream: '{}'. Valid options: public, followed, local, tag, profile-all, profile-pinned, content",
                s
            )),
        }
    }
}

impl std::fmt::Display for StreamName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which stream a store is showing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub name: StreamName,
    /// Tag name, profile id or content id, depending on `name`
    pub scope: Option<String>,
    /// True when viewing one piece of content rather than a feed
    pub single: bool,
}

impl StreamDescriptor {
    pub fn public() -> Self {
        Self::unscoped(StreamName::Public)
    }

    pub fn followed() -> Self {
        Self::unscoped(StreamName::Followed)
    }

    pub fn local() -> Self {
        Self::unscoped(StreamName::Local)
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self::scoped(StreamName::Tag, name)
    }

    pub fn profile_all(profile_id: impl Into<String>) -> Self {
        Self::scoped(StreamName::ProfileAll, profile_id)
    }

    pub fn profile_pinned(profile_id: impl Into<String>) -> Self {
        Self::scoped(StreamName::ProfilePinned, profile_id)
    }

    pub fn content(id: impl Into<ContentId>) -> Self {
        Self {
            name: StreamName::Content,
            scope: Some(id.into()),
            single: true,
        }
    }

    /// Build a descriptor from a name and optional scope, checking that
    /// scoped streams received one
    pub fn new(name: StreamName, scope: Option<String>) -> Result<Self> {
        let scope = scope.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        match (name.requires_scope(), scope) {
            (true, None) => Err(HearthError::InvalidInput(format!(
                "The {} stream needs a scope (tag name, profile id or content id)",
                name
            ))),
            (true, Some(scope)) => Ok(Self {
                name,
                single: name == StreamName::Content,
                scope: Some(scope),
            }),
            (false, _) => Ok(Self::unscoped(name)),
        }
    }

    fn unscoped(name: StreamName) -> Self {
        Self {
            name,
            scope: None,
            single: false,
        }
    }

    fn scoped(name: StreamName, scope: impl Into<String>) -> Self {
        Self {
            name,
            scope: Some(scope.into()),
            single: false,
        }
    }

    fn scope(&self) -> Result<&str> {
        self.scope.as_deref().ok_or_else(|| {
            HearthError::InvalidInput(format!("The {} stream is missing its scope", self.name))
        })
    }

    /// Key of the live-update channel for this stream
    pub fn channel_key(&self) -> Result<String> {
        Ok(match self.name {
            StreamName::Public => "public".to_string(),
            StreamName::Followed => "followed".to_string(),
            StreamName::Local => "local".to_string(),
            StreamName::Tag => format!("tag__{}", self.scope()?),
            StreamName::ProfileAll => format!("profile_all__{}", self.scope()?),
            StreamName::ProfilePinned => format!("profile_pinned__{}", self.scope()?),
            StreamName::Content => format!("content__{}", self.scope()?),
        })
    }
}

impl Default for StreamDescriptor {
    fn default() -> Self {
        Self::public()
    }
}

impl std::fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}:{}", self.name, scope),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A feed request against a stream endpoint
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamRequest {
    /// Raw path segments; the HTTP client encodes each one
    pub segments: Vec<String>,
    /// Pagination cursor
    pub last_id: Option<String>,
    /// Restrict the response to these ids
    pub accept_ids: Vec<ContentId>,
}

impl StreamRequest {
    /// Unencoded path, for logs
    pub fn path(&self) -> String {
        format!("/{}/", self.segments.join("/"))
    }

    /// Query parameters in the order the server expects them
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(last_id) = &self.last_id {
            query.push(("last_id", last_id.clone()));
        }
        if !self.accept_ids.is_empty() {
            query.push(("accept_ids", self.accept_ids.join(",")));
        }
        query
    }

    /// Same endpoint, restricted to the given ids and without a cursor
    pub fn accepting(&self, ids: Vec<ContentId>) -> Self {
        Self {
            segments: self.segments.clone(),
            last_id: None,
            accept_ids: ids,
        }
    }
}

/// What the store has to call to load a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFetch {
    Feed(StreamRequest),
    Single(ContentId),
}

/// Map a stream descriptor to its fetch operation
pub fn select(stream: &StreamDescriptor, last_id: Option<String>) -> Result<StreamFetch> {
    let endpoint = match stream.name {
        StreamName::Public => vec!["public"],
        StreamName::Followed => vec!["followed"],
        StreamName::Local => vec!["local"],
        StreamName::Tag => vec!["tag", stream.scope()?],
        StreamName::ProfileAll => vec!["profile-all", stream.scope()?],
        StreamName::ProfilePinned => vec!["profile-pinned", stream.scope()?],
        StreamName::Content => return Ok(StreamFetch::Single(stream.scope()?.to_string())),
    };

    let segments = ["api", "streams"]
        .into_iter()
        .chain(endpoint)
        .map(str::to_string)
        .collect();

    Ok(StreamFetch::Feed(StreamRequest {
        segments,
        last_id,
        accept_ids: Vec::new(),
    }))
}
