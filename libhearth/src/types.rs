//! Core types for Hearth

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Content identifiers arrive as numbers or strings and are kept as strings
pub type ContentId = String;

pub type ProfileId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(deserialize_with = "ids::required")]
    pub id: ContentId,
    pub author: Profile,
    #[serde(default)]
    pub content_type: ContentType,
    /// Rendered HTML body
    #[serde(default)]
    pub rendered: String,
    /// Markdown source, only sent to the author
    #[serde(default)]
    pub text: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub humanized_timestamp: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default)]
    pub shares_count: u32,
    #[serde(default, deserialize_with = "ids::optional")]
    pub parent: Option<ContentId>,
    #[serde(default, deserialize_with = "ids::optional")]
    pub share_of: Option<ContentId>,
    /// Pagination cursor; for shares this is the share's own id
    #[serde(default, deserialize_with = "ids::optional")]
    pub through: Option<ContentId>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub is_nsfw: bool,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub user_has_shared: bool,
    #[serde(default)]
    pub user_is_author: bool,

    // Client-side fields, never sent by the server
    #[serde(default)]
    pub reply_ids: Vec<ContentId>,
    #[serde(default)]
    pub share_ids: Vec<ContentId>,
    #[serde(default)]
    pub has_load_more: bool,
}

impl Content {
    /// Minimal public top-level content, mostly useful for tests and mocks
    pub fn new(id: impl Into<ContentId>, author: Profile, rendered: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author,
            content_type: ContentType::Content,
            rendered: rendered.into(),
            text: None,
            timestamp: Utc::now(),
            humanized_timestamp: None,
            visibility: Visibility::Public,
            reply_count: 0,
            shares_count: 0,
            parent: None,
            share_of: None,
            through: None,
            url: None,
            tags: Vec::new(),
            edited: false,
            pinned: false,
            is_nsfw: false,
            local: false,
            user_has_shared: false,
            user_is_author: false,
            reply_ids: Vec::new(),
            share_ids: Vec::new(),
            has_load_more: false,
        }
    }

    pub fn reply_to(mut self, parent: impl Into<ContentId>) -> Self {
        self.content_type = ContentType::Reply;
        self.parent = Some(parent.into());
        self
    }

    pub fn share_of(mut self, original: impl Into<ContentId>) -> Self {
        self.content_type = ContentType::Share;
        self.share_of = Some(original.into());
        self
    }

    pub fn is_reply(&self) -> bool {
        self.content_type == ContentType::Reply || self.parent.is_some()
    }

    /// Pagination cursor for the next page after this content
    pub fn cursor(&self) -> &str {
        self.through.as_deref().unwrap_or(&self.id)
    }

    /// Merge a fresh server copy into this one, keeping client-side state
    pub(crate) fn refresh_from(&mut self, fresh: Content) {
        let reply_ids = std::mem::take(&mut self.reply_ids);
        let share_ids = std::mem::take(&mut self.share_ids);
        let has_load_more = self.has_load_more;

        *self = fresh;
        for id in reply_ids {
            if !self.reply_ids.contains(&id) {
                self.reply_ids.push(id);
            }
        }
        for id in share_ids {
            if !self.share_ids.contains(&id) {
                self.share_ids.push(id);
            }
        }
        self.has_load_more |= has_load_more;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Content,
    Reply,
    Share,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Limited,
    Site,
    #[serde(rename = "self")]
    SelfOnly,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Limited => "limited",
            Self::Site => "site",
            Self::SelfOnly => "self",
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "limited" => Ok(Self::Limited),
            "site" => Ok(Self::Site),
            "self" => Ok(Self::SelfOnly),
            _ => Err(format!(
                "Invalid visibility: '{}'. Valid options: public, limited, site, self",
                s
            )),
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    #[serde(deserialize_with = "ids::required")]
    pub id: ProfileId,
    pub uuid: Uuid,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "image_url_small")]
    pub avatar_url: Option<String>,
    #[serde(default, rename = "is_local")]
    pub local: bool,
    #[serde(default)]
    pub user_following: bool,
    #[serde(default, rename = "home_url")]
    pub url: Option<String>,
}

impl Profile {
    pub fn new(id: impl Into<ProfileId>, handle: impl Into<String>) -> Self {
        let handle = handle.into();
        Self {
            id: id.into(),
            uuid: Uuid::new_v4(),
            name: handle.split('@').next().unwrap_or_default().to_string(),
            handle,
            avatar_url: None,
            local: false,
            user_following: false,
            url: None,
        }
    }

    /// Name to show: display name when set, handle otherwise
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.handle
        } else {
            &self.name
        }
    }
}

mod ids {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    impl RawId {
        fn into_string(self) -> String {
            match self {
                RawId::Number(n) => n.to_string(),
                RawId::Text(s) => s,
            }
        }
    }

    pub fn required<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        RawId::deserialize(deserializer).map(RawId::into_string)
    }

    pub fn optional<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(RawId::into_string))
    }
}

pub(crate) use ids::{optional as deserialize_optional_id, required as deserialize_id};
