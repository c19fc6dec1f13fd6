//! Publishing posts, replies and edits
//!
//! A [`PublishForm`] carries what the user typed. The [`Publisher`] checks
//! it locally, submits it as a create or an update, and maps structured
//! server validation errors back onto form fields.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::api::{Api, ContentPayload};
use crate::error::{ApiError, Result};
use crate::notify::Notifier;
use crate::types::{Content, ContentId, Visibility};

#[derive(Debug, Clone, PartialEq)]
pub struct PublishForm {
    pub text: String,
    pub visibility: Visibility,
    pub pinned: bool,
    pub federate: bool,
    pub show_preview: bool,
    /// Handles the content is shared with when visibility is limited
    pub recipients: Vec<String>,
    /// Content being replied to
    pub parent: Option<ContentId>,
    /// Content being edited
    pub edit: Option<ContentId>,
}

impl Default for PublishForm {
    fn default() -> Self {
        Self {
            text: String::new(),
            visibility: Visibility::Public,
            pinned: false,
            federate: true,
            show_preview: true,
            recipients: Vec::new(),
            parent: None,
            edit: None,
        }
    }
}

impl PublishForm {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn reply_to(parent: impl Into<ContentId>, text: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            ..Self::new(text)
        }
    }

    /// Checks that need no server round trip
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if self.text.trim().is_empty() {
            errors.push(FieldError::new(FormField::Text, "Text is required"));
        }

        if self.visibility == Visibility::Limited && self.recipient_list().is_empty() {
            errors.push(FieldError::new(
                FormField::Recipients,
                "Limited content needs at least one recipient",
            ));
        }

        errors
    }

    fn recipient_list(&self) -> Vec<&str> {
        self.recipients
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .collect()
    }

    pub fn to_payload(&self) -> ContentPayload {
        let recipients = if self.visibility == Visibility::Limited {
            self.recipient_list().join(",")
        } else {
            String::new()
        };

        ContentPayload {
            text: self.text.clone(),
            visibility: self.visibility,
            pinned: self.pinned,
            federate: self.federate,
            show_preview: self.show_preview,
            recipients,
            parent: self.parent.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Text,
    Visibility,
    Recipients,
    Parent,
}

impl FormField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::Text => "text",
            FormField::Visibility => "visibility",
            FormField::Recipients => "recipients",
            FormField::Parent => "parent",
        }
    }

    /// Field a server validation code refers to
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "text_required" => Some(FormField::Text),
            "recipients_required" | "recipients_not_found" => Some(FormField::Recipients),
            "invalid_visibility" => Some(FormField::Visibility),
            "parent_not_found" => Some(FormField::Parent),
            _ => None,
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: FormField,
    pub message: String,
}

impl FieldError {
    pub fn new(field: FormField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published { content: Content, url: String },
    Rejected(Vec<FieldError>),
}

pub struct Publisher {
    api: Arc<dyn Api>,
    notifier: Notifier,
    site_url: String,
}

impl Publisher {
    pub fn new(api: Arc<dyn Api>, notifier: Notifier, site_url: impl Into<String>) -> Self {
        Self {
            api,
            notifier,
            site_url: site_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Where a published content can be viewed
    pub fn content_url(&self, content: &Content) -> String {
        match content.url.as_deref() {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                url.to_string()
            }
            Some(path) if path.starts_with('/') => format!("{}{}", self.site_url, path),
            _ => format!("{}/content/{}/", self.site_url, content.id),
        }
    }

    #[instrument(skip(self, form), fields(edit = ?form.edit, parent = ?form.parent))]
    pub async fn publish(&self, form: &PublishForm) -> Result<PublishOutcome> {
        let errors = form.validate();
        if !errors.is_empty() {
            debug!(count = errors.len(), "form rejected locally");
            return Ok(PublishOutcome::Rejected(errors));
        }

        let payload = form.to_payload();
        let result = match &form.edit {
            Some(id) => self.api.update_content(id, &payload).await,
            None => self.api.create_content(&payload).await,
        };

        match result {
            Ok(content) => {
                let url = self.content_url(&content);
                info!(id = %content.id, url = %url, "content published");
                Ok(PublishOutcome::Published { content, url })
            }
            Err(e) => {
                if let ApiError::Validation { code, message } = &e {
                    if let Some(field) = FormField::from_code(code) {
                        debug!(code = %code, "server rejected the form");
                        return Ok(PublishOutcome::Rejected(vec![FieldError::new(
                            field,
                            message.clone(),
                        )]));
                    }
                }

                warn!(error = %e, "publishing failed");
                self.notifier
                    .error("Could not save the content, please try again");
                Err(e.into())
            }
        }
    }
}
