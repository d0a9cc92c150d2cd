//! Graph wire types used by this tool.
//!
//! Messages are exported exactly as delivered, so the collector keeps them as
//! [`serde_json::Value`]. The structs here are lenient *views* used for
//! reading specific fields: every field is optional and unknown fields are
//! ignored, so a malformed message never aborts an export or a render.
//!
//! Reference: <https://learn.microsoft.com/graph/api/resources/chatmessage>
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A raw message object as returned by the API.
pub type RawMessage = Value;

/// One page of `GET /chats/{id}/messages`.
#[derive(Debug, Default, Deserialize)]
pub struct MessagePage {
    #[serde(default)]
    pub value: Vec<RawMessage>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Typed view over [`RawMessage`].
#[derive(Debug, Default)]
pub struct ChatMessage {
    pub created_date_time: Option<String>,
    pub from: Option<IdentitySet>,
    pub body: Option<ItemBody>,
}

impl ChatMessage {
    /// Never fails. Each field is read on its own, so one field of the wrong
    /// shape only blanks that field.
    pub fn view(raw: &RawMessage) -> Self {
        Self {
            created_date_time: field(raw, "createdDateTime"),
            from: field(raw, "from"),
            body: field(raw, "body"),
        }
    }

    pub fn content(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| b.content.as_deref())
    }
}

fn field<T: DeserializeOwned>(raw: &RawMessage, key: &str) -> Option<T> {
    raw.get(key)
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
}

/// Who sent a message: a user, an application (bot) or a device.
#[derive(Debug, Default, Deserialize)]
pub struct IdentitySet {
    pub user: Option<Identity>,
    pub application: Option<Identity>,
    pub device: Option<Identity>,
}

impl IdentitySet {
    pub fn user_name(&self) -> Option<&str> {
        self.user.as_ref().and_then(Identity::name)
    }

    /// First non-blank display name among user, application, device.
    pub fn display_name(&self) -> Option<&str> {
        [&self.user, &self.application, &self.device]
            .into_iter()
            .flatten()
            .find_map(Identity::name)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub display_name: Option<String>,
}

impl Identity {
    fn name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    pub content: Option<String>,
}

/// Member as listed by `/chats/{id}/members` or `$expand=members`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMember {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MemberList {
    #[serde(default)]
    pub value: Vec<ConversationMember>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatWithMembers {
    #[serde(default)]
    pub members: Vec<ConversationMember>,
}

/// A chat participant, for report metadata only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub display_name: String,
    pub email: Option<String>,
}

impl Participant {
    pub fn email_or_unknown(&self) -> &str {
        self.email.as_deref().unwrap_or("unknown")
    }
}
