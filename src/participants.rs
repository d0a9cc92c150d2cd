use crate::graph::{FetchError, GraphClient, Transport};
use crate::model::{
    ChatMessage, ChatWithMembers, ConversationMember, IdentitySet, MemberList, MessagePage,
    Participant,
};
use std::collections::HashSet;
use tracing::{info, warn};

/// Substituted in the report when no strategy produced a name.
pub const UNKNOWN_PARTICIPANTS: &str = "Unknown Participants";
const SENDER_SCAN_LIMIT: usize = 50;

/// Ways of finding out who is in a chat, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `GET /chats/{id}/members`
    Members,
    /// `GET /chats/{id}?$expand=members`
    ExpandedChat,
    /// Distinct sender names among the most recent messages.
    MessageSenders,
}

impl Strategy {
    pub const ORDER: [Strategy; 3] = [
        Strategy::Members,
        Strategy::ExpandedChat,
        Strategy::MessageSenders,
    ];

    fn run<T: Transport>(
        self,
        client: &GraphClient<T>,
        chat_id: &str,
    ) -> Result<Vec<Participant>, FetchError> {
        match self {
            Strategy::Members => {
                let list: MemberList = client.get_json(&client.members_url(chat_id))?;
                Ok(from_members(list.value))
            }
            Strategy::ExpandedChat => {
                let chat: ChatWithMembers = client.get_json(&client.expanded_chat_url(chat_id))?;
                Ok(from_members(chat.members))
            }
            Strategy::MessageSenders => {
                let page: MessagePage =
                    client.get_json(&client.messages_url(chat_id, SENDER_SCAN_LIMIT))?;
                Ok(from_senders(&page.value))
            }
        }
    }
}

/// Resolve the chat's participants.
///
/// Strategies run in [`Strategy::ORDER`] until one yields a non-empty list.
/// A 401 from any of them is returned immediately. Every other failure falls
/// through to the next strategy, and an empty result means "unknown".
pub fn resolve<T: Transport>(
    client: &GraphClient<T>,
    chat_id: &str,
) -> Result<Vec<Participant>, FetchError> {
    for strategy in Strategy::ORDER {
        match strategy.run(client, chat_id) {
            Ok(found) if !found.is_empty() => {
                info!(?strategy, count = found.len(), "resolved participants");
                return Ok(found);
            }
            Ok(_) => info!(?strategy, "no participants found"),
            Err(FetchError::Unauthorized) => return Err(FetchError::Unauthorized),
            Err(FetchError::Status { status: 403, .. }) => {
                warn!(?strategy, "insufficient permissions for participants")
            }
            Err(e) => warn!(?strategy, error = %e, "participant lookup failed"),
        }
    }
    Ok(Vec::new())
}

/// Names for the report, or the placeholder when nothing was resolved.
pub fn display_names(participants: &[Participant]) -> Vec<String> {
    if participants.is_empty() {
        vec![UNKNOWN_PARTICIPANTS.to_string()]
    } else {
        participants.iter().map(|p| p.display_name.clone()).collect()
    }
}

fn from_members(members: Vec<ConversationMember>) -> Vec<Participant> {
    members
        .into_iter()
        .filter_map(|m| {
            let name = m.display_name.filter(|n| !n.trim().is_empty())?;
            Some(Participant {
                display_name: name,
                email: m.email.filter(|e| !e.trim().is_empty()),
            })
        })
        .collect()
}

fn from_senders(messages: &[serde_json::Value]) -> Vec<Participant> {
    let mut seen = HashSet::new();
    messages
        .iter()
        .filter_map(|raw| {
            let msg = ChatMessage::view(raw);
            msg.from
                .as_ref()
                .and_then(IdentitySet::user_name)
                .map(str::to_string)
        })
        .filter(|name| seen.insert(name.clone()))
        .map(|display_name| Participant {
            display_name,
            email: None,
        })
        .collect()
}
