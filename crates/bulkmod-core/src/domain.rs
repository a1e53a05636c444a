use std::fmt;

use serde::{Deserialize, Serialize};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric). Groups are chats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberRole {
    Owner,
    Administrator,
    Member,
}

impl MemberRole {
    pub fn is_privileged(self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Administrator)
    }
}

/// Administrative rights relevant to bulk actions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdminRights {
    pub can_restrict_members: bool,
    pub can_delete_messages: bool,
}

impl AdminRights {
    pub fn all() -> Self {
        Self {
            can_restrict_members: true,
            can_delete_messages: true,
        }
    }
}

/// Snapshot of one group member at fetch time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub user_id: UserId,
    pub role: MemberRole,
    pub is_bot: bool,
    pub is_deleted: bool,
    pub rights: AdminRights,
}

impl Member {
    /// Plain (non-admin, human, live) member.
    pub fn regular(user_id: UserId) -> Self {
        Self {
            user_id,
            role: MemberRole::Member,
            is_bot: false,
            is_deleted: false,
            rights: AdminRights::default(),
        }
    }
}

/// Chat permissions applied by a restrict call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermissionSet {
    pub send_messages: bool,
    pub send_media: bool,
    pub send_other: bool,
    pub add_web_page_previews: bool,
    pub send_polls: bool,
    pub change_info: bool,
    pub invite_users: bool,
    pub pin_messages: bool,
}

impl PermissionSet {
    /// Everything revoked (mute).
    pub const fn none() -> Self {
        Self {
            send_messages: false,
            send_media: false,
            send_other: false,
            add_web_page_previews: false,
            send_polls: false,
            change_info: false,
            invite_users: false,
            pin_messages: false,
        }
    }

    /// Regular member permissions (unmute). Info changes and pinning stay admin-only.
    pub const fn defaults() -> Self {
        Self {
            send_messages: true,
            send_media: true,
            send_other: true,
            add_web_page_previews: true,
            send_polls: true,
            change_info: false,
            invite_users: true,
            pin_messages: false,
        }
    }
}
