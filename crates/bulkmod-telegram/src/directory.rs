//! Members and messages the bot has seen, per chat.
//!
//! The Bot API cannot list group members or read history, so everything the
//! engine may act on has to be observed from incoming updates first.

use std::{
    collections::{BTreeSet, HashMap, VecDeque},
    sync::Mutex,
};

use bulkmod_core::domain::{ChatId, MessageId, MessageRef, UserId};

/// Recent message ids kept per chat.
pub const RECENT_MESSAGES_CAP: usize = 200;

#[derive(Default)]
struct ChatRecord {
    users: BTreeSet<UserId>,
    recent: VecDeque<MessageId>,
}

#[derive(Default)]
pub struct MemberDirectory {
    chats: Mutex<HashMap<ChatId, ChatRecord>>,
}

impl MemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_chat<T>(&self, chat: ChatId, f: impl FnOnce(&mut ChatRecord) -> T) -> T {
        let mut chats = self.chats.lock().unwrap_or_else(|p| p.into_inner());
        f(chats.entry(chat).or_default())
    }

    pub fn observe_member(&self, chat: ChatId, user: UserId) {
        self.with_chat(chat, |c| {
            c.users.insert(user);
        });
    }

    pub fn forget_member(&self, chat: ChatId, user: UserId) {
        self.with_chat(chat, |c| {
            c.users.remove(&user);
        });
    }

    pub fn observe_message(&self, chat: ChatId, id: MessageId) {
        self.with_chat(chat, |c| {
            if c.recent.back() == Some(&id) {
                return;
            }
            c.recent.push_back(id);
            while c.recent.len() > RECENT_MESSAGES_CAP {
                c.recent.pop_front();
            }
        });
    }

    pub fn forget_message(&self, msg: MessageRef) {
        self.with_chat(msg.chat_id, |c| c.recent.retain(|m| *m != msg.message_id));
    }

    /// Drop everything known about `chat` (after leaving it).
    pub fn forget_chat(&self, chat: ChatId) {
        let mut chats = self.chats.lock().unwrap_or_else(|p| p.into_inner());
        chats.remove(&chat);
    }

    /// Tracked users of `chat`, in id order.
    pub fn known_members(&self, chat: ChatId) -> Vec<UserId> {
        self.with_chat(chat, |c| c.users.iter().copied().collect())
    }

    /// Newest first, at most `limit`.
    pub fn recent_messages(&self, chat: ChatId, limit: usize) -> Vec<MessageRef> {
        self.with_chat(chat, |c| {
            c.recent
                .iter()
                .rev()
                .take(limit)
                .map(|&message_id| MessageRef {
                    chat_id: chat,
                    message_id,
                })
                .collect()
        })
    }

    pub fn tracked_chats(&self) -> usize {
        self.chats.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}
