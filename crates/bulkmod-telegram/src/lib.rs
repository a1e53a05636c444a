//! Telegram adapter (teloxide).
//!
//! This crate implements the `bulkmod-core` PlatformClient over the Telegram
//! Bot API, plus the update router and command handlers.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{ChatMember, ChatMemberKind, ChatPermissions},
    RequestError,
};

pub mod directory;
pub mod handlers;
pub mod progress;
pub mod router;

use bulkmod_core::{
    domain::{AdminRights, ChatId, Member, MemberRole, MessageId, MessageRef, PermissionSet, UserId},
    errors::Error,
    moderation::RetryPolicy,
    ports::PlatformClient,
    Result,
};

use crate::directory::MemberDirectory;

#[derive(Clone)]
pub struct TelegramPlatform {
    bot: Bot,
    directory: Arc<MemberDirectory>,
    lookup_retry: RetryPolicy,
}

impl TelegramPlatform {
    pub fn new(bot: Bot, directory: Arc<MemberDirectory>, lookup_retry: RetryPolicy) -> Self {
        Self {
            bot,
            directory,
            lookup_retry,
        }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_user(user: UserId) -> teloxide::types::UserId {
        teloxide::types::UserId(user.0 as u64)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    /// Current membership of `user`, `None` when they left or are banned.
    async fn lookup(&self, group: ChatId, user: UserId) -> Result<Option<Member>> {
        let cm = self
            .bot
            .get_chat_member(Self::tg_chat(group), Self::tg_user(user))
            .await
            .map_err(map_err)?;
        Ok(member_from_chat_member(&cm))
    }
}

/// Telegram flood control becomes [`Error::RateLimited`] so the engine can back off.
pub fn map_err(e: RequestError) -> Error {
    match e {
        RequestError::RetryAfter(wait) => Error::RateLimited(wait),
        other => Error::External(format!("telegram error: {other}")),
    }
}

pub fn chat_permissions(p: PermissionSet) -> ChatPermissions {
    let mut out = ChatPermissions::empty();
    let flags = [
        (p.send_messages, ChatPermissions::SEND_MESSAGES),
        (p.send_media, ChatPermissions::SEND_MEDIA_MESSAGES),
        (p.send_other, ChatPermissions::SEND_OTHER_MESSAGES),
        (p.add_web_page_previews, ChatPermissions::ADD_WEB_PAGE_PREVIEWS),
        (p.send_polls, ChatPermissions::SEND_POLLS),
        (p.change_info, ChatPermissions::CHANGE_INFO),
        (p.invite_users, ChatPermissions::INVITE_USERS),
        (p.pin_messages, ChatPermissions::PIN_MESSAGES),
    ];
    for (on, flag) in flags {
        if on {
            out |= flag;
        }
    }
    out
}

/// Deleted accounts keep their id but lose their name.
pub fn is_deleted_account(first_name: &str, username: Option<&str>) -> bool {
    first_name.trim().is_empty() || (first_name == "Deleted Account" && username.is_none())
}

/// Merge `admins` with every user the directory tracks in `group`.
///
/// `lookup` yields `None` for users who left or are banned; those are dropped
/// from the directory. A lookup error fails the whole snapshot.
async fn merge_snapshot<F, Fut>(
    group: ChatId,
    admins: Vec<Member>,
    directory: &MemberDirectory,
    mut lookup: F,
) -> Result<Vec<Member>>
where
    F: FnMut(UserId) -> Fut,
    Fut: Future<Output = Result<Option<Member>>>,
{
    let mut members = admins;
    for user in directory.known_members(group) {
        if members.iter().any(|m| m.user_id == user) {
            continue;
        }
        match lookup(user).await {
            Ok(Some(m)) => members.push(m),
            Ok(None) => directory.forget_member(group, user),
            Err(e) => {
                tracing::warn!(group = %group, user = %user, error = %e, "member lookup failed");
                return Err(e);
            }
        }
    }
    Ok(members)
}

fn member_from_chat_member(cm: &ChatMember) -> Option<Member> {
    let (role, rights) = match &cm.kind {
        ChatMemberKind::Owner(_) => (MemberRole::Owner, AdminRights::all()),
        ChatMemberKind::Administrator(a) => (
            MemberRole::Administrator,
            AdminRights {
                can_restrict_members: a.can_restrict_members,
                can_delete_messages: a.can_delete_messages,
            },
        ),
        ChatMemberKind::Member => (MemberRole::Member, AdminRights::default()),
        ChatMemberKind::Restricted(r) if r.is_member => (MemberRole::Member, AdminRights::default()),
        _ => return None,
    };
    Some(Member {
        user_id: UserId(cm.user.id.0 as i64),
        role,
        is_bot: cm.user.is_bot,
        is_deleted: is_deleted_account(&cm.user.first_name, cm.user.username.as_deref()),
        rights,
    })
}

#[async_trait]
impl PlatformClient for TelegramPlatform {
    /// Administrators plus every observed user who is still in the group.
    async fn fetch_members(&self, group: ChatId) -> Result<Vec<Member>> {
        let admins = self
            .bot
            .get_chat_administrators(Self::tg_chat(group))
            .await
            .map_err(map_err)?;
        let admins = admins.iter().filter_map(member_from_chat_member).collect();

        let members = merge_snapshot(group, admins, &self.directory, |user| {
            self.lookup_retry.run(move || self.lookup(group, user))
        })
        .await?;

        tracing::debug!(group = %group, count = members.len(), "members fetched");
        Ok(members)
    }

    async fn fetch_member(&self, group: ChatId, user: UserId) -> Result<Member> {
        Ok(self
            .lookup(group, user)
            .await?
            .unwrap_or_else(|| Member::regular(user)))
    }

    async fn ban_member(&self, group: ChatId, user: UserId) -> Result<()> {
        self.bot
            .ban_chat_member(Self::tg_chat(group), Self::tg_user(user))
            .await
            .map_err(map_err)?;
        self.directory.forget_member(group, user);
        Ok(())
    }

    async fn unban_member(&self, group: ChatId, user: UserId) -> Result<()> {
        // Without only_if_banned, unbanning a present member removes them.
        self.bot
            .unban_chat_member(Self::tg_chat(group), Self::tg_user(user))
            .only_if_banned(true)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn restrict_member(
        &self,
        group: ChatId,
        user: UserId,
        permissions: PermissionSet,
    ) -> Result<()> {
        self.bot
            .restrict_chat_member(
                Self::tg_chat(group),
                Self::tg_user(user),
                chat_permissions(permissions),
            )
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn self_identity(&self) -> Result<Member> {
        let me = self.bot.get_me().await.map_err(map_err)?;
        Ok(Member {
            is_bot: true,
            ..Member::regular(UserId(me.user.id.0 as i64))
        })
    }

    async fn leave_group(&self, group: ChatId) -> Result<()> {
        self.bot
            .leave_chat(Self::tg_chat(group))
            .await
            .map_err(map_err)?;
        self.directory.forget_chat(group);
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.bot
            .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
            .await
            .map_err(map_err)?;
        self.directory.forget_message(msg);
        Ok(())
    }

    async fn fetch_recent_messages(&self, group: ChatId, limit: usize) -> Result<Vec<MessageRef>> {
        Ok(self.directory.recent_messages(group, limit))
    }
}
