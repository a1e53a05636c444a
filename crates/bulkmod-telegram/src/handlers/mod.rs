//! Telegram update handlers.
//!
//! Every message first feeds the member directory, since that is the only
//! way the bot learns who is in a group. Commands go to [`commands`], other
//! text may get a chatbot reply.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use bulkmod_core::domain::{ChatId, MessageId, UserId};

use crate::directory::MemberDirectory;
use crate::router::AppState;

mod chatbot;
mod commands;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    observe(&state.directory, &msg);

    let Some(text) = msg.text() else {
        return Ok(());
    };
    if text.starts_with('/') {
        return commands::handle_command(bot, msg, state).await;
    }
    chatbot::handle_chat(bot, msg, state).await
}

fn observe(dir: &MemberDirectory, msg: &Message) {
    if !(msg.chat.is_group() || msg.chat.is_supergroup()) {
        return;
    }
    let chat = ChatId(msg.chat.id.0);

    dir.observe_message(chat, MessageId(msg.id.0));

    // Messages sent on behalf of a channel or an anonymous admin carry no real member.
    if msg.sender_chat().is_none() {
        if let Some(user) = msg.from() {
            dir.observe_member(chat, UserId(user.id.0 as i64));
        }
    }
    if let Some(joined) = msg.new_chat_members() {
        for user in joined {
            dir.observe_member(chat, UserId(user.id.0 as i64));
        }
    }
    if let Some(left) = msg.left_chat_member() {
        dir.forget_member(chat, UserId(left.id.0 as i64));
    }
}
