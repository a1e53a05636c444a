use std::sync::Arc;

use serde_json::json;
use teloxide::prelude::*;

use bulkmod_core::{
    domain::{ChatId, UserId},
    ports::ReportSink,
    utils::truncate_text,
};

use crate::router::AppState;

const PREVIEW_LEN: usize = 50;

/// In groups the bot only answers when spoken to.
pub(crate) fn addressed_to_bot(
    is_private: bool,
    text: &str,
    replied_to: Option<&str>,
    bot_username: Option<&str>,
) -> bool {
    if is_private {
        return true;
    }
    let Some(me) = bot_username else {
        return false;
    };
    if replied_to.is_some_and(|u| u.eq_ignore_ascii_case(me)) {
        return true;
    }
    let mention = format!("@{}", me.to_lowercase());
    text.to_lowercase().contains(&mention)
}

pub async fn handle_chat(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(chatbot) = state.chatbot.clone() else {
        return Ok(());
    };
    let (Some(user), Some(text)) = (msg.from(), msg.text()) else {
        return Ok(());
    };
    if user.is_bot {
        return Ok(());
    }

    let replied_to = msg
        .reply_to_message()
        .and_then(|m| m.from())
        .and_then(|u| u.username.as_deref());
    if !addressed_to_bot(
        msg.chat.is_private(),
        text,
        replied_to,
        state.bot_username.as_deref(),
    ) {
        return Ok(());
    }

    let user_id = UserId(user.id.0 as i64);
    let chat = ChatId(msg.chat.id.0);
    let name = user
        .username
        .clone()
        .unwrap_or_else(|| user.first_name.clone());

    state.reports.record_action(
        "CHATBOT_MESSAGE_RECEIVED",
        chat,
        Some(user_id),
        Some(json!({ "text_preview": truncate_text(text, PREVIEW_LEN) })),
    );

    let Some(answer) = chatbot.reply(user_id, &name, text).await else {
        return Ok(());
    };

    bot.send_message(msg.chat.id, answer.as_str())
        .reply_to_message_id(msg.id)
        .await?;

    state.reports.record_action(
        "CHATBOT_RESPONSE_SENT",
        chat,
        Some(user_id),
        Some(json!({ "response_preview": truncate_text(&answer, PREVIEW_LEN) })),
    );
    Ok(())
}
