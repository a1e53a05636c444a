use std::{future::IntoFuture, sync::Arc, time::Duration};

use teloxide::{prelude::*, types::ParseMode};

use bulkmod_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    formatting::{
        escape_html, render_abort, render_nuke_warning, render_recent_actions, render_stats,
        render_unban_notice,
    },
    moderation::OperationKind,
    ports::ReportSink,
    utils::best_effort,
    Error,
};

use crate::progress::StatusMessage;
use crate::router::AppState;

const RECENT_LOG_LINES: usize = 10;
const NUKE_COUNTDOWN: Duration = Duration::from_secs(5);

const OPERATOR_START: &str = "🔥 <b>Bulk moderation bot ready</b>\n\n\
⚡ Mass ban, kick, mute and bot purge\n\
🚪 Optional auto-leave after operations\n\
🕶 Stealth mode keeps the chat quiet\n\
🛡 Admins, operators and protected users are never touched\n\n\
Use /help for the command list.";

const OPERATOR_HELP: &str = "🔥 <b>Commands</b>\n\n\
<b>Bulk actions</b> (groups only)\n\
/banall - Ban all members, then leave\n\
/kickall - Kick all members, then leave\n\
/nukeall - Ban all, wipe recent messages, then leave\n\
/muteall - Mute all non-admin members\n\
/unmuteall - Restore default permissions\n\
/kickbots - Remove all bots\n\
/unbanall - Why bulk unban is not possible\n\
/cancel - Stop the running bulk action\n\n\
<b>Management</b>\n\
/stats - Bot statistics\n\
/logs - Recent actions\n\
/clearcache - Forget cached member lists";

const REGULAR_START: &str = "👋 <b>Hello! I'm ChatMate!</b> 🤖\n\n\
I'm here to make your chats more fun. Just talk to me normally!\n\n\
✨ Let's chat and have fun together! ✨";

const REGULAR_HELP: &str = "👋 <b>ChatMate help</b> 🤖\n\n\
/start - Get a welcome message\n\
/help - Show this help\n\n\
💬 Message me privately, mention me or reply to me in a group and I'll answer.";

pub(crate) fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Whether `/cmd@name` is meant for another bot.
pub(crate) fn addressed_elsewhere(text: &str, bot_username: Option<&str>) -> bool {
    let first = text.split_whitespace().next().unwrap_or("");
    match (first.split_once('@'), bot_username) {
        (Some((_, target)), Some(me)) => !target.eq_ignore_ascii_case(me),
        _ => false,
    }
}

/// Bulk command → (kind, nuke).
pub(crate) fn bulk_command(cmd: &str) -> Option<(OperationKind, bool)> {
    match cmd {
        "banall" => Some((OperationKind::Ban, false)),
        "kickall" => Some((OperationKind::Kick, false)),
        "muteall" => Some((OperationKind::Mute, false)),
        "unmuteall" => Some((OperationKind::Unmute, false)),
        "kickbots" => Some((OperationKind::PurgeBots, false)),
        "nukeall" => Some((OperationKind::Ban, true)),
        _ => None,
    }
}

async fn reply_html(bot: &Bot, msg: &Message, html: impl Into<String>) {
    best_effort(
        "reply",
        bot.send_message(msg.chat.id, html.into())
            .parse_mode(ParseMode::Html)
            .into_future(),
    )
    .await;
}

async fn delete_command(bot: &Bot, state: &AppState, msg: &Message) {
    if state.moderator.settings().delete_commands {
        best_effort(
            "delete command",
            bot.delete_message(msg.chat.id, msg.id).into_future(),
        )
        .await;
    }
}

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if addressed_elsewhere(text, state.bot_username.as_deref()) {
        return Ok(());
    }

    let user_id = UserId(user.id.0 as i64);
    let chat = ChatId(msg.chat.id.0);
    let is_operator = state.is_operator(user_id);
    let in_group = msg.chat.is_group() || msg.chat.is_supergroup();
    let stealth = state.moderator.settings().stealth_mode;

    let (cmd, _arg) = parse_command(text);

    if let Some((kind, nuke)) = bulk_command(&cmd) {
        if !in_group {
            reply_html(&bot, &msg, "This command only works in groups.").await;
            return Ok(());
        }
        start_bulk(bot, &msg, state, kind, nuke, user_id).await;
        return Ok(());
    }

    match cmd.as_str() {
        "start" | "help" => {
            let text = match (is_operator, cmd.as_str()) {
                (true, "start") => OPERATOR_START,
                (true, _) => OPERATOR_HELP,
                (false, "start") => REGULAR_START,
                (false, _) => REGULAR_HELP,
            };
            if is_operator {
                delete_command(&bot, &state, &msg).await;
            }
            reply_html(&bot, &msg, text).await;
            let name = format!("{}_COMMAND", cmd.to_uppercase());
            state.reports.record_action(&name, chat, Some(user_id), None);
            Ok(())
        }

        "stats" if is_operator => {
            let body = match state.reports.stats() {
                Ok(stats) => render_stats(
                    &stats,
                    state.started_at.elapsed(),
                    state.moderator.settings().batch_size,
                ),
                Err(e) => {
                    tracing::warn!(error = %e, "stats unavailable");
                    "📊 Stats not available.".to_string()
                }
            };
            reply_html(&bot, &msg, body).await;
            Ok(())
        }

        "logs" if is_operator => {
            let body = match state.reports.recent_actions(RECENT_LOG_LINES) {
                Ok(lines) => render_recent_actions(&lines),
                Err(e) => format!("📝 Logs not available: {}", escape_html(&e.to_string())),
            };
            reply_html(&bot, &msg, body).await;
            state
                .reports
                .record_action("LOGS_COMMAND", chat, Some(user_id), None);
            Ok(())
        }

        "clearcache" if is_operator => {
            state.moderator.cache().invalidate_all().await;
            delete_command(&bot, &state, &msg).await;
            if !stealth {
                reply_html(&bot, &msg, "🧹 Member cache cleared.").await;
            }
            Ok(())
        }

        "unbanall" if in_group => {
            if !is_operator {
                reply_html(&bot, &msg, render_abort(OperationKind::Ban, &Error::AccessDenied))
                    .await;
                return Ok(());
            }
            delete_command(&bot, &state, &msg).await;
            reply_html(&bot, &msg, render_unban_notice()).await;
            Ok(())
        }

        "cancel" if is_operator && in_group => {
            delete_command(&bot, &state, &msg).await;
            let found = state.operations.cancel(chat).await;
            if !stealth {
                let body = if found {
                    "⏹ Cancelling. Members not yet processed are skipped."
                } else {
                    "Nothing is running here."
                };
                reply_html(&bot, &msg, body).await;
            }
            Ok(())
        }

        // Operator-only commands stay silent for everyone else.
        _ => Ok(()),
    }
}

/// Runs the bulk action in its own task so `/cancel` in the same chat is
/// still processed while it runs.
async fn start_bulk(
    bot: Bot,
    msg: &Message,
    state: Arc<AppState>,
    kind: OperationKind,
    nuke: bool,
    by: UserId,
) {
    let group = ChatId(msg.chat.id.0);
    let settings = state.moderator.settings();
    let stealth = settings.stealth_mode;

    let Some(cancel) = state.operations.begin(group).await else {
        if state.is_operator(by) {
            reply_html(
                &bot,
                msg,
                "⏳ A bulk action is already running here. Use /cancel to stop it.",
            )
            .await;
        }
        return;
    };

    let req = state
        .moderator
        .request(kind, group, by)
        .with_command_message(MessageRef {
            chat_id: group,
            message_id: MessageId(msg.id.0),
        });
    let chat = msg.chat.id;

    tokio::spawn(async move {
        let progress = StatusMessage::new(bot.clone(), chat, stealth);
        let outcome = if nuke {
            if !stealth && state.is_operator(by) {
                best_effort(
                    "nuke warning",
                    bot.send_message(chat, render_nuke_warning())
                        .parse_mode(ParseMode::Html)
                        .into_future(),
                )
                .await;
                tokio::time::sleep(NUKE_COUNTDOWN).await;
            }
            state.moderator.nuke(&req, &progress, cancel).await
        } else {
            state
                .moderator
                .run_until_cancelled(&req, &progress, cancel)
                .await
        };
        state.operations.finish(group).await;

        if let Err(e) = outcome {
            tracing::info!(group = %group, operation = %kind, error = %e, "bulk command rejected");
        }
    });
}
