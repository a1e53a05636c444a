//! User-facing text for Telegram HTML parse mode.

use std::time::Duration;

use crate::{
    moderation::types::{OperationKind, OperationReport},
    report::Stats,
    Error,
};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn past_tense(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Ban => "Banned",
        OperationKind::Kick => "Kicked",
        OperationKind::Mute => "Muted",
        OperationKind::Unmute => "Unmuted",
        OperationKind::PurgeBots => "Bots removed",
    }
}

fn title(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Ban => "BAN-ALL",
        OperationKind::Kick => "KICK-ALL",
        OperationKind::Mute => "MUTE-ALL",
        OperationKind::Unmute => "UNMUTE-ALL",
        OperationKind::PurgeBots => "BOT PURGE",
    }
}

pub fn render_started(kind: OperationKind) -> String {
    format!("⚡ <b>{} started</b>\n\nFetching targets...", title(kind))
}

pub fn render_targets(kind: OperationKind, count: usize) -> String {
    if count == 0 {
        let why = match kind {
            OperationKind::PurgeBots => "No removable bots in this group.",
            _ => "All members are protected, admins or bots.",
        };
        return format!("ℹ️ <b>No targets.</b> {why}");
    }
    format!("🔥 <b>{}</b>: processing {count} targets...", title(kind))
}

/// Final summary of one run. Failure details are never listed per member.
pub fn render_operation_summary(report: &OperationReport, departing: bool) -> String {
    let r = &report.result;
    let mut out = format!(
        "✅ <b>{} completed</b>\n\n<b>{}:</b> {}\n<b>Failed:</b> {}\n<b>Total processed:</b> {}",
        title(report.kind),
        past_tense(report.kind),
        r.succeeded,
        r.failed,
        r.total
    );
    if let Some(n) = report.messages_deleted {
        out.push_str(&format!("\n<b>Messages deleted:</b> {n}"));
    }
    let skipped = report.breakdown.total.saturating_sub(report.breakdown.actionable);
    if skipped > 0 {
        let who = match report.kind {
            OperationKind::PurgeBots => "human, protected or admin",
            _ => "protected, admin or bot",
        };
        out.push_str(&format!("\n<i>Skipped {skipped} {who} members.</i>"));
    }
    if departing {
        out.push_str("\n\n🚪 Leaving chat in a few seconds...");
    }
    out
}

pub fn render_abort(kind: OperationKind, error: &Error) -> String {
    let reason = match error {
        Error::AccessDenied => "Only operators can use this command.".to_string(),
        Error::PermissionMissing(_) => {
            "I need admin rights with permission to restrict members.".to_string()
        }
        Error::FetchFailure(_) => "Could not fetch group members.".to_string(),
        other => escape_html(&other.to_string()),
    };
    format!("❌ <b>{} aborted.</b> {reason}", title(kind))
}

pub fn render_nuke_warning() -> String {
    "⚠️ <b>NUKE MODE ACTIVATED</b>\nEveryone is banned and recent history wiped in 5 seconds.".to_string()
}

pub fn render_unban_notice() -> String {
    "ℹ️ <b>Unban-all notice</b>\n\n\
     Telegram does not let bots list banned members, so they cannot be unbanned in bulk.\n\
     Unban specific users from the group settings or by their user id."
        .to_string()
}

pub fn format_uptime(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

pub fn render_stats(stats: &Stats, uptime: Duration, batch_size: usize) -> String {
    let last = stats.last_operation.as_deref().unwrap_or("never");
    format!(
        "📊 <b>Bot statistics</b>\n\n\
         • Total operations: <code>{}</code>\n\
         • Members banned: <code>{}</code>\n\
         • Members kicked: <code>{}</code>\n\
         • Members muted: <code>{}</code>\n\
         • Members unmuted: <code>{}</code>\n\
         • Bots removed: <code>{}</code>\n\
         • Groups processed: <code>{}</code>\n\n\
         • Uptime: <code>{}</code>\n\
         • Batch size: <code>{batch_size}</code>\n\
         • Last operation: <code>{}</code>",
        stats.total_operations,
        stats.total_banned,
        stats.total_kicked,
        stats.total_muted,
        stats.total_unmuted,
        stats.total_bots_removed,
        stats.groups_processed,
        format_uptime(uptime),
        escape_html(last),
    )
}

pub fn render_recent_actions(lines: &[String]) -> String {
    let mut out = String::from("📜 <b>Recent actions</b>\n\n");
    if lines.is_empty() {
        out.push_str("No recent actions logged.");
        return out;
    }
    for line in lines {
        out.push_str(&format!("<code>{}</code>\n", escape_html(line.trim())));
    }
    out
}
