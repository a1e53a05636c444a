use std::{fmt, time::Duration};

use serde_json::json;

use crate::{
    config::OperationSettings,
    domain::{ChatId, MessageRef, UserId},
};

/// Upper bound on per-target failure details kept in a result.
pub const MAX_FAILURE_DETAILS: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Ban,
    Kick,
    Mute,
    Unmute,
    PurgeBots,
}

impl OperationKind {
    /// Name used for the operation log entry.
    pub fn operation_name(self) -> &'static str {
        match self {
            OperationKind::Ban => "BAN_ALL",
            OperationKind::Kick => "KICK_ALL",
            OperationKind::Mute => "MUTE_ALL",
            OperationKind::Unmute => "UNMUTE_ALL",
            OperationKind::PurgeBots => "BOT_PURGE",
        }
    }

    /// Name used for each successful per-member action.
    pub fn action_name(self) -> &'static str {
        match self {
            OperationKind::Ban => "MEMBER_BANNED",
            OperationKind::Kick => "MEMBER_KICKED",
            OperationKind::Mute => "MEMBER_MUTED",
            OperationKind::Unmute => "MEMBER_UNMUTED",
            OperationKind::PurgeBots => "BOT_PURGED",
        }
    }

    /// Stats key for the succeeded count.
    pub fn outcome_key(self) -> &'static str {
        match self {
            OperationKind::Ban => "banned",
            OperationKind::Kick => "kicked",
            OperationKind::Mute => "muted",
            OperationKind::Unmute => "unmuted",
            OperationKind::PurgeBots => "bots_removed",
        }
    }

    /// Only ban and kick may be followed by leaving the group.
    pub fn auto_leaves(self, settings: &OperationSettings) -> bool {
        match self {
            OperationKind::Ban => settings.auto_leave_after_ban,
            OperationKind::Kick => settings.auto_leave_after_kick,
            _ => false,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Ban => "ban",
            OperationKind::Kick => "kick",
            OperationKind::Mute => "mute",
            OperationKind::Unmute => "unmute",
            OperationKind::PurgeBots => "purge-bots",
        };
        f.write_str(s)
    }
}

/// One incoming bulk command.
#[derive(Clone, Debug)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub group_id: ChatId,
    pub requested_by: UserId,
    pub concurrency: usize,
    pub action_delay: Duration,
    pub max_retry_wait: Duration,
    /// The triggering command, deleted after authorization when enabled.
    pub command_message: Option<MessageRef>,
}

impl OperationRequest {
    pub fn new(
        kind: OperationKind,
        group_id: ChatId,
        requested_by: UserId,
        settings: &OperationSettings,
    ) -> Self {
        // Bots are purged at half the pace.
        let action_delay = match kind {
            OperationKind::PurgeBots => settings.operation_delay * 2,
            _ => settings.operation_delay,
        };
        Self {
            kind,
            group_id,
            requested_by,
            concurrency: settings.max_concurrent_operations.max(1),
            action_delay,
            max_retry_wait: settings.flood_wait_threshold,
            command_message: None,
        }
    }

    pub fn with_command_message(mut self, msg: MessageRef) -> Self {
        self.command_message = Some(msg);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetFailure {
    pub user_id: UserId,
    pub reason: String,
}

/// Settled tally of one dispatch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperationResult {
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
    /// First [`MAX_FAILURE_DETAILS`] failures only.
    pub failures: Vec<TargetFailure>,
}

impl OperationResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, user_id: UserId, reason: impl Into<String>) {
        self.failed += 1;
        if self.failures.len() < MAX_FAILURE_DETAILS {
            self.failures.push(TargetFailure {
                user_id,
                reason: reason.into(),
            });
        }
    }

    pub fn is_settled(&self) -> bool {
        self.succeeded + self.failed == self.total
    }
}

/// Why members were (not) selected; observability only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterBreakdown {
    pub total: usize,
    pub admins: usize,
    pub own: usize,
    pub protected: usize,
    pub deleted: usize,
    pub bots: usize,
    /// Non-bot members left alone by a bot purge.
    pub humans: usize,
    pub actionable: usize,
}

impl FilterBreakdown {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "total_members": self.total,
            "actionable": self.actionable,
            "protected": self.protected,
            "admins": self.admins,
            "own": self.own,
            "deleted": self.deleted,
            "bots": self.bots,
            "humans": self.humans,
        })
    }
}

/// Everything a caller learns about a finished run.
#[derive(Clone, Debug)]
pub struct OperationReport {
    pub kind: OperationKind,
    pub group_id: ChatId,
    pub result: OperationResult,
    pub breakdown: FilterBreakdown,
    /// Set for nuke runs: how many recent messages were removed.
    pub messages_deleted: Option<usize>,
}

impl OperationReport {
    pub fn stats(&self) -> OperationStats {
        OperationStats {
            kind: self.kind,
            succeeded: self.result.succeeded,
            failed: self.result.failed,
            total_processed: self.result.total,
            messages_deleted: self.messages_deleted,
        }
    }
}

/// Counts handed to the report sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperationStats {
    pub kind: OperationKind,
    pub succeeded: usize,
    pub failed: usize,
    pub total_processed: usize,
    pub messages_deleted: Option<usize>,
}

impl OperationStats {
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert(self.kind.outcome_key().to_string(), json!(self.succeeded));
        obj.insert("failed".to_string(), json!(self.failed));
        obj.insert("total_processed".to_string(), json!(self.total_processed));
        if let Some(n) = self.messages_deleted {
            obj.insert("messages_deleted".to_string(), json!(n));
        }
        serde_json::Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_details_are_bounded_but_counted() {
        let mut r = OperationResult {
            total: MAX_FAILURE_DETAILS + 5,
            ..OperationResult::default()
        };
        for i in 0..(MAX_FAILURE_DETAILS + 5) {
            r.record_failure(UserId(i as i64), "nope");
        }
        assert_eq!(r.failed, MAX_FAILURE_DETAILS + 5);
        assert_eq!(r.failures.len(), MAX_FAILURE_DETAILS);
        assert!(r.is_settled());
    }

    #[test]
    fn purge_bots_runs_at_double_delay() {
        let settings = OperationSettings::default();
        let ban = OperationRequest::new(OperationKind::Ban, ChatId(-1), UserId(1), &settings);
        let purge =
            OperationRequest::new(OperationKind::PurgeBots, ChatId(-1), UserId(1), &settings);
        assert_eq!(purge.action_delay, ban.action_delay * 2);
    }

    #[test]
    fn stats_json_uses_kind_specific_key() {
        let stats = OperationStats {
            kind: OperationKind::Kick,
            succeeded: 3,
            failed: 1,
            total_processed: 4,
            messages_deleted: None,
        };
        let v = stats.to_json();
        assert_eq!(v["kicked"], 3);
        assert_eq!(v["failed"], 1);
        assert!(v.get("messages_deleted").is_none());
    }
}
