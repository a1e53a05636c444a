//! File-based action/operation log and cumulative stats.
//!
//! Layout under the log directory:
//! - `actions.log`: one line per action or finished operation
//! - `errors.log`: one line per recorded error
//! - `stats.json`: cumulative [`Stats`]

use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChatId, UserId},
    moderation::types::{OperationKind, OperationStats},
    ports::ReportSink,
    utils::iso_timestamp_utc,
    Result,
};

const ACTIONS_FILE: &str = "actions.log";
const ERRORS_FILE: &str = "errors.log";
const STATS_FILE: &str = "stats.json";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub total_operations: u64,
    pub total_banned: u64,
    pub total_kicked: u64,
    pub total_muted: u64,
    pub total_unmuted: u64,
    pub total_bots_removed: u64,
    pub groups_processed: u64,
    pub start_date: Option<String>,
    pub last_operation: Option<String>,
}

impl Stats {
    fn fresh() -> Self {
        Self {
            start_date: Some(iso_timestamp_utc()),
            ..Self::default()
        }
    }

    fn apply(&mut self, stats: &OperationStats) {
        let n = stats.succeeded as u64;
        self.total_operations += 1;
        self.groups_processed += 1;
        self.last_operation = Some(iso_timestamp_utc());
        match stats.kind {
            OperationKind::Ban => self.total_banned += n,
            OperationKind::Kick => self.total_kicked += n,
            OperationKind::Mute => self.total_muted += n,
            OperationKind::Unmute => self.total_unmuted += n,
            OperationKind::PurgeBots => self.total_bots_removed += n,
        }
    }
}

pub struct FileReportSink {
    dir: PathBuf,
    // Serializes read-modify-write of stats.json.
    stats_lock: Mutex<()>,
}

impl FileReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let sink = Self {
            dir,
            stats_lock: Mutex::new(()),
        };
        if !sink.path(STATS_FILE).exists() {
            sink.write_stats(&Stats::fresh())?;
        }
        Ok(sink)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stats(&self) -> Result<Stats> {
        let raw = fs::read_to_string(self.path(STATS_FILE))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Last `n` lines of the action log, oldest first.
    pub fn recent_actions(&self, n: usize) -> Result<Vec<String>> {
        let raw = match fs::read_to_string(self.path(ACTIONS_FILE)) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
        let skip = lines.len().saturating_sub(n);
        Ok(lines[skip..].iter().map(|l| l.to_string()).collect())
    }

    /// Remove both logs and reset the stats.
    pub fn clear(&self) -> Result<()> {
        for name in [ACTIONS_FILE, ERRORS_FILE] {
            match fs::remove_file(self.path(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        let _guard = self.stats_lock.lock().unwrap_or_else(|p| p.into_inner());
        self.write_stats(&Stats::fresh())
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn append(&self, name: &str, line: &str) {
        let res = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name))
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = res {
            tracing::warn!(file = name, error = %e, "failed to write report line");
        }
    }

    fn write_stats(&self, stats: &Stats) -> Result<()> {
        let body = serde_json::to_string_pretty(stats)?;
        fs::write(self.path(STATS_FILE), body)?;
        Ok(())
    }

    fn update_stats(&self, op: &OperationStats) -> Result<()> {
        let _guard = self.stats_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut stats = self.stats().unwrap_or_else(|_| Stats::fresh());
        stats.apply(op);
        self.write_stats(&stats)
    }
}

impl ReportSink for FileReportSink {
    fn record_action(
        &self,
        name: &str,
        group: ChatId,
        user: Option<UserId>,
        details: Option<serde_json::Value>,
    ) {
        let user = user.map(|u| u.to_string()).unwrap_or_else(|| "-".to_string());
        let mut line = format!(
            "[{}] ACTION: {name} | Chat: {group} | User: {user}",
            iso_timestamp_utc()
        );
        if let Some(d) = details {
            line.push_str(&format!(" | Details: {d}"));
        }
        self.append(ACTIONS_FILE, &line);
    }

    fn record_operation(&self, name: &str, group: ChatId, stats: &OperationStats) {
        let line = format!(
            "[{}] OPERATION: {name} | Chat: {group} | Stats: {}",
            iso_timestamp_utc(),
            stats.to_json()
        );
        self.append(ACTIONS_FILE, &line);

        if let Err(e) = self.update_stats(stats) {
            tracing::warn!(error = %e, "failed to update stats");
        }
    }

    fn record_error(&self, message: &str, context: Option<&str>) {
        let mut line = format!("[{}] ERROR: {message}", iso_timestamp_utc());
        if let Some(ctx) = context.filter(|c| !c.is_empty()) {
            line.push_str(&format!(" | Context: {ctx}"));
        }
        self.append(ERRORS_FILE, &line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tmp_dir(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_nanos();
        let pid = std::process::id();
        std::env::temp_dir().join(format!("{prefix}-{pid}-{ts}"))
    }

    fn op(kind: OperationKind, succeeded: usize) -> OperationStats {
        OperationStats {
            kind,
            succeeded,
            failed: 0,
            total_processed: succeeded,
            messages_deleted: None,
        }
    }

    #[test]
    fn new_sink_starts_with_fresh_stats() {
        let sink = FileReportSink::new(tmp_dir("bulkmod-report-fresh")).unwrap();
        let stats = sink.stats().unwrap();
        assert_eq!(stats.total_operations, 0);
        assert!(stats.start_date.is_some());
        assert!(stats.last_operation.is_none());
    }

    #[test]
    fn operations_accumulate_by_kind() {
        let sink = FileReportSink::new(tmp_dir("bulkmod-report-ops")).unwrap();
        sink.record_operation("BAN_ALL", ChatId(-1), &op(OperationKind::Ban, 5));
        sink.record_operation("KICK_ALL", ChatId(-2), &op(OperationKind::Kick, 3));
        sink.record_operation("BOT_PURGE", ChatId(-2), &op(OperationKind::PurgeBots, 2));

        let stats = sink.stats().unwrap();
        assert_eq!(stats.total_operations, 3);
        assert_eq!(stats.total_banned, 5);
        assert_eq!(stats.total_kicked, 3);
        assert_eq!(stats.total_bots_removed, 2);
        assert_eq!(stats.total_muted, 0);
        assert!(stats.last_operation.is_some());
    }

    #[test]
    fn action_lines_follow_the_log_format() {
        let sink = FileReportSink::new(tmp_dir("bulkmod-report-actions")).unwrap();
        sink.record_action(
            "MEMBER_BANNED",
            ChatId(-100),
            Some(UserId(42)),
            Some(serde_json::json!({ "attempt": 1 })),
        );
        sink.record_action("CHAT_LEFT", ChatId(-100), None, None);

        let lines = sink.recent_actions(10).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("ACTION: MEMBER_BANNED | Chat: -100 | User: 42 | Details: {\"attempt\":1}"));
        assert!(lines[1].ends_with("ACTION: CHAT_LEFT | Chat: -100 | User: -"));
    }

    #[test]
    fn recent_actions_returns_the_tail() {
        let sink = FileReportSink::new(tmp_dir("bulkmod-report-tail")).unwrap();
        for i in 0..5 {
            sink.record_action(&format!("A{i}"), ChatId(-1), None, None);
        }
        let lines = sink.recent_actions(2).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("A3"));
        assert!(lines[1].contains("A4"));
    }

    #[test]
    fn errors_go_to_their_own_file() {
        let sink = FileReportSink::new(tmp_dir("bulkmod-report-errors")).unwrap();
        sink.record_error("ban failed", Some("chat -1"));
        sink.record_error("no context", None);

        let raw = fs::read_to_string(sink.dir().join(ERRORS_FILE)).unwrap();
        assert!(raw.contains("ERROR: ban failed | Context: chat -1"));
        assert!(raw.lines().nth(1).unwrap().ends_with("ERROR: no context"));
        assert!(sink.recent_actions(10).unwrap().is_empty());
    }

    #[test]
    fn clear_removes_logs_and_resets_stats() {
        let sink = FileReportSink::new(tmp_dir("bulkmod-report-clear")).unwrap();
        sink.record_operation("MUTE_ALL", ChatId(-1), &op(OperationKind::Mute, 4));
        sink.record_error("x", None);

        sink.clear().unwrap();

        assert!(sink.recent_actions(10).unwrap().is_empty());
        assert!(!sink.dir().join(ERRORS_FILE).exists());
        assert_eq!(sink.stats().unwrap().total_muted, 0);
        // Clearing twice is fine.
        sink.clear().unwrap();
    }
}
