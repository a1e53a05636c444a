use async_trait::async_trait;

use crate::{
    domain::{ChatId, Member, MessageRef, PermissionSet, UserId},
    moderation::types::{OperationKind, OperationReport, OperationStats},
    Error, Result,
};

/// Hexagonal port for the group platform (Telegram today).
///
/// Every call may fail with [`Error::RateLimited`] or a generic error; the
/// engine decides what to retry.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Full member snapshot of a group. Pagination is the adapter's concern.
    async fn fetch_members(&self, group: ChatId) -> Result<Vec<Member>>;

    async fn fetch_member(&self, group: ChatId, user: UserId) -> Result<Member>;

    async fn ban_member(&self, group: ChatId, user: UserId) -> Result<()>;
    async fn unban_member(&self, group: ChatId, user: UserId) -> Result<()>;
    async fn restrict_member(
        &self,
        group: ChatId,
        user: UserId,
        permissions: PermissionSet,
    ) -> Result<()>;

    /// The acting agent itself.
    async fn self_identity(&self) -> Result<Member>;

    async fn leave_group(&self, group: ChatId) -> Result<()>;
    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    /// Most recent messages first, at most `limit`.
    async fn fetch_recent_messages(&self, group: ChatId, limit: usize) -> Result<Vec<MessageRef>>;
}

/// Who may run bulk commands and who may never be targeted.
pub trait AuthorizationSource: Send + Sync {
    fn is_privileged_operator(&self, user: UserId) -> bool;
    fn is_protected(&self, user: UserId) -> bool;
}

/// Action/operation log. Implementations must not fail the caller.
pub trait ReportSink: Send + Sync {
    fn record_action(
        &self,
        name: &str,
        group: ChatId,
        user: Option<UserId>,
        details: Option<serde_json::Value>,
    );
    fn record_operation(&self, name: &str, group: ChatId, stats: &OperationStats);
    fn record_error(&self, message: &str, context: Option<&str>);
}

/// User-visible progress of one orchestration run. All methods default to no-ops.
#[async_trait]
pub trait ProgressObserver: Send + Sync {
    async fn on_started(&self, _kind: OperationKind) {}
    async fn on_targets(&self, _kind: OperationKind, _count: usize) {}
    /// Called after reporting and before any departure.
    async fn on_finished(&self, _report: &OperationReport, _departing: bool) {}
    async fn on_failed(&self, _kind: OperationKind, _error: &Error) {}
}

/// Observer for callers that want no progress output.
pub struct NoProgress;

#[async_trait]
impl ProgressObserver for NoProgress {}
