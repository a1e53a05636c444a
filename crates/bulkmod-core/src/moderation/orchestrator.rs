//! Sequencing of one bulk command: authorize, fetch, filter, dispatch,
//! report and (optionally) leave the group.

use std::{fmt, sync::Arc};

use tokio::{sync::OnceCell, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::{
    cache::MembershipCache,
    config::OperationSettings,
    domain::{ChatId, Member, PermissionSet, UserId},
    moderation::{
        dispatcher::Dispatcher,
        filter::actionable_members,
        retry::RetryPolicy,
        types::{FilterBreakdown, OperationKind, OperationReport, OperationRequest, OperationResult},
    },
    ports::{AuthorizationSource, PlatformClient, ProgressObserver, ReportSink},
    utils::best_effort,
    Error, Result,
};

const NUKE_OPERATION: &str = "NUKE_ALL";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Authorizing,
    Fetching,
    Filtering,
    Dispatching,
    Reporting,
    Departing,
    Done,
    Aborted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub struct Moderator {
    platform: Arc<dyn PlatformClient>,
    cache: Arc<MembershipCache>,
    auth: Arc<dyn AuthorizationSource>,
    reports: Arc<dyn ReportSink>,
    settings: OperationSettings,
    identity: OnceCell<Member>,
}

impl Moderator {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        cache: Arc<MembershipCache>,
        auth: Arc<dyn AuthorizationSource>,
        reports: Arc<dyn ReportSink>,
        settings: OperationSettings,
    ) -> Self {
        Self {
            platform,
            cache,
            auth,
            reports,
            settings,
            identity: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &OperationSettings {
        &self.settings
    }

    pub fn cache(&self) -> &MembershipCache {
        &self.cache
    }

    pub fn request(&self, kind: OperationKind, group: ChatId, by: UserId) -> OperationRequest {
        OperationRequest::new(kind, group, by, &self.settings)
    }

    /// Run one bulk operation to completion.
    ///
    /// Returns `Err` only for aborts (access denied, missing permission,
    /// failed fetch); per-target failures are counted in the report.
    pub async fn run(
        &self,
        req: &OperationRequest,
        progress: &dyn ProgressObserver,
    ) -> Result<OperationReport> {
        self.execute(req, progress, CancellationToken::new(), false)
            .await
    }

    /// Like [`Moderator::run`], but targets still waiting for a slot when
    /// `cancel` fires settle as failures.
    pub async fn run_until_cancelled(
        &self,
        req: &OperationRequest,
        progress: &dyn ProgressObserver,
        cancel: CancellationToken,
    ) -> Result<OperationReport> {
        self.execute(req, progress, cancel, false).await
    }

    /// Ban everyone, then wipe recent history, then leave (if configured).
    pub async fn nuke(
        &self,
        req: &OperationRequest,
        progress: &dyn ProgressObserver,
        cancel: CancellationToken,
    ) -> Result<OperationReport> {
        let req = OperationRequest {
            kind: OperationKind::Ban,
            ..req.clone()
        };
        self.execute(&req, progress, cancel, true).await
    }

    async fn execute(
        &self,
        req: &OperationRequest,
        progress: &dyn ProgressObserver,
        cancel: CancellationToken,
        nuke: bool,
    ) -> Result<OperationReport> {
        let kind = req.kind;
        let group = req.group_id;

        let (targets, breakdown) = match self.prepare(req, progress).await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.enter(group, Phase::Aborted);
                tracing::warn!(group = %group, operation = %kind, error = %e, "bulk operation aborted");
                self.reports
                    .record_error(&e.to_string(), Some(kind.operation_name()));
                progress.on_failed(kind, &e).await;
                return Err(e);
            }
        };

        progress.on_targets(kind, targets.len()).await;
        let result = if targets.is_empty() {
            OperationResult::empty()
        } else {
            self.enter(group, Phase::Dispatching);
            self.dispatch(req, &targets, cancel).await
        };

        let messages_deleted = if nuke {
            Some(self.purge_recent_messages(group).await)
        } else {
            None
        };

        self.enter(group, Phase::Reporting);
        let report = OperationReport {
            kind,
            group_id: group,
            result,
            breakdown,
            messages_deleted,
        };
        let name = if nuke {
            NUKE_OPERATION
        } else {
            kind.operation_name()
        };
        self.reports.record_operation(name, group, &report.stats());
        tracing::info!(
            group = %group,
            operation = name,
            succeeded = report.result.succeeded,
            failed = report.result.failed,
            total = report.result.total,
            "bulk operation finished"
        );

        let departing = kind.auto_leaves(&self.settings);
        progress.on_finished(&report, departing).await;
        if departing {
            self.enter(group, Phase::Departing);
            self.depart(group).await;
        }

        self.enter(group, Phase::Done);
        Ok(report)
    }

    /// Authorizing, Fetching and Filtering. Every error here aborts the run.
    async fn prepare(
        &self,
        req: &OperationRequest,
        progress: &dyn ProgressObserver,
    ) -> Result<(Vec<Member>, FilterBreakdown)> {
        let group = req.group_id;
        let retry = RetryPolicy::new(req.max_retry_wait);

        self.enter(group, Phase::Authorizing);
        if !self.auth.is_privileged_operator(req.requested_by) {
            return Err(Error::AccessDenied);
        }
        if self.settings.delete_commands {
            if let Some(msg) = req.command_message {
                best_effort("delete command", self.platform.delete_message(msg)).await;
            }
        }
        progress.on_started(req.kind).await;

        let me = self
            .identity
            .get_or_try_init(|| retry.run(|| self.platform.self_identity()))
            .await
            .map_err(|e| Error::PermissionMissing(format!("cannot resolve own identity: {e}")))?;
        let status = retry
            .run(|| self.cache.admin_status(group, me.user_id))
            .await
            .map_err(|e| Error::PermissionMissing(format!("cannot read own status: {e}")))?;
        if !status.is_admin || !status.rights.can_restrict_members {
            return Err(Error::PermissionMissing(
                "administrator with restrict-members right required".to_string(),
            ));
        }

        self.enter(group, Phase::Fetching);
        let members = retry
            .run(|| self.cache.members(group))
            .await
            .map_err(|e| Error::FetchFailure(e.to_string()))?;

        self.enter(group, Phase::Filtering);
        let (targets, breakdown) =
            actionable_members(&members, req.kind, me.user_id, self.auth.as_ref());
        self.reports
            .record_action("MEMBER_FILTERING", group, None, Some(breakdown.to_json()));
        tracing::debug!(group = %group, ?breakdown, "members filtered");

        Ok((targets, breakdown))
    }

    async fn dispatch(
        &self,
        req: &OperationRequest,
        targets: &[Member],
        cancel: CancellationToken,
    ) -> OperationResult {
        let kind = req.kind;
        let group = req.group_id;
        let retry = RetryPolicy::new(req.max_retry_wait);
        let retry = &retry;

        Dispatcher::new(req.concurrency, req.action_delay)
            .with_cancellation(cancel)
            .run(targets, move |m: Member| async move {
                let user = m.user_id;
                match self.act(kind, group, user, retry).await {
                    Ok(()) => {
                        self.reports
                            .record_action(kind.action_name(), group, Some(user), None);
                        Ok(())
                    }
                    Err(e) => {
                        self.reports.record_error(
                            &format!("{kind} failed for {user}: {e}"),
                            Some(&format!("chat {group}")),
                        );
                        Err(e)
                    }
                }
            })
            .await
    }

    /// One logical action on one member. Kick is a ban immediately reversed;
    /// a quick rejoin between the two calls is not guarded against.
    async fn act(
        &self,
        kind: OperationKind,
        group: ChatId,
        user: UserId,
        retry: &RetryPolicy,
    ) -> Result<()> {
        let platform = self.platform.as_ref();
        match kind {
            OperationKind::Ban => retry.run(|| platform.ban_member(group, user)).await,
            OperationKind::Kick | OperationKind::PurgeBots => {
                retry.run(|| platform.ban_member(group, user)).await?;
                retry.run(|| platform.unban_member(group, user)).await
            }
            OperationKind::Mute => {
                retry
                    .run(|| platform.restrict_member(group, user, PermissionSet::none()))
                    .await
            }
            OperationKind::Unmute => {
                retry
                    .run(|| platform.restrict_member(group, user, PermissionSet::defaults()))
                    .await
            }
        }
    }

    async fn purge_recent_messages(&self, group: ChatId) -> usize {
        let limit = self.settings.nuke_message_limit;
        let messages = match self.platform.fetch_recent_messages(group, limit).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(group = %group, error = %e, "could not list recent messages");
                return 0;
            }
        };

        let mut deleted = 0;
        for msg in messages.into_iter().take(limit) {
            if best_effort("delete message", self.platform.delete_message(msg)).await {
                deleted += 1;
            }
            sleep(self.settings.message_delete_delay).await;
        }
        tracing::info!(group = %group, deleted, "recent messages purged");
        deleted
    }

    async fn depart(&self, group: ChatId) {
        sleep(self.settings.departure_grace).await;
        if best_effort("leave group", self.platform.leave_group(group)).await {
            self.reports.record_action("CHAT_LEFT", group, None, None);
        }
    }

    fn enter(&self, group: ChatId, phase: Phase) {
        tracing::debug!(group = %group, %phase, "orchestrator phase");
    }
}
