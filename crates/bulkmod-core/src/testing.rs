//! In-memory fakes shared by the crate's unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{
    cache::Clock,
    domain::{AdminRights, ChatId, Member, MemberRole, MessageId, MessageRef, PermissionSet, UserId},
    moderation::types::OperationStats,
    ports::{PlatformClient, ReportSink},
    Error, Result,
};

pub(crate) const SELF_ID: UserId = UserId(999);

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Ban(UserId),
    Unban(UserId),
    Restrict(UserId, PermissionSet),
    Leave(ChatId),
    Delete(MessageRef),
}

pub(crate) struct FakePlatform {
    members: Mutex<Vec<Member>>,
    me: Member,
    self_rights: Mutex<AdminRights>,
    fetches: AtomicUsize,
    lookups: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_leave: AtomicBool,
    rate_limits: Mutex<HashMap<UserId, usize>>,
    failing: Mutex<HashSet<UserId>>,
    failing_unbans: Mutex<HashSet<UserId>>,
    failing_deletes: Mutex<HashSet<MessageId>>,
    recent: Mutex<Vec<MessageRef>>,
    calls: Mutex<Vec<Call>>,
}

impl FakePlatform {
    pub(crate) fn with_members(members: Vec<Member>) -> Self {
        Self {
            members: Mutex::new(members),
            me: Member {
                user_id: SELF_ID,
                role: MemberRole::Administrator,
                is_bot: true,
                is_deleted: false,
                rights: AdminRights::all(),
            },
            self_rights: Mutex::new(AdminRights::all()),
            fetches: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
            fail_fetch: AtomicBool::new(false),
            fail_leave: AtomicBool::new(false),
            rate_limits: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            failing_unbans: Mutex::new(HashSet::new()),
            failing_deletes: Mutex::new(HashSet::new()),
            recent: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn self_member(&self) -> Member {
        self.me.clone()
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn member_lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_fetches(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_leaving(&self) {
        self.fail_leave.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_self_rights(&self, rights: AdminRights) {
        *self.self_rights.lock().unwrap() = rights;
    }

    /// The next `times` ban/restrict calls for `user` answer with a rate limit.
    pub(crate) fn rate_limit(&self, user: UserId, times: usize) {
        self.rate_limits.lock().unwrap().insert(user, times);
    }

    pub(crate) fn fail_for(&self, user: UserId) {
        self.failing.lock().unwrap().insert(user);
    }

    pub(crate) fn fail_unban_for(&self, user: UserId) {
        self.failing_unbans.lock().unwrap().insert(user);
    }

    pub(crate) fn set_recent_messages(&self, msgs: Vec<MessageRef>) {
        *self.recent.lock().unwrap() = msgs;
    }

    pub(crate) fn fail_delete_for(&self, id: MessageId) {
        self.failing_deletes.lock().unwrap().insert(id);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_target(&self, user: UserId) -> Result<()> {
        {
            let mut limits = self.rate_limits.lock().unwrap();
            if let Some(left) = limits.get_mut(&user) {
                if *left > 0 {
                    *left -= 1;
                    return Err(Error::RateLimited(Duration::from_secs(3)));
                }
            }
        }
        if self.failing.lock().unwrap().contains(&user) {
            return Err(Error::External(format!("USER_ADMIN_INVALID {user}")));
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    async fn fetch_members(&self, _group: ChatId) -> Result<Vec<Member>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::External("CHAT_ADMIN_REQUIRED".to_string()));
        }
        Ok(self.members.lock().unwrap().clone())
    }

    async fn fetch_member(&self, _group: ChatId, user: UserId) -> Result<Member> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if user == self.me.user_id {
            let mut me = self.me.clone();
            me.rights = *self.self_rights.lock().unwrap();
            return Ok(me);
        }
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.user_id == user)
            .cloned()
            .unwrap_or_else(|| Member::regular(user)))
    }

    async fn ban_member(&self, _group: ChatId, user: UserId) -> Result<()> {
        self.check_target(user)?;
        self.push(Call::Ban(user));
        Ok(())
    }

    async fn unban_member(&self, _group: ChatId, user: UserId) -> Result<()> {
        if self.failing_unbans.lock().unwrap().contains(&user) {
            return Err(Error::External("unban failed".to_string()));
        }
        self.push(Call::Unban(user));
        Ok(())
    }

    async fn restrict_member(
        &self,
        _group: ChatId,
        user: UserId,
        permissions: PermissionSet,
    ) -> Result<()> {
        self.check_target(user)?;
        self.push(Call::Restrict(user, permissions));
        Ok(())
    }

    async fn self_identity(&self) -> Result<Member> {
        Ok(self.me.clone())
    }

    async fn leave_group(&self, group: ChatId) -> Result<()> {
        self.push(Call::Leave(group));
        if self.fail_leave.load(Ordering::SeqCst) {
            return Err(Error::External("leave failed".to_string()));
        }
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        if self.failing_deletes.lock().unwrap().contains(&msg.message_id) {
            return Err(Error::External("MESSAGE_DELETE_FORBIDDEN".to_string()));
        }
        self.push(Call::Delete(msg));
        Ok(())
    }

    async fn fetch_recent_messages(&self, _group: ChatId, limit: usize) -> Result<Vec<MessageRef>> {
        Ok(self
            .recent
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .copied()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    actions: Mutex<Vec<(String, ChatId, Option<UserId>)>>,
    operations: Mutex<Vec<(String, OperationStats)>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub(crate) fn action_names(&self) -> Vec<String> {
        self.actions
            .lock()
            .unwrap()
            .iter()
            .map(|(n, _, _)| n.clone())
            .collect()
    }

    pub(crate) fn operations(&self) -> Vec<(String, OperationStats)> {
        self.operations.lock().unwrap().clone()
    }

    pub(crate) fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

impl ReportSink for RecordingSink {
    fn record_action(
        &self,
        name: &str,
        group: ChatId,
        user: Option<UserId>,
        _details: Option<serde_json::Value>,
    ) {
        self.actions
            .lock()
            .unwrap()
            .push((name.to_string(), group, user));
    }

    fn record_operation(&self, name: &str, _group: ChatId, stats: &OperationStats) {
        self.operations
            .lock()
            .unwrap()
            .push((name.to_string(), *stats));
    }

    fn record_error(&self, message: &str, _context: Option<&str>) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

/// Clock that only moves when told to.
pub(crate) struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }
}

pub(crate) fn member(id: i64) -> Member {
    Member::regular(UserId(id))
}

pub(crate) fn admin(id: i64) -> Member {
    Member {
        role: MemberRole::Administrator,
        ..Member::regular(UserId(id))
    }
}

pub(crate) fn owner(id: i64) -> Member {
    Member {
        role: MemberRole::Owner,
        rights: AdminRights::all(),
        ..Member::regular(UserId(id))
    }
}

pub(crate) fn bot(id: i64) -> Member {
    Member {
        is_bot: true,
        ..Member::regular(UserId(id))
    }
}

pub(crate) fn deleted(id: i64) -> Member {
    Member {
        is_deleted: true,
        ..Member::regular(UserId(id))
    }
}
