//! Time-bounded memoization of member snapshots and admin status.
//!
//! Entries are refreshed lazily on the first read past their TTL; there is no
//! background eviction and no push invalidation from the platform.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{
    domain::{AdminRights, ChatId, Member, UserId},
    ports::{PlatformClient, ReportSink},
    Result,
};

/// Time source for cache ages. Tests swap in a manual clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Tokio's clock (honors `tokio::time::pause` in tests).
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CachePolicy {
    pub enabled: bool,
    pub ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdminStatus {
    pub is_admin: bool,
    pub rights: AdminRights,
}

#[derive(Clone)]
struct CacheEntry<T> {
    data: T,
    at: Instant,
}

pub struct MembershipCache {
    platform: Arc<dyn PlatformClient>,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
    reports: Option<Arc<dyn ReportSink>>,
    members: Mutex<HashMap<ChatId, CacheEntry<Arc<Vec<Member>>>>>,
    admins: Mutex<HashMap<(ChatId, UserId), CacheEntry<AdminStatus>>>,
}

impl MembershipCache {
    pub fn new(platform: Arc<dyn PlatformClient>, policy: CachePolicy) -> Self {
        Self::with_clock(platform, policy, Arc::new(TokioClock))
    }

    pub fn with_clock(
        platform: Arc<dyn PlatformClient>,
        policy: CachePolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            platform,
            policy,
            clock,
            reports: None,
            members: Mutex::new(HashMap::new()),
            admins: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_reports(mut self, reports: Arc<dyn ReportSink>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Member snapshot of `group`, fetched fresh when missing or expired.
    ///
    /// A hit returns the very same snapshot `Arc` that was stored.
    pub async fn members(&self, group: ChatId) -> Result<Arc<Vec<Member>>> {
        if self.policy.enabled {
            let now = self.clock.now();
            let hit = {
                let map = self.members.lock().await;
                map.get(&group)
                    .filter(|e| self.is_fresh(e.at, now))
                    .map(|e| e.data.clone())
            };
            if let Some(members) = hit {
                tracing::debug!(group = %group, count = members.len(), "member cache hit");
                self.record(
                    "CACHE_HIT",
                    group,
                    json!({ "members_count": members.len() }),
                );
                return Ok(members);
            }
        }

        let fetched = Arc::new(self.platform.fetch_members(group).await?);
        self.record("MEMBERS_FETCHED", group, json!({ "count": fetched.len() }));

        if self.policy.enabled {
            // Concurrent refreshes of the same key: last writer wins.
            let entry = CacheEntry {
                data: fetched.clone(),
                at: self.clock.now(),
            };
            self.members.lock().await.insert(group, entry);
        }
        Ok(fetched)
    }

    /// Admin status of `user` in `group`, cached per (group, user).
    pub async fn admin_status(&self, group: ChatId, user: UserId) -> Result<AdminStatus> {
        let key = (group, user);
        if self.policy.enabled {
            let now = self.clock.now();
            let map = self.admins.lock().await;
            if let Some(e) = map.get(&key).filter(|e| self.is_fresh(e.at, now)) {
                return Ok(e.data);
            }
        }

        let member = self.platform.fetch_member(group, user).await?;
        let status = AdminStatus {
            is_admin: member.role.is_privileged(),
            rights: member.rights,
        };

        if self.policy.enabled {
            let entry = CacheEntry {
                data: status,
                at: self.clock.now(),
            };
            self.admins.lock().await.insert(key, entry);
        }
        Ok(status)
    }

    pub async fn invalidate_all(&self) {
        self.members.lock().await.clear();
        self.admins.lock().await.clear();
        tracing::info!("membership cache cleared");
        if let Some(r) = &self.reports {
            r.record_action("CACHE_CLEARED", ChatId(0), None, None);
        }
    }

    fn is_fresh(&self, at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(at) < self.policy.ttl
    }

    fn record(&self, name: &str, group: ChatId, details: serde_json::Value) {
        if let Some(r) = &self.reports {
            r.record_action(name, group, None, Some(details));
        }
    }
}
