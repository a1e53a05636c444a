use crate::{
    domain::{Member, UserId},
    moderation::types::{FilterBreakdown, OperationKind},
    ports::AuthorizationSource,
};

/// Reduce a member snapshot to the legal targets of `kind`.
///
/// A member is skipped when, in order: it is an owner/administrator, it is
/// the agent itself, it is protected, it is a deleted account, or it is a
/// bot. For [`OperationKind::PurgeBots`] the last rule is inverted: only bots
/// remain, the first four rules still apply.
pub fn actionable_members(
    members: &[Member],
    kind: OperationKind,
    self_id: UserId,
    auth: &dyn AuthorizationSource,
) -> (Vec<Member>, FilterBreakdown) {
    let mut out = Vec::new();
    let mut bd = FilterBreakdown {
        total: members.len(),
        ..FilterBreakdown::default()
    };
    let bots_only = kind == OperationKind::PurgeBots;

    for m in members {
        if m.role.is_privileged() {
            bd.admins += 1;
            continue;
        }
        if m.user_id == self_id {
            bd.own += 1;
            continue;
        }
        if auth.is_protected(m.user_id) {
            bd.protected += 1;
            continue;
        }
        if m.is_deleted {
            bd.deleted += 1;
            continue;
        }
        if m.is_bot != bots_only {
            if m.is_bot {
                bd.bots += 1;
            } else {
                bd.humans += 1;
            }
            continue;
        }
        out.push(m.clone());
    }

    bd.actionable = out.len();
    (out, bd)
}
