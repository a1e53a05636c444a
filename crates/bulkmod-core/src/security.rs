use std::collections::HashSet;

use crate::{config::Config, domain::UserId, ports::AuthorizationSource};

// ============== Authorization ==============

pub fn is_authorized(user_id: Option<UserId>, operators: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    if operators.is_empty() {
        return false;
    }
    operators.contains(&user_id.0)
}

// ============== Protection Roster ==============

/// Operators plus explicitly protected ids. Loaded once, read-only afterwards.
///
/// The acting agent itself is excluded separately by the protection filter.
#[derive(Clone, Debug, Default)]
pub struct ProtectionRoster {
    operators: Vec<i64>,
    protected: HashSet<UserId>,
}

impl ProtectionRoster {
    pub fn new(operators: Vec<i64>, protected: impl IntoIterator<Item = i64>) -> Self {
        Self {
            operators,
            protected: protected.into_iter().map(UserId).collect(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.sudo_users.clone(), cfg.protected_users.iter().copied())
    }

    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }
}

impl AuthorizationSource for ProtectionRoster {
    fn is_privileged_operator(&self, user: UserId) -> bool {
        is_authorized(Some(user), &self.operators)
    }

    fn is_protected(&self, user: UserId) -> bool {
        self.protected.contains(&user) || self.is_privileged_operator(user)
    }
}
