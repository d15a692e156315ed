use std::collections::HashSet;

use actix_identity::Identity;

use crate::errors::AppError;

/// Which signed-in subjects may use the admin actions. Built from config and
/// handed to every request through application state.
#[derive(Debug, Clone, Default)]
pub struct AdminPolicy {
    admin_ids: HashSet<String>,
}

impl AdminPolicy {
    pub fn new(admin_ids: HashSet<String>) -> Self {
        Self { admin_ids }
    }

    pub fn is_admin(&self, subject_id: &str) -> bool {
        self.admin_ids.contains(subject_id)
    }
}

/// Subject id of the signed-in caller.
pub fn current_user(identity: Option<Identity>) -> Result<String, AppError> {
    match identity.map(|id| id.id()) {
        None => Err(AppError::Unauthenticated),
        Some(Ok(id)) => Ok(id),
        Some(Err(err)) => {
            log::warn!("Unreadable identity in session: {}", err);
            Err(AppError::Unauthenticated)
        }
    }
}

/// Subject id of the caller, provided the policy lists them as admin.
pub fn require_admin(identity: Option<Identity>, policy: &AdminPolicy) -> Result<String, AppError> {
    let subject = current_user(identity)?;
    if !policy.is_admin(&subject) {
        log::warn!("Non-admin {} attempted an admin action", subject);
        return Err(AppError::Forbidden);
    }
    Ok(subject)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_only_admits_listed_subjects() {
        let policy = AdminPolicy::new(["user_admin".to_string()].into_iter().collect());
        assert!(policy.is_admin("user_admin"));
        assert!(!policy.is_admin("user_guest"));
        assert!(!AdminPolicy::default().is_admin("user_admin"));
    }

    #[test]
    fn anonymous_caller_is_unauthenticated() {
        assert!(matches!(current_user(None), Err(AppError::Unauthenticated)));
        assert!(matches!(
            require_admin(None, &AdminPolicy::default()),
            Err(AppError::Unauthenticated)
        ));
    }
}
