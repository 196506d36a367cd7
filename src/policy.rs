//! Pure authorization guards: no I/O, role set plus whatever resource state
//! the operation depends on goes in, a verdict comes out. One guard per
//! mutating operation; handlers never inline role checks.

use crate::models::{incident::IncidentStatus, user::Role};

fn has(roles: &[Role], role: Role) -> bool {
    roles.iter().any(|held| *held == role)
}

pub fn can_review_submission(roles: &[Role]) -> bool {
    has(roles, Role::Qi)
}

pub fn can_supervisor_approve(roles: &[Role]) -> bool {
    has(roles, Role::Supervisor) || has(roles, Role::Admin)
}

pub fn can_assign_hod(roles: &[Role]) -> bool {
    has(roles, Role::Qi)
}

pub fn can_hod_submit(roles: &[Role]) -> bool {
    has(roles, Role::Hod) || has(roles, Role::Admin)
}

pub fn can_assign_investigator(roles: &[Role]) -> bool {
    has(roles, Role::Qi) || has(roles, Role::Hod) || has(roles, Role::Admin)
}

pub fn can_create_investigation(roles: &[Role], status: &IncidentStatus) -> bool {
    has(roles, Role::Qi) && *status == IncidentStatus::Investigating
}

pub fn can_create_corrective_action(roles: &[Role]) -> bool {
    has(roles, Role::Qi)
}

pub fn can_close_corrective_action(roles: &[Role]) -> bool {
    has(roles, Role::Qi)
}

/// Close guard takes the open-action count computed inside the closing
/// transaction, never a cached flag.
pub fn can_close_incident(roles: &[Role], open_actions: u64) -> bool {
    has(roles, Role::Qi) && open_actions == 0
}

pub fn can_edit_incident(is_reporter: bool, status: &IncidentStatus) -> bool {
    is_reporter && *status == IncidentStatus::Draft
}

pub fn can_delete_incident(roles: &[Role], is_reporter: bool, status: &IncidentStatus) -> bool {
    (is_reporter && *status == IncidentStatus::Draft) || has(roles, Role::Admin)
}

/// Drafts exist only for their reporter; everything later is visible to any
/// authenticated employee.
pub fn can_view_incident(is_reporter: bool, status: &IncidentStatus) -> bool {
    *status != IncidentStatus::Draft || is_reporter
}

pub fn can_manage_shared_access(roles: &[Role]) -> bool {
    has(roles, Role::Qi)
}

/// QI and admin bypass the token path entirely when resolving shared access.
pub fn has_full_shared_access(roles: &[Role]) -> bool {
    has(roles, Role::Qi) || has(roles, Role::Admin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qi_reviews_and_closes_supervisor_does_not() {
        assert!(can_review_submission(&[Role::Qi]));
        assert!(!can_review_submission(&[Role::Supervisor]));
        assert!(can_close_incident(&[Role::Qi], 0));
        assert!(!can_close_incident(&[Role::Supervisor], 0));
    }

    #[test]
    fn close_denied_while_actions_remain_open() {
        assert!(!can_close_incident(&[Role::Qi], 2));
        assert!(can_close_incident(&[Role::Qi], 0));
    }

    #[test]
    fn admin_substitutes_for_supervisor_and_hod() {
        assert!(can_supervisor_approve(&[Role::Admin]));
        assert!(can_hod_submit(&[Role::Admin]));
        assert!(can_assign_investigator(&[Role::Admin]));
        // but never for the QI-only gates
        assert!(!can_review_submission(&[Role::Admin]));
        assert!(!can_close_corrective_action(&[Role::Admin]));
    }

    #[test]
    fn draft_editing_is_reporter_only_and_draft_only() {
        assert!(can_edit_incident(true, &IncidentStatus::Draft));
        assert!(!can_edit_incident(false, &IncidentStatus::Draft));
        assert!(!can_edit_incident(true, &IncidentStatus::Submitted));
    }

    #[test]
    fn deletion_needs_draft_ownership_or_admin() {
        assert!(can_delete_incident(&[Role::Reporter], true, &IncidentStatus::Draft));
        assert!(!can_delete_incident(&[Role::Reporter], true, &IncidentStatus::Submitted));
        assert!(can_delete_incident(&[Role::Admin], false, &IncidentStatus::Closed));
    }

    #[test]
    fn drafts_are_invisible_to_everyone_else() {
        assert!(can_view_incident(true, &IncidentStatus::Draft));
        assert!(!can_view_incident(false, &IncidentStatus::Draft));
        assert!(can_view_incident(false, &IncidentStatus::Submitted));
    }

    #[test]
    fn investigation_creation_requires_the_investigating_stage() {
        assert!(can_create_investigation(&[Role::Qi], &IncidentStatus::Investigating));
        assert!(!can_create_investigation(&[Role::Qi], &IncidentStatus::Submitted));
        assert!(!can_create_investigation(&[Role::Hod], &IncidentStatus::Investigating));
    }
}
