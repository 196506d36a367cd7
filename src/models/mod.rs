pub mod corrective_action;
pub mod incident;
pub mod investigation;
pub mod shared_access;
pub mod user;
