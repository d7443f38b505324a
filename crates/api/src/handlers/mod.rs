//! App API handlers module

pub mod auth;
pub mod dashboard;
pub mod me;
pub mod projects;
pub mod time_entries;
