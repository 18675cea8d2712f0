//! End-to-end attempt scenarios against the mock collaborators

pub mod timeout_tests;
pub mod lobby_tests;
