//! I/O helpers: payload files, the audit log, config, and provider seams.

pub mod config;
pub mod event_log;
pub mod layout;
pub mod provider;
pub mod result_store;
