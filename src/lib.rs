//! Application registry (appreg) library crate.
//!
//! Stores OAuth2 relying-party applications, validates their configuration,
//! issues client credentials and keeps attached certificates in step with the
//! stored records.

pub mod certificates;
pub mod config;
pub mod errors;
pub mod registry;
pub mod storage;
