use std::sync::OnceLock;

pub mod commands;
pub mod header;
pub mod pack;
pub mod record;
pub mod stream;
pub mod unpack;

/// Application-level verbosity
pub static VERBOSE: OnceLock<bool> = OnceLock::new();
