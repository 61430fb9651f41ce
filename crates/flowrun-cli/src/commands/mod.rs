//! CLI command implementations.

pub mod cancel;
pub mod common;
pub mod logs;
pub mod runs;
pub mod status;
pub mod submit;
pub mod version;
pub mod wait;
