//! sshcommand-core: Parameters, validation and result records
//!
//! Turns caller-supplied parameters into a validated execution request,
//! runs it through the retry controller and reports a result record.

pub mod config;
pub mod duration;
pub mod error;
pub mod resource;

pub use config::CommandParams;
pub use duration::{DurationError, parse_duration};
pub use error::CoreError;
pub use resource::{CommandResource, apply, resource_id};
