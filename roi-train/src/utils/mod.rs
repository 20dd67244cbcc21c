//! Misc utilities.

mod rate_counter;

pub use rate_counter::*;

/// The time format of logging directory names.
pub const FILE_STRFTIME: &str = "%Y-%m-%d-%H-%M-%S.%3f%z";
