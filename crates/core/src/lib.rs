//! Core types shared by every hive crate.
//!
//! - [`Error`] / [`Result`]: the error taxonomy every layer speaks
//! - [`ResultExt`]: logging combinators that avoid unwrap/expect
//! - [`Clock`]: injectable wall clock so time-dependent rules are testable

pub mod clock;
pub mod error;
pub mod result;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Error;
pub use result::{Result, ResultExt};
