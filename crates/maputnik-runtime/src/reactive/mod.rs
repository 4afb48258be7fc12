//! Change-notifying state cells.
//!
//! - [`Observable`]: shared value with version tracking and subscribers.
//! - [`BatchScope`]: defers notifications so a group of updates is seen atomically.

pub mod batch;
pub mod observable;

pub use batch::BatchScope;
pub use observable::{Observable, Subscription};
