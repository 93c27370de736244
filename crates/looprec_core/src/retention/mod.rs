//! Space-bounded retention.
//!
//! [`RetentionSet`] indexes sealed segments oldest first and
//! [`RetentionManager`] evicts from its front until the volume has the
//! configured amount of free space. [`RetentionWorker`] runs the manager on
//! a timer while a segment is being recorded.

mod manager;
mod set;
mod worker;

pub use manager::{EvictionPlan, RetentionManager, RetentionReport};
pub use set::RetentionSet;
pub use worker::RetentionWorker;
