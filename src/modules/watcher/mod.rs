pub mod ignore;
pub mod stall;
pub mod tracker;

pub use stall::{StallCounter, STALL_LIMIT};
pub use tracker::ProcessTreeTracker;
