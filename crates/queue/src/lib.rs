pub mod error;
pub mod lane;
pub mod source;

pub use error::{LaneError, SourceError};
pub use lane::{lane, LaneReceiver, LaneSender, SharedQueue, WaitPolicy};
pub use source::{Draw, Interrupter, SourceStats, Throttle, ThrottleConfig, ThrottledSource};
