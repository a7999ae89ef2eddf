pub mod controller;
pub mod playback;
pub mod transition;

pub use controller::{Buffering, Task, ViewerController, ViewerState};
pub use transition::{Decision, PendingTransition, RejectReason, TransitionCounts};
