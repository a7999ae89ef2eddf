//! The viewer's user-facing collaborator: month readout, status line and
//! play/pause state, plus the commands user input is translated into.

pub mod controls;
pub mod panel;

pub use controls::ViewerCommand;
pub use panel::PanelState;

use crate::core::month::Month;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusSeverity {
    Ok,
    Error,
}

/// Output side of the viewer controls
pub trait ViewerUi {
    /// Slider position and label
    fn show_month(&mut self, index: usize, month: Month);

    fn set_status(&mut self, message: &str, severity: StatusSeverity);

    fn set_playing(&mut self, playing: bool);
}
