use serde::{Deserialize, Serialize};

/// User input, already decoded from whatever widget or key produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ViewerCommand {
    StepBack,
    StepForward,
    /// Slider moved to an index
    SelectMonth(usize),
    TogglePlayback,
    /// Raw text of the speed input
    SetFps(String),
}

impl ViewerCommand {
    /// Keyboard shortcuts: arrows step, space toggles playback
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" => Some(Self::StepBack),
            "ArrowRight" => Some(Self::StepForward),
            " " | "Space" => Some(Self::TogglePlayback),
            _ => None,
        }
    }

    /// Whether the command navigates directly and so stops playback
    pub fn is_navigation(&self) -> bool {
        matches!(self, Self::StepBack | Self::StepForward | Self::SelectMonth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bindings() {
        assert_eq!(ViewerCommand::from_key("ArrowLeft"), Some(ViewerCommand::StepBack));
        assert_eq!(ViewerCommand::from_key(" "), Some(ViewerCommand::TogglePlayback));
        assert_eq!(ViewerCommand::from_key("q"), None);
        assert!(ViewerCommand::SelectMonth(3).is_navigation());
        assert!(!ViewerCommand::TogglePlayback.is_navigation());
    }
}
