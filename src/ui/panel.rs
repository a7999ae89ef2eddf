use crate::core::constants::STATUS_HISTORY_LIMIT;
use crate::core::month::Month;
use crate::ui::{StatusSeverity, ViewerUi};

/// Plain-state [`ViewerUi`] that remembers what it was last told.
///
/// Suits hosts that render the controls themselves each frame, and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelState {
    pub index: Option<usize>,
    pub label: String,
    pub status: String,
    pub severity: Option<StatusSeverity>,
    pub playing: bool,
    /// Recent status lines, oldest first, at most [`STATUS_HISTORY_LIMIT`]
    pub status_history: Vec<String>,
}

impl PanelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Some(StatusSeverity::Error)
    }
}

impl ViewerUi for PanelState {
    fn show_month(&mut self, index: usize, month: Month) {
        self.index = Some(index);
        self.label = month.to_string();
    }

    fn set_status(&mut self, message: &str, severity: StatusSeverity) {
        if message != self.status {
            log::info!("status: {}", message);
        }
        self.status = message.to_string();
        self.severity = Some(severity);
        if self.status_history.len() >= STATUS_HISTORY_LIMIT {
            let excess = self.status_history.len() + 1 - STATUS_HISTORY_LIMIT;
            self.status_history.drain(..excess);
        }
        self.status_history.push(message.to_string());
    }

    fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_records_latest_values() {
        let mut panel = PanelState::new();
        panel.show_month(4, "2000-05".parse().unwrap());
        panel.set_status("Showing 2000-05.", StatusSeverity::Ok);
        panel.set_status("Missing tiles", StatusSeverity::Error);
        panel.set_playing(true);

        assert_eq!(panel.index, Some(4));
        assert_eq!(panel.label, "2000-05");
        assert_eq!(panel.status, "Missing tiles");
        assert!(panel.is_error());
        assert!(panel.playing);
        assert_eq!(panel.status_history.len(), 2);
    }

    #[test]
    fn test_status_history_is_bounded() {
        let mut panel = PanelState::new();
        for i in 0..STATUS_HISTORY_LIMIT + 10 {
            panel.set_status(&format!("Loading month {i}"), StatusSeverity::Ok);
        }
        assert_eq!(panel.status_history.len(), STATUS_HISTORY_LIMIT);
        assert_eq!(panel.status_history[0], "Loading month 10");
        assert_eq!(
            panel.status_history.last().map(String::as_str),
            Some(format!("Loading month {}", STATUS_HISTORY_LIMIT + 9).as_str())
        );
    }
}
