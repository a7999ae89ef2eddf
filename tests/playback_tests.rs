mod common;

/// Timed playback: buffering, back-off, rate changes and interruption
#[cfg(test)]
mod playback_tests {
    use super::common::*;
    use chronotile::prelude::*;

    fn tick_due(viewer: &Viewer) -> f64 {
        let timer = viewer.state().playback_timer().expect("playback timer armed");
        viewer.events().due_at(timer).expect("timer pending")
    }

    /// Starting playback arms the first tick at the minimum delay and buffers ahead
    #[test]
    fn test_start_playback_buffers_ahead() {
        let mut viewer = viewer(two_tile_view());
        commit(&mut viewer, 0, 16.0);
        let start = viewer.now();

        viewer.dispatch(ViewerCommand::TogglePlayback);
        assert!(viewer.state().is_playing());
        assert!(viewer.ui().playing);
        assert_eq!(tick_due(&viewer), start + 16.0);
        assert_eq!(
            viewer.state().prefetch().job_months(),
            vec![m("2000-02"), m("2000-03"), m("2000-04")]
        );
    }

    /// A month that is not ready yet is retried quickly, then less often
    #[test]
    fn test_buffering_retries_then_backs_off() {
        let mut viewer = viewer(two_tile_view());
        commit(&mut viewer, 0, 16.0);
        viewer.toggle_playback();

        let first = tick_due(&viewer);
        viewer.advance(first);
        let buffering = viewer.state().buffering().unwrap();
        assert_eq!(buffering.month, m("2000-02"));
        assert_eq!(buffering.start_ms, first);
        assert_eq!(tick_due(&viewer), first + 300.0);

        let mut due = tick_due(&viewer);
        for _ in 0..3 {
            viewer.advance(due);
            assert_eq!(tick_due(&viewer), due + 300.0);
            due = tick_due(&viewer);
        }
        // 1200 ms spent on the same month: the wait restarts at the slower cadence
        assert_eq!(due, first + 1200.0);
        viewer.advance(due);
        assert_eq!(viewer.state().buffering().unwrap().start_ms, due);
        assert_eq!(tick_due(&viewer), due + 500.0);
        assert!(viewer.state().pending().is_none());
        assert_eq!(viewer.state().current_index(), Some(0));
    }

    /// Once the next month is fully loaded the tick requests it
    #[test]
    fn test_tick_requests_ready_month() {
        let mut viewer = viewer(two_tile_view());
        commit(&mut viewer, 0, 16.0);
        viewer.toggle_playback();
        assert_eq!(finish_prefetch(&mut viewer), 6);
        assert!(viewer.is_month_ready_for_current_view(m("2000-02")));

        let due = tick_due(&viewer);
        viewer.advance(due);
        assert!(viewer.state().buffering().is_none());
        assert_eq!(viewer.state().pending().unwrap().month, m("2000-02"));
        assert_eq!(viewer.ui().label, "2000-02");
        assert_eq!(tick_due(&viewer), due + 500.0);

        // the transition is still loading: the next tick only re-arms
        let next = tick_due(&viewer);
        viewer.advance(next);
        assert_eq!(viewer.state().requested_index(), Some(1));
        assert_eq!(tick_due(&viewer), next + 500.0);

        resolve_month(&mut viewer, m("2000-02"), &[]);
        viewer.render_frame(next + 16.0);
        assert_eq!(viewer.state().visible_month(), Some(m("2000-02")));
        assert!(viewer.state().is_playing());
    }

    /// Playback runs past the last month back to the first
    #[test]
    fn test_playback_wraps_to_first_month() {
        let mut viewer = viewer_with(two_tile_view(), "2000-03", ViewerConfig::for_testing());
        commit(&mut viewer, 2, 16.0);
        viewer.toggle_playback();
        finish_prefetch(&mut viewer);

        viewer.advance(tick_due(&viewer));
        assert_eq!(viewer.state().pending().unwrap().month, m("2000-01"));
        assert_eq!(viewer.state().requested_index(), Some(0));
    }

    /// Navigating by hand stops playback and disarms its timer
    #[test]
    fn test_navigation_stops_playback() {
        let mut viewer = viewer(two_tile_view());
        commit(&mut viewer, 0, 16.0);
        viewer.toggle_playback();
        assert!(viewer.state().playback_timer().is_some());

        viewer.dispatch(ViewerCommand::StepForward);
        assert!(!viewer.state().is_playing());
        assert!(!viewer.ui().playing);
        assert!(viewer.state().playback_timer().is_none());
        assert!(viewer.state().buffering().is_none());
        assert_eq!(viewer.state().pending().unwrap().month, m("2000-02"));
    }

    /// Toggling twice leaves nothing scheduled
    #[test]
    fn test_toggle_twice_stops() {
        let mut viewer = viewer(two_tile_view());
        commit(&mut viewer, 0, 16.0);
        viewer.dispatch(ViewerCommand::TogglePlayback);
        viewer.dispatch(ViewerCommand::TogglePlayback);
        assert!(!viewer.state().is_playing());
        assert!(viewer.state().playback_timer().is_none());
        assert!(!viewer
            .events()
            .timer_tasks()
            .any(|task| *task == Task::PlaybackTick));
    }

    /// A rate change re-arms a running playback at the new interval
    #[test]
    fn test_set_fps_reschedules() {
        let mut viewer = viewer(two_tile_view());
        commit(&mut viewer, 0, 16.0);
        viewer.toggle_playback();
        let now = viewer.now();

        viewer.dispatch(ViewerCommand::SetFps("4".to_string()));
        assert_eq!(viewer.state().fps(), 4.0);
        assert!(viewer.state().is_playing());
        assert_eq!(tick_due(&viewer), now + 250.0);

        viewer.dispatch(ViewerCommand::SetFps("abc".to_string()));
        assert_eq!(viewer.state().fps(), 2.0);
        assert_eq!(tick_due(&viewer), now + 500.0);
        assert_eq!(viewer.events().timer_tasks().filter(|task| **task == Task::PlaybackTick).count(), 1);
    }

    /// While stopped, a rate change is remembered without arming anything
    #[test]
    fn test_set_fps_while_stopped() {
        let mut viewer = viewer(two_tile_view());
        viewer.dispatch(ViewerCommand::SetFps("9".to_string()));
        assert_eq!(viewer.state().fps(), 5.0);
        assert_eq!(viewer.frame_interval_ms(), 200.0);
        assert!(viewer.state().playback_timer().is_none());
    }

    /// A view change forgets the buffering month
    #[test]
    fn test_view_change_resets_buffering() {
        let mut viewer = viewer(two_tile_view());
        commit(&mut viewer, 0, 16.0);
        viewer.toggle_playback();
        viewer.advance(tick_due(&viewer));
        assert!(viewer.state().buffering().is_some());

        viewer.surface_mut().set_viewport(four_tile_view());
        viewer.on_view_settled();
        assert!(viewer.state().buffering().is_none());
        assert_eq!(
            viewer.state().prefetch().job_months(),
            vec![m("2000-02"), m("2000-03"), m("2000-04")]
        );
    }
}
