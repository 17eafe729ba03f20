//! Arbitration between the network time source and the battery-backed
//! hardware clock.
//!
//! The arbiter keeps an approximate count of minutes since the last
//! completed network sync: it bumps once per tick on which the observed
//! minute value changed. Shortly after a sync completes the corrected
//! system time is pushed into the hardware clock exactly once; when no
//! sync has completed for the configured threshold, the hardware clock
//! is read back as a stopgap. The internal oscillator drifts far more
//! than the dedicated clock chip, so the stopgap keeps the display
//! honest during long offline stretches without ever counting as a
//! sync itself.

/// State of the network time collaborator, observed once per tick.
/// `Completed` is a latch: it is reported once per finished sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    InProgress,
    Completed,
}

/// What the tick loop should do with the clocks this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    None,
    /// Fresh sync landed a minute ago: write system time to the
    /// hardware clock.
    PushToHardware,
    /// No sync for a threshold multiple: read the hardware clock and
    /// correct the system clock from it.
    CorrectFromHardware,
}

/// Minute counter and decision logic, stepped once per tick.
#[derive(Debug, Clone)]
pub struct SyncArbiter {
    threshold: u32,
    minutes_since_sync: u32,
    last_minute: Option<i32>,
}

impl SyncArbiter {
    pub fn new(threshold: u32) -> Self {
        Self {
            // A zero threshold would turn the stopgap into a
            // every-minute correction; clamp it away.
            threshold: threshold.max(1),
            minutes_since_sync: 0,
            last_minute: None,
        }
    }

    /// Minutes since the last completed sync, saturating.
    pub fn minutes_since_sync(&self) -> u32 {
        self.minutes_since_sync
    }

    /// Change the stopgap threshold without disturbing the counter,
    /// e.g. on a configuration reload.
    pub fn set_threshold(&mut self, threshold: u32) {
        self.threshold = threshold.max(1);
    }

    /// Advance the arbiter by one tick.
    ///
    /// `minute` is the current local minute value; `status` the latched
    /// sync state. Clock actions are only requested on ticks where the
    /// minute changed, so each eligible minute triggers at most one
    /// hardware-clock operation.
    pub fn step(&mut self, minute: i32, status: SyncStatus) -> SyncAction {
        let minute_changed = self.last_minute != Some(minute);
        self.last_minute = Some(minute);
        if minute_changed {
            self.minutes_since_sync = self.minutes_since_sync.saturating_add(1);
        }

        if status == SyncStatus::Completed {
            self.minutes_since_sync = 0;
        }

        if !minute_changed {
            return SyncAction::None;
        }

        // The counter passes 1 exactly once per reset cycle, which
        // makes the push a one-shot without a separate written flag.
        if self.minutes_since_sync == 1 {
            return SyncAction::PushToHardware;
        }
        if self.minutes_since_sync > 0 && self.minutes_since_sync % self.threshold == 0 {
            return SyncAction::CorrectFromHardware;
        }
        SyncAction::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Step through `minutes` of ticks (two per minute) with an idle
    /// sync source, collecting any non-trivial actions.
    fn run_idle(arbiter: &mut SyncArbiter, start_minute: i32, minutes: i32) -> Vec<SyncAction> {
        let mut actions = Vec::new();
        for m in 0..minutes {
            let minute = (start_minute + m).rem_euclid(60);
            for _ in 0..2 {
                let action = arbiter.step(minute, SyncStatus::Idle);
                if action != SyncAction::None {
                    actions.push(action);
                }
            }
        }
        actions
    }

    #[test]
    fn completed_sync_resets_the_counter() {
        let mut arbiter = SyncArbiter::new(121);
        run_idle(&mut arbiter, 0, 5);
        assert_eq!(arbiter.minutes_since_sync(), 5);

        arbiter.step(5, SyncStatus::Completed);
        assert_eq!(arbiter.minutes_since_sync(), 0);
    }

    #[test]
    fn pushes_to_hardware_exactly_once_after_a_sync() {
        let mut arbiter = SyncArbiter::new(121);
        run_idle(&mut arbiter, 0, 3);
        arbiter.step(2, SyncStatus::Completed);

        // The next minute change passes the counter through 1: one
        // push, and only one, even across repeated ticks.
        assert_eq!(arbiter.step(3, SyncStatus::Idle), SyncAction::PushToHardware);
        assert_eq!(arbiter.step(3, SyncStatus::Idle), SyncAction::None);
        assert_eq!(arbiter.step(4, SyncStatus::Idle), SyncAction::None);
    }

    #[test]
    fn boot_counts_as_a_push_window() {
        // With no sync ever completed the counter still passes 1 on
        // the first minute change after start.
        let mut arbiter = SyncArbiter::new(121);
        assert_eq!(arbiter.step(10, SyncStatus::Idle), SyncAction::PushToHardware);
        assert_eq!(arbiter.step(11, SyncStatus::Idle), SyncAction::None);
    }

    #[test]
    fn corrects_from_hardware_at_threshold_multiples() {
        let mut arbiter = SyncArbiter::new(5);
        let actions = run_idle(&mut arbiter, 0, 11);

        assert_eq!(
            actions,
            vec![
                SyncAction::PushToHardware,      // counter 1
                SyncAction::CorrectFromHardware, // counter 5
                SyncAction::CorrectFromHardware, // counter 10
            ]
        );
        // The stopgap never resets the counter.
        assert_eq!(arbiter.minutes_since_sync(), 11);
    }

    #[test]
    fn in_progress_status_changes_nothing() {
        let mut arbiter = SyncArbiter::new(121);
        run_idle(&mut arbiter, 0, 2);
        let before = arbiter.minutes_since_sync();
        arbiter.step(1, SyncStatus::InProgress);
        assert_eq!(arbiter.minutes_since_sync(), before);
    }

    #[test]
    fn default_threshold_is_respected() {
        let mut arbiter = SyncArbiter::new(121);
        let actions = run_idle(&mut arbiter, 0, 122);
        assert_eq!(
            actions,
            vec![SyncAction::PushToHardware, SyncAction::CorrectFromHardware]
        );
        assert_eq!(arbiter.minutes_since_sync(), 122);
    }
}
