//! Core tick loop and runtime state.
//!
//! One cooperative loop drives the whole clock: it sleeps until just
//! past each wall-clock :00 / :30 boundary, re-derives local time,
//! feeds the display, arbitrates between the network time source and
//! the hardware clock, evaluates the alarm schedule and trickles dirty
//! settings out to persistence. External inputs (signals, config
//! changes) are drained from a channel between ticks, so a tick never
//! sees half-applied state.

use anyhow::Result;
use std::sync::atomic::Ordering;
use std::sync::mpsc::RecvTimeoutError;

use crate::{
    alarm::{
        AlarmSettings, AlarmState,
        engine::{self, AlarmDecision},
    },
    config::Config,
    constants::SETTINGS_BLOB,
    hw::{AudioSink, HardwareClock, SyncMonitor, SystemClock, TickSink},
    io::signals::{SignalMessage, SignalState},
    io::store::{DeferredWrite, SettingsStore},
    sched::{
        next_tick_delay,
        sync::{SyncAction, SyncArbiter, SyncStatus},
    },
    tz::TimezoneInfo,
};

/// Everything the core needs, bundled to keep the constructor sane.
pub(crate) struct CoreParams {
    pub config: Config,
    pub signal_state: SignalState,
    pub debug_enabled: bool,
    pub system_clock: Box<dyn SystemClock>,
    pub hardware_clock: Box<dyn HardwareClock>,
    pub sync_monitor: Box<dyn SyncMonitor>,
    pub audio: Box<dyn AudioSink>,
    pub tick_sinks: Vec<Box<dyn TickSink>>,
    pub store: Box<dyn SettingsStore>,
}

/// The running clock: collaborators plus all mutable scheduling state.
pub(crate) struct Core {
    config: Config,
    signal_state: SignalState,
    debug_enabled: bool,
    system_clock: Box<dyn SystemClock>,
    hardware_clock: Box<dyn HardwareClock>,
    sync_monitor: Box<dyn SyncMonitor>,
    audio: Box<dyn AudioSink>,
    tick_sinks: Vec<Box<dyn TickSink>>,
    store: Box<dyn SettingsStore>,
    timezone: TimezoneInfo,
    arbiter: SyncArbiter,
    alarm: AlarmState,
    persist: DeferredWrite,
    alarm_sounding: bool,
}

impl Core {
    pub fn new(params: CoreParams) -> Result<Self> {
        let timezone = TimezoneInfo::from_descriptor(params.config.timezone())?;
        let arbiter = SyncArbiter::new(params.config.no_sync_threshold());

        let mut core = Self {
            timezone,
            arbiter,
            alarm: AlarmState::default(),
            persist: DeferredWrite::default(),
            alarm_sounding: false,
            config: params.config,
            signal_state: params.signal_state,
            debug_enabled: params.debug_enabled,
            system_clock: params.system_clock,
            hardware_clock: params.hardware_clock,
            sync_monitor: params.sync_monitor,
            audio: params.audio,
            tick_sinks: params.tick_sinks,
            store: params.store,
        };
        core.load_alarm_settings();
        Ok(core)
    }

    /// Pull the persisted alarm settings, falling back to defaults on a
    /// fresh install (which then get written out through the deferred
    /// path).
    fn load_alarm_settings(&mut self) {
        match self.store.load_blob(SETTINGS_BLOB) {
            Ok(Some(blob)) => match serde_json::from_slice::<AlarmSettings>(&blob) {
                Ok(settings) => {
                    self.alarm = AlarmState::new(settings);
                    return;
                }
                Err(e) => {
                    log_pipe!();
                    log_warning!("Stored alarm settings are unreadable: {e}");
                    log_indented!("Starting from defaults");
                }
            },
            Ok(None) => {
                log_block_start!("No stored alarm settings, starting from defaults");
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Could not load alarm settings: {e}");
                log_indented!("Starting from defaults");
            }
        }
        self.alarm = AlarmState::default();
        self.persist.mark_dirty();
    }

    /// Run the clock until shutdown.
    pub fn execute(mut self) -> Result<()> {
        // The internal clock is meaningless at power-on; the hardware
        // clock is authoritative until the first network sync lands.
        match self.hardware_clock.read() {
            Ok(instant) => {
                self.system_clock.set_utc(instant);
                log_block_start!("Seeded system clock from hardware clock");
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Hardware clock unreadable at startup: {e}");
                log_indented!("Continuing on the unseeded system clock");
            }
        }

        log_block_start!("Clock running, ticking twice a minute");
        if self.debug_enabled {
            let local = self.timezone.to_local(self.system_clock.now_utc());
            log_debug!(
                "Local time {:02}:{:02}:{:02}, daylight {:?}",
                local.hour,
                local.minute,
                local.second,
                local.dst
            );
        }

        while self.signal_state.running.load(Ordering::SeqCst) {
            let local = self.timezone.to_local(self.system_clock.now_utc());
            let delay =
                next_tick_delay(i64::from(local.second), self.system_clock.subsec_micros());

            match self.signal_state.signal_receiver.recv_timeout(delay) {
                Ok(message) => self.handle_signal(message),
                Err(RecvTimeoutError::Timeout) => self.tick(),
                Err(RecvTimeoutError::Disconnected) => {
                    if self.signal_state.running.load(Ordering::SeqCst) {
                        log_pipe!();
                        log_warning!("Signal handler disconnected unexpectedly");
                        log_indented!("External snooze and reload are no longer available");
                        // Degrade to a plain tick instead of spinning.
                        std::thread::sleep(delay);
                        self.tick();
                    }
                }
            }
        }

        log_block_start!("Shutting down dotclock...");
        if self.alarm_sounding {
            self.audio.stop();
        }
        if self.persist.is_dirty() {
            self.save_alarm_settings();
        }
        log_end!();
        Ok(())
    }

    /// One scheduled tick, just past a half-minute boundary.
    fn tick(&mut self) {
        let now = self.system_clock.now_utc();
        let local = self.timezone.to_local(now);

        for sink in &mut self.tick_sinks {
            sink.tick(&local);
        }

        self.arbitrate_time_sources(local.minute);
        self.evaluate_alarm(&local);

        if self.persist.tick() {
            self.save_alarm_settings();
        }
    }

    /// The once-per-tick sync policy: push a freshly synced time into
    /// the hardware clock, or fall back to it after a long dry spell.
    fn arbitrate_time_sources(&mut self, minute: i32) {
        let status = self.sync_monitor.status();
        match status {
            SyncStatus::Completed => {
                log_block_start!("Network time sync complete");
            }
            SyncStatus::InProgress if self.debug_enabled => {
                log_debug!("Network time sync in progress");
            }
            _ => {}
        }

        match self.arbiter.step(minute, status) {
            SyncAction::None => {}
            SyncAction::PushToHardware => {
                let now = self.system_clock.now_utc();
                match self.hardware_clock.write(now) {
                    Ok(()) => log_decorated!("Synced time pushed to hardware clock"),
                    Err(e) => {
                        log_pipe!();
                        log_error!("Failed to push time to hardware clock: {e}");
                    }
                }
            }
            SyncAction::CorrectFromHardware => {
                // The internal oscillator has been on its own too long;
                // trust the clock chip instead. Not a sync, so the
                // counter keeps running.
                match self.hardware_clock.read() {
                    Ok(instant) => {
                        self.system_clock.set_utc(instant);
                        log_block_start!(
                            "No network sync for {} minutes, corrected from hardware clock",
                            self.arbiter.minutes_since_sync()
                        );
                    }
                    Err(e) => {
                        log_pipe!();
                        log_error!("Failed to read hardware clock: {e}");
                    }
                }
            }
        }
    }

    /// Ask the rule engine what to play and carry its pending alarm
    /// into the next tick.
    fn evaluate_alarm(&mut self, local: &crate::tz::calendar::LocalTime) {
        let evaluation = engine::evaluate(
            &self.alarm.settings.alarms,
            local,
            self.alarm.pending.as_ref(),
            self.alarm.settings.alarm_on,
        );
        self.alarm.pending = evaluation.pending;

        match evaluation.decision {
            AlarmDecision::Fired { sound } => {
                log_block_start!("Alarm ringing ({sound})");
                if let Err(e) = self.audio.play(&sound, true) {
                    log_pipe!();
                    log_error!("Failed to start alarm playback: {e}");
                } else {
                    self.alarm_sounding = true;
                }
            }
            AlarmDecision::Ancillary { sound } => {
                log_block_start!("Playing scheduled sound ({sound})");
                if let Err(e) = self.audio.play(&sound, false) {
                    log_pipe!();
                    log_error!("Failed to start playback: {e}");
                }
            }
            AlarmDecision::Nothing => {}
        }
    }

    /// Apply one external input between ticks.
    fn handle_signal(&mut self, message: SignalMessage) {
        match message {
            SignalMessage::Shutdown => {
                self.signal_state.running.store(false, Ordering::SeqCst);
            }
            SignalMessage::Snooze => {
                if self.alarm_sounding {
                    self.audio.stop();
                    self.alarm_sounding = false;
                }
                self.alarm.snooze();
                match self.alarm.pending.as_ref() {
                    Some(pending) => {
                        log_block_start!(
                            "Alarm snoozed until {:02}:{:02}",
                            pending.hour,
                            pending.minute
                        );
                    }
                    None => {
                        log_block_start!("Snooze requested but no alarm is pending");
                    }
                }
            }
            SignalMessage::Reload => self.reload_config(),
        }
    }

    /// Re-read the configuration file. Any failure keeps the currently
    /// active configuration in full.
    fn reload_config(&mut self) {
        log_block_start!("Reloading configuration...");
        let new_config = match Config::load() {
            Ok(config) => config,
            Err(e) => {
                log_pipe!();
                log_warning!("Configuration reload failed: {e:#}");
                log_indented!("Keeping the previous configuration");
                return;
            }
        };

        if new_config.timezone() != self.config.timezone() {
            match TimezoneInfo::from_descriptor(new_config.timezone()) {
                Ok(timezone) => {
                    self.timezone = timezone;
                    log_decorated!("Timezone changed to {}", new_config.timezone());
                }
                Err(e) => {
                    // Load-time validation normally catches this; keep
                    // the previous timezone either way.
                    log_pipe!();
                    log_warning!("{e}");
                    log_indented!("Keeping the previous timezone");
                }
            }
        }

        if new_config.no_sync_threshold() != self.config.no_sync_threshold() {
            self.arbiter.set_threshold(new_config.no_sync_threshold());
            log_decorated!(
                "No-sync threshold changed to {} minutes",
                new_config.no_sync_threshold()
            );
        }

        if new_config.ntp_server() != self.config.ntp_server() {
            // The network time collaborator owns the actual connection.
            log_decorated!("NTP server changed to {}", new_config.ntp_server());
        }

        self.config = new_config;
        log_decorated!("Configuration reloaded");
    }

    fn save_alarm_settings(&mut self) {
        let blob = match serde_json::to_vec(&self.alarm.settings) {
            Ok(blob) => blob,
            Err(e) => {
                log_pipe!();
                log_error!("Could not encode alarm settings: {e}");
                return;
            }
        };
        match self.store.save_blob(SETTINGS_BLOB, &blob) {
            Ok(()) => {
                log_decorated!("Alarm settings written to the settings store");
            }
            Err(e) => {
                log_pipe!();
                log_error!("Failed to persist alarm settings: {e}");
                // Leave the blob dirty so a later tick retries.
                self.persist.mark_dirty();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClockError;
    use crate::io::signals::SignalState;
    use crate::tz::calendar::secs_from_civil;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    struct Recorded {
        system_now: i64,
        system_sets: Vec<i64>,
        rtc_value: i64,
        rtc_fails: bool,
        rtc_writes: Vec<i64>,
        status: SyncStatus,
        played: Vec<(String, bool)>,
        stops: usize,
        blobs: Vec<Vec<u8>>,
    }

    impl Default for Recorded {
        fn default() -> Self {
            Self {
                system_now: 0,
                system_sets: Vec::new(),
                rtc_value: 0,
                rtc_fails: false,
                rtc_writes: Vec::new(),
                status: SyncStatus::Idle,
                played: Vec::new(),
                stops: 0,
                blobs: Vec::new(),
            }
        }
    }

    #[derive(Clone)]
    struct Shared(Rc<RefCell<Recorded>>);

    impl SystemClock for Shared {
        fn now_utc(&self) -> i64 {
            self.0.borrow().system_now
        }
        fn subsec_micros(&self) -> i64 {
            0
        }
        fn set_utc(&mut self, instant: i64) {
            let mut inner = self.0.borrow_mut();
            inner.system_now = instant;
            inner.system_sets.push(instant);
        }
    }

    impl HardwareClock for Shared {
        fn read(&mut self) -> Result<i64, ClockError> {
            let inner = self.0.borrow();
            if inner.rtc_fails {
                return Err(ClockError::device(
                    "hardware clock",
                    std::io::Error::other("bus busy"),
                ));
            }
            Ok(inner.rtc_value)
        }
        fn write(&mut self, instant: i64) -> Result<(), ClockError> {
            let mut inner = self.0.borrow_mut();
            if inner.rtc_fails {
                return Err(ClockError::device(
                    "hardware clock",
                    std::io::Error::other("bus busy"),
                ));
            }
            inner.rtc_writes.push(instant);
            Ok(())
        }
    }

    impl SyncMonitor for Shared {
        fn status(&mut self) -> SyncStatus {
            // Completed is a latch: observed once, then back to idle.
            let mut inner = self.0.borrow_mut();
            let status = inner.status;
            if status == SyncStatus::Completed {
                inner.status = SyncStatus::Idle;
            }
            status
        }
    }

    impl AudioSink for Shared {
        fn play(&mut self, sound: &str, looped: bool) -> Result<(), ClockError> {
            self.0.borrow_mut().played.push((sound.to_string(), looped));
            Ok(())
        }
        fn stop(&mut self) {
            self.0.borrow_mut().stops += 1;
        }
    }

    impl SettingsStore for Shared {
        fn load_blob(&mut self, _name: &str) -> Result<Option<Vec<u8>>, ClockError> {
            Ok(None)
        }
        fn save_blob(&mut self, _name: &str, blob: &[u8]) -> Result<(), ClockError> {
            self.0.borrow_mut().blobs.push(blob.to_vec());
            Ok(())
        }
    }

    fn test_signal_state() -> SignalState {
        let (signal_sender, signal_receiver) = std::sync::mpsc::channel();
        SignalState {
            running: Arc::new(AtomicBool::new(true)),
            signal_receiver,
            signal_sender,
        }
    }

    fn test_core(shared: &Shared, timezone: &str) -> Core {
        test_core_with_threshold(shared, timezone, 121)
    }

    fn test_core_with_threshold(shared: &Shared, timezone: &str, threshold: u32) -> Core {
        crate::logger::Log::set_enabled(false);
        let config = Config {
            timezone: Some(timezone.to_string()),
            no_sync_threshold: Some(threshold),
            ..Config::default()
        };
        let mut core = Core::new(CoreParams {
            config,
            signal_state: test_signal_state(),
            debug_enabled: false,
            system_clock: Box::new(shared.clone()),
            hardware_clock: Box::new(shared.clone()),
            sync_monitor: Box::new(shared.clone()),
            audio: Box::new(shared.clone()),
            tick_sinks: Vec::new(),
            store: Box::new(shared.clone()),
        })
        .unwrap();
        // Arm the alarm for the playback tests.
        core.alarm.settings.alarm_on = true;
        core
    }

    #[test]
    fn alarm_minute_starts_looping_playback_once() {
        let shared = Shared(Rc::new(RefCell::new(Recorded::default())));
        let mut core = test_core(&shared, "UTC0");

        // Default primary alarm rings at 10:15. Tick at 10:15:01 UTC.
        shared.0.borrow_mut().system_now = secs_from_civil(2021, 5, 15, 10, 15, 1);
        core.tick();
        // The :30 tick of the same minute stays quiet.
        shared.0.borrow_mut().system_now = secs_from_civil(2021, 5, 15, 10, 15, 31);
        core.tick();

        let played = shared.0.borrow().played.clone();
        assert_eq!(played, vec![("bird1".to_string(), true)]);
    }

    #[test]
    fn snooze_stops_playback_and_moves_the_ring() {
        let shared = Shared(Rc::new(RefCell::new(Recorded::default())));
        let mut core = test_core(&shared, "UTC0");

        shared.0.borrow_mut().system_now = secs_from_civil(2021, 5, 15, 10, 15, 1);
        core.tick();
        assert!(core.alarm_sounding);

        core.handle_signal(SignalMessage::Snooze);
        assert_eq!(shared.0.borrow().stops, 1);
        assert!(!core.alarm_sounding);
        let pending = core.alarm.pending.clone().unwrap();
        assert_eq!((pending.hour, pending.minute), (10, 20));

        // Five minutes later the snoozed ring fires again.
        shared.0.borrow_mut().system_now = secs_from_civil(2021, 5, 15, 10, 20, 2);
        core.tick();
        assert_eq!(shared.0.borrow().played.len(), 2);
    }

    #[test]
    fn completed_sync_pushes_hardware_clock_once() {
        let shared = Shared(Rc::new(RefCell::new(Recorded::default())));
        let mut core = test_core(&shared, "UTC0");

        // Absorb the boot-time push (the counter passes 1 on the first
        // observed minute).
        let base = secs_from_civil(2021, 5, 15, 12, 0, 1);
        shared.0.borrow_mut().system_now = base;
        core.tick();
        shared.0.borrow_mut().system_now = base + 60;
        core.tick();
        assert_eq!(shared.0.borrow().rtc_writes.len(), 1);

        // A sync completes; the write lands on the next minute change
        // and on no other tick.
        shared.0.borrow_mut().status = SyncStatus::Completed;
        shared.0.borrow_mut().system_now = base + 90;
        core.tick();
        shared.0.borrow_mut().system_now = base + 120;
        core.tick();
        shared.0.borrow_mut().system_now = base + 150;
        core.tick();
        shared.0.borrow_mut().system_now = base + 180;
        core.tick();

        let writes = shared.0.borrow().rtc_writes.clone();
        assert_eq!(writes, vec![base, base + 120]);
    }

    #[test]
    fn stale_sync_corrects_system_clock_from_hardware() {
        let shared = Shared(Rc::new(RefCell::new(Recorded::default())));
        let mut core = test_core_with_threshold(&shared, "UTC0", 3);

        let base = secs_from_civil(2021, 5, 15, 12, 0, 1);
        let rtc_truth = base + 7;
        shared.0.borrow_mut().rtc_value = rtc_truth;

        // Minutes 0, 1, 2: the counter reaches the threshold on the
        // third observed minute and the hardware clock takes over.
        for minute in 0..3 {
            shared.0.borrow_mut().system_now = base + minute * 60;
            core.tick();
        }

        assert_eq!(shared.0.borrow().system_sets, vec![rtc_truth]);
        // The stopgap is not a sync: the counter keeps running.
        assert_eq!(core.arbiter.minutes_since_sync(), 3);
    }

    #[test]
    fn failed_hardware_write_does_not_corrupt_state() {
        let shared = Shared(Rc::new(RefCell::new(Recorded::default())));
        let mut core = test_core(&shared, "UTC0");
        shared.0.borrow_mut().rtc_fails = true;

        let base = secs_from_civil(2021, 5, 15, 12, 0, 1);
        shared.0.borrow_mut().system_now = base;
        core.tick();
        shared.0.borrow_mut().system_now = base + 60;
        core.tick();

        // The write failed but the loop keeps going and the counter
        // keeps its value.
        assert!(shared.0.borrow().rtc_writes.is_empty());
        assert_eq!(core.arbiter.minutes_since_sync(), 2);
    }

    #[test]
    fn fresh_install_persists_defaults_after_the_delay() {
        let shared = Shared(Rc::new(RefCell::new(Recorded::default())));
        let mut core = test_core(&shared, "UTC0");

        let base = secs_from_civil(2021, 5, 15, 3, 0, 1);
        for tick in 0..(crate::constants::PERSIST_DELAY_TICKS + 2) {
            shared.0.borrow_mut().system_now = base + i64::from(tick) * 30;
            core.tick();
        }

        assert_eq!(shared.0.borrow().blobs.len(), 1);
        let settings: AlarmSettings =
            serde_json::from_slice(&shared.0.borrow().blobs[0]).unwrap();
        assert!(settings.alarm_on, "armed flag travels with the blob");
    }
}
