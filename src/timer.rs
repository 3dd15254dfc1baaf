//! # timers
//!
//! The delay and sound timers count down at 60Hz on their own threads, next to
//! the interpreter's main loop. Each timer owns at most one background task;
//! writing a new value cancels and joins the old task before starting another,
//! so two tasks never decrement the same counter. The counter itself is an
//! atomic shared between the main loop and the task.
//!
//! Time comes from a [`Clock`], so tests can drive the ticks by hand with
//! [`ManualClock`].
use crate::sound::{Mute, Sound};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const TIMER_HZ: u64 = 60;

pub fn timer_period() -> Duration {
    Duration::from_nanos(1_000_000_000 / TIMER_HZ)
}

/// Source of periodic ticks for the timers.
pub trait Clock: Send + Sync {
    /// a channel that yields once per `period` for as long as it's held
    fn ticker(&self, period: Duration) -> Receiver<Instant>;
}

/// real time
#[derive(Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn ticker(&self, period: Duration) -> Receiver<Instant> {
        crossbeam_channel::tick(period)
    }
}

/// ticks only when told to, whatever the period
#[derive(Default)]
pub struct ManualClock {
    tickers: Mutex<Vec<Sender<Instant>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// deliver one tick to every ticker still being listened to
    pub fn tick(&self) {
        let now = Instant::now();
        self.tickers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(now).is_ok());
    }

    pub fn tick_n(&self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }
}

impl Clock for ManualClock {
    fn ticker(&self, _period: Duration) -> Receiver<Instant> {
        let (tx, rx) = unbounded();
        self.tickers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }
}

type SharedSound = Arc<Mutex<Box<dyn Sound>>>;

fn tone(sound: &SharedSound, on: bool) {
    let mut sound = sound.lock().unwrap_or_else(PoisonError::into_inner);
    let res = if on { sound.beep() } else { sound.stop() };
    if let Err(e) = res {
        log::warn!("can't switch tone {}: {}", if on { "on" } else { "off" }, e);
    }
}

struct TimerTask {
    // dropping this disconnects the channel and wakes the task
    cancel: Sender<()>,
    handle: JoinHandle<()>,
}

/// An 8-bit counter that runs itself down to zero at 60Hz once set.
pub struct CountdownTimer {
    name: &'static str,
    value: Arc<AtomicU8>,
    disabled: bool,
    clock: Arc<dyn Clock>,
    sound: Option<SharedSound>,
    task: Option<TimerTask>,
}

impl CountdownTimer {
    pub fn new(name: &'static str, clock: Arc<dyn Clock>) -> Self {
        CountdownTimer {
            name,
            value: Arc::new(AtomicU8::new(0)),
            disabled: false,
            clock,
            sound: None,
            task: None,
        }
    }

    /// a timer that holds a tone on while it's running
    pub fn with_sound(
        name: &'static str,
        clock: Arc<dyn Clock>,
        sound: Box<dyn Sound>,
    ) -> Self {
        let mut timer = Self::new(name, clock);
        timer.sound = Some(Arc::new(Mutex::new(sound)));
        timer
    }

    pub fn get(&self) -> u8 {
        self.value.load(Ordering::SeqCst)
    }

    /// store `val` and, unless disabled, (re)start the countdown
    pub fn set(&mut self, val: u8) {
        self.cancel();
        self.value.store(val, Ordering::SeqCst);
        if self.disabled {
            return;
        }
        if val == 0 {
            if let Some(sound) = &self.sound {
                tone(sound, false);
            }
            return;
        }
        self.start();
    }

    /// stop ticking; get/set become plain storage
    pub fn disable(&mut self) {
        self.cancel();
        self.disabled = true;
    }

    pub fn enable(&mut self) {
        self.disabled = false;
        if self.get() > 0 && self.task.is_none() {
            self.start();
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map_or(false, |task| !task.handle.is_finished())
    }

    /// block until the current countdown has reached zero by itself
    pub fn wait_expired(&mut self) {
        if let Some(task) = self.task.take() {
            let TimerTask { cancel, handle } = task;
            if handle.join().is_err() {
                log::error!("{} timer task panicked", self.name);
            }
            drop(cancel);
        }
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            drop(task.cancel);
            if task.handle.join().is_err() {
                log::error!("{} timer task panicked", self.name);
            }
            log::debug!("{} timer cancelled at {}", self.name, self.get());
        }
    }

    fn start(&mut self) {
        // grab the ticker here rather than in the task so no tick is missed
        let ticks = self.clock.ticker(timer_period());
        let (cancel, cancelled) = bounded::<()>(0);
        let name = self.name;
        let value = Arc::clone(&self.value);
        let sound = self.sound.clone();
        log::debug!("{} timer started at {}", name, self.get());
        let handle = thread::spawn(move || loop {
            select! {
                recv(cancelled) -> _ => return,
                recv(ticks) -> tick => {
                    if tick.is_err() || !countdown_step(&value, sound.as_ref()) {
                        log::debug!("{} timer expired", name);
                        return;
                    }
                }
            }
        });
        self.task = Some(TimerTask { cancel, handle });
    }
}

/// one tick: decrement and drive the tone. false once the counter is spent
fn countdown_step(value: &AtomicU8, sound: Option<&SharedSound>) -> bool {
    match value.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1)) {
        Ok(prev) => {
            if let Some(sound) = sound {
                tone(sound, true);
                if prev == 1 {
                    tone(sound, false);
                }
            }
            prev > 1
        }
        Err(_) => {
            if let Some(sound) = sound {
                tone(sound, false);
            }
            false
        }
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel();
        if let Some(sound) = &self.sound {
            tone(sound, false);
        }
    }
}

/// The machine's two timers.
pub struct Timers {
    pub delay: CountdownTimer,
    pub sound: CountdownTimer,
}

impl Timers {
    pub fn new(clock: Arc<dyn Clock>, sound: Box<dyn Sound>) -> Self {
        Timers {
            delay: CountdownTimer::new("delay", Arc::clone(&clock)),
            sound: CountdownTimer::with_sound("sound", clock, sound),
        }
    }

    /// both timers as plain storage; handy for deterministic tests
    pub fn disabled() -> Self {
        let mut timers = Self::default();
        timers.delay.disable();
        timers.sound.disable();
        timers
    }
}

impl Default for Timers {
    fn default() -> Self {
        Self::new(Arc::new(WallClock), Box::new(Mute::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Default)]
    struct CountingSound {
        ons: Arc<AtomicUsize>,
        offs: Arc<AtomicUsize>,
    }

    impl Sound for CountingSound {
        fn beep(&mut self) -> Result<(), Box<dyn Error>> {
            self.ons.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&mut self) -> Result<(), Box<dyn Error>> {
            self.offs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// spin until the background task has caught up with the ticks sent
    fn settle(timer: &CountdownTimer, val: u8) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while timer.get() != val {
            assert!(Instant::now() < deadline, "timer stuck at {}", timer.get());
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_delay_reaches_zero_after_n_ticks() {
        let clock = Arc::new(ManualClock::new());
        let mut t = CountdownTimer::new("delay", clock.clone());
        t.set(5);
        assert!(t.is_running());
        clock.tick_n(4);
        settle(&t, 1);
        assert!(t.is_running());
        clock.tick();
        t.wait_expired();
        assert_eq!(t.get(), 0);
        assert!(!t.is_running());
    }

    #[test]
    fn test_sound_stops_toning_at_zero() {
        let clock = Arc::new(ManualClock::new());
        let sound = CountingSound::default();
        let mut t = CountdownTimer::with_sound("sound", clock.clone(), Box::new(sound.clone()));
        t.set(3);
        clock.tick_n(3);
        t.wait_expired();
        assert_eq!(t.get(), 0);
        assert_eq!(sound.ons.load(Ordering::SeqCst), 3);
        assert_eq!(sound.offs.load(Ordering::SeqCst), 1);

        clock.tick_n(5);
        assert_eq!(sound.ons.load(Ordering::SeqCst), 3);
        assert_eq!(sound.offs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_restart_replaces_task() {
        let clock = Arc::new(ManualClock::new());
        let mut t = CountdownTimer::new("delay", clock.clone());
        t.set(10);
        clock.tick_n(2);
        settle(&t, 8);
        t.set(3);
        // the old task is gone, so nothing moves without a tick
        assert_eq!(t.get(), 3);
        clock.tick_n(3);
        t.wait_expired();
        assert_eq!(t.get(), 0);
    }

    #[test]
    fn test_set_zero_cancels() {
        let clock = Arc::new(ManualClock::new());
        let sound = CountingSound::default();
        let mut t = CountdownTimer::with_sound("sound", clock.clone(), Box::new(sound.clone()));
        t.set(10);
        clock.tick();
        settle(&t, 9);
        t.set(0);
        assert!(!t.is_running());
        assert_eq!(sound.offs.load(Ordering::SeqCst), 1);
        clock.tick_n(3);
        assert_eq!(t.get(), 0);
    }

    #[test]
    fn test_disabled_is_plain_storage() {
        let clock = Arc::new(ManualClock::new());
        let mut t = CountdownTimer::new("delay", clock.clone());
        t.disable();
        t.set(105);
        assert!(!t.is_running());
        clock.tick_n(10);
        assert_eq!(t.get(), 105);

        t.enable();
        assert!(t.is_running());
        clock.tick();
        settle(&t, 104);
    }

    #[test]
    fn test_wall_clock_runs_down() {
        let mut t = CountdownTimer::new("delay", Arc::new(WallClock));
        t.set(2);
        t.wait_expired();
        assert_eq!(t.get(), 0);
    }

    #[test]
    fn test_disabled_timers() {
        let mut timers = Timers::disabled();
        timers.delay.set(7);
        timers.sound.set(9);
        assert_eq!((timers.delay.get(), timers.sound.get()), (7, 9));
        assert!(!timers.delay.is_running() && !timers.sound.is_running());
    }
}
