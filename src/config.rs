//! Run-time settings for the interpreter. The binary fills these in from the
//! command line; everything has a sensible default.

use crate::sound::{Mute, SimpleBeep, Sound, SIMPLEBEEP_PITCH};
use std::time::Duration;

/// Pause between cycles of the main loop.
pub const DEFAULT_CYCLE_DELAY: Duration = Duration::from_millis(2);

#[derive(Debug, Clone)]
pub struct Config {
    /// Sleep after every main loop iteration.
    pub cycle_delay: Duration,
    /// Tone frequency in Hz while the sound timer runs.
    pub tone_pitch: u16,
    /// No tone at all; the sound timer still counts down.
    pub mute: bool,
    /// Seed for RND; None seeds from the OS.
    pub rng_seed: Option<u64>,
    /// Keep DT as plain storage, never counting down.
    pub disable_delay_timer: bool,
    /// Keep ST as plain storage, never counting down or beeping.
    pub disable_sound_timer: bool,
    /// Addresses to break at before the first cycle.
    pub breakpoints: Vec<u16>,
    /// Start with the monitor paused at the entry point.
    pub start_paused: bool,
    /// Stop the main loop after this many iterations.
    pub max_cycles: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cycle_delay: DEFAULT_CYCLE_DELAY,
            tone_pitch: SIMPLEBEEP_PITCH,
            mute: false,
            rng_seed: None,
            disable_delay_timer: false,
            disable_sound_timer: false,
            breakpoints: Vec::new(),
            start_paused: false,
            max_cycles: None,
        }
    }
}

impl Config {
    /// the tone device the sound timer should drive
    pub fn sound(&self) -> Box<dyn Sound> {
        if self.mute {
            Box::new(Mute::new())
        } else {
            Box::new(SimpleBeep::new(self.tone_pitch))
        }
    }

    /// cycle delay for a target rate of instructions per second; 0 means flat out
    pub fn with_ips(mut self, ips: u64) -> Self {
        self.cycle_delay = match ips {
            0 => Duration::ZERO,
            ips => Duration::from_nanos(1_000_000_000 / ips),
        };
        self
    }
}

/// Parse an address like `0x2a4`, `2a4` or `$2A4`.
pub fn parse_addr(s: &str) -> Result<u16, String> {
    let digits = s
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X")
        .trim_start_matches('$');
    let addr = u16::from_str_radix(digits, 16).map_err(|e| format!("bad address {s:?}: {e}"))?;
    if addr > 0x0FFF {
        return Err(format!("address {s:?} is past the end of memory"));
    }
    Ok(addr)
}
