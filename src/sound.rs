use beep::beep;
use std::error::Error;

/// Tone output driven by the sound timer. It gets called from the timer's
/// background thread, hence `Send`.
pub trait Sound: Send {
    /// tone on
    fn beep(&mut self) -> Result<(), Box<dyn Error>>;
    /// tone off
    fn stop(&mut self) -> Result<(), Box<dyn Error>>;
}

pub const SIMPLEBEEP_PITCH: u16 = 2093; // C

/// PC speaker tone via the `beep` crate
pub struct SimpleBeep {
    pitch: u16,
    is_beeping: bool,
}

impl SimpleBeep {
    pub fn new(pitch: u16) -> Self {
        SimpleBeep {
            pitch,
            is_beeping: false,
        }
    }
}

impl Default for SimpleBeep {
    fn default() -> Self {
        Self::new(SIMPLEBEEP_PITCH)
    }
}

impl Sound for SimpleBeep {
    fn beep(&mut self) -> Result<(), Box<dyn Error>> {
        // the timer calls this every tick; only touch the device on the edge
        if !self.is_beeping {
            beep(self.pitch)?;
            self.is_beeping = true;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn Error>> {
        if self.is_beeping {
            beep(0)?;
            self.is_beeping = false;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct Mute {}

impl Mute {
    pub fn new() -> Self {
        Mute {}
    }
}

impl Sound for Mute {
    fn beep(&mut self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}
