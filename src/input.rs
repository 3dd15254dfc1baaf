use crate::error::Chip8Error;
use crate::monitor::{MonitorCommand, MonitorHandle};
use crossterm::event::{poll, read, Event, KeyCode};
use crossterm::terminal;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::{Duration, Instant};

pub const KEYPAD_SIZE: usize = 16;

/// the 16 hex keys of the COSMAC keypad
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Keypad {
    keys: [bool; KEYPAD_SIZE],
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: u8, pressed: bool) -> Result<(), Chip8Error> {
        let slot = self
            .keys
            .get_mut(key as usize)
            .ok_or(Chip8Error::InvalidKey(key))?;
        *slot = pressed;
        Ok(())
    }

    pub fn is_pressed(&self, key: u8) -> Result<bool, Chip8Error> {
        self.keys
            .get(key as usize)
            .copied()
            .ok_or(Chip8Error::InvalidKey(key))
    }

    /// replace the state of every key at once
    pub fn update(&mut self, keys: [bool; KEYPAD_SIZE]) {
        self.keys = keys;
    }

    pub fn release_all(&mut self) {
        self.keys = [false; KEYPAD_SIZE];
    }
}

/// left-hand side of a qwerty keyboard, laid out like the COSMAC keypad
const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); 16] = [
    ('x', 0x00), // x
    ('1', 0x01), // 1
    ('2', 0x02), // 2
    ('3', 0x03), // 3
    ('q', 0x04), // q
    ('w', 0x05), // w
    ('e', 0x06), // e
    ('a', 0x07), // a
    ('s', 0x08), // s
    ('d', 0x09), // d
    ('z', 0x0a), // z
    ('c', 0x0b), // c
    ('4', 0x0c), // 4
    ('r', 0x0d), // r
    ('f', 0x0e), // f
    ('v', 0x0f), // v
];

/// terminals only report key presses, so a key counts as held for this long
/// after its last (auto-repeated) press
const KEY_HOLD: Duration = Duration::from_millis(150);

/// reads keypresses
pub trait Input {
    /// refresh the keypad without blocking. returns false once the user has
    /// asked to quit
    fn handle_input(&mut self, keypad: &mut Keypad) -> Result<bool, io::Error>;

    /// block until a mapped key is pressed and return it. None means the
    /// user asked to quit instead; the next `handle_input` returns false
    fn wait_for_input(&mut self) -> Result<Option<u8>, io::Error>;
}

/// simple implementation of Input, using the terminal in raw mode
///
/// F1 pauses, F2 resumes and F3 single-steps when a monitor handle is
/// attached. Esc quits.
pub struct StdinInput {
    held: [Option<Instant>; KEYPAD_SIZE],
    keymap: HashMap<char, u8>,
    monitor: Option<MonitorHandle>,
    quit: bool,
}

impl StdinInput {
    pub fn new() -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        Ok(StdinInput {
            held: [None; KEYPAD_SIZE],
            keymap: HashMap::from(CHIP8_CONVENTIONAL_KEYMAP),
            monitor: None,
            quit: false,
        })
    }

    /// forward debugger keys to the monitor
    pub fn with_monitor(mut self, monitor: MonitorHandle) -> Self {
        self.monitor = Some(monitor);
        self
    }

    fn map_key(&self, key: char) -> Option<u8> {
        self.keymap.get(&key.to_ascii_lowercase()).copied()
    }

    fn send(&self, cmd: MonitorCommand) {
        match &self.monitor {
            Some(monitor) => monitor.send(cmd),
            None => log::debug!("no monitor attached, dropping {:?}", cmd),
        }
    }

    /// act on one key; returns the keypad key if it was one
    fn key_event(&mut self, code: KeyCode) -> Option<u8> {
        match code {
            KeyCode::Char(key) => match self.map_key(key) {
                Some(mapped_key) => {
                    self.held[mapped_key as usize] = Some(Instant::now());
                    return Some(mapped_key);
                }
                None => log::debug!("can't map {:?} to a COSMAC key", key),
            },
            KeyCode::Esc => self.quit = true,
            KeyCode::F(1) => self.send(MonitorCommand::Pause),
            KeyCode::F(2) => self.send(MonitorCommand::Resume),
            KeyCode::F(3) => self.send(MonitorCommand::Step),
            other => log::debug!("ignoring key {:?}", other),
        }
        None
    }

    /// drain pending terminal events without blocking
    fn read_stdin(&mut self) -> Result<(), io::Error> {
        while poll(Duration::from_millis(0))? {
            if let Event::Key(evt) = read()? {
                self.key_event(evt.code);
            }
        }
        Ok(())
    }
}

impl Drop for StdinInput {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            log::warn!("can't leave raw mode: {}", e);
        }
    }
}

impl Input for StdinInput {
    fn handle_input(&mut self, keypad: &mut Keypad) -> Result<bool, io::Error> {
        self.read_stdin()?;
        for pressed in self.held.iter_mut() {
            if matches!(pressed, Some(at) if at.elapsed() > KEY_HOLD) {
                *pressed = None;
            }
        }
        keypad.update(self.held.map(|at| at.is_some()));
        Ok(!self.quit)
    }

    fn wait_for_input(&mut self) -> Result<Option<u8>, io::Error> {
        while !self.quit {
            if let Event::Key(evt) = read()? {
                if let Some(key) = self.key_event(evt.code) {
                    return Ok(Some(key));
                }
            }
        }
        Ok(None)
    }
}

/// dummy Input implementation for testing
///
/// `keys` are held down forever; `presses` are handed out one at a time to
/// `wait_for_input`. Running out of presses counts as the user quitting.
pub struct DummyInput {
    keys: Vec<u8>,
    presses: VecDeque<u8>,
    quit: bool,
}

impl DummyInput {
    pub fn new(keys: &[u8]) -> Self {
        DummyInput {
            keys: Vec::from(keys),
            presses: VecDeque::new(),
            quit: false,
        }
    }

    pub fn with_presses(mut self, presses: &[u8]) -> Self {
        self.presses.extend(presses);
        self
    }
}

impl Input for DummyInput {
    fn handle_input(&mut self, keypad: &mut Keypad) -> Result<bool, io::Error> {
        keypad.release_all();
        for &key in &self.keys {
            keypad
                .set(key, true)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        }
        Ok(!self.quit)
    }

    fn wait_for_input(&mut self) -> Result<Option<u8>, io::Error> {
        let key = self.presses.pop_front();
        self.quit |= key.is_none();
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypad_set_and_clear() -> Result<(), Chip8Error> {
        let mut k = Keypad::new();
        k.set(0xa, true)?;
        assert!(k.is_pressed(0xa)?);
        assert!(!k.is_pressed(0xb)?);
        k.set(0xa, false)?;
        assert!(!k.is_pressed(0xa)?);
        Ok(())
    }

    #[test]
    fn test_keypad_rejects_bad_key() {
        let mut k = Keypad::new();
        assert!(matches!(k.set(16, true), Err(Chip8Error::InvalidKey(16))));
        assert!(matches!(k.is_pressed(0xff), Err(Chip8Error::InvalidKey(0xff))));
    }

    #[test]
    fn test_keymap_is_complete() {
        let map: HashMap<char, u8> = HashMap::from(CHIP8_CONVENTIONAL_KEYMAP);
        let mut values: Vec<u8> = map.values().copied().collect();
        values.sort_unstable();
        assert_eq!(values, (0..16).collect::<Vec<u8>>());
    }

    #[test]
    fn test_dummy_input() -> Result<(), io::Error> {
        let mut input = DummyInput::new(&[0x1, 0xf]).with_presses(&[0x7]);
        let mut k = Keypad::new();
        assert!(input.handle_input(&mut k)?);
        assert_eq!(k.is_pressed(0xf).ok(), Some(true));
        assert_eq!(k.is_pressed(0x2).ok(), Some(false));
        assert_eq!(input.wait_for_input()?, Some(0x7));
        assert!(input.handle_input(&mut k)?);
        assert_eq!(input.wait_for_input()?, None);
        assert!(!input.handle_input(&mut k)?);
        Ok(())
    }

    #[test]
    fn test_keypad_update() -> Result<(), Chip8Error> {
        let mut k = Keypad::new();
        k.set(0x3, true)?;
        let mut keys = [false; KEYPAD_SIZE];
        keys[0xc] = true;
        k.update(keys);
        assert!(k.is_pressed(0xc)?);
        assert!(!k.is_pressed(0x3)?);
        Ok(())
    }
}
