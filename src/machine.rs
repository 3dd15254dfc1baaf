use crate::display::Framebuffer;
use crate::error::Chip8Error;
use crate::input::Keypad;
use crate::memory::{Chip8MemoryMap, MemoryMap, CHIP8_PROGRAM_ADDR};
use crate::timer::Timers;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io;

pub const REGISTER_COUNT: usize = 16;
pub const STACK_SIZE: usize = 16;

/// V15 doubles as the carry/borrow/collision flag
pub const VF: usize = 0xF;

/// the stack grows down from this slot
const STACK_TOP: usize = STACK_SIZE - 1;

/// Everything a CHIP-8 program can see or touch.
pub struct MachineState {
    pub(crate) memory: Chip8MemoryMap,
    pub(crate) v: [u8; REGISTER_COUNT],
    pub(crate) i: u16,
    pc: u16,
    stack: [u16; STACK_SIZE],
    depth: usize,
    pub(crate) timers: Timers,
    keypad: Keypad,
    framebuffer: Framebuffer,
    redraw: bool,
    rng: StdRng,
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new(Timers::default())
    }
}

impl MachineState {
    pub fn new(timers: Timers) -> Self {
        MachineState {
            memory: Chip8MemoryMap::new(),
            v: [0; REGISTER_COUNT],
            i: 0,
            pc: CHIP8_PROGRAM_ADDR,
            stack: [0; STACK_SIZE],
            depth: 0,
            timers,
            keypad: Keypad::new(),
            framebuffer: Framebuffer::new(),
            redraw: false,
            rng: StdRng::from_entropy(),
        }
    }

    /// make RND repeatable
    pub fn seed_rng(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub(crate) fn random_byte(&mut self) -> u8 {
        self.rng.gen()
    }

    pub fn load_program(&mut self, program: &[u8]) -> Result<(), Chip8Error> {
        self.memory.load_program(program)
    }

    pub fn load_program_from(&mut self, reader: &mut impl io::Read) -> Result<(), Chip8Error> {
        self.memory.load_program_from(reader)
    }

    pub fn memory(&self) -> &Chip8MemoryMap {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Chip8MemoryMap {
        &mut self.memory
    }

    pub fn read_byte(&self, addr: u16) -> Result<u8, Chip8Error> {
        self.memory.read_byte(addr)
    }

    pub fn write_byte(&mut self, addr: u16, val: u8) -> Result<(), Chip8Error> {
        self.memory.write_byte(addr, val)
    }

    /// big-endian, as opcodes are stored
    pub fn read_word(&self, addr: u16) -> Result<u16, Chip8Error> {
        self.memory.get_word(addr)
    }

    pub fn write_word(&mut self, addr: u16, val: u16) -> Result<(), Chip8Error> {
        self.memory.set_word(addr, val)
    }

    pub fn get_v(&self, reg: usize) -> Result<u8, Chip8Error> {
        self.v
            .get(reg)
            .copied()
            .ok_or(Chip8Error::InvalidRegister(reg))
    }

    pub fn set_v(&mut self, reg: usize, val: u8) -> Result<(), Chip8Error> {
        let slot = self
            .v
            .get_mut(reg)
            .ok_or(Chip8Error::InvalidRegister(reg))?;
        *slot = val;
        Ok(())
    }

    pub fn get_i(&self) -> u16 {
        self.i
    }

    pub fn set_i(&mut self, val: u16) {
        self.i = val;
    }

    pub fn get_pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, val: u16) {
        self.pc = val;
    }

    /// move past the next instruction
    pub(crate) fn skip(&mut self) {
        self.pc = self.pc.wrapping_add(2);
    }

    /// index of the next free stack slot, None when the stack is full
    pub fn stack_pointer(&self) -> Option<usize> {
        STACK_TOP.checked_sub(self.depth)
    }

    pub fn stack_depth(&self) -> usize {
        self.depth
    }

    pub fn push(&mut self, val: u16) -> Result<(), Chip8Error> {
        let sp = self
            .stack_pointer()
            .ok_or(Chip8Error::StackOverflow { pc: self.pc })?;
        self.stack[sp] = val;
        self.depth += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16, Chip8Error> {
        if self.depth == 0 {
            return Err(Chip8Error::StackUnderflow { pc: self.pc });
        }
        self.depth -= 1;
        Ok(self.stack[STACK_TOP - self.depth])
    }

    /// read the big-endian opcode at PC and move PC past it
    pub fn fetch(&mut self) -> Result<u16, Chip8Error> {
        let opcode = self.memory.get_word(self.pc)?;
        self.skip();
        Ok(opcode)
    }

    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    pub fn keypad_mut(&mut self) -> &mut Keypad {
        &mut self.keypad
    }

    pub fn set_key(&mut self, key: u8) -> Result<(), Chip8Error> {
        self.keypad.set(key, true)
    }

    pub fn clear_key(&mut self, key: u8) -> Result<(), Chip8Error> {
        self.keypad.set(key, false)
    }

    pub fn is_key_pressed(&self, key: u8) -> Result<bool, Chip8Error> {
        self.keypad.is_pressed(key)
    }

    pub fn get_dt(&self) -> u8 {
        self.timers.delay.get()
    }

    pub fn set_dt(&mut self, val: u8) {
        self.timers.delay.set(val)
    }

    pub fn get_st(&self) -> u8 {
        self.timers.sound.get()
    }

    pub fn set_st(&mut self, val: u8) {
        self.timers.sound.set(val)
    }

    pub fn timers_mut(&mut self) -> &mut Timers {
        &mut self.timers
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn clear_screen(&mut self) {
        self.framebuffer.clear();
        self.redraw = true;
    }

    /// XOR `n` rows of sprite data from memory[I] onto the screen at (x, y).
    /// Returns whether any lit pixel was erased.
    pub fn draw(&mut self, x: u8, y: u8, n: u8) -> Result<bool, Chip8Error> {
        let rows = self.memory.get_ro_slice(self.i, n as usize)?;
        let collision = self.framebuffer.draw_sprite(x, y, rows);
        self.redraw = true;
        Ok(collision)
    }

    /// true once after the screen changed
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }
}
