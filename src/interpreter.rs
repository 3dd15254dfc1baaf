//! # interpreter
//!
//! Ties the machine state, dispatch table and monitor to a display and an
//! input device. Each iteration of the main loop:
//!
//!  1. polls input (keypad, quit, debugger keys)
//!  2. asks the monitor whether a cycle may run at PC
//!  3. fetches, decodes and executes one instruction
//!  4. redraws if the screen changed, then sleeps for the cycle delay
//!
//! The timers tick on their own threads throughout, paused or not.
use crate::config::Config;
use crate::decode::DispatchTable;
use crate::display::Display;
use crate::error::Chip8Error;
use crate::input::Input;
use crate::instruction;
use crate::machine::MachineState;
use crate::monitor::{Monitor, MonitorEvent, MonitorHandle};
use crate::sound::Sound;
use crate::timer::{Timers, WallClock};
use crossbeam_channel::Receiver;
use std::io;
use std::sync::Arc;

pub struct Chip8Interpreter<'a> {
    state: MachineState,
    table: DispatchTable,
    monitor: Monitor,
    display: &'a mut dyn Display,
    input: &'a mut dyn Input,
    config: Config,
    cycles: u64,
    faults: u64,
    last_fault: Option<(u16, String)>,
}

impl<'a> Chip8Interpreter<'a> {
    /// an interpreter on real time, beeping through `sound`
    pub fn new(
        display: &'a mut dyn Display,
        input: &'a mut dyn Input,
        sound: Box<dyn Sound>,
        monitor: Monitor,
        config: Config,
    ) -> Self {
        let timers = Timers::new(Arc::new(WallClock), sound);
        Self::with_state(display, input, MachineState::new(timers), monitor, config)
    }

    /// wrap an existing machine, e.g. one with a manual clock or disabled timers
    pub fn with_state(
        display: &'a mut dyn Display,
        input: &'a mut dyn Input,
        mut state: MachineState,
        mut monitor: Monitor,
        config: Config,
    ) -> Self {
        if let Some(seed) = config.rng_seed {
            state.seed_rng(seed);
        }
        if config.disable_delay_timer {
            state.timers_mut().delay.disable();
        }
        if config.disable_sound_timer {
            state.timers_mut().sound.disable();
        }
        for &addr in &config.breakpoints {
            monitor.set_breakpoint(addr);
        }
        if config.start_paused {
            monitor.handle().pause();
        }
        Chip8Interpreter {
            state,
            table: DispatchTable::new(),
            monitor,
            display,
            input,
            config,
            cycles: 0,
            faults: 0,
            last_fault: None,
        }
    }

    /// load a chip8 program
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<(), Chip8Error> {
        self.state.load_program_from(reader)
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut MachineState {
        &mut self.state
    }

    pub fn monitor_handle(&self) -> MonitorHandle {
        self.monitor.handle()
    }

    pub fn subscribe(&mut self) -> Receiver<MonitorEvent> {
        self.monitor.subscribe()
    }

    /// instructions executed so far, including ones that faulted
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn faults(&self) -> u64 {
        self.faults
    }

    /// address and description of the most recent recoverable fault
    pub fn last_fault(&self) -> Option<(u16, &str)> {
        self.last_fault
            .as_ref()
            .map(|(pc, msg)| (*pc, msg.as_str()))
    }

    /// fetch, decode and execute one instruction, ignoring the monitor
    pub fn cycle(&mut self) -> Result<(), Chip8Error> {
        let pc = self.state.get_pc();
        let opcode = self.state.fetch()?;
        self.cycles += 1;
        let op = self
            .table
            .decode(opcode)
            .ok_or(Chip8Error::InvalidOpcode { opcode, addr: pc })?;
        log::trace!("{:04x}: {:04x} {}", pc, opcode, op);
        instruction::execute(op, opcode, &mut self.state, &mut *self.input)
    }

    /// one cycle if the monitor allows it. Ok(false) when held at a
    /// breakpoint or paused
    pub fn step(&mut self) -> Result<bool, Chip8Error> {
        if !self.monitor.permit(self.state.get_pc()) {
            return Ok(false);
        }
        let res = self.cycle();
        self.monitor.end_cycle();
        res.map(|_| true)
    }

    /// Log and publish a recoverable fault; hand anything else back. A fault
    /// identical to the previous one is only counted. `stuck` means PC didn't
    /// move, so the same fault would come back every cycle: pause instead.
    fn fault(&mut self, pc: u16, e: Chip8Error, stuck: bool) -> Result<(), Chip8Error> {
        if !e.is_recoverable() {
            log::error!("fatal at 0x{:04x}: {}", pc, e);
            return Err(e);
        }
        self.faults += 1;
        let msg = e.to_string();
        let repeat = matches!(&self.last_fault, Some((at, last)) if *at == pc && *last == msg);
        if !repeat {
            log::warn!("fault at 0x{:04x}: {}", pc, msg);
            self.last_fault = Some((pc, msg));
            self.monitor.report_fault(pc, e);
        }
        if stuck {
            log::warn!("no way past 0x{:04x}, pausing", pc);
            self.monitor.halt(pc);
        }
        Ok(())
    }

    /// run until the input asks to quit, the display goes away, a fatal error
    /// or the configured cycle limit
    pub fn main_loop(&mut self) -> Result<(), Chip8Error> {
        let mut iterations: u64 = 0;
        loop {
            if matches!(self.config.max_cycles, Some(max) if iterations >= max) {
                log::info!("stopping after {} iterations", iterations);
                break;
            }
            iterations += 1;

            if !self.input.handle_input(self.state.keypad_mut())? {
                log::info!("quit requested");
                break;
            }

            let pc = self.state.get_pc();
            if let Err(e) = self.step() {
                let stuck = self.state.get_pc() == pc;
                self.fault(pc, e, stuck)?;
            }

            if self.state.take_redraw() {
                self.display.render(self.state.framebuffer())?;
            }
            if !self.display.is_alive() {
                log::info!("display closed");
                break;
            }
            if !self.config.cycle_delay.is_zero() {
                spin_sleep::sleep(self.config.cycle_delay);
            }
        }
        Ok(())
    }
}
