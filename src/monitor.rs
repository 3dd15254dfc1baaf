use crate::error::Chip8Error;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use std::collections::HashSet;

/// events kept for a debugger that isn't draining them; later ones are dropped
pub const EVENT_QUEUE_LEN: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorState {
    Running,
    Paused,
    /// paused, but allowed to run exactly one more cycle
    StepArmed,
}

/// debugger commands, consumed by the main loop before each cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorCommand {
    SetBreakpoint(u16),
    ClearBreakpoint(u16),
    Pause,
    Resume,
    Step,
}

/// what the monitor tells a debugger
#[derive(Debug)]
pub enum MonitorEvent {
    Paused { pc: u16 },
    Fault { pc: u16, error: Chip8Error },
}

/// the debugger's end of the command channel; cheap to clone
#[derive(Clone)]
pub struct MonitorHandle {
    commands: Sender<MonitorCommand>,
}

impl MonitorHandle {
    pub fn send(&self, cmd: MonitorCommand) {
        if self.commands.send(cmd).is_err() {
            log::warn!("monitor has gone away, dropping {:?}", cmd);
        }
    }

    pub fn set_breakpoint(&self, addr: u16) {
        self.send(MonitorCommand::SetBreakpoint(addr))
    }

    pub fn clear_breakpoint(&self, addr: u16) {
        self.send(MonitorCommand::ClearBreakpoint(addr))
    }

    pub fn pause(&self) {
        self.send(MonitorCommand::Pause)
    }

    pub fn resume(&self) {
        self.send(MonitorCommand::Resume)
    }

    pub fn step(&self) {
        self.send(MonitorCommand::Step)
    }
}

/// Breakpoints plus run/pause/step state. Decides whether the next
/// fetch-decode-execute cycle is allowed to happen.
pub struct Monitor {
    breakpoints: HashSet<u16>,
    state: MonitorState,
    // pc we were resumed at, so its breakpoint doesn't fire straight away
    resumed_at: Option<u16>,
    commands: Receiver<MonitorCommand>,
    sender: Sender<MonitorCommand>,
    events: Option<Sender<MonitorEvent>>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    pub fn new() -> Self {
        let (sender, commands) = unbounded();
        Monitor {
            breakpoints: HashSet::new(),
            state: MonitorState::Running,
            resumed_at: None,
            commands,
            sender,
            events: None,
        }
    }

    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle {
            commands: self.sender.clone(),
        }
    }

    /// start receiving pause and fault notifications
    pub fn subscribe(&mut self) -> Receiver<MonitorEvent> {
        let (tx, rx) = bounded(EVENT_QUEUE_LEN);
        self.events = Some(tx);
        rx
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != MonitorState::Running
    }

    pub fn set_breakpoint(&mut self, addr: u16) {
        self.breakpoints.insert(addr);
    }

    pub fn clear_breakpoint(&mut self, addr: u16) {
        self.breakpoints.remove(&addr);
    }

    pub fn is_breakpoint(&self, addr: u16) -> bool {
        self.breakpoints.contains(&addr)
    }

    fn publish(&self, event: MonitorEvent) {
        if let Some(events) = &self.events {
            match events.try_send(event) {
                Err(TrySendError::Full(event)) => {
                    log::debug!("event queue full, dropping {:?}", event)
                }
                // nobody listening any more is fine
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            }
        }
    }

    fn pause_at(&mut self, pc: u16) {
        log::debug!("monitor paused at 0x{:04x}", pc);
        self.state = MonitorState::Paused;
        self.publish(MonitorEvent::Paused { pc });
    }

    fn apply(&mut self, cmd: MonitorCommand, pc: u16) {
        match cmd {
            MonitorCommand::SetBreakpoint(addr) => self.set_breakpoint(addr),
            MonitorCommand::ClearBreakpoint(addr) => self.clear_breakpoint(addr),
            MonitorCommand::Pause => {
                if self.state == MonitorState::Running {
                    self.pause_at(pc);
                }
            }
            MonitorCommand::Resume => {
                if self.state != MonitorState::Running {
                    log::debug!("monitor resumed at 0x{:04x}", pc);
                    self.state = MonitorState::Running;
                    self.resumed_at = Some(pc);
                }
            }
            MonitorCommand::Step => match self.state {
                MonitorState::Paused => self.state = MonitorState::StepArmed,
                MonitorState::StepArmed => {}
                MonitorState::Running => log::debug!("step ignored while running"),
            },
        }
    }

    /// apply every queued debugger command
    pub fn poll_commands(&mut self, pc: u16) {
        while let Ok(cmd) = self.commands.try_recv() {
            self.apply(cmd, pc);
        }
    }

    /// whether the cycle about to fetch from `pc` may run
    pub fn permit(&mut self, pc: u16) -> bool {
        self.poll_commands(pc);
        match self.state {
            MonitorState::Running => {
                if self.resumed_at.take() == Some(pc) {
                    return true;
                }
                if self.is_breakpoint(pc) {
                    self.pause_at(pc);
                    return false;
                }
                true
            }
            MonitorState::Paused => false,
            MonitorState::StepArmed => true,
        }
    }

    /// per-cycle reset, after a permitted cycle has run
    pub fn end_cycle(&mut self) {
        if self.state == MonitorState::StepArmed {
            self.state = MonitorState::Paused;
        }
    }

    pub fn report_fault(&self, pc: u16, error: Chip8Error) {
        self.publish(MonitorEvent::Fault { pc, error });
    }

    /// pause because the machine can't make progress from `pc`
    pub fn halt(&mut self, pc: u16) {
        if self.state != MonitorState::Paused {
            self.pause_at(pc);
        }
    }
}
