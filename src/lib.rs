//! # chip8vm
//!
//! ## Design
//!
//! * one `MachineState` per interpreter; no globals
//! * instructions run as fast as the main loop allows then sleep, so timing
//!   is only authentic where it's observable: the 60Hz timers
//! * delay and sound timers count down on their own threads, driven by a
//!   `Clock` so they can be stepped by hand in tests
//! * abstract display, input and sound so alternatives can be plugged in;
//!   starting with TUI in-console
//! * a monitor sits in front of every cycle for breakpoints, pause and
//!   single-step
//!
//! Model
//!
//! ```text
//! Environment (main.rs)
//!  |-- display, input, sound, config, monitor
//!  |-- interpreter(display, input, sound, monitor, config)
//!  |    |-- dispatch table (masked opcode -> Op)
//!  |    |-- instruction handlers
//!  |    `-- machine state(memory, registers, stack, timers, keypad, screen)
//!  `-- main loop
//!       |-- input.handle_input(keypad)
//!       |-- if monitor.permit(pc) { fetch; decode; execute; monitor.end_cycle() }
//!       |-- faults: log, publish to the monitor, carry on
//!       |-- if screen changed { display.render(framebuffer) }
//!       `-- sleep(cycle_delay)
//! ```
pub mod config;
pub mod decode;
pub mod display;
pub mod error;
pub mod input;
pub mod instruction;
pub mod interpreter;
pub mod machine;
pub mod memory;
pub mod monitor;
pub mod sound;
pub mod timer;

pub use config::Config;
pub use error::Chip8Error;
pub use interpreter::Chip8Interpreter;
pub use machine::MachineState;
pub use monitor::{Monitor, MonitorCommand, MonitorEvent, MonitorHandle};
