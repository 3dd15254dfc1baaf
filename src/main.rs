use std::error::Error;
use std::fs::File;
use std::path::PathBuf;

use clap::Parser;

use chip8vm::config::{parse_addr, Config};
use chip8vm::display::MonoTermDisplay;
use chip8vm::input::StdinInput;
use chip8vm::interpreter::Chip8Interpreter;
use chip8vm::monitor::Monitor;
use chip8vm::sound::SIMPLEBEEP_PITCH;

/// Run a CHIP-8 program in the terminal.
///
/// Keys 1-4, q-r, a-f and z-v are the hex keypad. Esc quits; F1 pauses, F2
/// resumes and F3 single-steps.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// program image, loaded at 0x200
    rom: PathBuf,

    /// no sound
    #[arg(long)]
    mute: bool,

    /// tone frequency in Hz
    #[arg(long, default_value_t = SIMPLEBEEP_PITCH)]
    pitch: u16,

    /// instructions per second (0 = as fast as possible)
    #[arg(long, default_value_t = 500)]
    ips: u64,

    /// seed for RND, for repeatable runs
    #[arg(long)]
    seed: Option<u64>,

    /// break at this address (hex); may be repeated
    #[arg(short, long = "break", value_parser = parse_addr)]
    breakpoints: Vec<u16>,

    /// start paused at the entry point
    #[arg(short, long)]
    paused: bool,

    /// stop after this many main loop iterations
    #[arg(long)]
    max_cycles: Option<u64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Config {
        tone_pitch: args.pitch,
        mute: args.mute,
        rng_seed: args.seed,
        breakpoints: args.breakpoints,
        start_paused: args.paused,
        max_cycles: args.max_cycles,
        ..Config::default()
    }
    .with_ips(args.ips);

    let mut f = File::open(&args.rom)?;

    // initialise
    let monitor = Monitor::new();
    let mut input = StdinInput::new()?.with_monitor(monitor.handle());
    let mut display = MonoTermDisplay::new()?;
    let sound = config.sound();
    let mut interpreter = Chip8Interpreter::new(&mut display, &mut input, sound, monitor, config);

    interpreter.load_program(&mut f)?;
    let res = interpreter.main_loop();
    if let Some((pc, msg)) = interpreter.last_fault() {
        log::warn!("{} faults, last at 0x{:04x}: {}", interpreter.faults(), pc, msg);
    }
    drop(interpreter);

    // shove some junk on stdout to stop the cli messing up the last frame
    for _ in 0..12 {
        println!();
    }
    res?;
    Ok(())
}
