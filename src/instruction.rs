//! The handler for each instruction. Every handler gets the raw opcode and
//! decodes its own operands.
use crate::decode::{kk, n, nnn, x, y, Op};
use crate::error::Chip8Error;
use crate::input::{Input, KEYPAD_SIZE};
use crate::machine::{MachineState, VF};
use crate::memory::{glyph_addr, MemoryMap, CHIP8_RAM_SIZE_BYTES};

/// Binary to packed BCD by double dabble: hundreds, tens and ones end up in
/// bits 8-11, 4-7 and 0-3.
pub fn decimal_to_bcd(val: u8) -> u16 {
    let mut hundreds: u16 = 0;
    let mut tens: u16 = 0;
    let mut ones: u16 = 0;
    let mut bits = val;

    for _ in 0..8 {
        for digit in [&mut hundreds, &mut tens, &mut ones] {
            if *digit >= 5 {
                *digit += 3;
            }
        }
        hundreds = ((hundreds << 1) & 0xF) | (tens >> 3);
        tens = ((tens << 1) & 0xF) | (ones >> 3);
        ones = ((ones << 1) & 0xF) | (bits >> 7) as u16;
        bits <<= 1;
    }
    0xFFF & ((hundreds << 8) | (tens << 4) | ones)
}

/// run `op`, already decoded from `opcode`
pub fn execute(
    op: Op,
    opcode: u16,
    m: &mut MachineState,
    input: &mut dyn Input,
) -> Result<(), Chip8Error> {
    match op {
        Op::Cls => m.clear_screen(),
        Op::Ret => ret(m)?,
        Op::Jp => m.set_pc(nnn(opcode)),
        Op::Call => call(m, opcode)?,
        Op::SeVxKk => {
            let eq = m.v[x(opcode)] == kk(opcode);
            skip_if(m, eq)
        }
        Op::SneVxKk => {
            let eq = m.v[x(opcode)] == kk(opcode);
            skip_if(m, !eq)
        }
        Op::SeVxVy => {
            let eq = m.v[x(opcode)] == m.v[y(opcode)];
            skip_if(m, eq)
        }
        Op::SneVxVy => {
            let eq = m.v[x(opcode)] == m.v[y(opcode)];
            skip_if(m, !eq)
        }
        Op::LdVxKk => m.v[x(opcode)] = kk(opcode),
        Op::AddVxKk => m.v[x(opcode)] = m.v[x(opcode)].wrapping_add(kk(opcode)),
        Op::LdVxVy => m.v[x(opcode)] = m.v[y(opcode)],
        Op::Or => m.v[x(opcode)] |= m.v[y(opcode)],
        Op::And => m.v[x(opcode)] &= m.v[y(opcode)],
        Op::Xor => m.v[x(opcode)] ^= m.v[y(opcode)],
        Op::AddVxVy => with_flag(m, opcode, |vx, vy| {
            let (sum, carry) = vx.overflowing_add(vy);
            (sum, carry as u8)
        }),
        Op::Sub => with_flag(m, opcode, |vx, vy| (vx.wrapping_sub(vy), (vx >= vy) as u8)),
        Op::Shr => with_flag(m, opcode, |vx, _| (vx >> 1, vx & 0x01)),
        Op::Subn => with_flag(m, opcode, |vx, vy| (vy.wrapping_sub(vx), (vy >= vx) as u8)),
        Op::Shl => with_flag(m, opcode, |vx, _| (vx << 1, vx >> 7)),
        Op::LdI => m.set_i(nnn(opcode)),
        Op::JpV0 => m.set_pc(nnn(opcode).wrapping_add(m.v[0] as u16)),
        Op::Rnd => m.v[x(opcode)] = m.random_byte() & kk(opcode),
        Op::Drw => drw(m, opcode)?,
        Op::Skp => {
            let pressed = m.is_key_pressed(m.v[x(opcode)])?;
            skip_if(m, pressed)
        }
        Op::Sknp => {
            let pressed = m.is_key_pressed(m.v[x(opcode)])?;
            skip_if(m, !pressed)
        }
        Op::LdVxK => ld_vx_k(m, input, opcode)?,
        Op::LdVxDt => m.v[x(opcode)] = m.get_dt(),
        Op::LdDtVx => m.set_dt(m.v[x(opcode)]),
        Op::LdStVx => m.set_st(m.v[x(opcode)]),
        Op::AddIVx => add_i_vx(m, opcode)?,
        Op::LdFVx => m.set_i(glyph_addr(m.v[x(opcode)])),
        Op::LdBVx => ld_b_vx(m, opcode)?,
        Op::StoreRegs => store_regs(m, opcode)?,
        Op::LoadRegs => load_regs(m, opcode)?,
    }
    Ok(())
}

fn skip_if(m: &mut MachineState, cond: bool) {
    if cond {
        m.skip();
    }
}

/// (00ee) RET return from the current sub-routine
fn ret(m: &mut MachineState) -> Result<(), Chip8Error> {
    let addr = m.pop()?;
    m.set_pc(addr);
    Ok(())
}

/// (2nnn) CALL sub-routine at `nnn`; PC already points past the call
fn call(m: &mut MachineState, opcode: u16) -> Result<(), Chip8Error> {
    m.push(m.get_pc())?;
    m.set_pc(nnn(opcode));
    Ok(())
}

/// (8xy4, 8xy5, 8xy6, 8xy7, 8xye) arithmetic that reports through VF.
/// Vx is written before VF, so VF holds the flag even when x is F.
fn with_flag(m: &mut MachineState, opcode: u16, f: impl Fn(u8, u8) -> (u8, u8)) {
    let (result, flag) = f(m.v[x(opcode)], m.v[y(opcode)]);
    m.v[x(opcode)] = result;
    m.v[VF] = flag;
}

/// (dxyn) DRW sprite of `n` rows at (Vx, Vy)
fn drw(m: &mut MachineState, opcode: u16) -> Result<(), Chip8Error> {
    let (vx, vy) = (m.v[x(opcode)], m.v[y(opcode)]);
    m.v[VF] = 0;
    let collision = m.draw(vx, vy, n(opcode))?;
    m.v[VF] = collision as u8;
    Ok(())
}

/// (fx0a) LD Vx, K waits for a key press. If the wait ends in a quit, PC
/// goes back to this instruction and Vx is untouched
fn ld_vx_k(m: &mut MachineState, input: &mut dyn Input, opcode: u16) -> Result<(), Chip8Error> {
    let key = match input.wait_for_input()? {
        Some(key) => key,
        None => {
            m.set_pc(m.get_pc().wrapping_sub(2));
            return Ok(());
        }
    };
    if key as usize >= KEYPAD_SIZE {
        return Err(Chip8Error::InvalidKey(key));
    }
    m.v[x(opcode)] = key;
    Ok(())
}

/// (fx1e) ADD I, Vx. I keeps the sum even when it points past the end of RAM
fn add_i_vx(m: &mut MachineState, opcode: u16) -> Result<(), Chip8Error> {
    let addr = m.get_i().wrapping_add(m.v[x(opcode)] as u16);
    m.set_i(addr);
    if addr as usize >= CHIP8_RAM_SIZE_BYTES {
        return Err(Chip8Error::OutOfBoundsAddress {
            addr: addr as usize,
        });
    }
    Ok(())
}

/// (fx33) LD B, Vx stores hundreds, tens, ones at I, I+1, I+2
fn ld_b_vx(m: &mut MachineState, opcode: u16) -> Result<(), Chip8Error> {
    let bcd = decimal_to_bcd(m.v[x(opcode)]);
    let digits = [(bcd >> 8) as u8 & 0xF, (bcd >> 4) as u8 & 0xF, bcd as u8 & 0xF];
    let i = m.get_i();
    m.memory.write(&digits, i)
}

/// (fx55) LD [I], Vx. Registers written before a bad address stay written
fn store_regs(m: &mut MachineState, opcode: u16) -> Result<(), Chip8Error> {
    let i = m.get_i();
    for reg in 0..=x(opcode) {
        m.memory.write_byte(i.wrapping_add(reg as u16), m.v[reg])?;
    }
    Ok(())
}

/// (fx65) LD Vx, [I]
fn load_regs(m: &mut MachineState, opcode: u16) -> Result<(), Chip8Error> {
    let i = m.get_i();
    for reg in 0..=x(opcode) {
        m.v[reg] = m.memory.read_byte(i.wrapping_add(reg as u16))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DispatchTable;
    use crate::input::DummyInput;
    use crate::timer::Timers;

    fn machine() -> MachineState {
        MachineState::new(Timers::disabled())
    }

    /// decode through the real table, then execute
    fn exec(m: &mut MachineState, opcode: u16) -> Result<(), Chip8Error> {
        exec_with(m, &mut DummyInput::new(&[]), opcode)
    }

    fn exec_with(
        m: &mut MachineState,
        input: &mut DummyInput,
        opcode: u16,
    ) -> Result<(), Chip8Error> {
        let op = DispatchTable::new()
            .decode(opcode)
            .ok_or(Chip8Error::InvalidOpcode { opcode, addr: m.get_pc() })?;
        execute(op, opcode, m, input)
    }

    #[test]
    fn test_bcd() {
        assert_eq!(decimal_to_bcd(162), 0x162);
        assert_eq!(decimal_to_bcd(162), 354);
        assert_eq!(decimal_to_bcd(0), 0x000);
        assert_eq!(decimal_to_bcd(9), 0x009);
        assert_eq!(decimal_to_bcd(10), 0x010);
        assert_eq!(decimal_to_bcd(255), 0x255);
    }

    #[test]
    fn test_jp_and_call_ret() -> Result<(), Chip8Error> {
        let mut m = machine();
        exec(&mut m, 0x1123)?;
        assert_eq!(m.get_pc(), 0x123);

        // pretend we fetched a CALL at 0x200
        m.set_pc(0x202);
        exec(&mut m, 0x2400)?;
        assert_eq!(m.get_pc(), 0x400);
        assert_eq!(m.stack_depth(), 1);
        exec(&mut m, 0x00EE)?;
        assert_eq!(m.get_pc(), 0x202);
        assert_eq!(m.stack_depth(), 0);
        Ok(())
    }

    #[test]
    fn test_ret_on_empty_stack() {
        let mut m = machine();
        assert!(matches!(exec(&mut m, 0x00EE), Err(Chip8Error::StackUnderflow { .. })));
    }

    #[test]
    fn test_skips() -> Result<(), Chip8Error> {
        let mut m = machine();
        m.set_v(2, 6)?;
        m.set_v(3, 6)?;
        exec(&mut m, 0x3206)?; // SE V2, 6
        assert_eq!(m.get_pc(), 0x202);
        exec(&mut m, 0x4206)?; // SNE V2, 6
        assert_eq!(m.get_pc(), 0x202);
        exec(&mut m, 0x4207)?; // SNE V2, 7
        assert_eq!(m.get_pc(), 0x204);
        exec(&mut m, 0x5230)?; // SE V2, V3
        assert_eq!(m.get_pc(), 0x206);
        exec(&mut m, 0x9230)?; // SNE V2, V3
        assert_eq!(m.get_pc(), 0x206);
        Ok(())
    }

    #[test]
    fn test_loads_and_logic() -> Result<(), Chip8Error> {
        let mut m = machine();
        exec(&mut m, 0x6207)?;
        assert_eq!(m.get_v(2)?, 7);
        exec(&mut m, 0x72FE)?; // wraps
        assert_eq!(m.get_v(2)?, 5);
        m.set_v(4, 2)?;
        exec(&mut m, 0x8241)?;
        assert_eq!(m.get_v(2)?, 7);
        exec(&mut m, 0x8242)?;
        assert_eq!(m.get_v(2)?, 2);
        exec(&mut m, 0x8243)?;
        assert_eq!(m.get_v(2)?, 0);
        exec(&mut m, 0x8240)?;
        assert_eq!(m.get_v(2)?, 2);
        Ok(())
    }

    #[test]
    fn test_add_carry() -> Result<(), Chip8Error> {
        let mut m = machine();
        m.set_v(2, 0x0F)?;
        m.set_v(4, 0x01)?;
        m.set_v(VF, 1)?;
        exec(&mut m, 0x8244)?;
        assert_eq!((m.get_v(2)?, m.get_v(VF)?), (0x10, 0));

        m.set_v(2, 0xFD)?;
        m.set_v(4, 0x05)?;
        exec(&mut m, 0x8244)?;
        assert_eq!((m.get_v(2)?, m.get_v(VF)?), (0x02, 1));
        Ok(())
    }

    #[test]
    fn test_sub_and_subn() -> Result<(), Chip8Error> {
        let mut m = machine();
        m.set_v(2, 6)?;
        m.set_v(4, 2)?;
        exec(&mut m, 0x8245)?;
        assert_eq!((m.get_v(2)?, m.get_v(VF)?), (4, 1));

        // equal operands: no borrow
        m.set_v(2, 2)?;
        exec(&mut m, 0x8245)?;
        assert_eq!((m.get_v(2)?, m.get_v(VF)?), (0, 1));

        m.set_v(2, 2)?;
        m.set_v(4, 8)?;
        exec(&mut m, 0x8247)?;
        assert_eq!((m.get_v(2)?, m.get_v(VF)?), (6, 1));

        m.set_v(2, 8)?;
        m.set_v(4, 2)?;
        exec(&mut m, 0x8247)?;
        assert_eq!((m.get_v(2)?, m.get_v(VF)?), (250, 0));
        Ok(())
    }

    #[test]
    fn test_shifts() -> Result<(), Chip8Error> {
        let mut m = machine();
        m.set_v(2, 9)?;
        exec(&mut m, 0x8206)?;
        assert_eq!((m.get_v(2)?, m.get_v(VF)?), (4, 1));
        m.set_v(3, 8)?;
        exec(&mut m, 0x8306)?;
        assert_eq!((m.get_v(3)?, m.get_v(VF)?), (4, 0));

        m.set_v(2, 129)?;
        exec(&mut m, 0x820E)?;
        assert_eq!((m.get_v(2)?, m.get_v(VF)?), (2, 1));
        m.set_v(3, 8)?;
        exec(&mut m, 0x830E)?;
        assert_eq!((m.get_v(3)?, m.get_v(VF)?), (16, 0));
        Ok(())
    }

    #[test]
    fn test_flag_wins_over_vf_result() -> Result<(), Chip8Error> {
        let mut m = machine();
        m.set_v(VF, 0xFF)?;
        m.set_v(1, 0x01)?;
        exec(&mut m, 0x8F14)?; // ADD VF, V1
        assert_eq!(m.get_v(VF)?, 1);
        Ok(())
    }

    #[test]
    fn test_i_and_jump_v0() -> Result<(), Chip8Error> {
        let mut m = machine();
        exec(&mut m, 0xA222)?;
        assert_eq!(m.get_i(), 0x222);
        m.set_v(0, 1)?;
        exec(&mut m, 0xB222)?;
        assert_eq!(m.get_pc(), 0x223);

        m.set_i(200);
        m.set_v(2, 5)?;
        exec(&mut m, 0xF21E)?;
        assert_eq!(m.get_i(), 205);
        Ok(())
    }

    #[test]
    fn test_add_i_past_memory() -> Result<(), Chip8Error> {
        let mut m = machine();
        m.set_i(0x0FFF);
        m.set_v(1, 1)?;
        assert!(matches!(
            exec(&mut m, 0xF11E),
            Err(Chip8Error::OutOfBoundsAddress { addr: 0x1000 })
        ));
        assert_eq!(m.get_i(), 0x1000);
        Ok(())
    }

    #[test]
    fn test_rnd_masks() -> Result<(), Chip8Error> {
        let mut m = machine();
        m.seed_rng(42);
        for _ in 0..32 {
            exec(&mut m, 0xC30F)?;
            assert_eq!(m.get_v(3)? & 0xF0, 0);
        }
        exec(&mut m, 0xC300)?;
        assert_eq!(m.get_v(3)?, 0);
        Ok(())
    }

    #[test]
    fn test_rnd_seeded_is_repeatable() -> Result<(), Chip8Error> {
        let (mut a, mut b) = (machine(), machine());
        a.seed_rng(7);
        b.seed_rng(7);
        for _ in 0..8 {
            exec(&mut a, 0xC1FF)?;
            exec(&mut b, 0xC1FF)?;
            assert_eq!(a.get_v(1)?, b.get_v(1)?);
        }
        Ok(())
    }

    #[test]
    fn test_draw_sets_collision() -> Result<(), Chip8Error> {
        let mut m = machine();
        m.memory_mut().write(&[0xFF, 0x81], 0x300)?;
        m.set_i(0x300);
        m.set_v(0, 10)?;
        m.set_v(1, 10)?;
        exec(&mut m, 0xD012)?;
        assert_eq!(m.get_v(VF)?, 0);
        assert!(m.framebuffer().get(10, 10) && m.framebuffer().get(17, 11));
        assert!(!m.framebuffer().get(11, 11));

        exec(&mut m, 0xD012)?;
        assert_eq!(m.get_v(VF)?, 1);
        assert_eq!(m.framebuffer().lit_pixels(), 0);

        exec(&mut m, 0x00E0)?;
        assert_eq!(m.framebuffer().lit_pixels(), 0);
        Ok(())
    }

    #[test]
    fn test_draw_straddling_bottom_edge() -> Result<(), Chip8Error> {
        let mut m = machine();
        m.memory_mut().write(&[0x80, 0x80, 0x80], 0x300)?;
        m.set_i(0x300);
        m.set_v(0, 63)?;
        m.set_v(1, 31)?;
        m.set_v(VF, 1)?;
        exec(&mut m, 0xD013)?;
        assert_eq!(m.get_v(VF)?, 0);
        assert!(m.framebuffer().get(63, 31));
        assert_eq!(m.framebuffer().lit_pixels(), 1);
        Ok(())
    }

    #[test]
    fn test_keys() -> Result<(), Chip8Error> {
        let mut m = machine();
        m.set_v(2, 2)?;
        m.set_key(2)?;
        exec(&mut m, 0xE29E)?;
        assert_eq!(m.get_pc(), 0x202);
        exec(&mut m, 0xE2A1)?;
        assert_eq!(m.get_pc(), 0x202);
        m.clear_key(2)?;
        exec(&mut m, 0xE2A1)?;
        assert_eq!(m.get_pc(), 0x204);

        m.set_v(2, 0x20)?;
        assert!(matches!(exec(&mut m, 0xE29E), Err(Chip8Error::InvalidKey(0x20))));
        Ok(())
    }

    #[test]
    fn test_wait_for_key() -> Result<(), Chip8Error> {
        let mut m = machine();
        let mut input = DummyInput::new(&[]).with_presses(&[0xB]);
        exec_with(&mut m, &mut input, 0xF50A)?;
        assert_eq!(m.get_v(5)?, 0xB);
        Ok(())
    }

    #[test]
    fn test_quit_while_waiting_for_key() -> Result<(), Chip8Error> {
        let mut m = machine();
        let mut input = DummyInput::new(&[]);
        m.set_v(5, 0x42)?;
        // as if LD V5, K at 0x200 had just been fetched
        m.set_pc(0x202);
        exec_with(&mut m, &mut input, 0xF50A)?;
        assert_eq!(m.get_pc(), 0x200);
        assert_eq!(m.get_v(5)?, 0x42);
        Ok(())
    }

    #[test]
    fn test_timer_registers() -> Result<(), Chip8Error> {
        let mut m = machine();
        m.set_v(2, 105)?;
        exec(&mut m, 0xF215)?;
        assert_eq!(m.get_dt(), 105);
        exec(&mut m, 0xF307)?;
        assert_eq!(m.get_v(3)?, 105);
        exec(&mut m, 0xF218)?;
        assert_eq!(m.get_st(), 105);
        Ok(())
    }

    #[test]
    fn test_glyph_address() -> Result<(), Chip8Error> {
        let mut m = machine();
        m.set_v(2, 3)?;
        exec(&mut m, 0xF229)?;
        assert_eq!(m.get_i(), 15);
        Ok(())
    }

    #[test]
    fn test_store_bcd() -> Result<(), Chip8Error> {
        let mut m = machine();
        m.set_i(0x300);
        m.set_v(2, 162)?;
        exec(&mut m, 0xF233)?;
        assert_eq!(m.memory().get_ro_slice(0x300, 3)?, &[1, 6, 2]);
        Ok(())
    }

    #[test]
    fn test_block_store_load_round_trip() -> Result<(), Chip8Error> {
        let mut m = machine();
        let values = [3, 14, 15, 92, 65, 35];
        for (reg, &val) in values.iter().enumerate() {
            m.set_v(reg, val)?;
        }
        m.set_v(6, 0xAA)?;
        m.set_i(0x400);
        exec(&mut m, 0xF555)?; // V0..=V5
        assert_eq!(m.memory().read_byte(0x406)?, 0);

        for reg in 0..6 {
            m.set_v(reg, 0)?;
        }
        exec(&mut m, 0xF565)?;
        for (reg, &val) in values.iter().enumerate() {
            assert_eq!(m.get_v(reg)?, val);
        }
        assert_eq!(m.get_v(6)?, 0xAA);
        assert_eq!(m.get_i(), 0x400);
        Ok(())
    }

    #[test]
    fn test_block_store_partial_write() -> Result<(), Chip8Error> {
        let mut m = machine();
        m.set_i(0x0FFE);
        for reg in 0..4 {
            m.set_v(reg, 0x10 + reg as u8)?;
        }
        assert!(matches!(
            exec(&mut m, 0xF355),
            Err(Chip8Error::OutOfBoundsAddress { addr: 0x1000 })
        ));
        assert_eq!(m.memory().get_ro_slice(0x0FFE, 2)?, &[0x10, 0x11]);
        Ok(())
    }
}
