use std::collections::HashMap;
use std::fmt;

/// One entry per instruction in the base CHIP-8 set. Operands stay in the raw
/// opcode; handlers pull out the fields they need.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Cls,
    Ret,
    Jp,
    Call,
    SeVxKk,
    SneVxKk,
    SeVxVy,
    LdVxKk,
    AddVxKk,
    LdVxVy,
    Or,
    And,
    Xor,
    AddVxVy,
    Sub,
    Shr,
    Subn,
    Shl,
    SneVxVy,
    LdI,
    JpV0,
    Rnd,
    Drw,
    Skp,
    Sknp,
    LdVxK,
    LdVxDt,
    LdDtVx,
    LdStVx,
    AddIVx,
    LdFVx,
    LdBVx,
    StoreRegs,
    LoadRegs,
}

impl Op {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Cls => "CLS",
            Op::Ret => "RET",
            Op::Jp => "JP NNN",
            Op::Call => "CALL NNN",
            Op::SeVxKk => "SE Vx, KK",
            Op::SneVxKk => "SNE Vx, KK",
            Op::SeVxVy => "SE Vx, Vy",
            Op::LdVxKk => "LD Vx, KK",
            Op::AddVxKk => "ADD Vx, KK",
            Op::LdVxVy => "LD Vx, Vy",
            Op::Or => "OR Vx, Vy",
            Op::And => "AND Vx, Vy",
            Op::Xor => "XOR Vx, Vy",
            Op::AddVxVy => "ADD Vx, Vy",
            Op::Sub => "SUB Vx, Vy",
            Op::Shr => "SHR Vx",
            Op::Subn => "SUBN Vx, Vy",
            Op::Shl => "SHL Vx",
            Op::SneVxVy => "SNE Vx, Vy",
            Op::LdI => "LD I, NNN",
            Op::JpV0 => "JP V0, NNN",
            Op::Rnd => "RND Vx, KK",
            Op::Drw => "DRW Vx, Vy, N",
            Op::Skp => "SKP Vx",
            Op::Sknp => "SKNP Vx",
            Op::LdVxK => "LD Vx, K",
            Op::LdVxDt => "LD Vx, DT",
            Op::LdDtVx => "LD DT, Vx",
            Op::LdStVx => "LD ST, Vx",
            Op::AddIVx => "ADD I, Vx",
            Op::LdFVx => "LD F, Vx",
            Op::LdBVx => "LD B, Vx",
            Op::StoreRegs => "LD [I], Vx",
            Op::LoadRegs => "LD Vx, [I]",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// masked opcode -> instruction
#[rustfmt::skip]
const OPCODES: [(u16, Op); 34] = [
    (0x00E0, Op::Cls),
    (0x00EE, Op::Ret),
    (0x1000, Op::Jp),
    (0x2000, Op::Call),
    (0x3000, Op::SeVxKk),
    (0x4000, Op::SneVxKk),
    (0x5000, Op::SeVxVy),
    (0x6000, Op::LdVxKk),
    (0x7000, Op::AddVxKk),
    (0x8000, Op::LdVxVy),
    (0x8001, Op::Or),
    (0x8002, Op::And),
    (0x8003, Op::Xor),
    (0x8004, Op::AddVxVy),
    (0x8005, Op::Sub),
    (0x8006, Op::Shr),
    (0x8007, Op::Subn),
    (0x800E, Op::Shl),
    (0x9000, Op::SneVxVy),
    (0xA000, Op::LdI),
    (0xB000, Op::JpV0),
    (0xC000, Op::Rnd),
    (0xD000, Op::Drw),
    (0xE09E, Op::Skp),
    (0xE0A1, Op::Sknp),
    (0xF007, Op::LdVxDt),
    (0xF00A, Op::LdVxK),
    (0xF015, Op::LdDtVx),
    (0xF018, Op::LdStVx),
    (0xF01E, Op::AddIVx),
    (0xF029, Op::LdFVx),
    (0xF033, Op::LdBVx),
    (0xF055, Op::StoreRegs),
    (0xF065, Op::LoadRegs),
];

/// which bits of the opcode pick the instruction, by top nibble
pub fn family_mask(opcode: u16) -> u16 {
    match opcode & 0xF000 {
        0x0000 | 0xE000 | 0xF000 => 0xF0FF,
        0x8000 => 0xF00F,
        _ => 0xF000,
    }
}

/// Lookup from masked opcode to instruction, built once and never changed.
pub struct DispatchTable {
    table: HashMap<u16, Op>,
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchTable {
    pub fn new() -> Self {
        DispatchTable {
            table: OPCODES.iter().copied().collect(),
        }
    }

    /// None when nothing in the base set matches
    pub fn decode(&self, opcode: u16) -> Option<Op> {
        self.table.get(&(opcode & family_mask(opcode))).copied()
    }
}

/// register Vx, bits 8-11
pub fn x(opcode: u16) -> usize {
    ((opcode & 0x0F00) >> 8) as usize
}

/// register Vy, bits 4-7
pub fn y(opcode: u16) -> usize {
    ((opcode & 0x00F0) >> 4) as usize
}

/// byte literal, bits 0-7
pub fn kk(opcode: u16) -> u8 {
    (opcode & 0x00FF) as u8
}

/// address literal, bits 0-11
pub fn nnn(opcode: u16) -> u16 {
    opcode & 0x0FFF
}

/// nibble literal, bits 0-3
pub fn n(opcode: u16) -> u8 {
    (opcode & 0x000F) as u8
}
