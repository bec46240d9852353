//! Stack-based bytecode VM for user-defined strategies.
//!
//! Programs are at most 64 bytes and run on a fixed 8-slot u8 stack with a
//! fuel limit, so a submitted strategy can never execute arbitrary code or
//! loop forever. During a match any runtime fault defaults to Cooperate
//! (the "fail-safe" rule); at registration the same faults reject the
//! program outright.

use thiserror::Error;

use crate::random::SeededRng;
use crate::strategy::{HistoryEntry, Move, SAMPLE_HISTORIES};

// ── Constants ────────────────────────────────────────────────────────

/// Maximum bytecode program length in bytes.
pub const MAX_BYTECODE_LEN: usize = 64;

/// Maximum instructions the VM will execute before halting (fuel limit).
const MAX_FUEL: u32 = 128;

/// Stack depth (fixed array, no heap).
const STACK_SIZE: usize = 8;

/// Seed of the private stream used when exercising programs at admission.
const ADMISSION_SEED: u32 = 0x5eed_0001;

// ── Opcodes ──────────────────────────────────────────────────────────

pub mod op {
    pub const COOP: u8 = 0x00;
    pub const PUSH: u8 = 0x01;
    pub const OPP_LAST: u8 = 0x02;
    pub const MY_LAST: u8 = 0x03;
    pub const OPP_N: u8 = 0x04;
    pub const MY_N: u8 = 0x05;
    pub const OPP_DEFECTS: u8 = 0x06;
    pub const MY_DEFECTS: u8 = 0x07;
    pub const ROUND: u8 = 0x08;
    pub const RAND: u8 = 0x09;
    pub const ADD: u8 = 0x0A;
    pub const SUB: u8 = 0x0B;
    pub const MUL: u8 = 0x0C;
    pub const GT: u8 = 0x0D;
    pub const LT: u8 = 0x0E;
    pub const EQ: u8 = 0x0F;
    pub const NOT: u8 = 0x10;
    pub const AND: u8 = 0x11;
    pub const OR: u8 = 0x12;
    pub const DUP: u8 = 0x13;
    pub const JMP_FWD: u8 = 0x14;
    pub const JMP_FWD_IF: u8 = 0x15;
    pub const DEFECT: u8 = 0x16;
    pub const RANK_LAST: u8 = 0x17;
    pub const RETURN: u8 = 0x18;
}

/// Mnemonic table used by the assembler: (name, opcode, takes immediate).
const MNEMONICS: [(&str, u8, bool); 25] = [
    ("COOP", op::COOP, false),
    ("PUSH", op::PUSH, true),
    ("OPP_LAST", op::OPP_LAST, false),
    ("MY_LAST", op::MY_LAST, false),
    ("OPP_N", op::OPP_N, false),
    ("MY_N", op::MY_N, false),
    ("OPP_DEFECTS", op::OPP_DEFECTS, false),
    ("MY_DEFECTS", op::MY_DEFECTS, false),
    ("ROUND", op::ROUND, false),
    ("RAND", op::RAND, false),
    ("ADD", op::ADD, false),
    ("SUB", op::SUB, false),
    ("MUL", op::MUL, false),
    ("GT", op::GT, false),
    ("LT", op::LT, false),
    ("EQ", op::EQ, false),
    ("NOT", op::NOT, false),
    ("AND", op::AND, false),
    ("OR", op::OR, false),
    ("DUP", op::DUP, false),
    ("JMP_FWD", op::JMP_FWD, true),
    ("JMP_FWD_IF", op::JMP_FWD_IF, true),
    ("DEFECT", op::DEFECT, false),
    ("RANK_LAST", op::RANK_LAST, false),
    ("RETURN", op::RETURN, false),
];

// ── Errors ───────────────────────────────────────────────────────────

/// Errors that can occur during static bytecode validation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BytecodeError {
    #[error("bytecode is empty")]
    Empty,
    #[error("bytecode exceeds {MAX_BYTECODE_LEN} bytes")]
    TooLong,
    #[error("unknown opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode { offset: usize, opcode: u8 },
    #[error("truncated immediate at offset {offset}")]
    TruncatedImmediate { offset: usize },
    #[error("forward jump out of bounds at offset {offset}")]
    JumpOutOfBounds { offset: usize },
    #[error("no terminal instruction (COOP/DEFECT/RETURN)")]
    NoTerminal,
}

/// Runtime faults raised while executing a program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum VmFault {
    #[error("stack underflow at offset {offset}")]
    StackUnderflow { offset: usize },
    #[error("stack overflow at offset {offset}")]
    StackOverflow { offset: usize },
    #[error("fuel exhausted after {MAX_FUEL} instructions")]
    FuelExhausted,
    #[error("program ended without a terminal instruction")]
    FellOffEnd,
    #[error("unknown opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode { offset: usize, opcode: u8 },
    #[error("truncated immediate at offset {offset}")]
    TruncatedImmediate { offset: usize },
    #[error("RETURN with {value}, expected 0 (cooperate) or 1 (defect)")]
    InvalidMove { value: u8 },
}

/// Why a program was refused admission.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProgramRejection {
    #[error(transparent)]
    Invalid(#[from] BytecodeError),
    #[error("faulted on sample history #{sample}: {fault}")]
    Fault { sample: usize, fault: VmFault },
}

/// Errors produced by the textual assembler.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error("unknown mnemonic `{token}` at token {position}")]
    UnknownMnemonic { token: String, position: usize },
    #[error("`{mnemonic}` expects an immediate operand")]
    MissingImmediate { mnemonic: String },
    #[error("invalid immediate `{token}` (expected 0-255)")]
    BadImmediate { token: String },
    #[error(transparent)]
    Invalid(#[from] BytecodeError),
}

// ── Validation ───────────────────────────────────────────────────────

/// Validate bytecode before admitting it into a strategy set.
///
/// Checks:
/// - Non-empty, at most `MAX_BYTECODE_LEN` bytes
/// - All opcodes are known
/// - All immediates are present (not truncated)
/// - All forward jumps land within bounds
/// - At least one terminal instruction exists
pub fn validate_bytecode(bytecode: &[u8]) -> Result<(), BytecodeError> {
    if bytecode.is_empty() {
        return Err(BytecodeError::Empty);
    }
    if bytecode.len() > MAX_BYTECODE_LEN {
        return Err(BytecodeError::TooLong);
    }

    let mut pc = 0usize;
    let mut has_terminal = false;

    while pc < bytecode.len() {
        let opcode = bytecode[pc];
        match opcode {
            op::COOP | op::DEFECT | op::RETURN => {
                has_terminal = true;
                pc += 1;
            }
            op::PUSH => {
                if pc + 1 >= bytecode.len() {
                    return Err(BytecodeError::TruncatedImmediate { offset: pc });
                }
                pc += 2;
            }
            op::JMP_FWD | op::JMP_FWD_IF => {
                if pc + 1 >= bytecode.len() {
                    return Err(BytecodeError::TruncatedImmediate { offset: pc });
                }
                let target = pc + 2 + bytecode[pc + 1] as usize;
                if target > bytecode.len() {
                    return Err(BytecodeError::JumpOutOfBounds { offset: pc });
                }
                pc += 2;
            }
            op::OPP_LAST | op::MY_LAST | op::OPP_N | op::MY_N |
            op::OPP_DEFECTS | op::MY_DEFECTS | op::ROUND | op::RAND |
            op::ADD | op::SUB | op::MUL | op::GT | op::LT | op::EQ |
            op::NOT | op::AND | op::OR | op::DUP | op::RANK_LAST => {
                pc += 1;
            }
            _ => {
                return Err(BytecodeError::UnknownOpcode { offset: pc, opcode });
            }
        }
    }

    if !has_terminal {
        return Err(BytecodeError::NoTerminal);
    }

    Ok(())
}

/// Admission check for a user-submitted program.
///
/// Runs static validation, then executes the program against every sample
/// history on a private RNG stream. Any fault rejects the program.
pub fn admit_program(bytecode: &[u8]) -> Result<(), ProgramRejection> {
    validate_bytecode(bytecode)?;
    let mut rng = SeededRng::new(ADMISSION_SEED);
    for (sample, history) in SAMPLE_HISTORIES.iter().enumerate() {
        try_execute(bytecode, history, &mut rng)
            .map_err(|fault| ProgramRejection::Fault { sample, fault })?;
    }
    Ok(())
}

// ── Assembler ────────────────────────────────────────────────────────

/// Assemble a whitespace-separated mnemonic listing into bytecode.
///
/// `;` starts a comment running to the end of the line. Immediates accept
/// decimal or `0x` hex. The result is validated before it is returned.
///
/// ```
/// use evolution_logic::vm::{assemble, op};
/// assert_eq!(assemble("OPP_LAST RETURN").unwrap(), vec![op::OPP_LAST, op::RETURN]);
/// ```
pub fn assemble(source: &str) -> Result<Vec<u8>, AssembleError> {
    let mut tokens = source
        .lines()
        .map(|line| line.split(';').next().unwrap_or(""))
        .flat_map(|line| line.split(|c: char| c.is_whitespace() || c == ','))
        .filter(|t| !t.is_empty())
        .enumerate();

    let mut code = Vec::new();
    while let Some((position, token)) = tokens.next() {
        let upper = token.to_ascii_uppercase();
        let (_, opcode, has_imm) = MNEMONICS
            .iter()
            .find(|(name, _, _)| *name == upper)
            .copied()
            .ok_or_else(|| AssembleError::UnknownMnemonic {
                token: token.to_string(),
                position,
            })?;
        code.push(opcode);
        if has_imm {
            let (_, imm) = tokens
                .next()
                .ok_or_else(|| AssembleError::MissingImmediate { mnemonic: upper.clone() })?;
            code.push(parse_immediate(imm)?);
        }
    }

    validate_bytecode(&code)?;
    Ok(code)
}

fn parse_immediate(token: &str) -> Result<u8, AssembleError> {
    let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => token.parse::<u8>(),
    };
    parsed.map_err(|_| AssembleError::BadImmediate { token: token.to_string() })
}

// ── Execution ────────────────────────────────────────────────────────

/// Execute a bytecode program and return the chosen move.
///
/// Fail-safe: any runtime fault → Cooperate.
pub fn execute_bytecode(bytecode: &[u8], history: &[HistoryEntry], rng: &mut SeededRng) -> Move {
    try_execute(bytecode, history, rng).unwrap_or(Move::Cooperate)
}

/// Execute a program, surfacing the first runtime fault.
pub fn try_execute(
    bytecode: &[u8],
    history: &[HistoryEntry],
    rng: &mut SeededRng,
) -> Result<Move, VmFault> {
    let mut stack = Stack::default();
    let mut pc: usize = 0;
    let mut fuel: u32 = 0;

    while pc < bytecode.len() {
        fuel += 1;
        if fuel > MAX_FUEL {
            return Err(VmFault::FuelExhausted);
        }

        let opcode = bytecode[pc];
        let at = pc;
        match opcode {
            op::COOP => return Ok(Move::Cooperate),
            op::DEFECT => return Ok(Move::Defect),

            op::RETURN => {
                return match stack.pop(at)? {
                    0 => Ok(Move::Cooperate),
                    1 => Ok(Move::Defect),
                    value => Err(VmFault::InvalidMove { value }),
                };
            }

            op::PUSH => {
                let imm = immediate(bytecode, at)?;
                stack.push(at, imm)?;
                pc += 2;
            }

            op::OPP_LAST => {
                stack.push(at, move_to_u8(history.last().map(|e| e.opponent)))?;
                pc += 1;
            }

            op::MY_LAST => {
                stack.push(at, move_to_u8(history.last().map(|e| e.own)))?;
                pc += 1;
            }

            op::OPP_N => {
                let n = stack.pop(at)? as usize;
                stack.push(at, n_ago(history, n, |e| e.opponent))?;
                pc += 1;
            }

            op::MY_N => {
                let n = stack.pop(at)? as usize;
                stack.push(at, n_ago(history, n, |e| e.own))?;
                pc += 1;
            }

            op::OPP_DEFECTS => {
                stack.push(at, count_defects(history, |e| e.opponent))?;
                pc += 1;
            }

            op::MY_DEFECTS => {
                stack.push(at, count_defects(history, |e| e.own))?;
                pc += 1;
            }

            op::ROUND => {
                stack.push(at, history.len().min(255) as u8)?;
                pc += 1;
            }

            op::RAND => {
                stack.push(at, rng.next_percent())?;
                pc += 1;
            }

            op::ADD | op::SUB | op::MUL | op::GT | op::LT | op::EQ | op::AND | op::OR => {
                let b = stack.pop(at)?;
                let a = stack.pop(at)?;
                let v = match opcode {
                    op::ADD => a.saturating_add(b),
                    op::SUB => a.saturating_sub(b),
                    op::MUL => a.saturating_mul(b),
                    op::GT => u8::from(a > b),
                    op::LT => u8::from(a < b),
                    op::EQ => u8::from(a == b),
                    op::AND => u8::from(a != 0 && b != 0),
                    _ => u8::from(a != 0 || b != 0),
                };
                stack.push(at, v)?;
                pc += 1;
            }

            op::NOT => {
                let a = stack.pop(at)?;
                stack.push(at, u8::from(a == 0))?;
                pc += 1;
            }

            op::DUP => {
                let a = stack.pop(at)?;
                stack.push(at, a)?;
                stack.push(at, a)?;
                pc += 1;
            }

            op::JMP_FWD => {
                pc = at + 2 + immediate(bytecode, at)? as usize;
            }

            op::JMP_FWD_IF => {
                let cond = stack.pop(at)?;
                let offset = immediate(bytecode, at)? as usize;
                pc = if cond != 0 { at + 2 + offset } else { at + 2 };
            }

            op::RANK_LAST => {
                let rank = history.last().map_or(2, |e| outcome_rank(e.own, e.opponent));
                stack.push(at, rank)?;
                pc += 1;
            }

            _ => return Err(VmFault::UnknownOpcode { offset: at, opcode }),
        }
    }

    Err(VmFault::FellOffEnd)
}

// ── Stack ────────────────────────────────────────────────────────────

#[derive(Default)]
struct Stack {
    slots: [u8; STACK_SIZE],
    sp: usize,
}

impl Stack {
    #[inline]
    fn push(&mut self, offset: usize, val: u8) -> Result<(), VmFault> {
        if self.sp >= STACK_SIZE {
            return Err(VmFault::StackOverflow { offset });
        }
        self.slots[self.sp] = val;
        self.sp += 1;
        Ok(())
    }

    #[inline]
    fn pop(&mut self, offset: usize) -> Result<u8, VmFault> {
        if self.sp == 0 {
            return Err(VmFault::StackUnderflow { offset });
        }
        self.sp -= 1;
        Ok(self.slots[self.sp])
    }
}

// ── History helpers ──────────────────────────────────────────────────

#[inline]
fn immediate(bytecode: &[u8], offset: usize) -> Result<u8, VmFault> {
    bytecode
        .get(offset + 1)
        .copied()
        .ok_or(VmFault::TruncatedImmediate { offset })
}

#[inline]
fn move_to_u8(m: Option<Move>) -> u8 {
    match m {
        Some(Move::Defect) => 1,
        _ => 0, // Cooperate or no history
    }
}

#[inline]
fn n_ago(history: &[HistoryEntry], n: usize, side: impl Fn(&HistoryEntry) -> Move) -> u8 {
    if n >= history.len() {
        return 0; // no data → Cooperate
    }
    move_to_u8(Some(side(&history[history.len() - 1 - n])))
}

#[inline]
fn count_defects(history: &[HistoryEntry], side: impl Fn(&HistoryEntry) -> Move) -> u8 {
    let count = history.iter().filter(|e| side(e) == Move::Defect).count();
    count.min(255) as u8
}

/// Ordinal payoff of a round from the mover's side: S=0, P=1, R=2, T=3.
#[inline]
fn outcome_rank(own: Move, opponent: Move) -> u8 {
    match (own, opponent) {
        (Move::Cooperate, Move::Defect) => 0,
        (Move::Defect, Move::Defect) => 1,
        (Move::Cooperate, Move::Cooperate) => 2,
        (Move::Defect, Move::Cooperate) => 3,
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const C: Move = Move::Cooperate;
    const D: Move = Move::Defect;

    fn rng() -> SeededRng {
        SeededRng::new(42)
    }

    fn h(rounds: &[(Move, Move)]) -> Vec<HistoryEntry> {
        rounds.iter().map(|&(own, opponent)| HistoryEntry { own, opponent }).collect()
    }

    fn run(code: &[u8], history: &[HistoryEntry]) -> Result<Move, VmFault> {
        try_execute(code, history, &mut rng())
    }

    // -- Terminals --

    #[test]
    fn test_coop() {
        assert_eq!(execute_bytecode(&[op::COOP], &[], &mut rng()), C);
    }

    #[test]
    fn test_defect() {
        assert_eq!(execute_bytecode(&[op::DEFECT], &[], &mut rng()), D);
    }

    #[test]
    fn test_return_zero_and_one() {
        assert_eq!(run(&[op::PUSH, 0, op::RETURN], &[]), Ok(C));
        assert_eq!(run(&[op::PUSH, 1, op::RETURN], &[]), Ok(D));
    }

    #[test]
    fn test_return_out_of_range_faults() {
        assert_eq!(run(&[op::PUSH, 7, op::RETURN], &[]), Err(VmFault::InvalidMove { value: 7 }));
        // fail-safe during a match
        assert_eq!(execute_bytecode(&[op::PUSH, 7, op::RETURN], &[], &mut rng()), C);
    }

    // -- TitForTat as bytecode: OPP_LAST RETURN --

    #[test]
    fn test_bytecode_tit_for_tat() {
        let code = [op::OPP_LAST, op::RETURN];
        assert_eq!(run(&code, &[]), Ok(C));
        assert_eq!(run(&code, &h(&[(C, C)])), Ok(C));
        assert_eq!(run(&code, &h(&[(C, D)])), Ok(D));
    }

    #[test]
    fn test_bytecode_grim_trigger() {
        // OPP_DEFECTS PUSH 0 GT JMP_FWD_IF 1 COOP DEFECT
        let code = [op::OPP_DEFECTS, op::PUSH, 0, op::GT, op::JMP_FWD_IF, 1, op::COOP, op::DEFECT];
        assert_eq!(run(&code, &[]), Ok(C));
        assert_eq!(run(&code, &h(&[(C, C), (C, C)])), Ok(C));
        assert_eq!(run(&code, &h(&[(C, D), (D, C), (D, C)])), Ok(D));
    }

    // -- Arithmetic / logic --

    #[test]
    fn test_saturating_arithmetic() {
        assert_eq!(run(&[op::PUSH, 200, op::PUSH, 100, op::ADD, op::PUSH, 255, op::EQ, op::RETURN], &[]), Ok(D));
        assert_eq!(run(&[op::PUSH, 1, op::PUSH, 5, op::SUB, op::RETURN], &[]), Ok(C));
        assert_eq!(run(&[op::PUSH, 16, op::PUSH, 16, op::MUL, op::PUSH, 255, op::EQ, op::RETURN], &[]), Ok(D));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run(&[op::PUSH, 5, op::PUSH, 3, op::GT, op::RETURN], &[]), Ok(D));
        assert_eq!(run(&[op::PUSH, 5, op::PUSH, 3, op::LT, op::RETURN], &[]), Ok(C));
        assert_eq!(run(&[op::PUSH, 4, op::PUSH, 4, op::EQ, op::RETURN], &[]), Ok(D));
    }

    #[test]
    fn test_boolean_ops() {
        assert_eq!(run(&[op::PUSH, 0, op::NOT, op::RETURN], &[]), Ok(D));
        assert_eq!(run(&[op::PUSH, 9, op::NOT, op::RETURN], &[]), Ok(C));
        assert_eq!(run(&[op::PUSH, 2, op::PUSH, 0, op::AND, op::RETURN], &[]), Ok(C));
        assert_eq!(run(&[op::PUSH, 2, op::PUSH, 0, op::OR, op::RETURN], &[]), Ok(D));
    }

    #[test]
    fn test_dup() {
        assert_eq!(run(&[op::PUSH, 1, op::DUP, op::AND, op::RETURN], &[]), Ok(D));
    }

    // -- History access --

    #[test]
    fn test_round_counts_history() {
        let history = h(&[(C, C), (C, C), (C, C)]);
        assert_eq!(run(&[op::ROUND, op::PUSH, 3, op::EQ, op::RETURN], &history), Ok(D));
    }

    #[test]
    fn test_opp_n_and_my_n() {
        let history = h(&[(D, C), (C, D), (C, C)]);
        // opponent one round ago defected
        assert_eq!(run(&[op::PUSH, 1, op::OPP_N, op::RETURN], &history), Ok(D));
        // own move two rounds ago defected
        assert_eq!(run(&[op::PUSH, 2, op::MY_N, op::RETURN], &history), Ok(D));
        // beyond the start reads as Cooperate
        assert_eq!(run(&[op::PUSH, 9, op::OPP_N, op::RETURN], &history), Ok(C));
    }

    #[test]
    fn test_defect_counts() {
        let history = h(&[(D, D), (D, C), (C, D)]);
        assert_eq!(run(&[op::OPP_DEFECTS, op::PUSH, 2, op::EQ, op::RETURN], &history), Ok(D));
        assert_eq!(run(&[op::MY_DEFECTS, op::PUSH, 2, op::EQ, op::RETURN], &history), Ok(D));
    }

    #[test]
    fn test_rank_last() {
        let code = [op::RANK_LAST, op::PUSH, 2, op::LT, op::RETURN];
        assert_eq!(run(&code, &[]), Ok(C)); // empty reads as R
        assert_eq!(run(&code, &h(&[(C, C)])), Ok(C));
        assert_eq!(run(&code, &h(&[(D, C)])), Ok(C));
        assert_eq!(run(&code, &h(&[(D, D)])), Ok(D));
        assert_eq!(run(&code, &h(&[(C, D)])), Ok(D));
    }

    #[test]
    fn test_rand_draws_from_stream() {
        let mut a = rng();
        let mut b = rng();
        let code = [op::RAND, op::PUSH, 50, op::LT, op::RETURN];
        let expected = if b.next_percent() < 50 { D } else { C };
        assert_eq!(try_execute(&code, &[], &mut a), Ok(expected));
        assert_eq!(a, b);
    }

    // -- Control flow --

    #[test]
    fn test_jmp_fwd() {
        assert_eq!(run(&[op::JMP_FWD, 1, op::COOP, op::DEFECT], &[]), Ok(D));
    }

    #[test]
    fn test_jmp_fwd_if() {
        assert_eq!(run(&[op::PUSH, 1, op::JMP_FWD_IF, 1, op::COOP, op::DEFECT], &[]), Ok(D));
        assert_eq!(run(&[op::PUSH, 0, op::JMP_FWD_IF, 1, op::COOP, op::DEFECT], &[]), Ok(C));
    }

    // -- Faults --

    #[test]
    fn test_stack_underflow() {
        assert_eq!(run(&[op::RETURN], &[]), Err(VmFault::StackUnderflow { offset: 0 }));
    }

    #[test]
    fn test_stack_overflow() {
        let mut code = Vec::new();
        for _ in 0..9 {
            code.extend_from_slice(&[op::PUSH, 0]);
        }
        code.push(op::COOP);
        assert_eq!(run(&code, &[]), Err(VmFault::StackOverflow { offset: 16 }));
    }

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(run(&[0xFF], &[]), Err(VmFault::UnknownOpcode { offset: 0, opcode: 0xFF }));
    }

    #[test]
    fn test_fall_off_end() {
        assert_eq!(run(&[op::PUSH, 1], &[]), Err(VmFault::FellOffEnd));
        assert_eq!(execute_bytecode(&[], &[], &mut rng()), C);
    }

    #[test]
    fn test_fuel_exhaustion() {
        // unvalidated input longer than the fuel budget
        let mut code = vec![op::PUSH, 0];
        code.extend(std::iter::repeat(op::NOT).take(200));
        code.push(op::RETURN);
        assert_eq!(run(&code, &[]), Err(VmFault::FuelExhausted));
        assert_eq!(execute_bytecode(&code, &[], &mut rng()), C);
    }

    #[test]
    fn test_full_length_program_runs() {
        let mut code = vec![op::OPP_LAST];
        while code.len() < MAX_BYTECODE_LEN - 1 {
            code.push(op::NOT);
        }
        code.push(op::RETURN);
        assert!(validate_bytecode(&code).is_ok());
        assert!(run(&code, &[]).is_ok());
    }

    // -- Validation --

    #[test]
    fn test_validate_errors() {
        assert_eq!(validate_bytecode(&[]), Err(BytecodeError::Empty));
        assert_eq!(validate_bytecode(&[op::COOP; 65]), Err(BytecodeError::TooLong));
        assert_eq!(
            validate_bytecode(&[op::COOP, 0x99]),
            Err(BytecodeError::UnknownOpcode { offset: 1, opcode: 0x99 })
        );
        assert_eq!(
            validate_bytecode(&[op::COOP, op::PUSH]),
            Err(BytecodeError::TruncatedImmediate { offset: 1 })
        );
        assert_eq!(
            validate_bytecode(&[op::JMP_FWD, 5, op::COOP]),
            Err(BytecodeError::JumpOutOfBounds { offset: 0 })
        );
        assert_eq!(validate_bytecode(&[op::OPP_LAST]), Err(BytecodeError::NoTerminal));
    }

    #[test]
    fn test_validate_valid_programs() {
        assert!(validate_bytecode(&[op::COOP]).is_ok());
        assert!(validate_bytecode(&[op::OPP_LAST, op::RETURN]).is_ok());
        assert!(validate_bytecode(&[
            op::OPP_DEFECTS, op::PUSH, 0, op::GT, op::JMP_FWD_IF, 1, op::COOP, op::DEFECT,
        ]).is_ok());
    }

    // -- Admission --

    #[test]
    fn test_admit_accepts_sound_programs() {
        assert_eq!(admit_program(&[op::OPP_LAST, op::RETURN]), Ok(()));
        assert_eq!(admit_program(&[op::RAND, op::PUSH, 30, op::LT, op::RETURN]), Ok(()));
    }

    #[test]
    fn test_admit_rejects_static_errors() {
        assert_eq!(
            admit_program(&[op::OPP_LAST]),
            Err(ProgramRejection::Invalid(BytecodeError::NoTerminal))
        );
    }

    #[test]
    fn test_admit_rejects_runtime_faults() {
        // valid shape, but underflows on the first sample
        assert!(matches!(
            admit_program(&[op::ADD, op::RETURN]),
            Err(ProgramRejection::Fault { sample: 0, fault: VmFault::StackUnderflow { .. } })
        ));
        // returns 2 once the opponent has defected
        let code = [op::OPP_DEFECTS, op::PUSH, 2, op::MUL, op::RETURN];
        assert!(matches!(
            admit_program(&code),
            Err(ProgramRejection::Fault { fault: VmFault::InvalidMove { value: 2 }, .. })
        ));
    }

    // -- Assembler --

    #[test]
    fn test_assemble_basic() {
        assert_eq!(assemble("opp_last return"), Ok(vec![op::OPP_LAST, op::RETURN]));
        assert_eq!(
            assemble("OPP_DEFECTS, PUSH 0, GT\nJMP_FWD_IF 0x01 ; skip coop\nCOOP DEFECT"),
            Ok(vec![op::OPP_DEFECTS, op::PUSH, 0, op::GT, op::JMP_FWD_IF, 1, op::COOP, op::DEFECT])
        );
    }

    #[test]
    fn test_assemble_errors() {
        assert_eq!(
            assemble("OPP_LAST SHOUT"),
            Err(AssembleError::UnknownMnemonic { token: "SHOUT".into(), position: 1 })
        );
        assert_eq!(
            assemble("PUSH"),
            Err(AssembleError::MissingImmediate { mnemonic: "PUSH".into() })
        );
        assert_eq!(
            assemble("PUSH 300 RETURN"),
            Err(AssembleError::BadImmediate { token: "300".into() })
        );
        assert_eq!(assemble("OPP_LAST"), Err(AssembleError::Invalid(BytecodeError::NoTerminal)));
    }

    #[test]
    fn test_max_length_bytecode() {
        // 31 PUSH+imm pairs (62 bytes) + COOP + DEFECT = 64 bytes
        let mut code = Vec::new();
        for _ in 0..31 {
            code.extend_from_slice(&[op::PUSH, 0]);
        }
        code.push(op::COOP);
        code.push(op::DEFECT);
        assert_eq!(code.len(), MAX_BYTECODE_LEN);
        assert!(validate_bytecode(&code).is_ok());
        // Stack overflow at push #9 → fail-safe cooperate
        assert_eq!(execute_bytecode(&code, &[], &mut rng()), C);
    }
}
