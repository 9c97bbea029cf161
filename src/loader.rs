//! Loads a program image into a process's code segment.
//!
//! A program image is a sequence of lines, each exactly 27 balanced-
//! ternary digits from the alphabet `{-, 0, +}`, one instruction per
//! line, most-significant trit first on the line (reversed into the
//! least-significant-first in-memory representation [`TritWord`] uses).
//! Blank lines and lines starting with `#` are skipped, mirroring the
//! teacher's tolerance for comments in its own text-based test fixtures.

use crate::error::T3Error;
use crate::instruction::INSTRUCTION_TRITS;
use crate::mmu::MemoryManager;
use crate::protection::SecurityLevel;
use crate::trit::{Trit, TritWord};

/// Parses a 27-character line of `{-,0,+}` into a [`TritWord`], most-
/// significant trit first on the page, reversed to least-significant-
/// first internally.
pub fn parse_line(line: &str) -> Result<TritWord, T3Error> {
    let trimmed = line.trim();
    if trimmed.len() != INSTRUCTION_TRITS {
        return Err(T3Error::InvalidInstruction {
            reason: format!("program line has {} characters, expected {INSTRUCTION_TRITS}", trimmed.len()),
        });
    }
    let mut trits: Vec<Trit> = Vec::with_capacity(INSTRUCTION_TRITS);
    for c in trimmed.chars() {
        trits.push(Trit::from_char(c)?);
    }
    trits.reverse();
    Ok(TritWord::new(trits))
}

/// Loads a program image (one 27-trit line per instruction) into `mmu`
/// starting at trit address 0, using `security` for the write checks.
/// Returns the number of instructions loaded.
pub fn load_program(mmu: &mut MemoryManager, source: &str, security: SecurityLevel) -> Result<usize, T3Error> {
    let mut count = 0;
    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let word = parse_line(trimmed)?;
        mmu.write_word_raw(count * INSTRUCTION_TRITS, &word, security)?;
        count += 1;
    }
    Ok(count)
}
