//! The ternary virtual machine: fetch-decode-execute loop, register
//! file access, and the headless debug surface (breakpoints/watchpoints)
//! a host drives directly instead of through a TUI.
//!
//! Grounded on the teacher's `processor::CPU`: a `clock_cycle` per step,
//! a breakpoint set consulted each fetch, and a disassembly view — minus
//! the teacher's `termion`-based rendering, which has no counterpart
//! here (the equivalent external collaborator is out of scope).

use std::collections::{HashMap, HashSet};

use tracing::{trace, warn};

use crate::alu;
use crate::config::VmConfig;
use crate::devices::IoDevices;
use crate::error::{FaultKind, T3Error};
use crate::instruction::{Instruction, Opcode, INSTRUCTION_TRITS};
use crate::mmu::MemoryManager;
use crate::pcb::{Priority, RegisterName};
use crate::protection::SecurityLevel;
use crate::scheduler::Scheduler;
use crate::trit::TritWord;

type Handler = fn(&mut Tvm, u32, &Instruction) -> Result<(), T3Error>;

const DISPATCH_TABLE: [Handler; 37] = [
    op_load, op_store, op_move, op_loadi, op_push, op_pop,
    op_add, op_sub, op_mul, op_div, op_neg, op_abs,
    op_nand, op_cons, op_any, op_not,
    op_cmp, op_test,
    op_jmp, op_jz, op_jn, op_jp, op_call, op_ret, op_calli,
    op_tshl, op_tshr, op_rotl, op_rotr,
    op_syscall, op_halt, op_nop, op_break,
    op_print, op_input, op_printi, op_prints,
];

/// Outcome of a single `step()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continued,
    Halted,
    HitBreakpoint(usize),
    NoRunnableProcess,
}

pub struct Tvm {
    pub mmu: MemoryManager,
    pub io: IoDevices,
    pub scheduler: Scheduler,
    pub config: VmConfig,
    breakpoints: HashSet<usize>,
    watchpoints: HashMap<usize, TritWord>,
    halted: bool,
    tick_count: u64,
}

impl Tvm {
    pub fn new(config: VmConfig) -> Self {
        let mmu = MemoryManager::new(config.memory_trits);
        let scheduler = Scheduler::new(config.policy, config.time_quantum);
        Tvm {
            mmu,
            io: IoDevices::new(),
            scheduler,
            config,
            breakpoints: HashSet::new(),
            watchpoints: HashMap::new(),
            halted: false,
            tick_count: 0,
        }
    }

    pub fn spawn_process(&mut self, name: impl Into<String>, priority: Priority, entry_pc: usize) -> u32 {
        let pid = self.scheduler.create_process(name, priority);
        let (_, stack_top) = self.mmu.memory().segment_bounds(crate::memory::Segment::Stack);
        if let Some(pcb) = self.scheduler.process_mut(pid) {
            pcb.set_pc(entry_pc);
            let width = pcb.register(RegisterName::Sp).len();
            pcb.set_register(RegisterName::Sp, TritWord::from_decimal(stack_top as i64, width).unwrap_or_else(|_| TritWord::zero(width)));
        }
        pid
    }

    pub fn set_breakpoint(&mut self, addr: usize) {
        self.breakpoints.insert(addr);
    }

    pub fn clear_breakpoint(&mut self, addr: usize) {
        self.breakpoints.remove(&addr);
    }

    pub fn set_watchpoint(&mut self, addr: usize, expected: TritWord) {
        self.watchpoints.insert(addr, expected);
    }

    pub fn clear_watchpoint(&mut self, addr: usize) {
        self.watchpoints.remove(&addr);
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Fetch, decode, and execute a single instruction for the currently
    /// scheduled process. Returns a `StepOutcome` describing what
    /// happened, or a `T3Error` for an architectural fault.
    pub fn step(&mut self) -> Result<StepOutcome, T3Error> {
        if self.halted {
            return Ok(StepOutcome::Halted);
        }
        let Some(pid) = self.scheduler.schedule() else {
            return Ok(StepOutcome::NoRunnableProcess);
        };
        let pc = self.scheduler.process(pid).map(|p| p.pc()).unwrap_or(0);
        if self.breakpoints.contains(&pc) {
            return Ok(StepOutcome::HitBreakpoint(pc));
        }

        let security = self.scheduler.process(pid).map(|p| p.security_level).unwrap_or(SecurityLevel::User);
        let word = self.mmu.read_word_raw(pc, INSTRUCTION_TRITS, security)?;
        let instruction = Instruction::decode(&word)?;
        trace!(pid, pc, opcode = instruction.opcode.mnemonic(), "dispatch");

        if let Some(pcb) = self.scheduler.process_mut(pid) {
            pcb.set_pc(pc + INSTRUCTION_TRITS);
        }

        let handler = DISPATCH_TABLE[instruction.opcode as usize];
        let result = handler(self, pid, &instruction);
        if let Err(ref e) = result {
            warn!(pid, pc, error = %e, "fault");
            if let Some(pcb) = self.scheduler.process_mut(pid) {
                pcb.stats.faults += 1;
            }
            match e.kind() {
                // No trap handler is installed yet, so the default
                // policy terminates the offending process outright.
                FaultKind::Architectural => self.scheduler.terminate_process(pid),
                FaultKind::Resource => {}
                FaultKind::HostBug => panic!("host-bug fault in a correctly driven VM: {e}"),
            }
        }
        self.scheduler.tick();
        self.tick_count += 1;
        result.map(|_| StepOutcome::Continued)
    }

    /// Runs up to `max_instructions` steps, stopping early on halt, a
    /// breakpoint, or an architectural fault.
    pub fn run(&mut self, max_instructions: u64) -> Result<StepOutcome, T3Error> {
        for _ in 0..max_instructions {
            let outcome = self.step()?;
            if outcome != StepOutcome::Continued {
                return Ok(outcome);
            }
        }
        Ok(StepOutcome::Continued)
    }

    fn reg(&self, pid: u32, index: usize) -> Result<TritWord, T3Error> {
        let name = RegisterName::from_index(index).ok_or_else(|| T3Error::InvalidInstruction {
            reason: format!("register index {index} out of range"),
        })?;
        Ok(self
            .scheduler
            .process(pid)
            .map(|p| p.register(name).clone())
            .unwrap_or_else(|| TritWord::zero(crate::pcb::REGISTER_WIDTH_TRITS)))
    }

    fn set_reg(&mut self, pid: u32, index: usize, value: TritWord) -> Result<(), T3Error> {
        let name = RegisterName::from_index(index).ok_or_else(|| T3Error::InvalidInstruction {
            reason: format!("register index {index} out of range"),
        })?;
        if let Some(pcb) = self.scheduler.process_mut(pid) {
            pcb.set_register(name, value);
        }
        Ok(())
    }

    fn flags(&self, pid: u32) -> TritWord {
        self.scheduler
            .process(pid)
            .map(|p| p.register(RegisterName::Flags).clone())
            .unwrap_or_else(|| TritWord::zero(crate::pcb::REGISTER_WIDTH_TRITS))
    }

    fn set_flags(&mut self, pid: u32, value: TritWord) {
        if let Some(pcb) = self.scheduler.process_mut(pid) {
            pcb.set_register(RegisterName::Flags, value);
        }
    }

    fn security_of(&self, pid: u32) -> SecurityLevel {
        self.scheduler.process(pid).map(|p| p.security_level).unwrap_or(SecurityLevel::User)
    }

    fn push(&mut self, pid: u32, value: &TritWord) -> Result<(), T3Error> {
        let sp = self.reg(pid, 9)?.to_decimal();
        let new_sp = sp - value.len() as i64;
        let (stack_start, _) = self.mmu.memory().segment_bounds(crate::memory::Segment::Stack);
        if new_sp < stack_start as i64 {
            return Err(T3Error::StackOverflow { pc: Some(self.scheduler.process(pid).map(|p| p.pc()).unwrap_or(0)) });
        }
        let security = self.security_of(pid);
        self.mmu.write_word_raw(new_sp as usize, value, security)?;
        let width = self.reg(pid, 9)?.len();
        self.set_reg(pid, 9, TritWord::from_decimal(new_sp, width)?)
    }

    fn pop(&mut self, pid: u32, width: usize) -> Result<TritWord, T3Error> {
        let sp = self.reg(pid, 9)?.to_decimal();
        let (_, stack_end) = self.mmu.memory().segment_bounds(crate::memory::Segment::Stack);
        if sp + width as i64 > stack_end as i64 {
            return Err(T3Error::StackUnderflow { pc: Some(self.scheduler.process(pid).map(|p| p.pc()).unwrap_or(0)) });
        }
        let security = self.security_of(pid);
        let value = self.mmu.read_word_raw(sp as usize, width, security)?;
        let new_sp = sp + width as i64;
        let sp_width = self.reg(pid, 9)?.len();
        self.set_reg(pid, 9, TritWord::from_decimal(new_sp, sp_width)?)?;
        Ok(value)
    }
}

fn op_load(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let addr = vm.reg(pid, instr.reg2)?.to_decimal().max(0) as usize;
    let security = vm.security_of(pid);
    let value = vm.mmu.read_word_raw(addr, crate::pcb::REGISTER_WIDTH_TRITS, security)?;
    vm.set_reg(pid, instr.reg1, value)
}

fn op_store(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let addr = vm.reg(pid, instr.reg1)?.to_decimal().max(0) as usize;
    let value = vm.reg(pid, instr.reg2)?;
    let security = vm.security_of(pid);
    vm.mmu.write_word_raw(addr, &value, security)
}

fn op_move(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let value = vm.reg(pid, instr.reg2)?;
    vm.set_reg(pid, instr.reg1, value)
}

fn op_loadi(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let value = TritWord::from_decimal(instr.immediate, crate::pcb::REGISTER_WIDTH_TRITS)?;
    vm.set_reg(pid, instr.reg1, value)
}

fn op_push(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let value = vm.reg(pid, instr.reg1)?;
    vm.push(pid, &value)
}

fn op_pop(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let value = vm.pop(pid, crate::pcb::REGISTER_WIDTH_TRITS)?;
    vm.set_reg(pid, instr.reg1, value)
}

fn op_add(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg2)?;
    let b = vm.reg(pid, instr.reg3)?;
    let (result, _) = alu::add(&a, &b);
    vm.set_reg(pid, instr.reg1, result)
}

fn op_sub(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg2)?;
    let b = vm.reg(pid, instr.reg3)?;
    let (result, _) = alu::sub(&a, &b);
    vm.set_reg(pid, instr.reg1, result)
}

fn op_mul(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg2)?;
    let b = vm.reg(pid, instr.reg3)?;
    let (result, _) = alu::mul(&a, &b);
    vm.set_reg(pid, instr.reg1, result)
}

fn op_div(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg2)?;
    let b = vm.reg(pid, instr.reg3)?;
    let pc = vm.scheduler.process(pid).map(|p| p.pc());
    let (q, _) = alu::div(&a, &b, pc)?;
    vm.set_reg(pid, instr.reg1, q)
}

fn op_neg(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg2)?;
    vm.set_reg(pid, instr.reg1, alu::neg(&a))
}

fn op_abs(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg2)?;
    vm.set_reg(pid, instr.reg1, alu::abs(&a))
}

fn op_nand(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg2)?;
    let b = vm.reg(pid, instr.reg3)?;
    vm.set_reg(pid, instr.reg1, alu::nand(&a, &b))
}

fn op_cons(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg2)?;
    let b = vm.reg(pid, instr.reg3)?;
    vm.set_reg(pid, instr.reg1, alu::cons(&a, &b))
}

fn op_any(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg2)?;
    let b = vm.reg(pid, instr.reg3)?;
    vm.set_reg(pid, instr.reg1, alu::any(&a, &b))
}

fn op_not(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg2)?;
    vm.set_reg(pid, instr.reg1, alu::not(&a))
}

fn op_cmp(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg1)?;
    let b = vm.reg(pid, instr.reg2)?;
    let result = alu::cmp(&a, &b);
    let width = vm.flags(pid).len();
    let mut flags = TritWord::zero(width);
    flags.set(0, result);
    vm.set_flags(pid, flags);
    Ok(())
}

fn op_test(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg1)?;
    let f = alu::test(&a);
    let width = vm.flags(pid).len();
    let mut flags = TritWord::zero(width);
    flags.set(0, if f.negative { crate::trit::Trit::NEGATIVE } else if f.positive { crate::trit::Trit::POSITIVE } else { crate::trit::Trit::NEUTRAL });
    vm.set_flags(pid, flags);
    Ok(())
}

fn op_jmp(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    if let Some(pcb) = vm.scheduler.process_mut(pid) {
        pcb.set_pc(instr.immediate.max(0) as usize);
    }
    Ok(())
}

fn op_jz(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    if vm.reg(pid, instr.reg1)?.to_decimal() == 0 {
        op_jmp(vm, pid, instr)?;
    }
    Ok(())
}

fn op_jn(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    if vm.reg(pid, instr.reg1)?.to_decimal() < 0 {
        op_jmp(vm, pid, instr)?;
    }
    Ok(())
}

fn op_jp(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    if vm.reg(pid, instr.reg1)?.to_decimal() > 0 {
        op_jmp(vm, pid, instr)?;
    }
    Ok(())
}

fn op_call(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let target = vm.reg(pid, instr.reg1)?.to_decimal().max(0) as usize;
    let return_pc = vm.scheduler.process(pid).map(|p| p.pc()).unwrap_or(0);
    let width = vm.reg(pid, 9)?.len().max(crate::pcb::REGISTER_WIDTH_TRITS);
    let ret_word = TritWord::from_decimal(return_pc as i64, width)?;
    vm.push(pid, &ret_word)?;
    if let Some(pcb) = vm.scheduler.process_mut(pid) {
        pcb.set_pc(target);
    }
    Ok(())
}

fn op_ret(vm: &mut Tvm, pid: u32, _instr: &Instruction) -> Result<(), T3Error> {
    let ret = vm.pop(pid, crate::pcb::REGISTER_WIDTH_TRITS)?;
    if let Some(pcb) = vm.scheduler.process_mut(pid) {
        pcb.set_pc(ret.to_decimal().max(0) as usize);
    }
    Ok(())
}

fn op_calli(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let return_pc = vm.scheduler.process(pid).map(|p| p.pc()).unwrap_or(0);
    let width = vm.reg(pid, 9)?.len().max(crate::pcb::REGISTER_WIDTH_TRITS);
    let ret_word = TritWord::from_decimal(return_pc as i64, width)?;
    vm.push(pid, &ret_word)?;
    op_jmp(vm, pid, instr)
}

fn op_tshl(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg2)?;
    vm.set_reg(pid, instr.reg1, alu::tshl(&a, instr.immediate))
}

fn op_tshr(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg2)?;
    vm.set_reg(pid, instr.reg1, alu::tshr(&a, instr.immediate))
}

fn op_rotl(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg2)?;
    vm.set_reg(pid, instr.reg1, alu::rotl(&a, instr.immediate))
}

fn op_rotr(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let a = vm.reg(pid, instr.reg2)?;
    vm.set_reg(pid, instr.reg1, alu::rotr(&a, instr.immediate))
}

fn op_syscall(vm: &mut Tvm, pid: u32, _instr: &Instruction) -> Result<(), T3Error> {
    if let Some(pcb) = vm.scheduler.process_mut(pid) {
        pcb.stats.syscalls += 1;
    }
    Ok(())
}

fn op_halt(vm: &mut Tvm, pid: u32, _instr: &Instruction) -> Result<(), T3Error> {
    vm.halted = true;
    vm.scheduler.terminate_process(pid);
    Ok(())
}

fn op_nop(_vm: &mut Tvm, _pid: u32, _instr: &Instruction) -> Result<(), T3Error> {
    Ok(())
}

fn op_break(_vm: &mut Tvm, _pid: u32, _instr: &Instruction) -> Result<(), T3Error> {
    Ok(())
}

fn op_print(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let value = vm.reg(pid, instr.reg1)?;
    vm.io.enqueue_output(value);
    Ok(())
}

fn op_input(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let value = vm.io.read_input(crate::pcb::REGISTER_WIDTH_TRITS);
    vm.set_reg(pid, instr.reg1, value)
}

fn op_printi(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let value = vm.reg(pid, instr.reg1)?;
    vm.io.enqueue_text(value.to_decimal().to_string());
    Ok(())
}

fn op_prints(vm: &mut Tvm, pid: u32, instr: &Instruction) -> Result<(), T3Error> {
    let security = vm.security_of(pid);
    let mut addr = vm.reg(pid, instr.reg1)?.to_decimal().max(0) as usize;
    let mut text = String::new();
    loop {
        let word = vm.mmu.read_word_raw(addr, crate::pcb::REGISTER_WIDTH_TRITS, security)?;
        if word.is_zero() {
            break;
        }
        text.push(char::from_u32(word.to_decimal().rem_euclid(0x110000) as u32).unwrap_or('?'));
        addr += crate::pcb::REGISTER_WIDTH_TRITS;
        if text.len() > 4096 {
            break;
        }
    }
    vm.io.enqueue_text(text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;

    fn write_program(vm: &mut Tvm, pid: u32, program: &[Instruction]) {
        let security = vm.security_of(pid);
        for (i, instr) in program.iter().enumerate() {
            let word = instr.encode().unwrap();
            vm.mmu.write_word_raw(i * INSTRUCTION_TRITS, &word, security).unwrap();
        }
    }

    #[test]
    fn loadi_then_halt() {
        let mut vm = Tvm::new(VmConfig::default());
        let pid = vm.spawn_process("p", Priority::Normal, 0);
        write_program(&mut vm, pid, &[
            Instruction::new(Opcode::Loadi, 0, 0, 0, 42),
            Instruction::new(Opcode::Halt, 0, 0, 0, 0),
        ]);
        let outcome = vm.run(10).unwrap();
        assert_eq!(outcome, StepOutcome::Halted);
        assert!(vm.is_halted());
    }

    #[test]
    fn add_computes_sum_into_reg1() {
        let mut vm = Tvm::new(VmConfig::default());
        let pid = vm.spawn_process("p", Priority::Normal, 0);
        write_program(&mut vm, pid, &[
            Instruction::new(Opcode::Loadi, 1, 0, 0, 3),
            Instruction::new(Opcode::Loadi, 2, 0, 0, 4),
            Instruction::new(Opcode::Add, 0, 1, 2, 0),
            Instruction::new(Opcode::Halt, 0, 0, 0, 0),
        ]);
        vm.run(10).unwrap();
        let pcb = vm.scheduler.process(pid).unwrap();
        assert_eq!(pcb.register(RegisterName::R0).to_decimal(), 7);
    }

    #[test]
    fn breakpoint_halts_stepping() {
        let mut vm = Tvm::new(VmConfig::default());
        let pid = vm.spawn_process("p", Priority::Normal, 0);
        write_program(&mut vm, pid, &[
            Instruction::new(Opcode::Nop, 0, 0, 0, 0),
            Instruction::new(Opcode::Halt, 0, 0, 0, 0),
        ]);
        vm.set_breakpoint(INSTRUCTION_TRITS);
        let outcome = vm.run(10).unwrap();
        assert_eq!(outcome, StepOutcome::HitBreakpoint(INSTRUCTION_TRITS));
    }

    #[test]
    fn division_by_zero_is_architectural_fault() {
        let mut vm = Tvm::new(VmConfig::default());
        let pid = vm.spawn_process("p", Priority::Normal, 0);
        write_program(&mut vm, pid, &[
            Instruction::new(Opcode::Loadi, 1, 0, 0, 5),
            Instruction::new(Opcode::Loadi, 2, 0, 0, 0),
            Instruction::new(Opcode::Div, 0, 1, 2, 0),
        ]);
        let err = vm.run(10).unwrap_err();
        assert!(matches!(err, T3Error::DivisionByZero { .. }));
    }
}
