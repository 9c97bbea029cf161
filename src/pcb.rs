//! Process control block.
//!
//! Grounded on `original_source/.../core/t3_pcb.py`'s `T3_PCB`: pid,
//! name, parent/children, state, priority, security level, a register
//! snapshot, memory descriptors, fd table, counters, permissions,
//! signals, quotas, and the environment/cwd/argv bookkeeping a process
//! needs to be context-switched in and out cleanly.

use std::collections::{HashMap, HashSet};

use crate::protection::SecurityLevel;
use crate::trit::TritWord;

pub const REGISTER_FILE_SIZE: usize = 12; // R0..R7, PC, SP, FP, FLAGS
pub const REGISTER_WIDTH_TRITS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterName {
    R0, R1, R2, R3, R4, R5, R6, R7,
    Pc, Sp, Fp, Flags,
}

impl RegisterName {
    /// The 11 addressable registers in operand-field order: R0..R7 map
    /// to indices 0..7, PC/SP/FP to 8..10. FLAGS exists in the register
    /// file but is never addressable through the 3-trit register-index
    /// operand field (whose range is 0..=10) — it is only ever set
    /// implicitly by CMP/TEST and read through host accessors.
    pub fn from_index(index: usize) -> Option<RegisterName> {
        use RegisterName::*;
        Some(match index {
            0 => R0, 1 => R1, 2 => R2, 3 => R3, 4 => R4, 5 => R5, 6 => R6, 7 => R7,
            8 => Pc, 9 => Sp, 10 => Fp,
            _ => return None,
        })
    }

    pub fn slot(self) -> usize {
        use RegisterName::*;
        match self {
            R0 => 0, R1 => 1, R2 => 2, R3 => 3, R4 => 4, R5 => 5, R6 => 6, R7 => 7,
            Pc => 8, Sp => 9, Fp => 10, Flags => 11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Running,
    Blocked,
    Zombie,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryInfo {
    pub code_base: usize,
    pub data_base: usize,
    pub stack_base: usize,
    pub heap_base: usize,
    pub allocations: Vec<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessStats {
    pub ticks_scheduled: u64,
    pub context_switches: u64,
    pub faults: u64,
    pub syscalls: u64,
}

/// Full process control block, carried across context switches.
#[derive(Debug, Clone)]
pub struct Pcb {
    pub pid: u32,
    pub name: String,
    pub parent_pid: Option<u32>,
    pub children_pids: Vec<u32>,
    pub state: ProcessState,
    pub priority: Priority,
    pub security_level: SecurityLevel,
    pub registers: [TritWord; REGISTER_FILE_SIZE],
    pub memory_info: MemoryInfo,
    pub file_descriptors: HashMap<u32, String>,
    pub stats: ProcessStats,
    pub permissions: HashMap<String, bool>,
    pub pending_signals: Vec<u32>,
    pub signal_handlers: HashMap<u32, usize>,
    pub interrupt_mask: HashSet<u32>,
    pub resource_quotas: HashMap<String, u64>,
    pub environment: HashMap<String, String>,
    pub working_directory: String,
    pub umask: u32,
    pub argv: Vec<String>,
    pub envp: Vec<String>,
    pub capabilities: HashSet<String>,
}

impl Pcb {
    pub fn new(pid: u32, name: impl Into<String>, priority: Priority) -> Self {
        Pcb {
            pid,
            name: name.into(),
            parent_pid: None,
            children_pids: Vec::new(),
            state: ProcessState::Ready,
            priority,
            security_level: SecurityLevel::User,
            registers: std::array::from_fn(|_| TritWord::zero(REGISTER_WIDTH_TRITS)),
            memory_info: MemoryInfo::default(),
            file_descriptors: HashMap::new(),
            stats: ProcessStats::default(),
            permissions: HashMap::new(),
            pending_signals: Vec::new(),
            signal_handlers: HashMap::new(),
            interrupt_mask: HashSet::new(),
            resource_quotas: HashMap::new(),
            environment: HashMap::new(),
            working_directory: "/".to_string(),
            umask: 0,
            argv: Vec::new(),
            envp: Vec::new(),
            capabilities: HashSet::new(),
        }
    }

    pub fn register(&self, name: RegisterName) -> &TritWord {
        &self.registers[name.slot()]
    }

    pub fn set_register(&mut self, name: RegisterName, value: TritWord) {
        self.registers[name.slot()] = value;
    }

    pub fn pc(&self) -> usize {
        self.register(RegisterName::Pc).to_decimal().max(0) as usize
    }

    pub fn set_pc(&mut self, value: usize) {
        let width = self.register(RegisterName::Pc).len();
        self.set_register(RegisterName::Pc, TritWord::from_decimal(value as i64, width).unwrap_or_else(|_| TritWord::zero(width)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pcb_starts_ready_with_zeroed_registers() {
        let pcb = Pcb::new(1, "init", Priority::Normal);
        assert_eq!(pcb.state, ProcessState::Ready);
        assert!(pcb.register(RegisterName::R0).is_zero());
    }

    #[test]
    fn flags_register_is_not_addressable_by_index() {
        assert!((0..=10).all(|i| RegisterName::from_index(i).is_some()));
        assert!(RegisterName::from_index(11).is_none());
    }

    #[test]
    fn set_pc_roundtrips() {
        let mut pcb = Pcb::new(1, "init", Priority::Normal);
        pcb.set_pc(42);
        assert_eq!(pcb.pc(), 42);
    }
}
