//! Memory protection: per-address access levels gated by caller security.
//!
//! Grounded on `original_source/.../memory/memory_protection.py`'s
//! `TernaryMemoryProtection`: a protection map keyed by address range, a
//! bounded violation log, and access counters.

use std::collections::HashMap;

use crate::error::T3Error;

const VIOLATION_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    User,
    Kernel,
    Supervisor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionLevel {
    NoAccess,
    ReadOnly,
    ReadWrite,
    Execute,
    ReadWriteExecute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
    Execute,
}

impl ProtectionLevel {
    fn permits(self, kind: AccessKind) -> bool {
        use AccessKind::*;
        use ProtectionLevel::*;
        match (self, kind) {
            (NoAccess, _) => false,
            (ReadOnly, Read) => true,
            (ReadOnly, _) => false,
            (ReadWrite, Read) | (ReadWrite, Write) => true,
            (ReadWrite, Execute) => false,
            (Execute, Execute) => true,
            (Execute, _) => false,
            (ReadWriteExecute, _) => true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    start: usize,
    end: usize,
    level: ProtectionLevel,
    required: SecurityLevel,
}

#[derive(Debug, Clone)]
pub struct Violation {
    pub address: usize,
    pub kind: AccessKind,
    pub caller: SecurityLevel,
    pub reason: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProtectionStats {
    pub accesses: u64,
    pub violations: u64,
}

pub struct MemoryProtection {
    entries: HashMap<usize, Entry>,
    next_id: usize,
    violations: Vec<Violation>,
    stats: ProtectionStats,
}

impl MemoryProtection {
    pub fn new() -> Self {
        MemoryProtection {
            entries: HashMap::new(),
            next_id: 0,
            violations: Vec::new(),
            stats: ProtectionStats::default(),
        }
    }

    pub fn set_protection(&mut self, start: usize, end: usize, level: ProtectionLevel, required: SecurityLevel) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, Entry { start, end, level, required });
        id
    }

    pub fn remove_protection(&mut self, id: usize) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Checks whether `caller` may perform `kind` access at `address`.
    /// Logs the outcome (bounded to the last 1000 violations) and
    /// returns `ProtectionViolation` on denial. An address with no
    /// matching entry is treated as unprotected and always permitted.
    pub fn check_access(&mut self, address: usize, kind: AccessKind, caller: SecurityLevel) -> Result<(), T3Error> {
        self.stats.accesses += 1;
        let matching = self.entries.values().find(|e| address >= e.start && address < e.end);
        let Some(entry) = matching else {
            return Ok(());
        };
        if caller < entry.required {
            let reason = format!("requires security level {:?}, caller has {:?}", entry.required, caller);
            self.record_violation(address, kind, caller, reason.clone());
            return Err(T3Error::ProtectionViolation { address, reason });
        }
        if !entry.level.permits(kind) {
            let reason = format!("{:?} access denied by protection level {:?}", kind, entry.level);
            self.record_violation(address, kind, caller, reason.clone());
            return Err(T3Error::ProtectionViolation { address, reason });
        }
        Ok(())
    }

    fn record_violation(&mut self, address: usize, kind: AccessKind, caller: SecurityLevel, reason: String) {
        self.stats.violations += 1;
        if self.violations.len() >= VIOLATION_LOG_CAPACITY {
            self.violations.remove(0);
        }
        self.violations.push(Violation { address, kind, caller, reason });
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn stats(&self) -> ProtectionStats {
        self.stats
    }
}

impl Default for MemoryProtection {
    fn default() -> Self {
        Self::new()
    }
}
