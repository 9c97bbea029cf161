//! Error surface for the whole crate.
//!
//! [`T3Error`] is the single error type returned from fallible core
//! operations. [`FaultKind`] classifies a `T3Error` for the propagation
//! policy described in the scheduler/host contract: architectural faults
//! terminate the owning process, resource exhaustion surfaces as a plain
//! `Result`/`Option` to the caller, and host-bug errors are not supposed
//! to happen inside a correctly driven VM.

use thiserror::Error;

/// Errors raised by the ternary virtual machine and its subsystems.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum T3Error {
    #[error("invalid trit value: {value}")]
    InvalidTrit { value: i32 },

    #[error("invalid instruction: {reason}")]
    InvalidInstruction { reason: String },

    #[error("unknown opcode {opcode} at pc={pc}")]
    UnknownOpcode { opcode: i64, pc: Option<usize> },

    #[error("address {address} out of range (memory size {size})")]
    AddressOutOfRange { address: usize, size: usize },

    #[error("page fault at virtual address {vaddr}")]
    PageFault { vaddr: usize },

    #[error("protection violation at address {address}: {reason}")]
    ProtectionViolation { address: usize, reason: String },

    #[error("division by zero at pc={pc:?}")]
    DivisionByZero { pc: Option<usize> },

    #[error("allocation failed: requested {requested} pages, {available} available")]
    AllocationFailed { requested: usize, available: usize },

    #[error("stack overflow at pc={pc:?}")]
    StackOverflow { pc: Option<usize> },

    #[error("stack underflow at pc={pc:?}")]
    StackUnderflow { pc: Option<usize> },
}

impl T3Error {
    /// PC at which the fault occurred, when one is known.
    pub fn pc(&self) -> Option<usize> {
        match self {
            T3Error::UnknownOpcode { pc, .. } => *pc,
            T3Error::DivisionByZero { pc } => *pc,
            T3Error::StackOverflow { pc } => *pc,
            T3Error::StackUnderflow { pc } => *pc,
            _ => None,
        }
    }

    /// Classification used to decide propagation policy.
    pub fn kind(&self) -> FaultKind {
        match self {
            T3Error::InvalidTrit { .. } => FaultKind::HostBug,
            T3Error::InvalidInstruction { .. } => FaultKind::Architectural,
            T3Error::UnknownOpcode { .. } => FaultKind::Architectural,
            T3Error::AddressOutOfRange { .. } => FaultKind::HostBug,
            T3Error::PageFault { .. } => FaultKind::Architectural,
            T3Error::ProtectionViolation { .. } => FaultKind::Architectural,
            T3Error::DivisionByZero { .. } => FaultKind::Architectural,
            T3Error::AllocationFailed { .. } => FaultKind::Resource,
            T3Error::StackOverflow { .. } => FaultKind::Architectural,
            T3Error::StackUnderflow { .. } => FaultKind::Architectural,
        }
    }
}

/// Propagation class for a [`T3Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Raised by the running process's own instruction stream; the
    /// scheduler terminates the owning process unless a trap handler
    /// intervenes.
    Architectural,
    /// Exhaustion of a finite resource (memory, quota); surfaces as a
    /// plain `Result`/`Option` to the direct caller and never tears down
    /// the VM.
    Resource,
    /// A core invariant was violated by the host driving the VM
    /// incorrectly; these are not expected to occur and are allowed to
    /// `panic!` where caught.
    HostBug,
}
