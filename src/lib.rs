//! A balanced-ternary computing platform: decoder/ALU, segmented paged
//! memory with a buddy allocator and mark-and-sweep garbage collector,
//! and a preemptive process scheduler.
//!
//! There is no hidden global singleton; every piece of state lives in a
//! [`tvm::Tvm`] value a host constructs, drives via `step`/`run`, and
//! owns for as long as it needs it.

pub mod alu;
pub mod buddy;
pub mod config;
pub mod devices;
pub mod error;
pub mod gc;
pub mod instruction;
pub mod loader;
pub mod memory;
pub mod mmu;
pub mod paging;
pub mod pcb;
pub mod protection;
pub mod scheduler;
pub mod trit;
pub mod tvm;

pub use config::VmConfig;
pub use error::T3Error;
pub use tvm::{StepOutcome, Tvm};
