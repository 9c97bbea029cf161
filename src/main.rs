use std::fs;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use t3vm::config::VmConfig;
use t3vm::instruction::Instruction;
use t3vm::loader;
use t3vm::pcb::Priority;
use t3vm::protection::SecurityLevel;
use t3vm::tvm::{StepOutcome, Tvm};

#[derive(Parser)]
#[command(name = "t3vmctl", about = "Host harness for the ternary virtual machine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a program image and run it for a bounded number of steps.
    Run {
        program: String,
        #[arg(long, default_value_t = 10_000)]
        max_instructions: u64,
        #[arg(long)]
        breakpoint: Vec<usize>,
        #[arg(long, value_enum, default_value_t = Policy::RoundRobin)]
        policy: Policy,
    },
    /// Print the disassembly of a program image without executing it.
    Disasm { program: String },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Policy {
    RoundRobin,
    Priority,
    Multilevel,
    Sjf,
    Fcfs,
}

impl From<Policy> for t3vm::scheduler::SchedulingPolicy {
    fn from(p: Policy) -> Self {
        use t3vm::scheduler::SchedulingPolicy::*;
        match p {
            Policy::RoundRobin => RoundRobin,
            Policy::Priority => Priority,
            Policy::Multilevel => Multilevel,
            Policy::Sjf => ShortestJobFirst,
            Policy::Fcfs => FirstComeFirstServed,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { program, max_instructions, breakpoint, policy } => run(&program, max_instructions, breakpoint, policy),
        Command::Disasm { program } => disasm(&program),
    }
}

fn run(program: &str, max_instructions: u64, breakpoints: Vec<usize>, policy: Policy) -> Result<()> {
    let source = fs::read_to_string(program).with_context(|| format!("reading program {program}"))?;
    let mut config = VmConfig::default();
    config.policy = policy.into();
    let mut vm = Tvm::new(config);
    loader::load_program(&mut vm.mmu, &source, SecurityLevel::Kernel).context("loading program image")?;
    vm.spawn_process("main", Priority::Normal, 0);
    for addr in breakpoints {
        vm.set_breakpoint(addr);
    }

    let outcome = vm.run(max_instructions).context("running program")?;
    match outcome {
        StepOutcome::Halted => println!("halted"),
        StepOutcome::HitBreakpoint(addr) => println!("hit breakpoint at {addr}"),
        StepOutcome::NoRunnableProcess => println!("no runnable process"),
        StepOutcome::Continued => println!("stopped after {max_instructions} instructions"),
    }
    for item in vm.io.drain_output() {
        match item {
            t3vm::devices::OutputItem::Word(w) => println!("{w}"),
            t3vm::devices::OutputItem::Text(s) => println!("{s}"),
        }
    }
    Ok(())
}

fn disasm(program: &str) -> Result<()> {
    let source = fs::read_to_string(program).with_context(|| format!("reading program {program}"))?;
    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let word = loader::parse_line(trimmed)?;
        let instr = Instruction::decode(&word)?;
        println!("{}", instr.disassemble());
    }
    Ok(())
}
