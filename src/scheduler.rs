//! Preemptive process scheduler.
//!
//! Grounded on `original_source/.../process/scheduler.py`'s
//! `TernaryScheduler`: a pid-keyed process table, a ready queue (or
//! per-priority ready queues under the priority/multilevel policies), a
//! blocked queue, at most one running process, and quantum-driven
//! preemption.

use std::collections::{HashMap, VecDeque};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::pcb::{Pcb, Priority, ProcessState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SchedulingPolicy {
    RoundRobin,
    Priority,
    Multilevel,
    ShortestJobFirst,
    FirstComeFirstServed,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SchedulerStats {
    pub context_switches: u64,
    pub processes_created: u64,
    pub processes_terminated: u64,
}

pub struct Scheduler {
    policy: SchedulingPolicy,
    processes: HashMap<u32, Pcb>,
    ready_queue: VecDeque<u32>,
    priority_queues: [VecDeque<u32>; 4],
    blocked_queue: VecDeque<u32>,
    running: Option<u32>,
    next_pid: u32,
    time_quantum: u32,
    current_quantum: u32,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new(policy: SchedulingPolicy, time_quantum: u32) -> Self {
        Scheduler {
            policy,
            processes: HashMap::new(),
            ready_queue: VecDeque::new(),
            priority_queues: Default::default(),
            blocked_queue: VecDeque::new(),
            running: None,
            next_pid: 1,
            time_quantum,
            current_quantum: 0,
            stats: SchedulerStats::default(),
        }
    }

    pub fn create_process(&mut self, name: impl Into<String>, priority: Priority) -> u32 {
        let pid = self.next_pid;
        self.next_pid += 1;
        let pcb = Pcb::new(pid, name, priority);
        self.processes.insert(pid, pcb);
        self.enqueue_ready(pid, priority);
        self.stats.processes_created += 1;
        pid
    }

    fn enqueue_ready(&mut self, pid: u32, priority: Priority) {
        match self.policy {
            SchedulingPolicy::Priority | SchedulingPolicy::Multilevel => {
                self.priority_queues[priority as usize].push_back(pid);
            }
            _ => self.ready_queue.push_back(pid),
        }
        if let Some(pcb) = self.processes.get_mut(&pid) {
            pcb.state = ProcessState::Ready;
        }
    }

    pub fn terminate_process(&mut self, pid: u32) {
        if self.running == Some(pid) {
            self.running = None;
            self.current_quantum = 0;
        }
        self.ready_queue.retain(|&p| p != pid);
        for q in &mut self.priority_queues {
            q.retain(|&p| p != pid);
        }
        self.blocked_queue.retain(|&p| p != pid);
        if let Some(pcb) = self.processes.get_mut(&pid) {
            pcb.state = ProcessState::Terminated;
        }
        self.stats.processes_terminated += 1;
    }

    pub fn block_process(&mut self, pid: u32) {
        if self.running == Some(pid) {
            self.running = None;
            self.current_quantum = 0;
        }
        if let Some(pcb) = self.processes.get_mut(&pid) {
            pcb.state = ProcessState::Blocked;
        }
        self.blocked_queue.push_back(pid);
    }

    pub fn unblock_process(&mut self, pid: u32) {
        self.blocked_queue.retain(|&p| p != pid);
        let priority = self.processes.get(&pid).map(|p| p.priority).unwrap_or(Priority::Normal);
        self.enqueue_ready(pid, priority);
    }

    /// Selects the next process to run according to the active policy.
    /// Returns `None` when nothing is runnable.
    pub fn schedule(&mut self) -> Option<u32> {
        if let Some(running) = self.running {
            return Some(running);
        }
        let next = match self.policy {
            SchedulingPolicy::RoundRobin | SchedulingPolicy::FirstComeFirstServed => self.ready_queue.pop_front(),
            SchedulingPolicy::Priority | SchedulingPolicy::Multilevel => {
                (0..4).rev().find_map(|p| self.priority_queues[p].pop_front())
            }
            SchedulingPolicy::ShortestJobFirst => self.pop_shortest_job(),
        }?;
        if let Some(pcb) = self.processes.get_mut(&next) {
            pcb.state = ProcessState::Running;
            pcb.stats.context_switches += 1;
        }
        self.running = Some(next);
        self.current_quantum = 0;
        self.stats.context_switches += 1;
        Some(next)
    }

    fn pop_shortest_job(&mut self) -> Option<u32> {
        let shortest = self
            .ready_queue
            .iter()
            .copied()
            .min_by_key(|pid| self.processes.get(pid).map(|p| p.priority).unwrap_or(Priority::Normal))?;
        self.ready_queue.retain(|&p| p != shortest);
        Some(shortest)
    }

    /// Advance the scheduler by one tick. When the running process's
    /// quantum expires, it is preempted back to the ready queue.
    /// Returns `true` if a preemption occurred this tick.
    pub fn tick(&mut self) -> bool {
        let Some(pid) = self.running else { return false };
        if let Some(pcb) = self.processes.get_mut(&pid) {
            pcb.stats.ticks_scheduled += 1;
        }
        self.current_quantum += 1;
        if self.current_quantum >= self.time_quantum {
            self.running = None;
            self.current_quantum = 0;
            let priority = self.processes.get(&pid).map(|p| p.priority).unwrap_or(Priority::Normal);
            self.enqueue_ready(pid, priority);
            true
        } else {
            false
        }
    }

    pub fn running_pid(&self) -> Option<u32> {
        self.running
    }

    pub fn process(&self, pid: u32) -> Option<&Pcb> {
        self.processes.get(&pid)
    }

    pub fn process_mut(&mut self, pid: u32) -> Option<&mut Pcb> {
        self.processes.get_mut(&pid)
    }

    pub fn ready_count(&self) -> usize {
        self.ready_queue.len() + self.priority_queues.iter().map(|q| q.len()).sum::<usize>()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}
