//! Fargate task CPU/memory validation
//!
//! Sizing is checked once, against enumerated allowed values, wherever it
//! enters the tool (environment for deploy, flags for update-service).

use std::fmt;
use thiserror::Error;

/// Allowed task CPU units
pub const VALID_CPU: &[u32] = &[256, 512, 1024, 2048, 4096];

/// Allowed task memory values in MiB
pub const VALID_MEMORY: &[u32] = &[512, 1024, 2048, 4096, 8192];

/// Task sizing validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskSizeError {
    #[error("invalid CPU value '{0}', expected one of: 256, 512, 1024, 2048, 4096")]
    InvalidCpu(String),

    #[error("invalid memory value '{0}', expected one of: 512, 1024, 2048, 4096, 8192")]
    InvalidMemory(String),
}

/// Validated task-level CPU and memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskSize {
    cpu: u32,
    memory: u32,
}

impl TaskSize {
    /// Validate CPU units and memory MiB given as the strings ECS uses.
    pub fn new(cpu: &str, memory: &str) -> Result<Self, TaskSizeError> {
        let cpu = parse_member(cpu, VALID_CPU)
            .ok_or_else(|| TaskSizeError::InvalidCpu(cpu.to_string()))?;
        let memory = parse_member(memory, VALID_MEMORY)
            .ok_or_else(|| TaskSizeError::InvalidMemory(memory.to_string()))?;
        Ok(Self { cpu, memory })
    }

    pub fn cpu(&self) -> u32 {
        self.cpu
    }

    pub fn memory(&self) -> u32 {
        self.memory
    }

    /// CPU as the string ECS expects in task definitions
    pub fn cpu_str(&self) -> String {
        self.cpu.to_string()
    }

    /// Memory as the string ECS expects in task definitions
    pub fn memory_str(&self) -> String {
        self.memory.to_string()
    }

    /// Whether a described task definition's sizing matches this one.
    ///
    /// ECS reports sizing as optional strings; a missing value is treated as "0".
    pub fn matches(&self, cpu: Option<&str>, memory: Option<&str>) -> bool {
        cpu.unwrap_or("0") == self.cpu_str() && memory.unwrap_or("0") == self.memory_str()
    }
}

impl fmt::Display for TaskSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} CPU / {} MiB", self.cpu, self.memory)
    }
}

fn parse_member(value: &str, allowed: &[u32]) -> Option<u32> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok().filter(|v| allowed.contains(v))
}
