//! Core library for a multi-provider LLM orchestrator: a health-tracked
//! pool of API endpoints, a Manager that decomposes goals and compiles
//! results, role-specialized Workers that execute subtasks (with peer
//! review and self-correction), and an Orchestrator tying it together.
//!
//! Grounded in `gator`'s workspace split between a pure-`core`
//! library crate and a thin CLI crate: this crate has no I/O of its own
//! beyond what callers inject through [`provider::LlmProvider`],
//! [`worker::tool::Tool`], and [`memory::MemorySink`] implementations.

pub mod endpoint;
pub mod error;
pub mod manager;
pub mod memory;
pub mod orchestrator;
pub mod pool;
pub mod provider;
pub mod state;
pub mod task;
pub mod worker;

pub use endpoint::{Endpoint, EndpointStatus};
pub use orchestrator::{Orchestrator, OrchestratorConfig, WorkerInfo};
pub use pool::{ApiPool, PoolConfig};
pub use provider::{GenerateParams, GenerateResponse, LlmProvider, Provider, ProviderRegistry};
pub use task::{Subtask, SubtaskStatus, Task, WorkerRole};
pub use worker::{ExecutionMode, Worker};
