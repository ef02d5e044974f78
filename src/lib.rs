//! Taskboard: user stories, sub-tasks, and sprints for agile project boards.
//!
//! The crate keeps a user story's status consistent with its sub-tasks and
//! applies the carry-over rules when a sprint ends.
//!
//! # Architecture
//!
//! Taskboard follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, files, memory)
//!
//! # Modules
//!
//! - [`board`]: Task hierarchy, status propagation, and sprint lifecycle
//! - [`config`]: Defaults and limits applied by board services
//! - [`telemetry`]: Tracing subscriber setup for binaries

pub mod board;
pub mod config;
pub mod telemetry;
