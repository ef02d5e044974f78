//! Project board: user stories, tasks, and sprints.
//!
//! Keeps a user story's status consistent with its sub-tasks and returns
//! unfinished work to the backlog when a sprint ends. The module follows
//! hexagonal architecture:
//!
//! - Domain types and the status engine in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
