//! Step definitions for board behaviour scenarios.

pub mod then;
pub mod world;
