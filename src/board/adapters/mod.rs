//! Adapter implementations for board ports.

pub mod document;
pub mod memory;
pub mod postgres;
