//! Shared types for the ServiceLine conversation core.
//!
//! Everything here is plain data: the session record carried through a
//! call, the state vertex enum, the action record returned by the state
//! machine, tool names and result shapes, configuration, errors, and
//! structured trace events. Behavior lives in the downstream crates.

pub mod action;
pub mod config;
pub mod error;
pub mod session;
pub mod state;
pub mod tool;
pub mod trace;
