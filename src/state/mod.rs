//! Client-side state owned by the event loop.
//!
//! SYSTEM CONTEXT
//! ==============
//! `session` is the connection manager's private lifecycle record,
//! `surface` is the presentation state every view projects, and
//! `reconnect`/`typing` are the two timer-driven state machines.

pub mod reconnect;
pub mod session;
pub mod surface;
pub mod typing;
