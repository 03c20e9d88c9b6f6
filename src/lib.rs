//! Chat room client over STOMP/WebSocket.
//!
//! SYSTEM CONTEXT
//! ==============
//! The client joins a shared broker topic under a validated username, shows
//! live and historical messages for one of three fixed rooms, tracks who is
//! online from join/leave notices, and reconnects on failure with a fixed
//! delay and a capped number of attempts. The backend (broker plus REST
//! history endpoint) is an external collaborator.
//!
//! `app::ChatApp` wires `connection::ConnectionManager` and
//! `pipeline::MessagePipeline` around one `state::surface::SurfaceHandle`
//! and runs the event loop. `terminal` is the bundled text front end.

pub mod app;
pub mod config;
pub mod connection;
pub mod error;
pub mod models;
pub mod net;
pub mod pipeline;
pub mod state;
pub mod terminal;
pub mod timer;

#[cfg(test)]
mod test_helpers;
