//! Network layer: the broker transport seam, its WebSocket/STOMP
//! implementation, and the REST helpers for history and health.

pub mod api;
pub mod transport;
pub mod ws;
