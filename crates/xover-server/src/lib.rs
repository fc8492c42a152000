//! XOver rendezvous service.
//!
//! Peers exchange offers, answers and ICE candidates through short-lived
//! records keyed by session code. Records expire five minutes after creation.

pub mod config;
pub mod protocol;
pub mod server;
pub mod store;

pub use config::ServerConfig;
pub use server::{run_server, serve, spawn_sweeper, ServerState};
pub use store::{Clock, RendezvousStore, StoreError, SystemClock};
