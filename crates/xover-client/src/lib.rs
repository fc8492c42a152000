//! Native client for XOver online matches.
//!
//! [`host_match`] and [`join_match`] connect to the rendezvous server and spawn
//! the match loop, which drives negotiation and the game over a caller-supplied
//! [`PeerTransport`](xover_core::PeerTransport). The returned [`MatchHandle`]
//! sends moves and receives updates.

pub mod config;
pub mod error;
pub mod rendezvous;
pub mod session;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use rendezvous::RendezvousClient;
pub use session::{host_match, join_match, MatchCommand, MatchHandle, MatchUpdate};
