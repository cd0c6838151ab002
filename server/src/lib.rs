//! # Tug-of-War Territory Server
//!
//! Authoritative server for a two-team territory game on a 10×10 grid.
//! Players press and hold cells; a cell held by exactly one team for the
//! claim dwell becomes that team's, and a contested cell goes to whichever
//! team is still holding when the other lets go. The first team with ten
//! owned cells in a line wins the round.
//!
//! ## Architecture
//!
//! ### Single Coordinator
//! All game state lives in one [`game::GameState`] owned by a single
//! coordinator task. Connection workers, claim timers and queries talk to it
//! through one ordered command queue, so every state change and the
//! broadcasts it causes happen as one step and all clients see the same
//! order of events.
//!
//! ### Worker Per Connection
//! Each TCP connection gets its own task (bounded by a worker pool). The
//! worker turns inbound frames into commands and writes the session's
//! outbound queue back to the socket.
//!
//! ### Deferred Claims
//! Claim timers are tokio tasks that post back into the command queue. Each
//! carries an id, so a timer cancelled after it already fired is ignored.
//!
//! ## Module Organization
//!
//! - `board`: cell ownership, per-cell hold counts and the tug-of-war rules
//! - `scheduler`: claim timers
//! - `win`: longest-run scoring and round-end detection
//! - `registry`: sessions, team rosters and capacity limits
//! - `broadcast`: fan-out to session outboxes
//! - `game`: the coordinator's state and command handling
//! - `session`: the per-connection worker
//! - `network`: listener, worker pool and configuration
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod broadcast;
pub mod game;
pub mod network;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod win;
