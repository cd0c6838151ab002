//! # Tug-of-War Client Library
//!
//! Headless client for the territory game server.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! - [`network::Connection`]: join a game, send commands, receive messages
//! - [`network::check_capacity`] and [`network::team_status`]: the one-shot
//!   queries a launcher makes before joining
//!
//! ### Game Module (`game`)
//! [`game::ClientGameState`] mirrors the board, holds, scores, rosters and
//! chat from server messages. The server is authoritative; nothing is
//! predicted locally.
//!
//! ### Bot Module (`bot`)
//! A simple automated player used for load and smoke testing.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::ClientGameState;
//! use client::network::Connection;
//! use shared::{Cell, ClientCommand, Team};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (mut conn, assignment) = Connection::join("127.0.0.1:12345", "alice", Team::A).await?;
//!     let mut state = ClientGameState::new();
//!     state.apply(&assignment);
//!
//!     let cell = Cell::new(4, 4).ok_or("bad cell")?;
//!     conn.send(&ClientCommand::HoldStart(cell)).await?;
//!     while !state.is_over() {
//!         state.apply(&conn.recv().await?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod game;
pub mod network;
