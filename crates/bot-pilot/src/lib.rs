//! Bot Pilot - plays UCI chess engines on a matchmaking service and against
//! each other.
//!
//! # Modules
//!
//! - [`transport`] / [`uci_client`] - launching engines and speaking UCI to them
//! - [`remote`] / [`ndjson`] - the matchmaking service seam and its event streams
//! - [`intake`] - bounded challenge queue with accept/decline policy
//! - [`turn`] / [`session`] - per-game turn tracking and the game driver
//! - [`server`] - server mode tying intake and sessions together
//! - [`rules`] / [`game_runner`] / [`selfplay`] / [`elo`] - engine-vs-engine matches
//! - [`config`] - `pilot.toml` loading

pub mod config;
pub mod elo;
pub mod game_runner;
pub mod intake;
pub mod ndjson;
pub mod remote;
pub mod rules;
pub mod selfplay;
pub mod server;
pub mod session;
pub mod transport;
pub mod turn;
pub mod uci_client;

#[cfg(test)]
pub(crate) mod testing;
