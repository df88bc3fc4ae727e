//! Tournament server.
//!
//! Runs a [`tourney::TournamentController`] against a remote game server and
//! exposes read-only snapshots plus operator commands over HTTP.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod runner;
