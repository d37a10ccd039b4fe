//! POLLX - polling and social voting backend
//!
//! Users publish polls, vote once per poll, comment, and receive
//! notifications. Vote tallies are pushed live to subscribed clients.
//!
//! ## Components
//!
//! - **Ledger**: one vote per (user, poll), atomic tallies
//! - **Notify**: event fan-out to notifications and live topics
//! - **Aggregate**: badges on profile touch, collective mood on a timer
//! - **Evaluator**: external text evaluation for candidate and mood analysis
//! - **Store**: MongoDB and in-memory storage behind one set of traits

pub mod aggregate;
pub mod auth;
pub mod config;
pub mod db;
pub mod evaluator;
pub mod ledger;
pub mod live;
pub mod notify;
pub mod routes;
pub mod server;
pub mod services;
pub mod store;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{PollxError, Result};
