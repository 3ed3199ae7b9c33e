//! HTTP control surface for the reaction relay pipeline.
//!
//! Endpoints:
//! - POST /start-bot: start the pipeline if it is stopped
//! - POST /stop-bot: stop the running pipeline
//! - GET  /status: current lifecycle state
//! - GET  /health: liveness of this HTTP process

pub mod config;
pub mod routes;
pub mod state;
