//! Acquisition scheduling, shared telemetry and the dispatcher

pub mod acquisition;
pub mod app;
pub mod events;
pub mod scheduler;
pub mod state;
pub mod store;
