//! Builds the frontend bundles of Kolibri plugins.
//!
//! Bundles are resolved from the plugin manifest, then handed to the
//! [`orchestrator`], which either builds them serially in this process or
//! fans them out to worker processes. Each job drives the external bundler
//! through a [`runner::JobRunner`].
pub mod clean;
pub mod compress;
pub mod config;
pub mod exec;
pub mod orchestrator;
pub mod resolver;
pub mod runner;
pub mod stats_server;
pub mod watch;

pub use kolibri_build_core::*;
