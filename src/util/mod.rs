//! Ambient utilities: logging bootstrap and environment-driven options.

pub mod logger;
pub mod options;
