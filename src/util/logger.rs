//! This module is for logging-related utilities.  The `log` crate writes log
//! messages to registered implementations; by default this crate ships an
//! `env_logger` behind the "builtin_env_logger" feature, and the embedder can
//! disable that feature and register its own.

use log::SetLoggerError;

/// Attempt to init a env_logger for XGC.
/// Does nothing if the "builtin_env_logger" feature is disabled.
pub fn try_init() -> Result<(), SetLoggerError> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "builtin_env_logger")] {
            env_logger::try_init_from_env(
                // By default, use info level logging.
                env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
            )
        } else {
            Ok(())
        }
    }
}
