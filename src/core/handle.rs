//! Cloneable entry point for code that should not own the engine
//!
//! A [`LogHandle`] can be created before the engine exists and handed to
//! the components that log; the host installs the engine later. Until then
//! every write fails with [`LoggerError::NotInitialized`] instead of
//! silently logging nowhere.
//!
//! # Example
//!
//! ```
//! use logflow::prelude::*;
//!
//! let handle = LogHandle::uninitialized();
//! assert!(matches!(
//!     handle.write(LogLevel::Info, "too early"),
//!     Err(LoggerError::NotInitialized)
//! ));
//!
//! handle.install(LoggerConfig::default()).unwrap();
//! assert!(handle.is_ready());
//! handle.write(LogLevel::Info, "ready").unwrap();
//! ```

use super::{
    config::LoggerConfig,
    context::{self, ScopeGuard},
    engine::LoggerEngine,
    error::{LoggerError, Result},
    log_context::FieldValue,
    log_level::LogLevel,
};
use std::error::Error as StdError;
use std::sync::{Arc, OnceLock};

#[derive(Clone, Default)]
pub struct LogHandle {
    engine: Arc<OnceLock<LoggerEngine>>,
}

impl LogHandle {
    /// Handle with no engine yet; see [`install`](Self::install)
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// Build an engine from `config` and wrap it
    pub fn init(config: LoggerConfig) -> Result<Self> {
        Ok(Self::from_engine(LoggerEngine::new(config)?))
    }

    pub fn from_engine(engine: LoggerEngine) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(engine);
        Self {
            engine: Arc::new(cell),
        }
    }

    /// Build and install the engine for this handle and all its clones
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or an engine is already
    /// installed; the existing engine is left untouched.
    pub fn install(&self, config: LoggerConfig) -> Result<()> {
        if self.is_ready() {
            return Err(Self::already_installed());
        }
        self.engine
            .set(LoggerEngine::new(config)?)
            .map_err(|_| Self::already_installed())
    }

    pub fn is_ready(&self) -> bool {
        self.engine.get().is_some()
    }

    pub fn engine(&self) -> Result<&LoggerEngine> {
        self.engine.get().ok_or(LoggerError::NotInitialized)
    }

    pub fn write(&self, level: LogLevel, message: impl Into<String>) -> Result<()> {
        self.engine()?.log(level, message);
        Ok(())
    }

    pub async fn write_async(&self, level: LogLevel, message: impl Into<String>) -> Result<()> {
        self.engine()?.log_async(level, message).await;
        Ok(())
    }

    pub fn write_error<E>(&self, level: LogLevel, error: &E, message: impl Into<String>) -> Result<()>
    where
        E: StdError + ?Sized,
    {
        self.engine()?.log_error_at(level, error, message);
        Ok(())
    }

    pub async fn write_error_async<E>(
        &self,
        level: LogLevel,
        error: &E,
        message: impl Into<String>,
    ) -> Result<()>
    where
        E: StdError + ?Sized,
    {
        self.engine()?
            .log_error_at_async(level, error, message)
            .await;
        Ok(())
    }

    /// Context scopes live with the current task, so this works before the
    /// engine is installed.
    pub fn begin_scope<K, V>(&self, key: K, value: V) -> ScopeGuard
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        context::push(key, value)
    }

    pub fn clear_context(&self) {
        context::clear();
    }

    fn already_installed() -> LoggerError {
        LoggerError::config("LogHandle", "an engine is already installed")
    }
}

impl std::fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogHandle")
            .field("engine", &self.engine.get())
            .finish()
    }
}
