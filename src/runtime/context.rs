//! Process-scoped runtime initialization.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::category::ErrorCategory;
use super::security::SecurityProfile;
use crate::backend::Platform;
use crate::types::{Config, Error, Result};

/// Token for "runtime initialized with security profile X".
///
/// Created once by its owner and handed to every connection. Tearing down
/// happens exactly once, on [`ProcessContext::release`] or on drop,
/// whichever comes first. Connections keep the context alive through an
/// `Arc`, so the runtime outlives every handle obtained from it.
pub struct ProcessContext {
    platform: Arc<dyn Platform>,
    profile: SecurityProfile,
    errors: ErrorCategory,
    released: AtomicBool,
}

impl ProcessContext {
    /// Initialize the runtime, then apply the default security profile.
    ///
    /// If the profile cannot be applied the runtime is torn down again
    /// before the error is returned.
    pub fn acquire(platform: Arc<dyn Platform>, profile: &SecurityProfile) -> Result<Arc<Self>> {
        platform
            .initialize()
            .map_err(|code| Error::initialization("initialize runtime", code))?;

        if let Err(code) = platform.initialize_security(profile) {
            tracing::warn!(%code, "security profile rejected, rolling back runtime init");
            platform.uninitialize();
            return Err(Error::initialization("initialize security", code));
        }

        tracing::debug!(
            authentication = ?profile.authentication_level,
            impersonation = ?profile.impersonation_level,
            "runtime initialized"
        );

        Ok(Arc::new(Self {
            errors: ErrorCategory::new(Arc::clone(&platform)),
            platform,
            profile: profile.clone(),
            released: AtomicBool::new(false),
        }))
    }

    /// [`ProcessContext::acquire`] with the profile from `config.security`.
    pub fn acquire_with(platform: Arc<dyn Platform>, config: &Config) -> Result<Arc<Self>> {
        Self::acquire(platform, &config.security)
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub fn profile(&self) -> &SecurityProfile {
        &self.profile
    }

    pub fn errors(&self) -> &ErrorCategory {
        &self.errors
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Tear the runtime down. Later calls (and the drop) do nothing.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.platform.uninitialize();
        tracing::debug!("runtime released");
    }

    pub(crate) fn ensure_live(&self, operation: &str) -> Result<()> {
        if self.is_released() {
            return Err(Error::initialization(
                format!("{operation}: runtime already released"),
                crate::types::StatusCode::UNEXPECTED,
            ));
        }
        Ok(())
    }
}

impl Drop for ProcessContext {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessContext")
            .field("profile", &self.profile)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}
