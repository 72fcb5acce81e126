use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::unit::{BackupKind, Restorable};

#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    #[serde(default)]
    pub org: Option<String>,
    #[serde(default)]
    pub activation_key: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Credentials {
    /// Either an activation key with its organization, or a username with
    /// its password.
    pub fn is_complete(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        (present(&self.activation_key) && present(&self.org))
            || (present(&self.username) && present(&self.password))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |value: &Option<String>| value.as_ref().map(|_| "*****");
        f.debug_struct("Credentials")
            .field("org", &mask(&self.org))
            .field("activation_key", &mask(&self.activation_key))
            .field("username", &mask(&self.username))
            .field("password", &mask(&self.password))
            .finish()
    }
}

/// Subscription service the converted host registers with.
pub trait Registrar: Send + Sync {
    /// Register the host and return the exact invocation used.
    fn register(&self, credentials: &Credentials) -> Result<Vec<String>>;

    fn unregister(&self) -> Result<()>;

    fn is_registered(&self) -> Result<bool>;
}

/// Registration performed during conversion; restore unregisters the host
/// unless it was already registered before.
#[derive(Clone)]
pub struct RestorableRegistration {
    registrar: Arc<dyn Registrar>,
    registered_before: bool,
}

impl RestorableRegistration {
    pub fn capture(registrar: Arc<dyn Registrar>) -> Result<Self> {
        let registered_before = registrar
            .is_registered()
            .context("failed to query registration state")?;
        Ok(Self {
            registrar,
            registered_before,
        })
    }
}

impl fmt::Debug for RestorableRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestorableRegistration")
            .field("registered_before", &self.registered_before)
            .finish_non_exhaustive()
    }
}

impl Restorable for RestorableRegistration {
    fn kind(&self) -> BackupKind {
        BackupKind::Registration
    }

    fn describe(&self) -> String {
        "system registration".to_string()
    }

    fn restore(&mut self) -> Result<()> {
        if self.registered_before {
            info!("host was registered before conversion, leaving registration in place");
            return Ok(());
        }
        if !self
            .registrar
            .is_registered()
            .context("failed to query registration state")?
        {
            info!("host is not registered, nothing to undo");
            return Ok(());
        }
        self.registrar
            .unregister()
            .context("failed to unregister host")?;
        info!("host unregistered");
        Ok(())
    }
}
