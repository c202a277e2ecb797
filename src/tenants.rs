//! Tenant credential store
//!
//! Multiple named tenants (API key + base URL) may be configured, with exactly one
//! marked active at a time. The store persists to a local JSON file written with
//! owner-only permissions, and assumes single-writer access: every mutation is a
//! read-modify-write of the whole file.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Credentials and endpoint for one tenant
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Static bearer token used for every API call
    pub api_key: String,
    /// Base URL of the tenant's API, e.g. "https://api.eu.example.com"
    pub base_url: String,
    /// Free-form operator note
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    active_tenant: Option<String>,
    // BTreeMap keeps the on-disk ordering stable across rewrites
    tenants: BTreeMap<String, Tenant>,
}

/// File-backed tenant store
#[derive(Debug)]
pub struct TenantStore {
    path: PathBuf,
}

impl TenantStore {
    /// Open a store at the given path, creating an empty one if the file is absent
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { path: path.into() };
        if !store.path.exists() {
            debug!(path = ?store.path, "creating empty tenant store");
            store.save(&StoreFile {
                active_tenant: None,
                tenants: BTreeMap::new(),
            })?;
        }
        Ok(store)
    }

    fn load(&self) -> Result<StoreFile> {
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, data: &StoreFile) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(data)?)?;
        restrict_permissions(&self.path)?;
        Ok(())
    }

    /// The active tenant, if one is configured
    pub fn active(&self) -> Result<Option<(String, Tenant)>> {
        let data = self.load()?;
        let Some(name) = data.active_tenant else {
            return Ok(None);
        };
        Ok(data.tenants.get(&name).cloned().map(|t| (name, t)))
    }

    /// All configured tenants, keyed by name
    pub fn all(&self) -> Result<BTreeMap<String, Tenant>> {
        Ok(self.load()?.tenants)
    }

    /// Add or update a tenant. The first tenant ever added becomes active.
    pub fn upsert(&self, name: &str, tenant: Tenant) -> Result<()> {
        let mut data = self.load()?;
        data.tenants.insert(name.to_string(), tenant);
        if data.tenants.len() == 1 {
            data.active_tenant = Some(name.to_string());
        }
        self.save(&data)?;
        info!(tenant = name, "tenant saved");
        Ok(())
    }

    /// Remove a tenant by name; returns false if it did not exist.
    ///
    /// Removing the active tenant promotes an arbitrary remaining tenant, or clears
    /// the active slot when none remain.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let mut data = self.load()?;
        if data.tenants.remove(name).is_none() {
            return Ok(false);
        }
        if data.active_tenant.as_deref() == Some(name) {
            data.active_tenant = data.tenants.keys().next().cloned();
        }
        self.save(&data)?;
        info!(tenant = name, "tenant removed");
        Ok(true)
    }

    /// Mark an existing tenant active; returns false if it does not exist
    pub fn set_active(&self, name: &str) -> Result<bool> {
        let mut data = self.load()?;
        if !data.tenants.contains_key(name) {
            return Ok(false);
        }
        data.active_tenant = Some(name.to_string());
        self.save(&data)?;
        info!(tenant = name, "active tenant switched");
        Ok(true)
    }

    /// Active tenant or a configuration error naming the store file
    pub fn require_active(&self) -> Result<Tenant> {
        self.active()?.map(|(_, t)| t).ok_or_else(|| Error::Config {
            message: format!("no active tenant configured in {}", self.path.display()),
            key: Some("active_tenant".to_string()),
        })
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    // No POSIX mode bits; rely on per-user profile directories.
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tenant(url: &str) -> Tenant {
        Tenant {
            api_key: "key".to_string(),
            base_url: url.to_string(),
            note: String::new(),
        }
    }

    #[test]
    fn first_tenant_becomes_active() {
        let dir = TempDir::new().unwrap();
        let store = TenantStore::open(dir.path().join("tenants.json")).unwrap();
        assert!(store.active().unwrap().is_none());

        store.upsert("prod", tenant("https://api.one")).unwrap();
        let (name, t) = store.active().unwrap().unwrap();
        assert_eq!(name, "prod");
        assert_eq!(t.base_url, "https://api.one");

        // A second tenant does not steal the active slot
        store.upsert("staging", tenant("https://api.two")).unwrap();
        assert_eq!(store.active().unwrap().unwrap().0, "prod");
    }

    #[test]
    fn removing_active_promotes_remaining() {
        let dir = TempDir::new().unwrap();
        let store = TenantStore::open(dir.path().join("tenants.json")).unwrap();
        store.upsert("a", tenant("https://a")).unwrap();
        store.upsert("b", tenant("https://b")).unwrap();

        assert!(store.remove("a").unwrap());
        assert_eq!(store.active().unwrap().unwrap().0, "b");

        assert!(store.remove("b").unwrap());
        assert!(store.active().unwrap().is_none());
        assert!(!store.remove("b").unwrap());
    }

    #[test]
    fn set_active_requires_existing_tenant() {
        let dir = TempDir::new().unwrap();
        let store = TenantStore::open(dir.path().join("tenants.json")).unwrap();
        store.upsert("a", tenant("https://a")).unwrap();
        store.upsert("b", tenant("https://b")).unwrap();

        assert!(store.set_active("b").unwrap());
        assert_eq!(store.active().unwrap().unwrap().0, "b");
        assert!(!store.set_active("nope").unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn store_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tenants.json");
        let store = TenantStore::open(&path).unwrap();
        store.upsert("a", tenant("https://a")).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn require_active_errors_when_unconfigured() {
        let dir = TempDir::new().unwrap();
        let store = TenantStore::open(dir.path().join("tenants.json")).unwrap();
        assert!(matches!(
            store.require_active(),
            Err(crate::error::Error::Config { .. })
        ));
    }
}
