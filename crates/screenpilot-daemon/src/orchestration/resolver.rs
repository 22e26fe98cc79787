//! Resolves informal application references against the installed set.
//!
//! A reference may be a display name, a package identifier, or a full
//! registry listing (`"Name (package.id)"`). Matching is case-insensitive and
//! tries package identifier, then display name, then the raw listing.
//! Nothing is cached: every [`AppResolver::snapshot`] queries the registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::executor::{AppRegistry, RegistryError};

/// One installed application, parsed from a registry listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledApp {
    pub display_name: String,
    pub package_id: Option<String>,
    pub raw_listing: String,
}

impl InstalledApp {
    /// Parse a listing entry. Returns `None` for a blank entry.
    ///
    /// An entry ending in a parenthetical is split at its last `(` into
    /// name and package, provided both parts are non-empty; anything else
    /// is taken whole as the display name.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Some(inner) = raw.strip_suffix(')')
            && let Some(open) = inner.rfind('(')
        {
            let name = inner[..open].trim();
            let package = inner[open + 1..].trim();
            if !name.is_empty() && !package.is_empty() {
                return Some(Self {
                    display_name: name.to_string(),
                    package_id: Some(package.to_string()),
                    raw_listing: raw.to_string(),
                });
            }
        }

        Some(Self {
            display_name: raw.to_string(),
            package_id: None,
            raw_listing: raw.to_string(),
        })
    }

    /// What the executor is told to launch: the package when known.
    pub fn run_target(&self) -> &str {
        self.package_id.as_deref().unwrap_or(&self.display_name)
    }

    /// Identity used for cross-branch exclusivity.
    pub fn conflict_key(&self) -> String {
        self.run_target().to_lowercase()
    }
}

/// A point-in-time view of the installed applications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledApps {
    entries: Vec<InstalledApp>,
}

impl InstalledApps {
    pub fn from_listing<I, S>(listing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: listing
                .into_iter()
                .filter_map(|raw| InstalledApp::parse(raw.as_ref()))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[InstalledApp] {
        &self.entries
    }

    /// Find the app a reference names. First match wins within each pass.
    pub fn find(&self, reference: &str) -> Option<&InstalledApp> {
        let wanted = reference.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|app| {
                app.package_id
                    .as_deref()
                    .is_some_and(|pkg| pkg.to_lowercase() == wanted)
            })
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|app| app.display_name.to_lowercase() == wanted)
            })
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|app| app.raw_listing.to_lowercase() == wanted)
            })
    }

    /// Display names, deduplicated case-insensitively and sorted.
    ///
    /// When two entries differ only in case, the later spelling is kept.
    pub fn names(&self) -> Vec<String> {
        let mut by_key = BTreeMap::new();
        for app in &self.entries {
            by_key.insert(app.display_name.to_lowercase(), app.display_name.clone());
        }
        by_key.into_values().collect()
    }
}

/// Outcome of resolving one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(InstalledApp),
    NotFound { valid_names: Vec<String> },
}

/// Registry-backed resolver.
#[derive(Clone)]
pub struct AppResolver {
    registry: Arc<dyn AppRegistry>,
    include_system_apps: bool,
}

impl AppResolver {
    pub fn new(registry: Arc<dyn AppRegistry>) -> Self {
        Self {
            registry,
            include_system_apps: false,
        }
    }

    #[must_use]
    pub const fn with_system_apps(mut self, include: bool) -> Self {
        self.include_system_apps = include;
        self
    }

    /// Query the registry for the current installed set.
    pub async fn snapshot(&self) -> Result<InstalledApps, RegistryError> {
        let listing = self.registry.list_installed(self.include_system_apps).await?;
        let apps = InstalledApps::from_listing(listing);
        debug!(count = apps.entries().len(), "Installed app snapshot taken");
        Ok(apps)
    }

    /// Resolve a single reference against a fresh snapshot.
    pub async fn resolve(&self, reference: &str) -> Result<Resolution, RegistryError> {
        let apps = self.snapshot().await?;
        Ok(apps.find(reference).cloned().map_or_else(
            || Resolution::NotFound {
                valid_names: apps.names(),
            },
            Resolution::Found,
        ))
    }
}
