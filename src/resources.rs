//! Dependency-resource loading for render payloads
//!
//! A render payload may declare scripts and stylesheets that must be in the
//! page before the widget initializes. Loading is idempotent across repeated
//! pushes: a resource already requested or resolved is never fetched again.
//!
//! The bridge never blocks on a load. When a payload's dependencies are not
//! yet resolved the render is parked in the output adapter's pending queue
//! and resumed from [`Bridge::pump_pending`](crate::bridge::Bridge::pump_pending)
//! once the loader reports them ready.

use std::any::Any;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One declared dependency of a render payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceDep {
    /// Stable name used for idempotence (e.g. "countup")
    pub name: String,
    pub kind: ResourceKind,
    /// Location the embedder fetches from
    pub href: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Script,
    Stylesheet,
}

/// How resources get into the page. Implementations must make `request`
/// idempotent per resource name.
pub trait ResourceLoader {
    /// Begin fetching `dep` if it is neither loaded nor in flight
    fn request(&mut self, dep: &ResourceDep);

    /// Whether `dep` has fully resolved
    fn is_loaded(&self, dep: &ResourceDep) -> bool;

    /// Downcast support for embedders that drive loads externally
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Loader that resolves every request synchronously. The default: suitable
/// when all widget assets are bundled with the page.
#[derive(Debug, Default)]
pub struct InstantLoader {
    loaded: HashSet<String>,
}

impl InstantLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResourceLoader for InstantLoader {
    fn request(&mut self, dep: &ResourceDep) {
        if self.loaded.insert(dep.name.clone()) {
            tracing::debug!(resource = %dep.name, href = %dep.href, "resource loaded");
        }
    }

    fn is_loaded(&self, dep: &ResourceDep) -> bool {
        self.loaded.contains(&dep.name)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Loader whose completions are driven externally. Requests are recorded as
/// in flight; the embedder (or a test) resolves them with [`complete`] and
/// then pumps the bridge's pending renders.
///
/// [`complete`]: DeferredLoader::complete
#[derive(Debug, Default)]
pub struct DeferredLoader {
    in_flight: HashSet<String>,
    loaded: HashSet<String>,
}

impl DeferredLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a requested resource as resolved. Returns false when the
    /// resource was never requested or already resolved.
    pub fn complete(&mut self, name: &str) -> bool {
        if self.in_flight.remove(name) {
            self.loaded.insert(name.to_string());
            tracing::debug!(resource = %name, "deferred resource resolved");
            true
        } else {
            false
        }
    }

    /// Names currently in flight, for diagnostics
    pub fn in_flight(&self) -> impl Iterator<Item = &str> {
        self.in_flight.iter().map(|s| s.as_str())
    }
}

impl ResourceLoader for DeferredLoader {
    fn request(&mut self, dep: &ResourceDep) {
        if !self.loaded.contains(&dep.name) && self.in_flight.insert(dep.name.clone()) {
            tracing::debug!(resource = %dep.name, href = %dep.href, "resource load started");
        }
    }

    fn is_loaded(&self, dep: &ResourceDep) -> bool {
        self.loaded.contains(&dep.name)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
