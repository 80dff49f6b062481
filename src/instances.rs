//! Widget instance registry: out-of-band lookup of live widgets by id
//!
//! The output adapter owns widget instances; this registry publishes weak,
//! non-owning references so host commands (`add-traces`-style messages) can
//! reach an already-rendered widget without re-initializing it or scanning
//! the document.
//!
//! Written only by the output adapter (publish/withdraw), read by the bus
//! command path. `lookup` on a never-published or withdrawn id is the
//! recoverable "target not ready yet" case, not a crash.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::binding::WidgetInstance;
use crate::error::{BridgeError, Result};
use crate::types::ElementId;

/// Map from element identity to its live output-binding instance.
#[derive(Default)]
pub struct InstanceRegistry {
    entries: HashMap<ElementId, Weak<RefCell<WidgetInstance>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a live instance. Called once by the output adapter after the
    /// first successful render; publishing over a still-live entry replaces
    /// it with a warning (the one-instance-per-element invariant holds
    /// because the adapter keys its owned instances by element id).
    pub fn publish(&mut self, element_id: &ElementId, instance: Weak<RefCell<WidgetInstance>>) {
        let previous = self.entries.insert(element_id.clone(), instance);
        if previous.is_some_and(|w| w.upgrade().is_some()) {
            tracing::warn!(element = %element_id, "republished over a live widget instance");
        } else {
            tracing::debug!(element = %element_id, "widget instance published");
        }
    }

    /// Resolve a live instance handle.
    pub fn lookup(&self, element_id: &str) -> Result<Rc<RefCell<WidgetInstance>>> {
        self.entries
            .get(element_id)
            .and_then(Weak::upgrade)
            .ok_or_else(|| BridgeError::instance_not_found(element_id))
    }

    /// Clear the reference for a destroyed element. Idempotent.
    pub fn withdraw(&mut self, element_id: &str) {
        if self.entries.remove(element_id).is_some() {
            tracing::debug!(element = %element_id, "widget instance withdrawn");
        }
    }

    /// Number of published entries (live or stale), for diagnostics
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
