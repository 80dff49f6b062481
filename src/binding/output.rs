//! Output binding adapter: render/resize lifecycle per element
//!
//! One [`WidgetInstance`] per element, created on the first render and never
//! re-constructed: double-initialization corrupts component-internal state,
//! so repeated host pushes go through the controller's update path (or are
//! ignored when the component has no incremental update). This replaces the
//! closure-captured `var controller; var rendered = false;` state of the
//! original widget factories with addressable records.
//!
//! Renders whose declared dependency resources are still loading are parked
//! in a per-element queue and resumed in order once the loader reports them
//! ready. An in-flight load is never cancelled.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::binding::{EventSink, OutputBinding, WidgetController};
use crate::error::{BridgeError, Result};
use crate::instances::InstanceRegistry;
use crate::resources::{ResourceDep, ResourceLoader};
use crate::types::ElementId;

/// Render lifecycle state for one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    #[default]
    Uninitialized,
    Rendered,
}

/// The live wrapper around one rendered third-party component.
pub struct WidgetInstance {
    element_id: ElementId,
    binding_name: String,
    state: RenderState,
    pub controller: Box<dyn WidgetController>,
}

impl WidgetInstance {
    fn new(element_id: ElementId, binding_name: String, controller: Box<dyn WidgetController>) -> Self {
        Self {
            element_id,
            binding_name,
            state: RenderState::Uninitialized,
            controller,
        }
    }

    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    pub fn binding_name(&self) -> &str {
        &self.binding_name
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn stub_for_tests(element_id: &str) -> Self {
        struct Noop;
        impl WidgetController for Noop {
            fn initialize(&mut self, _: &Value, _: &mut dyn EventSink) -> Result<()> {
                Ok(())
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }
        }
        Self::new(element_id.to_string(), "stub".to_string(), Box::new(Noop))
    }
}

// Manual impl: the controller box has no Debug.
impl fmt::Debug for WidgetInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetInstance")
            .field("element_id", &self.element_id)
            .field("binding_name", &self.binding_name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// What a render call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// First render: controller initialized and instance published
    Rendered,
    /// Payload fed through the controller's update path
    Updated,
    /// Element already rendered and the controller has no update path;
    /// the old rendering stays in place
    Unchanged,
    /// Parked until dependency resources resolve
    Deferred,
}

/// Adapter owning every widget instance and pending render queue.
#[derive(Default)]
pub struct OutputAdapter {
    instances: HashMap<ElementId, Rc<RefCell<WidgetInstance>>>,
    pending: HashMap<ElementId, VecDeque<Value>>,
}

impl OutputAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a host render push for `element_id`.
    ///
    /// Renders for a single element are processed in host issue order: a
    /// payload arriving while earlier payloads wait on a dependency load
    /// queues behind them.
    #[allow(clippy::too_many_arguments)]
    pub fn render_value(
        &mut self,
        binding_name: &str,
        binding: &dyn OutputBinding,
        element_id: &ElementId,
        payload: Value,
        loader: &mut dyn ResourceLoader,
        instances: &mut InstanceRegistry,
        events: &mut dyn EventSink,
        max_pending: usize,
    ) -> Result<RenderOutcome> {
        validate_payload(binding, element_id, &payload)?;
        let deps = extract_deps(element_id, &payload)?;

        if self.pending.get(element_id).is_some_and(|q| !q.is_empty()) {
            self.defer(element_id, payload, max_pending);
            return Ok(RenderOutcome::Deferred);
        }

        for dep in &deps {
            loader.request(dep);
        }
        if deps.iter().any(|d| !loader.is_loaded(d)) {
            tracing::debug!(element = %element_id, "render deferred on dependency load");
            self.defer(element_id, payload, max_pending);
            return Ok(RenderOutcome::Deferred);
        }

        self.apply(binding_name, binding, element_id, &payload, instances, events)
    }

    /// Retry queued renders for `element_id` after a loader completion.
    /// Applies payloads in order until the queue empties or the head still
    /// waits on an unresolved dependency. Returns the number applied.
    pub fn pump_element(
        &mut self,
        binding_name: &str,
        binding: &dyn OutputBinding,
        element_id: &ElementId,
        loader: &mut dyn ResourceLoader,
        instances: &mut InstanceRegistry,
        events: &mut dyn EventSink,
    ) -> Result<usize> {
        let mut applied = 0;
        loop {
            let Some(payload) = self.pending.get_mut(element_id).and_then(|q| q.front().cloned())
            else {
                break;
            };
            // Queued payloads had their deps validated on entry; a parse
            // failure here must not leave the payload wedged at the head.
            let deps = match extract_deps(element_id, &payload) {
                Ok(deps) => deps,
                Err(e) => {
                    tracing::error!(element = %element_id, error = %e, "dropping queued payload");
                    self.pending
                        .get_mut(element_id)
                        .expect("queue checked above")
                        .pop_front();
                    continue;
                }
            };
            for dep in &deps {
                loader.request(dep);
            }
            if deps.iter().any(|d| !loader.is_loaded(d)) {
                break;
            }
            self.pending
                .get_mut(element_id)
                .expect("queue checked above")
                .pop_front();
            self.apply(binding_name, binding, element_id, &payload, instances, events)?;
            applied += 1;
        }
        if self.pending.get(element_id).is_some_and(|q| q.is_empty()) {
            self.pending.remove(element_id);
        }
        Ok(applied)
    }

    /// Elements with renders parked on dependency loads
    pub fn pending_elements(&self) -> Vec<ElementId> {
        self.pending.keys().cloned().collect()
    }

    /// Forward new layout dimensions to the live instance. A no-op while
    /// uninitialized.
    pub fn resize(&mut self, element_id: &str, width: u32, height: u32) {
        match self.instances.get(element_id) {
            Some(instance) => instance.borrow_mut().controller.resize(width, height),
            None => {
                tracing::debug!(element = %element_id, "resize before first render ignored");
            }
        }
    }

    /// The live controller handle for `element_id`.
    pub fn get_instance(&self, element_id: &str) -> Result<Rc<RefCell<WidgetInstance>>> {
        self.instances
            .get(element_id)
            .cloned()
            .ok_or_else(|| BridgeError::instance_not_found(element_id))
    }

    pub fn is_rendered(&self, element_id: &str) -> bool {
        self.instances.contains_key(element_id)
    }

    /// Drop the instance and pending renders for a destroyed element and
    /// withdraw its published reference.
    pub fn teardown(&mut self, element_id: &str, instances: &mut InstanceRegistry) {
        self.pending.remove(element_id);
        if self.instances.remove(element_id).is_some() {
            tracing::debug!(element = %element_id, "widget instance torn down");
        }
        instances.withdraw(element_id);
    }

    fn defer(&mut self, element_id: &ElementId, payload: Value, max_pending: usize) {
        let queue = self.pending.entry(element_id.clone()).or_default();
        if queue.len() >= max_pending {
            tracing::warn!(
                element = %element_id,
                max_pending,
                "pending render queue full, dropping oldest payload"
            );
            queue.pop_front();
        }
        queue.push_back(payload);
    }

    fn apply(
        &mut self,
        binding_name: &str,
        binding: &dyn OutputBinding,
        element_id: &ElementId,
        payload: &Value,
        instances: &mut InstanceRegistry,
        events: &mut dyn EventSink,
    ) -> Result<RenderOutcome> {
        if let Some(instance) = self.instances.get(element_id) {
            let mut inst = instance.borrow_mut();
            return if inst.controller.supports_update() {
                inst.controller
                    .update(payload, events)
                    .map_err(|e| e.with_context(format!("update of '{element_id}' failed")))?;
                Ok(RenderOutcome::Updated)
            } else {
                tracing::debug!(
                    element = %element_id,
                    binding = %binding_name,
                    "re-render ignored: controller has no update path"
                );
                Ok(RenderOutcome::Unchanged)
            };
        }

        let mut controller = binding.create(element_id);
        controller
            .initialize(payload, events)
            .map_err(|e| e.with_context(format!("initialization of '{element_id}' failed")))?;

        let mut instance = WidgetInstance::new(
            element_id.clone(),
            binding_name.to_string(),
            controller,
        );
        instance.state = RenderState::Rendered;
        let instance = Rc::new(RefCell::new(instance));
        instances.publish(element_id, Rc::downgrade(&instance));
        self.instances.insert(element_id.clone(), instance);
        tracing::info!(element = %element_id, binding = %binding_name, "widget rendered");
        Ok(RenderOutcome::Rendered)
    }
}

fn validate_payload(binding: &dyn OutputBinding, element_id: &str, payload: &Value) -> Result<()> {
    let required = binding.required_fields();
    if required.is_empty() {
        return Ok(());
    }
    let Some(object) = payload.as_object() else {
        return Err(BridgeError::MalformedPayload(format!(
            "payload for '{element_id}' is not an object"
        )));
    };
    for field in required {
        if !object.contains_key(*field) {
            return Err(BridgeError::MalformedPayload(format!(
                "payload for '{element_id}' is missing required field '{field}'"
            )));
        }
    }
    Ok(())
}

fn extract_deps(element_id: &str, payload: &Value) -> Result<Vec<ResourceDep>> {
    match payload.get("deps") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| {
            BridgeError::MalformedPayload(format!(
                "payload for '{element_id}' has malformed deps: {e}"
            ))
        }),
    }
}
