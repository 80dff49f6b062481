//! The bridge: wiring between registry, adapters, bus and scheduler
//!
//! One `Bridge` per page. It owns every subsystem and exposes the entry
//! points the embedder drives: scope binding after the host injects markup,
//! render pushes, native change events, the timer pump, and inbound host
//! messages. All calls run on one logical thread; nothing here blocks.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;

use crate::binding::{
    InputAdapter, InputBinding, OutputAdapter, OutputBinding, RenderOutcome, SubscriptionHandle,
    WidgetInstance,
};
use crate::bus::{BusEventSink, HostHandler, HostReceiver, MessageBus, SendOpts};
use crate::dom::Document;
use crate::error::{BridgeError, Result};
use crate::instances::InstanceRegistry;
use crate::registry::{BindingDescriptor, BindingRegistry};
use crate::resources::{InstantLoader, ResourceLoader};
use crate::scheduler::{Scheduler, TimerTask};
use crate::types::{BindingKind, BridgeConfig, Capability, ElementId, InputValue, RateMode, RatePolicy};

/// A live element-to-binding association of input kind.
struct BoundInput {
    binding_name: String,
    handle: SubscriptionHandle,
}

/// The client-side bridge. Constructed once at page start; the returned
/// receiver is the host's end of the outbound value channel.
pub struct Bridge {
    config: BridgeConfig,
    registry: BindingRegistry,
    output: OutputAdapter,
    input: InputAdapter,
    instances: InstanceRegistry,
    bus: MessageBus,
    scheduler: Scheduler,
    loader: Box<dyn ResourceLoader>,
    bound_inputs: HashMap<ElementId, BoundInput>,
    bound_outputs: HashMap<ElementId, String>,
}

impl Bridge {
    /// Bridge with the synchronous [`InstantLoader`]
    pub fn new(config: BridgeConfig) -> (Self, HostReceiver) {
        Self::with_loader(config, Box::new(InstantLoader::new()))
    }

    /// Bridge with an embedder-driven resource loader
    pub fn with_loader(
        config: BridgeConfig,
        loader: Box<dyn ResourceLoader>,
    ) -> (Self, HostReceiver) {
        let (bus, receiver) = MessageBus::new(config.outbound_capacity);
        (
            Self {
                config,
                registry: BindingRegistry::new(),
                output: OutputAdapter::new(),
                input: InputAdapter::new(),
                instances: InstanceRegistry::new(),
                bus,
                scheduler: Scheduler::new(),
                loader,
                bound_inputs: HashMap::new(),
                bound_outputs: HashMap::new(),
            },
            receiver,
        )
    }

    // --- Registration (page start) ---

    pub fn register_input_binding(
        &mut self,
        descriptor: BindingDescriptor,
        binding: Box<dyn InputBinding>,
    ) -> Result<()> {
        self.registry.register_input(descriptor, binding)
    }

    pub fn register_output_binding(
        &mut self,
        descriptor: BindingDescriptor,
        binding: Box<dyn OutputBinding>,
    ) -> Result<()> {
        self.registry.register_output(descriptor, binding)
    }

    /// Register the built-in command path for `msg_type`: messages carrying
    /// an `id` field are routed to the live widget instance with that
    /// element id. A not-yet-rendered target is "not ready" and the message
    /// is dropped with a diagnostic, never an error.
    pub fn register_widget_command(&mut self, msg_type: impl Into<String>) {
        let msg_type = msg_type.into();
        let label = msg_type.clone();
        self.bus.on_host_message(
            msg_type,
            Box::new(move |ctx, payload| {
                let Some(id) = payload.get("id").and_then(Value::as_str) else {
                    return Err(BridgeError::MalformedPayload(format!(
                        "'{label}' command is missing its 'id' field"
                    )));
                };
                match ctx.instances.lookup(id) {
                    Ok(instance) => {
                        let mut sink = ctx.event_sink(id);
                        instance.borrow_mut().controller.handle_command(payload, &mut sink)
                    }
                    Err(BridgeError::InstanceNotFound { .. }) => {
                        tracing::debug!(msg_type = %label, element = %id, "command target not ready, dropping");
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }),
        );
    }

    /// Register a custom inbound handler. Last writer wins.
    pub fn on_host_message(&mut self, msg_type: impl Into<String>, handler: HostHandler) -> bool {
        self.bus.on_host_message(msg_type, handler)
    }

    // --- Scope binding ---

    /// Scan `scope_id` and associate matched elements with their bindings.
    /// Input elements are subscribed with their descriptor's rate policy.
    /// Already-bound elements are left untouched, so rebinding a scope
    /// after an incremental update is safe. Returns the number of new
    /// associations.
    pub fn bind_scope(&mut self, doc: &Document, scope_id: &str) -> Result<usize> {
        let mut bound = 0;
        for m in self.registry.find(doc, scope_id, BindingKind::Input) {
            if self.bound_inputs.contains_key(&m.element_id) {
                continue;
            }
            let (descriptor, binding) = self.registry.input(&m.binding_name)?;
            let policy = effective_policy(&self.config, descriptor, binding);
            let handle = self.input.subscribe(&m.element_id, policy)?;
            self.bound_inputs.insert(
                m.element_id,
                BoundInput {
                    binding_name: m.binding_name,
                    handle,
                },
            );
            bound += 1;
        }
        for m in self.registry.find(doc, scope_id, BindingKind::Output) {
            if self.bound_outputs.contains_key(&m.element_id) {
                continue;
            }
            self.bound_outputs.insert(m.element_id, m.binding_name);
            bound += 1;
        }
        tracing::debug!(scope = %scope_id, bound, "scope bound");
        Ok(bound)
    }

    /// Tear down every binding under `scope_id`. Call before removing the
    /// subtree from the document.
    pub fn unbind_scope(&mut self, doc: &Document, scope_id: &str) {
        let ids: Vec<ElementId> = doc
            .elements_in_scope(scope_id)
            .iter()
            .map(|e| e.id.clone())
            .collect();
        for id in ids {
            self.teardown_element(&id);
        }
    }

    /// Drop all bridge state for one element: subscription, rate timers,
    /// widget instance, pending renders and the published reference.
    pub fn teardown_element(&mut self, element_id: &str) {
        if let Some(bound) = self.bound_inputs.remove(element_id) {
            bound.handle.cancel();
            self.input.unsubscribe(element_id, &mut self.scheduler);
        }
        if self.bound_outputs.remove(element_id).is_some() {
            self.output.teardown(element_id, &mut self.instances);
        }
    }

    // --- Output path (host -> widget) ---

    /// Apply a host render push to a bound output element.
    pub fn render_value(&mut self, element_id: &str, payload: Value) -> Result<RenderOutcome> {
        let binding_name = self
            .bound_outputs
            .get(element_id)
            .cloned()
            .ok_or_else(|| BridgeError::ElementNotFound(element_id.to_string()))?;
        let (_, binding) = self.registry.output(&binding_name)?;
        let mut sink = BusEventSink::new(element_id, self.bus.sender());
        self.output.render_value(
            &binding_name,
            binding,
            &element_id.to_string(),
            payload,
            self.loader.as_mut(),
            &mut self.instances,
            &mut sink,
            self.config.max_pending_renders,
        )
    }

    /// Retry renders parked on dependency loads. Call after the loader
    /// resolves resources. Returns the number of renders applied.
    pub fn pump_pending(&mut self) -> Result<usize> {
        let mut applied = 0;
        for element_id in self.output.pending_elements() {
            let Some(binding_name) = self.bound_outputs.get(&element_id).cloned() else {
                continue;
            };
            let (_, binding) = self.registry.output(&binding_name)?;
            let mut sink = BusEventSink::new(&element_id, self.bus.sender());
            applied += self.output.pump_element(
                &binding_name,
                binding,
                &element_id,
                self.loader.as_mut(),
                &mut self.instances,
                &mut sink,
            )?;
        }
        Ok(applied)
    }

    /// Forward new layout dimensions; a no-op before the first render.
    pub fn resize(&mut self, element_id: &str, width: u32, height: u32) {
        self.output.resize(element_id, width, height);
    }

    /// Live controller handle for a rendered element.
    pub fn get_instance(&self, element_id: &str) -> Result<Rc<RefCell<WidgetInstance>>> {
        self.output.get_instance(element_id)
    }

    /// Out-of-band lookup through the published (weak) reference.
    pub fn lookup_instance(&self, element_id: &str) -> Result<Rc<RefCell<WidgetInstance>>> {
        self.instances.lookup(element_id)
    }

    // --- Input path (user -> host) ---

    /// Read the current value of a bound input element.
    pub fn get_value(&self, doc: &Document, element_id: &str) -> Result<InputValue> {
        let (_, binding) = self.input_binding_for(element_id)?;
        let element = doc
            .get(element_id)
            .ok_or_else(|| BridgeError::ElementNotFound(element_id.to_string()))?;
        binding.read(element)
    }

    /// Write a value and run the same change-notification path as a
    /// user-driven edit, so host- and control-visible state never diverge.
    pub fn set_value(
        &mut self,
        doc: &mut Document,
        element_id: &str,
        value: InputValue,
    ) -> Result<()> {
        {
            let (_, binding) = self.input_binding_for(element_id)?;
            let element = doc
                .get_mut(element_id)
                .ok_or_else(|| BridgeError::ElementNotFound(element_id.to_string()))?;
            binding.write(element, value)?;
        }
        self.notify_change(doc, element_id)
    }

    /// Native change event entry point: reads the control value and feeds
    /// it through the element's rate policy. Unbound or unsubscribed
    /// elements forward nothing.
    pub fn notify_change(&mut self, doc: &Document, element_id: &str) -> Result<()> {
        let value = {
            let Ok((_, binding)) = self.input_binding_for(element_id) else {
                return Ok(());
            };
            let element = doc
                .get(element_id)
                .ok_or_else(|| BridgeError::ElementNotFound(element_id.to_string()))?;
            binding.read(element)?
        };
        let sender = self.bus.sender();
        self.input
            .on_change(&element_id.to_string(), value, &mut self.scheduler, &sender)
    }

    /// Apply a host-pushed partial update to an input element. Unrecognized
    /// fields are ignored; a value update runs the change path.
    pub fn receive_input_message(
        &mut self,
        doc: &mut Document,
        element_id: &str,
        data: &Value,
    ) -> Result<()> {
        let changed = {
            let (_, binding) = self.input_binding_for(element_id)?;
            let element = doc
                .get_mut(element_id)
                .ok_or_else(|| BridgeError::ElementNotFound(element_id.to_string()))?;
            binding.receive_message(element, data)?
        };
        if changed {
            self.notify_change(doc, element_id)?;
        }
        Ok(())
    }

    /// Cancel the change subscription for one element. Idempotent; pending
    /// rate timers are cancelled with it.
    pub fn unsubscribe(&mut self, element_id: &str) {
        if let Some(bound) = self.bound_inputs.get(element_id) {
            bound.handle.cancel();
        }
        self.input.unsubscribe(element_id, &mut self.scheduler);
    }

    /// Re-arm the change subscription for a bound but unsubscribed element.
    /// Returns the new handle (the old one stays cancelled).
    pub fn subscribe(&mut self, element_id: &str) -> Result<SubscriptionHandle> {
        let binding_name = self
            .bound_inputs
            .get(element_id)
            .map(|b| b.binding_name.clone())
            .ok_or_else(|| BridgeError::ElementNotFound(element_id.to_string()))?;
        let (descriptor, binding) = self.registry.input(&binding_name)?;
        let policy = effective_policy(&self.config, descriptor, binding);
        let handle = self.input.subscribe(&element_id.to_string(), policy)?;
        if let Some(bound) = self.bound_inputs.get_mut(element_id) {
            bound.handle = handle.clone();
        }
        Ok(handle)
    }

    pub fn is_subscribed(&self, element_id: &str) -> bool {
        self.input.is_subscribed(element_id)
    }

    // --- Bus passthrough ---

    /// Transmit a named value to the host (the `setInputValue` path for
    /// script-originated values not tied to a bound control).
    pub fn send_value(&self, name: impl Into<String>, value: Value, opts: SendOpts) -> Result<()> {
        self.bus.send_value(name, value, opts)
    }

    /// Deliver an inbound host message. Unknown types are dropped with a
    /// diagnostic. Returns whether a handler ran.
    pub fn dispatch(&mut self, msg_type: &str, payload: &Value) -> bool {
        self.bus.dispatch(msg_type, payload, &mut self.instances)
    }

    // --- Clock ---

    /// Advance the logical clock to `now`, firing due rate timers in order.
    pub fn advance_to(&mut self, now: Duration) -> Result<()> {
        let sender = self.bus.sender();
        while let Some(fired) = self.scheduler.pop_due(now) {
            match fired.task {
                TimerTask::RateFlush { element_id } => {
                    self.input
                        .on_timer(&element_id, fired.due, &mut self.scheduler, &sender)?;
                }
            }
        }
        self.scheduler.advance_to(now);
        Ok(())
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// The resource loader, for embedders that resolve loads externally
    pub fn loader_mut(&mut self) -> &mut dyn ResourceLoader {
        self.loader.as_mut()
    }

    fn input_binding_for(&self, element_id: &str) -> Result<(&BindingDescriptor, &dyn InputBinding)> {
        let bound = self
            .bound_inputs
            .get(element_id)
            .ok_or_else(|| BridgeError::ElementNotFound(element_id.to_string()))?;
        self.registry.input(&bound.binding_name)
    }
}

/// The policy a subscription gets: the binding's own policy, or the
/// configured default delay (throttled) when the descriptor declares the
/// RatePolicy capability but the binding keeps Immediate.
fn effective_policy(
    config: &BridgeConfig,
    descriptor: &BindingDescriptor,
    binding: &dyn InputBinding,
) -> RatePolicy {
    let policy = binding.rate_policy();
    if policy.mode == RateMode::Immediate
        && descriptor.capabilities.contains(Capability::RatePolicy)
    {
        RatePolicy::throttle(config.default_rate_delay_ms)
    } else {
        policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ValueInputBinding;
    use crate::dom::Element;
    use crate::types::InputValueKind;
    use serde_json::json;

    fn text_bridge() -> (Bridge, HostReceiver, Document) {
        let (mut bridge, rx) = Bridge::new(BridgeConfig::default());
        bridge
            .register_input_binding(
                BindingDescriptor::input("text", ".text-plus"),
                Box::new(ValueInputBinding::new(InputValueKind::Text)),
            )
            .unwrap();
        let mut doc = Document::new();
        doc.push(Element::new("t1").with_class("text-plus").with_value(""));
        bridge.bind_scope(&doc, "document").unwrap();
        (bridge, rx, doc)
    }

    #[test]
    fn test_set_value_round_trip_and_notification() {
        let (mut bridge, rx, mut doc) = text_bridge();
        bridge
            .set_value(&mut doc, "t1", InputValue::Text("abc".into()))
            .unwrap();
        assert_eq!(
            bridge.get_value(&doc, "t1").unwrap(),
            InputValue::Text("abc".into())
        );
        // set_value runs the same path as a user edit.
        let msg = rx.recv().unwrap();
        assert_eq!(msg.name, "t1");
        assert_eq!(msg.value, json!("abc"));
    }

    #[test]
    fn test_rebinding_a_scope_is_idempotent() {
        let (mut bridge, _rx, doc) = text_bridge();
        assert_eq!(bridge.bind_scope(&doc, "document").unwrap(), 0);
        assert!(bridge.is_subscribed("t1"));
    }

    #[test]
    fn test_change_on_unbound_element_is_silent() {
        let (mut bridge, rx, mut doc) = text_bridge();
        doc.push(Element::new("stray").with_value("x"));
        bridge.notify_change(&doc, "stray").unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_render_on_unbound_element_fails() {
        let (mut bridge, _rx, _doc) = text_bridge();
        let err = bridge.render_value("nope", json!({})).unwrap_err();
        assert!(matches!(err, BridgeError::ElementNotFound(_)));
    }

    #[test]
    fn test_descriptor_rate_policy_capability_applies_default_delay() {
        let config = BridgeConfig::default();
        let descriptor = BindingDescriptor::input("slider", ".slider")
            .with_capability(Capability::RatePolicy);
        let binding = ValueInputBinding::new(InputValueKind::Number);
        let policy = effective_policy(&config, &descriptor, &binding);
        assert_eq!(policy.mode, RateMode::Throttle);
        assert_eq!(policy.delay_ms, config.default_rate_delay_ms);

        // A binding with its own policy keeps it.
        let custom = ValueInputBinding::new(InputValueKind::Number)
            .with_rate_policy(RatePolicy::debounce(300));
        assert_eq!(effective_policy(&config, &descriptor, &custom).mode, RateMode::Debounce);
    }
}
