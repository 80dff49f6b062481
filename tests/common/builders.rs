//! Builders assembling a bridge and document like a page would

use uibridge_rs::{
    bus::HostReceiver, BindingDescriptor, Bridge, BridgeConfig, Capability, Document, Element,
    InputValueKind, RatePolicy, ValueInputBinding,
};

use super::mock_helpers::{ControllerProbe, CountingBinding};

/// Bridge with the standard input bindings used across the suite:
/// a bool "switch" (throttled 1000ms), a text "text" (immediate) and a
/// numeric "slider" (debounced 300ms).
pub fn input_bridge() -> (Bridge, HostReceiver) {
    super::init_tracing();
    let (mut bridge, rx) = Bridge::new(BridgeConfig::default());
    bridge
        .register_input_binding(
            BindingDescriptor::input("switch", ".switch-input")
                .with_capability(Capability::RatePolicy)
                .with_capability(Capability::ReceiveMessage),
            Box::new(
                ValueInputBinding::new(InputValueKind::Bool)
                    .with_rate_policy(RatePolicy::throttle(1000)),
            ),
        )
        .expect("switch registers");
    bridge
        .register_input_binding(
            BindingDescriptor::input("text", ".text-plus")
                .with_capability(Capability::ReceiveMessage),
            Box::new(ValueInputBinding::new(InputValueKind::Text)),
        )
        .expect("text registers");
    bridge
        .register_input_binding(
            BindingDescriptor::input("slider", ".slider")
                .with_capability(Capability::RatePolicy),
            Box::new(
                ValueInputBinding::new(InputValueKind::Number)
                    .with_rate_policy(RatePolicy::debounce(300)),
            ),
        )
        .expect("slider registers");
    (bridge, rx)
}

/// Document carrying one element per standard input binding
pub fn input_document() -> Document {
    let mut doc = Document::new();
    doc.push(
        Element::new("sidebar")
            .with_child(Element::new("s1").with_class("switch-input").with_value(false))
            .with_child(Element::new("t1").with_class("text-plus").with_value(""))
            .with_child(Element::new("n1").with_class("slider").with_value(0.0)),
    );
    doc
}

/// Register a probed output binding named `name` matching `.{name}` and
/// return its probe.
pub fn register_output(bridge: &mut Bridge, name: &str, binding: CountingBinding) -> ControllerProbe {
    super::init_tracing();
    let probe = binding.probe.clone();
    bridge
        .register_output_binding(
            BindingDescriptor::output(name, format!(".{name}")),
            Box::new(binding),
        )
        .expect("output registers");
    probe
}

/// Document with a single output element `el_id` of class `class`
pub fn output_document(el_id: &str, class: &str) -> Document {
    let mut doc = Document::new();
    doc.push(Element::new(el_id).with_class(class));
    doc
}
