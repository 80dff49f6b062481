//! Binding registry: the single source of truth for all binding kinds
//!
//! Named descriptors (input and output), each with a class-style selector
//! and a capability set, paired with the trait object implementing the
//! binding. Registered once at bridge construction and read for the rest of
//! the process lifetime; there is no dynamic unregistration.
//!
//! The element scanner lives here too: `find(doc, scope, kind)` resolves
//! registered selectors to elements in document order.

use serde::{Deserialize, Serialize};

use crate::binding::{InputBinding, OutputBinding};
use crate::dom::Document;
use crate::error::{BridgeError, Result};
use crate::types::{BindingKind, Capability, CapabilitySet, ElementId};

/// Immutable description of one binding: name, kind, selector, capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingDescriptor {
    /// Globally unique within its kind
    pub name: String,
    pub kind: BindingKind,
    /// CSS-class-style selector (".switch-input")
    pub selector: String,
    pub capabilities: CapabilitySet,
}

impl BindingDescriptor {
    pub fn input(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: BindingKind::Input,
            selector: selector.into(),
            capabilities: CapabilitySet::input_defaults(),
        }
    }

    pub fn output(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: BindingKind::Output,
            selector: selector.into(),
            capabilities: CapabilitySet::output_defaults(),
        }
    }

    /// Builder-style capability addition
    pub fn with_capability(mut self, cap: Capability) -> Self {
        self.capabilities = self.capabilities.with(cap);
        self
    }
}

/// An element matched to a registered binding during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingMatch {
    pub element_id: ElementId,
    pub binding_name: String,
    pub kind: BindingKind,
}

struct InputEntry {
    descriptor: BindingDescriptor,
    binding: Box<dyn InputBinding>,
}

struct OutputEntry {
    descriptor: BindingDescriptor,
    binding: Box<dyn OutputBinding>,
}

/// Process-wide table of binding descriptors and their implementations.
#[derive(Default)]
pub struct BindingRegistry {
    inputs: Vec<InputEntry>,
    outputs: Vec<OutputEntry>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an input binding. Fails on duplicate (kind, name), on a
    /// non-class selector, and on a capability set invalid for the kind.
    pub fn register_input(
        &mut self,
        descriptor: BindingDescriptor,
        binding: Box<dyn InputBinding>,
    ) -> Result<()> {
        validate(&descriptor, BindingKind::Input)?;
        if self.inputs.iter().any(|e| e.descriptor.name == descriptor.name) {
            return Err(BridgeError::DuplicateBinding {
                kind: "input",
                name: descriptor.name,
            });
        }
        tracing::info!(name = %descriptor.name, selector = %descriptor.selector, "input binding registered");
        self.inputs.push(InputEntry { descriptor, binding });
        Ok(())
    }

    /// Register an output binding, with the same validation rules.
    pub fn register_output(
        &mut self,
        descriptor: BindingDescriptor,
        binding: Box<dyn OutputBinding>,
    ) -> Result<()> {
        validate(&descriptor, BindingKind::Output)?;
        if self.outputs.iter().any(|e| e.descriptor.name == descriptor.name) {
            return Err(BridgeError::DuplicateBinding {
                kind: "output",
                name: descriptor.name,
            });
        }
        tracing::info!(name = %descriptor.name, selector = %descriptor.selector, "output binding registered");
        self.outputs.push(OutputEntry { descriptor, binding });
        Ok(())
    }

    /// Resolve a registered input binding by name
    pub fn input(&self, name: &str) -> Result<(&BindingDescriptor, &dyn InputBinding)> {
        self.inputs
            .iter()
            .find(|e| e.descriptor.name == name)
            .map(|e| (&e.descriptor, e.binding.as_ref()))
            .ok_or_else(|| BridgeError::UnknownBinding(name.to_string()))
    }

    /// Resolve a registered output binding by name
    pub fn output(&self, name: &str) -> Result<(&BindingDescriptor, &dyn OutputBinding)> {
        self.outputs
            .iter()
            .find(|e| e.descriptor.name == name)
            .map(|e| (&e.descriptor, e.binding.as_ref()))
            .ok_or_else(|| BridgeError::UnknownBinding(name.to_string()))
    }

    /// Element scanner: all elements under `scope_id` matching a registered
    /// descriptor of `kind`, in document order. An element matches at most
    /// one binding per kind (first registered wins). Unmatched or unknown
    /// scopes yield an empty vec.
    pub fn find(&self, doc: &Document, scope_id: &str, kind: BindingKind) -> Vec<BindingMatch> {
        let mut matches = Vec::new();
        for element in doc.elements_in_scope(scope_id) {
            if element.id.is_empty() {
                continue;
            }
            let hit = match kind {
                BindingKind::Input => self
                    .inputs
                    .iter()
                    .find(|e| element.matches(&e.descriptor.selector))
                    .map(|e| e.descriptor.name.clone()),
                BindingKind::Output => self
                    .outputs
                    .iter()
                    .find(|e| element.matches(&e.descriptor.selector))
                    .map(|e| e.descriptor.name.clone()),
            };
            if let Some(binding_name) = hit {
                matches.push(BindingMatch {
                    element_id: element.id.clone(),
                    binding_name,
                    kind,
                });
            }
        }
        matches
    }
}

/// Registration-time validation: kind agreement, selector shape, and the
/// capability rules (value access and subscription are input-side,
/// instance lookup is output-side).
fn validate(descriptor: &BindingDescriptor, expected_kind: BindingKind) -> Result<()> {
    if descriptor.kind != expected_kind {
        return Err(BridgeError::InvalidDescriptor(format!(
            "descriptor '{}' declares kind {} but was registered as {}",
            descriptor.name,
            descriptor.kind.label(),
            expected_kind.label()
        )));
    }
    if !descriptor.selector.starts_with('.') || descriptor.selector.len() < 2 {
        return Err(BridgeError::InvalidDescriptor(format!(
            "selector '{}' of '{}' is not a class selector",
            descriptor.selector, descriptor.name
        )));
    }
    let caps = descriptor.capabilities;
    match expected_kind {
        BindingKind::Input => {
            let required = CapabilitySet::new()
                .with(Capability::GetValue)
                .with(Capability::SetValue)
                .with(Capability::Subscribe);
            if !caps.contains_all(required) {
                return Err(BridgeError::InvalidDescriptor(format!(
                    "input binding '{}' must declare GetValue, SetValue and Subscribe",
                    descriptor.name
                )));
            }
            if caps.contains(Capability::GetInstance) {
                return Err(BridgeError::InvalidDescriptor(format!(
                    "input binding '{}' cannot declare GetInstance",
                    descriptor.name
                )));
            }
        }
        BindingKind::Output => {
            let input_only = CapabilitySet::new()
                .with(Capability::GetValue)
                .with(Capability::SetValue)
                .with(Capability::Subscribe)
                .with(Capability::RatePolicy);
            if !caps.is_disjoint(input_only) {
                return Err(BridgeError::InvalidDescriptor(format!(
                    "output binding '{}' declares input-side capabilities",
                    descriptor.name
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{ValueInputBinding, WidgetController};
    use crate::dom::Element;
    use crate::types::InputValueKind;

    struct NullController;

    impl WidgetController for NullController {
        fn initialize(
            &mut self,
            _: &serde_json::Value,
            _: &mut dyn crate::binding::EventSink,
        ) -> Result<()> {
            Ok(())
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    struct NullOutput;

    impl OutputBinding for NullOutput {
        fn create(&self, _: &ElementId) -> Box<dyn WidgetController> {
            Box::new(NullController)
        }
    }

    fn text_binding() -> Box<dyn InputBinding> {
        Box::new(ValueInputBinding::new(InputValueKind::Text))
    }

    #[test]
    fn test_duplicate_name_same_kind_fails() {
        let mut registry = BindingRegistry::new();
        registry
            .register_input(BindingDescriptor::input("text", ".text-plus"), text_binding())
            .unwrap();
        let err = registry
            .register_input(BindingDescriptor::input("text", ".other"), text_binding())
            .unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateBinding { kind: "input", .. }));
    }

    #[test]
    fn test_same_name_different_kind_is_allowed() {
        let mut registry = BindingRegistry::new();
        registry
            .register_input(BindingDescriptor::input("gio", ".gio-input"), text_binding())
            .unwrap();
        registry
            .register_output(BindingDescriptor::output("gio", ".gio"), Box::new(NullOutput))
            .unwrap();
        assert!(registry.input("gio").is_ok());
        assert!(registry.output("gio").is_ok());
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let mut registry = BindingRegistry::new();
        let err = registry
            .register_input(BindingDescriptor::input("bad", "div"), text_binding())
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidDescriptor(_)));
    }

    #[test]
    fn test_capability_rules_checked_at_registration() {
        let mut registry = BindingRegistry::new();
        let bad_input =
            BindingDescriptor::input("x", ".x").with_capability(Capability::GetInstance);
        assert!(registry.register_input(bad_input, text_binding()).is_err());

        let bad_output =
            BindingDescriptor::output("y", ".y").with_capability(Capability::Subscribe);
        assert!(registry
            .register_output(bad_output, Box::new(NullOutput))
            .is_err());
    }

    #[test]
    fn test_find_returns_document_order() {
        let mut registry = BindingRegistry::new();
        registry
            .register_input(BindingDescriptor::input("text", ".text-plus"), text_binding())
            .unwrap();
        registry
            .register_output(BindingDescriptor::output("gio", ".gio"), Box::new(NullOutput))
            .unwrap();

        let mut doc = Document::new();
        doc.push(
            Element::new("panel")
                .with_child(Element::new("t1").with_class("text-plus"))
                .with_child(Element::new("g1").with_class("gio"))
                .with_child(Element::new("t2").with_class("text-plus")),
        );

        let inputs = registry.find(&doc, "document", BindingKind::Input);
        let ids: Vec<&str> = inputs.iter().map(|m| m.element_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);

        let outputs = registry.find(&doc, "document", BindingKind::Output);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].element_id, "g1");
    }

    #[test]
    fn test_find_scoped_and_unmatched() {
        let mut registry = BindingRegistry::new();
        registry
            .register_input(BindingDescriptor::input("text", ".text-plus"), text_binding())
            .unwrap();

        let mut doc = Document::new();
        doc.push(Element::new("a").with_child(Element::new("t1").with_class("text-plus")));
        doc.push(Element::new("b").with_child(Element::new("t2").with_class("text-plus")));

        let scoped = registry.find(&doc, "b", BindingKind::Input);
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].element_id, "t2");
        assert!(registry.find(&doc, "missing", BindingKind::Input).is_empty());
    }
}
