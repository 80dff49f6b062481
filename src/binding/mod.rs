//! Binding traits: the explicit contracts behind input and output bindings
//!
//! Where the original page scripts attached duck-typed objects
//! (`find/getValue/setValue/subscribe/...`) to global registries, this
//! module pins those method sets down as traits. Required methods are
//! enforced by the compiler; optional capabilities are declared in the
//! descriptor and validated at registration time, not at call time.
//!
//! Dispatch is polymorphic via vtable.

pub mod input;
pub mod output;

use std::any::Any;

use serde_json::Value;

use crate::bus::SendOpts;
use crate::dom::Element;
use crate::error::Result;
use crate::types::{ElementId, InputValue, InputValueKind, RatePolicy};

pub use input::{InputAdapter, SubscriptionHandle};
pub use output::{OutputAdapter, RenderOutcome, RenderState, WidgetInstance};

/// Where widget-originated events go. Controllers receive a sink during
/// init/update/command and may forward events upstream as input values
/// keyed `{element_id}_{suffix}` (the `el.id + '_selected'` convention).
pub trait EventSink {
    fn emit(&mut self, suffix: &str, value: Value, opts: SendOpts);
}

/// The live, stateful wrapper around one third-party component instance.
///
/// `initialize` runs exactly once per element; repeated host pushes go
/// through `update` when [`supports_update`](WidgetController::supports_update)
/// is true and are otherwise ignored, leaving the old rendering in place.
pub trait WidgetController: Any {
    /// First-render initialization. Called once per element lifetime.
    fn initialize(&mut self, payload: &Value, events: &mut dyn EventSink) -> Result<()>;

    /// Whether the component has an incremental-update path
    fn supports_update(&self) -> bool {
        false
    }

    /// Feed a subsequent payload through the component's own update path
    fn update(&mut self, _payload: &Value, _events: &mut dyn EventSink) -> Result<()> {
        Ok(())
    }

    /// Apply new layout dimensions
    fn resize(&mut self, _width: u32, _height: u32) {}

    /// Out-of-band host command targeted at this instance by element id
    fn handle_command(&mut self, _payload: &Value, _events: &mut dyn EventSink) -> Result<()> {
        Ok(())
    }

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Factory contract for output bindings: one controller per matched element.
pub trait OutputBinding {
    /// Construct the controller for a freshly bound element
    fn create(&self, element_id: &ElementId) -> Box<dyn WidgetController>;

    /// Payload fields that must be present; a missing field aborts the
    /// render with a malformed-payload error before the controller runs.
    fn required_fields(&self) -> &[&'static str] {
        &[]
    }
}

/// Value access contract for input bindings.
///
/// The default implementations read and write [`Element::value`] with a
/// kind check; bindings whose value lives elsewhere (an attribute, derived
/// text) override `read`/`write`.
pub trait InputBinding {
    /// The value type this binding declares
    fn value_kind(&self) -> InputValueKind;

    /// Read the control's current value
    fn read(&self, element: &Element) -> Result<InputValue> {
        let value = element
            .value
            .clone()
            .ok_or_else(|| crate::error::BridgeError::ElementNotFound(element.id.clone()))?;
        check_kind(&element.id, self.value_kind(), value)
    }

    /// Write a value into the control. The adapter triggers the change
    /// notification path afterwards, so host and control state never diverge.
    fn write(&self, element: &mut Element, value: InputValue) -> Result<()> {
        let value = check_kind(&element.id, self.value_kind(), value)?;
        element.value = Some(value);
        Ok(())
    }

    /// Static rate policy for this binding
    fn rate_policy(&self) -> RatePolicy {
        RatePolicy::immediate()
    }

    /// Apply a host-pushed partial update. Unrecognized fields are ignored;
    /// returns whether the control value changed (the adapter then runs the
    /// change path, as `setValue(...).change()` did in the original scripts).
    fn receive_message(&self, element: &mut Element, data: &Value) -> Result<bool> {
        let Some(raw) = data.get("value") else {
            return Ok(false);
        };
        match InputValue::from_json(self.value_kind(), raw) {
            Some(value) => {
                self.write(element, value)?;
                Ok(true)
            }
            None => {
                tracing::warn!(
                    element = %element.id,
                    expected = self.value_kind().label(),
                    "ignoring receive_message value of mismatched type"
                );
                Ok(false)
            }
        }
    }
}

fn check_kind(
    element_id: &str,
    expected: InputValueKind,
    value: InputValue,
) -> Result<InputValue> {
    if value.kind() == expected {
        Ok(value)
    } else {
        Err(crate::error::BridgeError::TypeMismatch {
            element_id: element_id.to_string(),
            expected: expected.label(),
            actual: value.kind().label(),
        })
    }
}

/// A plain value-backed input binding, enough for controls whose state is
/// entirely in [`Element::value`] (switches, text fields, numerics).
#[derive(Debug, Clone)]
pub struct ValueInputBinding {
    kind: InputValueKind,
    policy: RatePolicy,
}

impl ValueInputBinding {
    pub fn new(kind: InputValueKind) -> Self {
        Self {
            kind,
            policy: RatePolicy::immediate(),
        }
    }

    pub fn with_rate_policy(mut self, policy: RatePolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl InputBinding for ValueInputBinding {
    fn value_kind(&self) -> InputValueKind {
        self.kind
    }

    fn rate_policy(&self) -> RatePolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_read_write_round_trip() {
        let binding = ValueInputBinding::new(InputValueKind::Text);
        let mut el = Element::new("t1").with_value("abc");
        assert_eq!(binding.read(&el).unwrap(), InputValue::Text("abc".into()));
        binding.write(&mut el, InputValue::Text("xyz".into())).unwrap();
        assert_eq!(binding.read(&el).unwrap(), InputValue::Text("xyz".into()));
    }

    #[test]
    fn test_kind_mismatch_is_an_error() {
        let binding = ValueInputBinding::new(InputValueKind::Bool);
        let mut el = Element::new("s1").with_value(true);
        let err = binding.write(&mut el, InputValue::Number(1.0)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::BridgeError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_receive_message_applies_value_and_ignores_rest() {
        let binding = ValueInputBinding::new(InputValueKind::Bool);
        let mut el = Element::new("s1").with_value(false);
        let changed = binding
            .receive_message(&mut el, &serde_json::json!({"value": true, "label": "On"}))
            .unwrap();
        assert!(changed);
        assert_eq!(el.value, Some(InputValue::Bool(true)));
    }

    #[test]
    fn test_receive_message_without_value_is_noop() {
        let binding = ValueInputBinding::new(InputValueKind::Bool);
        let mut el = Element::new("s1").with_value(false);
        let changed = binding
            .receive_message(&mut el, &serde_json::json!({"label": "On"}))
            .unwrap();
        assert!(!changed);
        assert_eq!(el.value, Some(InputValue::Bool(false)));
    }
}
