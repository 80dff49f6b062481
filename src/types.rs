//! Core data types for the binding bridge
//!
//! This module contains the fundamental data structures shared across the
//! registry, adapters and the message bus.
//!
//! # Main Types
//!
//! - [`BindingKind`] - Whether a binding carries values into or out of the host
//! - [`Capability`] / [`CapabilitySet`] - The method set a descriptor declares
//! - [`InputValue`] - The three control value types (bool, string, number)
//! - [`RatePolicy`] - How often input changes are forwarded upstream
//! - [`Priority`] - Normal (batched) vs Event (immediate flush) delivery
//! - [`BridgeConfig`] - Tunables for channel capacity and pending queues

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identity of a document element. Element ids are the keys for widget
/// instances, subscriptions and outbound value channels.
pub type ElementId = String;

/// Whether a binding carries values from the host into the page (Output)
/// or from user interaction back to the host (Input).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingKind {
    Input,
    Output,
}

impl BindingKind {
    /// Short label used in error messages and logs
    pub fn label(&self) -> &'static str {
        match self {
            BindingKind::Input => "input",
            BindingKind::Output => "output",
        }
    }
}

/// A single capability a binding descriptor may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Capability {
    GetValue = 0,
    SetValue = 1,
    Subscribe = 2,
    RatePolicy = 3,
    ReceiveMessage = 4,
    GetInstance = 5,
}

impl Capability {
    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// A set of [`Capability`] flags, validated against the binding kind at
/// registration time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    /// Empty capability set
    pub fn new() -> Self {
        Self(0)
    }

    /// Builder-style insertion
    pub fn with(mut self, cap: Capability) -> Self {
        self.0 |= cap.bit();
        self
    }

    /// Membership test
    pub fn contains(&self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    /// Whether this set is a superset of `other`
    pub fn contains_all(&self, other: CapabilitySet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether this set shares no capability with `other`
    pub fn is_disjoint(&self, other: CapabilitySet) -> bool {
        self.0 & other.0 == 0
    }

    /// The default set for an input binding: value access plus change
    /// subscription, the minimum `register` accepts for that kind.
    pub fn input_defaults() -> Self {
        Self::new()
            .with(Capability::GetValue)
            .with(Capability::SetValue)
            .with(Capability::Subscribe)
    }

    /// The default set for an output binding.
    pub fn output_defaults() -> Self {
        Self::new().with(Capability::GetInstance)
    }
}

/// The type a control value is declared as, per descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InputValueKind {
    Bool,
    #[default]
    Text,
    Number,
}

impl InputValueKind {
    pub fn label(&self) -> &'static str {
        match self {
            InputValueKind::Bool => "bool",
            InputValueKind::Text => "text",
            InputValueKind::Number => "number",
        }
    }
}

/// A typed control value. Input bindings read and write these; the message
/// bus serializes them to JSON for the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Bool(bool),
    Text(String),
    Number(f64),
}

impl InputValue {
    /// The kind of this value
    pub fn kind(&self) -> InputValueKind {
        match self {
            InputValue::Bool(_) => InputValueKind::Bool,
            InputValue::Text(_) => InputValueKind::Text,
            InputValue::Number(_) => InputValueKind::Number,
        }
    }

    /// Convert to a JSON value for outbound transmission
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            InputValue::Bool(b) => serde_json::Value::Bool(*b),
            InputValue::Text(s) => serde_json::Value::String(s.clone()),
            InputValue::Number(n) => serde_json::json!(n),
        }
    }

    /// Interpret a JSON value as a control value of the given kind.
    /// Returns `None` when the JSON shape does not match.
    pub fn from_json(kind: InputValueKind, value: &serde_json::Value) -> Option<InputValue> {
        match kind {
            InputValueKind::Bool => value.as_bool().map(InputValue::Bool),
            InputValueKind::Text => value.as_str().map(|s| InputValue::Text(s.to_string())),
            InputValueKind::Number => value.as_f64().map(InputValue::Number),
        }
    }
}

impl From<bool> for InputValue {
    fn from(v: bool) -> Self {
        InputValue::Bool(v)
    }
}

impl From<&str> for InputValue {
    fn from(v: &str) -> Self {
        InputValue::Text(v.to_string())
    }
}

impl From<f64> for InputValue {
    fn from(v: f64) -> Self {
        InputValue::Number(v)
    }
}

/// When a locally observed change is forwarded upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RateMode {
    /// Forward every change synchronously
    #[default]
    Immediate,
    /// At most one emission per delay window, coalescing to the latest value
    Throttle,
    /// One trailing emission after a quiet period, carrying the final value
    Debounce,
}

/// Rate policy attached to an input binding. Static per descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RatePolicy {
    pub mode: RateMode,
    /// Window / quiescence length in milliseconds. Ignored for Immediate.
    pub delay_ms: u64,
}

impl RatePolicy {
    pub fn immediate() -> Self {
        Self {
            mode: RateMode::Immediate,
            delay_ms: 0,
        }
    }

    pub fn throttle(delay_ms: u64) -> Self {
        Self {
            mode: RateMode::Throttle,
            delay_ms,
        }
    }

    pub fn debounce(delay_ms: u64) -> Self {
        Self {
            mode: RateMode::Debounce,
            delay_ms,
        }
    }

    /// Delay as a [`Duration`]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Delivery priority for outbound value messages.
///
/// `Event` asks the host to flush the message immediately instead of
/// batching it with the next scheduled update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    Event,
}

/// Tunables for the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Capacity of the outbound value channel. `None` means unbounded.
    pub outbound_capacity: Option<usize>,
    /// Maximum render payloads queued per element while a dependency load
    /// is in flight. The oldest payload is dropped (with a warning) when
    /// the queue overflows.
    pub max_pending_renders: usize,
    /// Delay applied when a descriptor declares the RatePolicy capability
    /// but its binding keeps the default policy.
    pub default_rate_delay_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: None,
            max_pending_renders: 16,
            default_rate_delay_ms: 250,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_set_membership() {
        let caps = CapabilitySet::new()
            .with(Capability::GetValue)
            .with(Capability::Subscribe);
        assert!(caps.contains(Capability::GetValue));
        assert!(caps.contains(Capability::Subscribe));
        assert!(!caps.contains(Capability::GetInstance));
        assert!(caps.is_disjoint(CapabilitySet::new().with(Capability::GetInstance)));
    }

    #[test]
    fn test_input_defaults_are_superset_of_required() {
        let required = CapabilitySet::new()
            .with(Capability::GetValue)
            .with(Capability::SetValue)
            .with(Capability::Subscribe);
        assert!(CapabilitySet::input_defaults().contains_all(required));
    }

    #[test]
    fn test_input_value_json_round_trip() {
        let v = InputValue::Number(42.0);
        let json = v.to_json();
        assert_eq!(InputValue::from_json(InputValueKind::Number, &json), Some(v));
        assert_eq!(InputValue::from_json(InputValueKind::Bool, &json), None);
    }

    #[test]
    fn test_rate_policy_delay() {
        let policy = RatePolicy::throttle(1000);
        assert_eq!(policy.delay(), Duration::from_millis(1000));
        assert_eq!(RatePolicy::immediate().mode, RateMode::Immediate);
    }
}
