//! Bidirectional message bus between the page and the host
//!
//! Outbound (client -> host): value messages on a crossbeam channel, in send
//! order per channel name. A message may carry a coercion tag (`type_hint`)
//! selecting a named host-side codec, and an `Event` priority asking the
//! host to flush immediately instead of batching.
//!
//! Inbound (host -> client): named custom messages dispatched synchronously
//! to at most one handler per type. Re-registering a type replaces the
//! previous handler (last writer wins; documented, but callers should not
//! lean on it). Unknown types are logged and dropped, never fatal.

use std::collections::HashMap;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use serde_json::Value;

use crate::binding::EventSink;
use crate::error::{BridgeError, Result};
use crate::instances::InstanceRegistry;
use crate::types::Priority;

/// Options for an outbound value message.
#[derive(Debug, Clone, Default)]
pub struct SendOpts {
    /// Coercion tag: the host decodes the payload through this named codec
    /// instead of default type inference
    pub type_hint: Option<String>,
    pub priority: Priority,
}

impl SendOpts {
    pub fn with_type_hint(mut self, hint: impl Into<String>) -> Self {
        self.type_hint = Some(hint.into());
        self
    }

    pub fn event_priority(mut self) -> Self {
        self.priority = Priority::Event;
        self
    }
}

/// One client -> host value message.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueMessage {
    /// Channel name, conventionally the element id (plus `_suffix` for
    /// widget-originated events)
    pub name: String,
    pub type_hint: Option<String>,
    pub value: Value,
    pub priority: Priority,
}

impl ValueMessage {
    /// The field key the host sees: `name` or `name:type_hint`
    pub fn wire_key(&self) -> String {
        match &self.type_hint {
            Some(hint) => format!("{}:{}", self.name, hint),
            None => self.name.clone(),
        }
    }
}

/// Context handed to inbound message handlers. Gives the out-of-band
/// command path read access to live widget instances and a way to send
/// values back without borrowing the bus itself.
pub struct HandlerCtx<'a> {
    pub instances: &'a mut InstanceRegistry,
    sender: Sender<ValueMessage>,
}

impl HandlerCtx<'_> {
    pub fn send_value(&self, name: impl Into<String>, value: Value, opts: SendOpts) -> Result<()> {
        send_on(&self.sender, name.into(), value, opts)
    }

    /// Sink for forwarding widget events from within a handler
    pub fn event_sink(&self, element_id: impl Into<String>) -> BusEventSink {
        BusEventSink {
            element_id: element_id.into(),
            sender: self.sender.clone(),
        }
    }
}

/// [`EventSink`] that writes widget events onto the outbound channel as
/// `{element_id}_{suffix}` value messages.
pub struct BusEventSink {
    element_id: String,
    sender: Sender<ValueMessage>,
}

impl BusEventSink {
    pub fn new(element_id: impl Into<String>, sender: Sender<ValueMessage>) -> Self {
        Self {
            element_id: element_id.into(),
            sender,
        }
    }
}

impl EventSink for BusEventSink {
    fn emit(&mut self, suffix: &str, value: Value, opts: SendOpts) {
        let name = format!("{}_{}", self.element_id, suffix);
        if let Err(e) = send_on(&self.sender, name, value, opts) {
            tracing::error!(element = %self.element_id, error = %e, "dropping widget event");
        }
    }
}

/// Handler for one inbound message type.
pub type HostHandler = Box<dyn FnMut(&mut HandlerCtx<'_>, &Value) -> Result<()>>;

/// The host's end of the outbound value channel
pub type HostReceiver = Receiver<ValueMessage>;

/// The bus. Owns the inbound handler table and the outbound sender; the
/// host side holds the matching receiver.
pub struct MessageBus {
    handlers: HashMap<String, HostHandler>,
    sender: Sender<ValueMessage>,
}

impl MessageBus {
    /// Build the bus and the host-side receiver. `capacity: None` gives an
    /// unbounded channel.
    pub fn new(capacity: Option<usize>) -> (Self, HostReceiver) {
        let (sender, receiver) = match capacity {
            Some(n) => bounded(n),
            None => unbounded(),
        };
        (
            Self {
                handlers: HashMap::new(),
                sender,
            },
            receiver,
        )
    }

    /// Register the handler for `msg_type`. Returns true when a previous
    /// handler was replaced (last writer wins).
    pub fn on_host_message(&mut self, msg_type: impl Into<String>, handler: HostHandler) -> bool {
        let msg_type = msg_type.into();
        let replaced = self.handlers.insert(msg_type.clone(), handler).is_some();
        if replaced {
            tracing::warn!(msg_type = %msg_type, "replacing existing message handler");
        }
        replaced
    }

    /// Dispatch an inbound message synchronously. Unknown types and handler
    /// failures are contained: logged, dropped, never propagated.
    pub fn dispatch(
        &mut self,
        msg_type: &str,
        payload: &Value,
        instances: &mut InstanceRegistry,
    ) -> bool {
        let Some(handler) = self.handlers.get_mut(msg_type) else {
            let err = BridgeError::UnknownMessageType(msg_type.to_string());
            tracing::warn!(msg_type = %msg_type, "{err}, dropping message");
            return false;
        };
        let mut ctx = HandlerCtx {
            instances,
            sender: self.sender.clone(),
        };
        if let Err(e) = handler(&mut ctx, payload) {
            tracing::error!(msg_type = %msg_type, error = %e, "message handler failed");
        }
        true
    }

    /// Transmit a value to the host.
    pub fn send_value(&self, name: impl Into<String>, value: Value, opts: SendOpts) -> Result<()> {
        send_on(&self.sender, name.into(), value, opts)
    }

    /// Clone of the outbound sender, for adapters that emit directly
    pub fn sender(&self) -> Sender<ValueMessage> {
        self.sender.clone()
    }
}

pub(crate) fn send_on(
    sender: &Sender<ValueMessage>,
    name: String,
    value: Value,
    opts: SendOpts,
) -> Result<()> {
    let message = ValueMessage {
        name,
        type_hint: opts.type_hint,
        value,
        priority: opts.priority,
    };
    // Never block the bridge thread on a full channel; the emission is
    // skipped instead.
    match sender.try_send(message) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(dropped)) => {
            tracing::warn!(name = %dropped.name, "outbound channel full, dropping value message");
            Ok(())
        }
        Err(TrySendError::Disconnected(_)) => {
            Err(BridgeError::Channel("outbound channel closed".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_send_order_is_preserved_per_channel() {
        let (bus, rx) = MessageBus::new(None);
        for i in 0..3 {
            bus.send_value("slider1", json!(i), SendOpts::default()).unwrap();
        }
        let got: Vec<i64> = rx.try_iter().map(|m| m.value.as_i64().unwrap()).collect();
        assert_eq!(got, vec![0, 1, 2]);
    }

    #[test]
    fn test_wire_key_with_and_without_hint() {
        let (bus, rx) = MessageBus::new(None);
        bus.send_value("classification", json!(42), SendOpts::default().with_type_hint("class"))
            .unwrap();
        bus.send_value("classification", json!(42), SendOpts::default())
            .unwrap();
        let tagged = rx.recv().unwrap();
        let untagged = rx.recv().unwrap();
        assert_eq!(tagged.wire_key(), "classification:class");
        assert_eq!(untagged.wire_key(), "classification");
    }

    #[test]
    fn test_full_bounded_channel_skips_the_emission() {
        let (bus, rx) = MessageBus::new(Some(1));
        bus.send_value("slider1", json!(1), SendOpts::default()).unwrap();
        // Channel full: the second send is skipped, never blocked on.
        bus.send_value("slider1", json!(2), SendOpts::default()).unwrap();
        let got: Vec<i64> = rx.try_iter().map(|m| m.value.as_i64().unwrap()).collect();
        assert_eq!(got, vec![1]);
    }

    #[test]
    fn test_closed_channel_is_a_channel_error() {
        let (bus, rx) = MessageBus::new(None);
        drop(rx);
        let err = bus
            .send_value("slider1", json!(1), SendOpts::default())
            .unwrap_err();
        assert!(matches!(err, BridgeError::Channel(_)));
    }

    #[test]
    fn test_event_priority_is_carried() {
        let (bus, rx) = MessageBus::new(None);
        bus.send_value("secret", json!(true), SendOpts::default().event_priority())
            .unwrap();
        assert_eq!(rx.recv().unwrap().priority, Priority::Event);
    }

    #[test]
    fn test_unknown_type_is_dropped_not_fatal() {
        let (mut bus, _rx) = MessageBus::new(None);
        let mut instances = InstanceRegistry::new();
        assert!(!bus.dispatch("no-such-type", &json!({}), &mut instances));
    }

    #[test]
    fn test_last_writer_wins_registration() {
        let (mut bus, rx) = MessageBus::new(None);
        let mut instances = InstanceRegistry::new();
        bus.on_host_message(
            "ping",
            Box::new(|ctx, _| ctx.send_value("pong", json!(1), SendOpts::default())),
        );
        let replaced = bus.on_host_message(
            "ping",
            Box::new(|ctx, _| ctx.send_value("pong", json!(2), SendOpts::default())),
        );
        assert!(replaced);
        assert!(bus.dispatch("ping", &json!({}), &mut instances));
        assert_eq!(rx.recv().unwrap().value, json!(2));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_handler_failure_is_contained() {
        let (mut bus, _rx) = MessageBus::new(None);
        let mut instances = InstanceRegistry::new();
        bus.on_host_message(
            "boom",
            Box::new(|_, _| Err(BridgeError::Widget("controller exploded".into()))),
        );
        // Handled (and logged); the bus stays usable.
        assert!(bus.dispatch("boom", &json!({}), &mut instances));
        assert!(bus.dispatch("boom", &json!({}), &mut instances));
    }
}
