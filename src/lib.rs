//! # uibridge-rs: client-side widget binding and messaging bridge
//!
//! The glue that lets third-party interactive components (charts, globes,
//! detectors, custom controls) participate in a reactive host application's
//! data flow. The host pushes rendered values into the page; interactive
//! controls push user- and device-generated values back.
//!
//! ## Architecture
//!
//! - **Registry & scanner**: named binding descriptors (selector plus
//!   capability set) resolved against a headless element tree in document
//!   order
//! - **Output adapter**: one widget instance per element, initialized once
//!   and updated in place on repeated host pushes, with dependency-resource
//!   gating before renders
//! - **Input adapter**: typed value access, cancellable change
//!   subscriptions, and rate-limited forwarding (immediate / throttle /
//!   debounce)
//! - **Message bus**: inbound named messages to registered handlers,
//!   outbound value messages over a crossbeam channel with coercion tags
//!   and event priority
//! - **Instance registry**: weak references to live widgets so out-of-band
//!   host commands reach an already-rendered widget by element id
//!
//! Everything runs on one logical thread: operations are handlers invoked
//! by an external event source, and timers schedule future resumptions
//! through an explicitly pumped scheduler instead of blocking.
//!
//! ## Example
//!
//! ```
//! use uibridge_rs::{
//!     binding::ValueInputBinding,
//!     bridge::Bridge,
//!     dom::{Document, Element},
//!     registry::BindingDescriptor,
//!     types::{BridgeConfig, InputValue, InputValueKind},
//! };
//!
//! let (mut bridge, host_rx) = Bridge::new(BridgeConfig::default());
//! bridge
//!     .register_input_binding(
//!         BindingDescriptor::input("switch", ".switch-input"),
//!         Box::new(ValueInputBinding::new(InputValueKind::Bool)),
//!     )
//!     .unwrap();
//!
//! let mut doc = Document::new();
//! doc.push(Element::new("s1").with_class("switch-input").with_value(false));
//! bridge.bind_scope(&doc, "document").unwrap();
//!
//! bridge.set_value(&mut doc, "s1", InputValue::Bool(true)).unwrap();
//! assert_eq!(host_rx.recv().unwrap().name, "s1");
//! ```

pub mod binding;
pub mod bridge;
pub mod bus;
pub mod codec;
pub mod dom;
pub mod error;
pub mod instances;
pub mod registry;
pub mod resources;
pub mod scheduler;
pub mod types;

// Re-export commonly used types
pub use binding::{
    EventSink, InputAdapter, InputBinding, OutputAdapter, OutputBinding, RenderOutcome,
    RenderState, SubscriptionHandle, ValueInputBinding, WidgetController, WidgetInstance,
};
pub use bridge::Bridge;
pub use bus::{HostReceiver, MessageBus, SendOpts, ValueMessage};
pub use codec::{CodecRegistry, DecodedValue};
pub use dom::{Document, Element};
pub use error::{BridgeError, Result};
pub use instances::InstanceRegistry;
pub use registry::{BindingDescriptor, BindingRegistry};
pub use resources::{DeferredLoader, InstantLoader, ResourceDep, ResourceKind, ResourceLoader};
pub use types::{
    BindingKind, BridgeConfig, Capability, CapabilitySet, ElementId, InputValue, InputValueKind,
    Priority, RateMode, RatePolicy,
};
