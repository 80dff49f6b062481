//! Error handling for the uibridge-rs library
//!
//! This module defines custom error types and a Result alias for use
//! throughout the bridge. The propagation policy is containment: a failure
//! in one render or one message stays scoped to that operation and never
//! tears down the registry or unrelated element adapters.

use thiserror::Error;

/// Main error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A descriptor with the same kind and name is already registered
    #[error("Duplicate binding '{name}' for kind {kind}")]
    DuplicateBinding { kind: &'static str, name: String },

    /// A descriptor failed registration-time validation
    #[error("Invalid binding descriptor: {0}")]
    InvalidDescriptor(String),

    /// A render payload is missing required fields or is structurally wrong
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// No live widget instance is published for the element
    #[error("No widget instance for element '{element_id}'")]
    InstanceNotFound { element_id: String },

    /// An inbound message type has no registered handler
    #[error("Unknown message type '{0}'")]
    UnknownMessageType(String),

    /// A value message could not be decoded through the selected codec
    #[error("Coercion failure for codec '{codec}': {message}")]
    CoercionFailure { codec: String, message: String },

    /// The named binding is not registered
    #[error("Unknown binding '{0}'")]
    UnknownBinding(String),

    /// The element id does not exist in the document or is not bound
    #[error("Element '{0}' not found")]
    ElementNotFound(String),

    /// A control value does not match the type its descriptor declares
    #[error("Type mismatch for element '{element_id}': expected {expected}, got {actual}")]
    TypeMismatch {
        element_id: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// An element already has an active change subscription
    #[error("Element '{0}' is already subscribed")]
    AlreadySubscribed(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// Errors raised by a widget controller during init/update/command
    #[error("Widget error: {0}")]
    Widget(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<BridgeError>,
    },
}

impl BridgeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        BridgeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an instance-not-found error for an element
    pub fn instance_not_found(element_id: impl Into<String>) -> Self {
        BridgeError::InstanceNotFound {
            element_id: element_id.into(),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
