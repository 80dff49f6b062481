//! Counting and recording doubles for widget controllers

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{json, Value};
use uibridge_rs::{
    BridgeError, ElementId, EventSink, OutputBinding, Result, SendOpts, WidgetController,
};

/// Shared counters observing every controller a [`CountingBinding`] creates.
#[derive(Clone, Default)]
pub struct ControllerProbe {
    pub creates: Rc<Cell<usize>>,
    pub inits: Rc<Cell<usize>>,
    pub updates: Rc<Cell<usize>>,
    pub resizes: Rc<RefCell<Vec<(u32, u32)>>>,
    pub commands: Rc<RefCell<Vec<Value>>>,
    pub last_payload: Rc<RefCell<Option<Value>>>,
}

/// Output binding whose controllers count lifecycle calls through a probe.
pub struct CountingBinding {
    pub probe: ControllerProbe,
    pub updatable: bool,
    /// Emit `{id}_picked` with the payload's "value" on every command
    pub echo_commands: bool,
    /// Fail initialization, for containment tests
    pub fail_init: bool,
    pub required: Vec<&'static str>,
}

impl CountingBinding {
    pub fn new(updatable: bool) -> Self {
        Self {
            probe: ControllerProbe::default(),
            updatable,
            echo_commands: false,
            fail_init: false,
            required: Vec::new(),
        }
    }

    pub fn with_required(mut self, fields: Vec<&'static str>) -> Self {
        self.required = fields;
        self
    }
}

impl OutputBinding for CountingBinding {
    fn create(&self, _element_id: &ElementId) -> Box<dyn WidgetController> {
        self.probe.creates.set(self.probe.creates.get() + 1);
        Box::new(CountingController {
            probe: self.probe.clone(),
            updatable: self.updatable,
            echo_commands: self.echo_commands,
            fail_init: self.fail_init,
        })
    }

    fn required_fields(&self) -> &[&'static str] {
        &self.required
    }
}

pub struct CountingController {
    probe: ControllerProbe,
    updatable: bool,
    echo_commands: bool,
    fail_init: bool,
}

impl WidgetController for CountingController {
    fn initialize(&mut self, payload: &Value, _events: &mut dyn EventSink) -> Result<()> {
        if self.fail_init {
            return Err(BridgeError::Widget("init refused".to_string()));
        }
        self.probe.inits.set(self.probe.inits.get() + 1);
        *self.probe.last_payload.borrow_mut() = Some(payload.clone());
        Ok(())
    }

    fn supports_update(&self) -> bool {
        self.updatable
    }

    fn update(&mut self, payload: &Value, _events: &mut dyn EventSink) -> Result<()> {
        self.probe.updates.set(self.probe.updates.get() + 1);
        *self.probe.last_payload.borrow_mut() = Some(payload.clone());
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.probe.resizes.borrow_mut().push((width, height));
    }

    fn handle_command(&mut self, payload: &Value, events: &mut dyn EventSink) -> Result<()> {
        self.probe.commands.borrow_mut().push(payload.clone());
        if self.echo_commands {
            let value = payload.get("value").cloned().unwrap_or(json!(null));
            events.emit("picked", value, SendOpts::default());
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
