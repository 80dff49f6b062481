//! Input binding adapter: change subscriptions and rate-limited forwarding
//!
//! One active subscription per element. A [`SubscriptionHandle`] is an
//! explicit cancellable token: `cancel` is idempotent and a cancelled handle
//! can never be re-armed, so deterministic teardown does not depend on
//! removing listeners by selector string.
//!
//! Rate policies:
//! - `Immediate` forwards every change synchronously.
//! - `Throttle(d)` forwards on the leading edge, then at most once per `d`
//!   window, coalescing intermediate changes to the latest value. The window
//!   re-arms from its own close time, so windows stay back-to-back while
//!   changes keep arriving.
//! - `Debounce(d)` forwards one trailing value after `d` of quiescence.
//!
//! A skipped emission (cancelled timer, closed channel) drops at most the
//! one in-flight value; it is never duplicated.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use crossbeam_channel::Sender;

use crate::bus::{send_on, SendOpts, ValueMessage};
use crate::error::{BridgeError, Result};
use crate::scheduler::{Scheduler, TimerId, TimerTask};
use crate::types::{ElementId, InputValue, RateMode, RatePolicy};

/// Cancellable token for one change subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    active: Rc<Cell<bool>>,
}

impl SubscriptionHandle {
    fn new() -> Self {
        Self {
            active: Rc::new(Cell::new(true)),
        }
    }

    /// Stop forwarding. Idempotent; the handle cannot be re-armed.
    pub fn cancel(&self) {
        self.active.set(false);
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

#[derive(Debug)]
enum Limiter {
    Immediate,
    Throttle {
        window: Option<TimerId>,
        pending: Option<InputValue>,
    },
    Debounce {
        timer: Option<TimerId>,
        pending: Option<InputValue>,
    },
}

impl Limiter {
    fn for_policy(policy: RatePolicy) -> Self {
        match policy.mode {
            RateMode::Immediate => Limiter::Immediate,
            RateMode::Throttle => Limiter::Throttle {
                window: None,
                pending: None,
            },
            RateMode::Debounce => Limiter::Debounce {
                timer: None,
                pending: None,
            },
        }
    }

    fn timer(&self) -> Option<TimerId> {
        match self {
            Limiter::Immediate => None,
            Limiter::Throttle { window, .. } => *window,
            Limiter::Debounce { timer, .. } => *timer,
        }
    }
}

#[derive(Debug)]
struct Subscription {
    policy: RatePolicy,
    active: Rc<Cell<bool>>,
    limiter: Limiter,
}

/// Adapter owning every input subscription and its rate-limiter state.
#[derive(Debug, Default)]
pub struct InputAdapter {
    subs: HashMap<ElementId, Subscription>,
}

impl InputAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the change listener for `element_id`. Fails when an active
    /// subscription already exists; a cancelled one is replaced.
    pub fn subscribe(
        &mut self,
        element_id: &ElementId,
        policy: RatePolicy,
    ) -> Result<SubscriptionHandle> {
        if self
            .subs
            .get(element_id)
            .is_some_and(|s| s.active.get())
        {
            return Err(BridgeError::AlreadySubscribed(element_id.clone()));
        }
        let handle = SubscriptionHandle::new();
        self.subs.insert(
            element_id.clone(),
            Subscription {
                policy,
                active: handle.active.clone(),
                limiter: Limiter::for_policy(policy),
            },
        );
        tracing::debug!(element = %element_id, mode = ?policy.mode, "input subscribed");
        Ok(handle)
    }

    /// Remove the listener and cancel any pending rate timer. Safe to call
    /// when already unsubscribed.
    pub fn unsubscribe(&mut self, element_id: &str, scheduler: &mut Scheduler) {
        if let Some(sub) = self.subs.remove(element_id) {
            sub.active.set(false);
            if let Some(timer) = sub.limiter.timer() {
                scheduler.cancel(timer);
            }
            tracing::debug!(element = %element_id, "input unsubscribed");
        }
    }

    pub fn is_subscribed(&self, element_id: &str) -> bool {
        self.subs
            .get(element_id)
            .is_some_and(|s| s.active.get())
    }

    /// The change notification path: called for native change events and
    /// programmatic `set_value` alike. Unsubscribed elements forward nothing.
    pub fn on_change(
        &mut self,
        element_id: &ElementId,
        value: InputValue,
        scheduler: &mut Scheduler,
        sender: &Sender<ValueMessage>,
    ) -> Result<()> {
        let Some(sub) = self.subs.get_mut(element_id) else {
            return Ok(());
        };
        if !sub.active.get() {
            return Ok(());
        }
        let delay = sub.policy.delay();
        match &mut sub.limiter {
            Limiter::Immediate => forward(element_id, value, sender)?,
            Limiter::Throttle { window, pending } => {
                if window.is_none() {
                    forward(element_id, value, sender)?;
                    *window = Some(scheduler.schedule(
                        delay,
                        TimerTask::RateFlush {
                            element_id: element_id.clone(),
                        },
                    ));
                } else {
                    *pending = Some(value);
                }
            }
            Limiter::Debounce { timer, pending } => {
                if let Some(old) = timer.take() {
                    scheduler.cancel(old);
                }
                *pending = Some(value);
                *timer = Some(scheduler.schedule(
                    delay,
                    TimerTask::RateFlush {
                        element_id: element_id.clone(),
                    },
                ));
            }
        }
        Ok(())
    }

    /// Rate-window resumption, driven by the scheduler pump. `due` is the
    /// fire time, used to re-arm throttle windows back-to-back.
    pub fn on_timer(
        &mut self,
        element_id: &str,
        due: std::time::Duration,
        scheduler: &mut Scheduler,
        sender: &Sender<ValueMessage>,
    ) -> Result<()> {
        let Some(sub) = self.subs.get_mut(element_id) else {
            return Ok(());
        };
        if !sub.active.get() {
            return Ok(());
        }
        let delay = sub.policy.delay();
        match &mut sub.limiter {
            Limiter::Immediate => {}
            Limiter::Throttle { window, pending } => match pending.take() {
                Some(value) => {
                    forward(&element_id.to_string(), value, sender)?;
                    *window = Some(scheduler.schedule_at(
                        due + delay,
                        TimerTask::RateFlush {
                            element_id: element_id.to_string(),
                        },
                    ));
                }
                None => *window = None,
            },
            Limiter::Debounce { timer, pending } => {
                *timer = None;
                if let Some(value) = pending.take() {
                    forward(&element_id.to_string(), value, sender)?;
                }
            }
        }
        Ok(())
    }
}

fn forward(element_id: &ElementId, value: InputValue, sender: &Sender<ValueMessage>) -> Result<()> {
    send_on(sender, element_id.clone(), value.to_json(), SendOpts::default())
}
