//! Two-phase extension hooks.
//!
//! Listeners run in registration order. During the build phase a listener
//! sees the plan and the filter about to be compiled, before the filter's
//! joins exist, and may reshape the plan; stopping propagation suppresses
//! later listeners along with the default joins and predicate for that key.
//! Joins a listener adds are still subject to the visibility gate. During
//! the apply phase a listener sees the parameter slots of one key and may
//! supply bind values; stopping propagation suppresses later listeners and
//! default binding, and every slot must then be bound by the listener.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use super::compiler::Bindings;
use super::normalizer::NormalizedFilter;
use super::plan::{ParamSlot, QueryPlan};
use crate::error::Result;

/// Build-phase event for one criteria key.
pub struct BuildEvent<'a> {
    pub plan: &'a mut QueryPlan,
    pub filter: &'a NormalizedFilter,
    stopped: bool,
}

impl<'a> BuildEvent<'a> {
    pub fn new(plan: &'a mut QueryPlan, filter: &'a NormalizedFilter) -> Self {
        Self {
            plan,
            filter,
            stopped: false,
        }
    }

    /// Criteria key.
    pub fn key(&self) -> &str {
        &self.filter.key
    }

    pub fn stop_propagation(&mut self) {
        self.stopped = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.stopped
    }
}

/// Apply-phase event for the parameter slots of one key.
pub struct ApplyEvent<'a> {
    pub key: &'a str,
    pub slots: &'a [ParamSlot],
    pub bindings: &'a mut Bindings,
    stopped: bool,
}

impl<'a> ApplyEvent<'a> {
    pub fn new(key: &'a str, slots: &'a [ParamSlot], bindings: &'a mut Bindings) -> Self {
        Self {
            key,
            slots,
            bindings,
            stopped: false,
        }
    }

    pub fn stop_propagation(&mut self) {
        self.stopped = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.stopped
    }
}

/// An extension hooked into query compilation.
pub trait QueryListener: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Called before the default predicate for a key is added.
    fn on_build(&self, _event: &mut BuildEvent<'_>) -> Result<()> {
        Ok(())
    }

    /// Called before the slots of a key are bound.
    fn on_apply(&self, _event: &mut ApplyEvent<'_>) -> Result<()> {
        Ok(())
    }
}

/// Ordered listener list.
#[derive(Clone, Default)]
pub struct HookBus {
    listeners: Vec<Arc<dyn QueryListener>>,
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener.
    pub fn subscribe(&mut self, listener: Arc<dyn QueryListener>) {
        self.listeners.push(listener);
    }

    pub fn with_listener(mut self, listener: Arc<dyn QueryListener>) -> Self {
        self.subscribe(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Dispatch a build event. Returns whether propagation was stopped.
    pub fn dispatch_build(&self, event: &mut BuildEvent<'_>) -> Result<bool> {
        for listener in &self.listeners {
            listener.on_build(event)?;
            if event.is_propagation_stopped() {
                warn!(
                    listener = listener.name(),
                    key = event.key(),
                    "default predicate suppressed by listener"
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Dispatch an apply event. Returns whether propagation was stopped.
    pub fn dispatch_apply(&self, event: &mut ApplyEvent<'_>) -> Result<bool> {
        for listener in &self.listeners {
            listener.on_apply(event)?;
            if event.is_propagation_stopped() {
                warn!(
                    listener = listener.name(),
                    key = event.key,
                    "default binding suppressed by listener"
                );
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl fmt::Debug for HookBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.listeners.iter().map(|l| l.name()).collect();
        f.debug_struct("HookBus").field("listeners", &names).finish()
    }
}
