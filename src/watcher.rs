//! Observer protocol for value and bound changes.
//!
//! The outer solver's constraint objects register to be told about every
//! assignment and bound change of the variables they care about. The tableau
//! holds watchers as weak, non-owning references; keeping the watcher alive
//! and de-registering it before teardown is the client's responsibility.
//!
//! Callbacks receive a [`TableauAccess`] view of the engine. The view exposes
//! queries and bound tightening only, so a watcher can never re-enter growth
//! or pivot primitives from inside a notification.

use crate::VarId;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::rc::{Rc, Weak};

/// The slice of the tableau a watcher may touch from inside a callback.
pub trait TableauAccess {
    /// Number of equality rows.
    fn get_m(&self) -> usize;
    /// Total number of variables.
    fn get_n(&self) -> usize;
    /// Lower bound of a variable.
    fn get_lower_bound(&self, variable: VarId) -> f64;
    /// Upper bound of a variable.
    fn get_upper_bound(&self, variable: VarId) -> f64;
    /// True iff the variable is currently basic.
    fn is_basic(&self, variable: VarId) -> bool;
    /// False once some variable's bounds have crossed.
    fn all_bounds_valid(&self) -> bool;
    /// Raise a lower bound if the new value is strictly greater.
    fn tighten_lower_bound(&mut self, variable: VarId, value: f64);
    /// Lower an upper bound if the new value is strictly smaller.
    fn tighten_upper_bound(&mut self, variable: VarId, value: f64);
}

/// Callbacks delivered on value and bound changes.
///
/// All methods default to no-ops so a watcher only implements the events it
/// cares about. Implementations use interior mutability to record state; the
/// tableau treats the callbacks as non-failing.
pub trait VariableWatcher {
    /// The variable was assigned a new value.
    fn notify_variable_value(&self, tableau: &mut dyn TableauAccess, variable: VarId, value: f64) {
        let _ = (tableau, variable, value);
    }

    /// The variable's lower bound changed.
    fn notify_lower_bound(&self, tableau: &mut dyn TableauAccess, variable: VarId, bound: f64) {
        let _ = (tableau, variable, bound);
    }

    /// The variable's upper bound changed.
    fn notify_upper_bound(&self, tableau: &mut dyn TableauAccess, variable: VarId, bound: f64) {
        let _ = (tableau, variable, bound);
    }
}

pub(crate) type WatcherRef = Weak<dyn VariableWatcher>;

/// Registered watchers: one global list plus a per-variable map.
#[derive(Default)]
pub(crate) struct WatcherRegistry {
    global: Vec<WatcherRef>,
    per_variable: FxHashMap<VarId, SmallVec<[WatcherRef; 2]>>,
}

impl WatcherRegistry {
    pub(crate) fn register(&mut self, watcher: &Rc<dyn VariableWatcher>, variable: VarId) {
        self.per_variable
            .entry(variable)
            .or_default()
            .push(Rc::downgrade(watcher));
    }

    pub(crate) fn unregister(&mut self, watcher: &Rc<dyn VariableWatcher>, variable: VarId) {
        let target = Rc::downgrade(watcher);
        if let Some(list) = self.per_variable.get_mut(&variable) {
            list.retain(|w| !Weak::ptr_eq(w, &target));
        }
    }

    pub(crate) fn register_global(&mut self, watcher: &Rc<dyn VariableWatcher>) {
        self.global.push(Rc::downgrade(watcher));
    }

    /// Dispatch targets for one event: global watchers first, then the
    /// variable's own, each in registration order. The list is cloned out so
    /// callbacks may re-enter the registry.
    pub(crate) fn collect(&self, variable: VarId) -> SmallVec<[WatcherRef; 4]> {
        let mut targets: SmallVec<[WatcherRef; 4]> = self.global.iter().cloned().collect();
        if let Some(list) = self.per_variable.get(&variable) {
            targets.extend(list.iter().cloned());
        }
        targets
    }
}
