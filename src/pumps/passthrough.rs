//! PassThrough pump - forwards items unchanged.

use std::marker::PhantomData;

use crate::pump::{Emission, Pump, SwitchablePump};

/// A pump that forwards every item unchanged.
///
/// Useful as a placeholder stage, for exercising pipeline plumbing in tests,
/// and as the simplest possible switchable stage (its reassembly is the
/// identity).
pub struct PassThrough<T> {
    _marker: PhantomData<T>,
}

impl<T> PassThrough<T> {
    /// Create a new pass-through pump.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for PassThrough<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Pump for PassThrough<T> {
    type Input = T;
    type Output = T;

    fn received(&mut self, item: T) -> Emission<T> {
        Emission::single(item)
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

impl<T: 'static> SwitchablePump for PassThrough<T> {
    fn reassemble(&mut self, data: Vec<T>) -> Vec<T> {
        data
    }
}
