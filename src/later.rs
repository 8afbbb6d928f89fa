//! Values that resolve later.
//!
//! A pump may produce an output element whose value is not known yet, for
//! example because it is being fetched from elsewhere. [`Later`] is the
//! minimal interop surface the flow core needs for that: a single-shot value
//! with "run this callback with the eventual outcome" semantics. It imposes
//! no executor; whatever owns the matching [`Resolver`] (an async task, a
//! reactor callback, plain test code) resolves it from its own call stack.
//!
//! The outcome is either the value or an error; a failed outcome terminates
//! the flow it was spliced into (see the crate-level notes on failure).

use std::cell::RefCell;
use std::rc::Rc;

use crate::flow::FlowError;

/// The eventual outcome of a [`Later`]: the value, or the error it failed with.
pub type Outcome<T> = std::result::Result<T, FlowError>;

type Callback<T> = Box<dyn FnOnce(Outcome<T>)>;

enum State<T: 'static> {
    /// Not resolved; a callback may be parked here waiting.
    Waiting(Option<Callback<T>>),
    /// Resolved before anyone registered a callback.
    Ready(Option<Outcome<T>>),
    /// Resolved and the outcome has been handed over.
    Delivered,
}

/// A single-shot value that may not have resolved yet.
///
/// Created with [`later`], or pre-resolved with [`Later::succeed`] /
/// [`Later::failed`]. Cloning shares the same underlying slot.
pub struct Later<T: 'static> {
    state: Rc<RefCell<State<T>>>,
}

impl<T: 'static> Clone for Later<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

/// The write half of a [`Later`]; resolving consumes it, so a value can only
/// be resolved once.
pub struct Resolver<T: 'static> {
    state: Rc<RefCell<State<T>>>,
}

/// Create an unresolved value and the resolver that will complete it.
pub fn later<T: 'static>() -> (Resolver<T>, Later<T>) {
    let state = Rc::new(RefCell::new(State::Waiting(None)));
    (
        Resolver {
            state: Rc::clone(&state),
        },
        Later { state },
    )
}

impl<T: 'static> Later<T> {
    /// A value that has already resolved successfully.
    pub fn succeed(value: T) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Ready(Some(Ok(value))))),
        }
    }

    /// A value that has already resolved to a failure.
    pub fn failed(error: impl std::error::Error + 'static) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Ready(Some(Err(Rc::new(error)))))),
        }
    }

    /// Register the continuation to run with the eventual outcome.
    ///
    /// If the value has already resolved, the callback runs synchronously on
    /// this call stack. At most one callback may be registered.
    pub fn when_ready(&self, callback: impl FnOnce(Outcome<T>) + 'static) {
        let ready = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                State::Ready(outcome) => {
                    let outcome = outcome.take();
                    *state = State::Delivered;
                    outcome
                }
                _ => None,
            }
        };
        match ready {
            // Invoked outside the borrow so the continuation may do anything,
            // including touching this Later again.
            Some(outcome) => callback(outcome),
            None => {
                let mut state = self.state.borrow_mut();
                if let State::Waiting(slot) = &mut *state {
                    debug_assert!(slot.is_none(), "second callback registered on Later");
                    *slot = Some(Box::new(callback));
                }
            }
        }
    }

    /// Whether the value has resolved (whether or not it was handed over).
    pub fn is_resolved(&self) -> bool {
        !matches!(&*self.state.borrow(), State::Waiting(_))
    }

    /// Take the outcome now if it has already resolved.
    ///
    /// Used when a pipeline is being re-pointed and cannot wait.
    pub fn take_now(&self) -> Option<Outcome<T>> {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            State::Ready(outcome) => {
                let outcome = outcome.take();
                *state = State::Delivered;
                outcome
            }
            _ => None,
        }
    }
}

impl<T: 'static> Resolver<T> {
    /// Resolve the value successfully.
    pub fn resolve(self, value: T) {
        self.finish(Ok(value));
    }

    /// Resolve the value to a failure.
    pub fn fail(self, error: impl std::error::Error + 'static) {
        self.finish(Err(Rc::new(error) as FlowError));
    }

    fn finish(self, outcome: Outcome<T>) {
        let callback = {
            let mut state = self.state.borrow_mut();
            match std::mem::replace(&mut *state, State::Delivered) {
                State::Waiting(Some(cb)) => Some(cb),
                State::Waiting(None) => {
                    *state = State::Ready(Some(outcome));
                    return;
                }
                other => {
                    // Resolver is consumed on use, so this cannot recur.
                    *state = other;
                    return;
                }
            }
        };
        if let Some(cb) = callback {
            cb(outcome);
        }
    }
}
