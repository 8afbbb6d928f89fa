//! Pump traits and the emission sequence they produce.
//!
//! A [`Pump`] is pure transformation logic: it turns input items into a
//! sequence of output elements and knows nothing about pause bookkeeping,
//! buffering or delivery order; all of that is the owning tube's job. If you
//! want to modify flow *control* rather than flow *contents*, implement
//! [`Drain`](crate::flow::Drain) directly instead and put it in the chain.
//!
//! # Emissions
//!
//! Each pump callback returns an [`Emission`]: zero or more elements, each of
//! which is a finished item, a [`Later`] that resolves to an item, or a
//! terminal fault. The tube delivers the elements downstream strictly in
//! order, suspending on unresolved laters and splicing their values back into
//! place when they arrive.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::flow::{FlowError, StopReason};
use crate::later::Later;
use crate::tube::TubeHandle;

/// One element of an [`Emission`].
pub enum Emitted<T: 'static> {
    /// A finished output item.
    Item(T),
    /// An output item that has not resolved yet. Delivery of everything after
    /// it waits until it resolves, preserving order.
    Later(Later<T>),
    /// A terminal data error. The flow is stopped and the error forwarded
    /// downstream as a failing [`StopReason`]; nothing after it is delivered.
    Fault(FlowError),
}

enum Inner<T: 'static> {
    Ready(VecDeque<Emitted<T>>),
    Lazy(Box<dyn Iterator<Item = Emitted<T>>>),
}

/// The output of one pump callback: a lazily consumed sequence of
/// [`Emitted`] elements.
///
/// Mirrors the usual shapes a transformation produces:
///
/// ```rust
/// use siphon::pump::Emission;
///
/// // No output (input was consumed or filtered).
/// let none = Emission::<u32>::none();
///
/// // Exactly one output item.
/// let one = Emission::single(7u32);
///
/// // Several output items from one input.
/// let many: Emission<u32> = vec![1, 2, 3].into();
/// assert_eq!(many.count(), 3);
/// # drop((none, one));
/// ```
pub struct Emission<T: 'static> {
    inner: Inner<T>,
}

impl<T: 'static> Emission<T> {
    /// An empty emission: no output, nothing pending.
    pub fn none() -> Self {
        Self {
            inner: Inner::Ready(VecDeque::new()),
        }
    }

    /// Emit exactly one item.
    pub fn single(item: T) -> Self {
        let mut queue = VecDeque::with_capacity(1);
        queue.push_back(Emitted::Item(item));
        Self {
            inner: Inner::Ready(queue),
        }
    }

    /// Emit one element that resolves later.
    pub fn later(value: Later<T>) -> Self {
        let mut queue = VecDeque::with_capacity(1);
        queue.push_back(Emitted::Later(value));
        Self {
            inner: Inner::Ready(queue),
        }
    }

    /// A terminal data error: stop the flow with this failure.
    pub fn fault(error: impl std::error::Error + 'static) -> Self {
        let mut queue = VecDeque::with_capacity(1);
        queue.push_back(Emitted::Fault(Rc::new(error)));
        Self {
            inner: Inner::Ready(queue),
        }
    }

    /// A lazily evaluated emission; elements are pulled one at a time as the
    /// downstream accepts them.
    pub fn lazy(elements: impl Iterator<Item = Emitted<T>> + 'static) -> Self {
        Self {
            inner: Inner::Lazy(Box::new(elements)),
        }
    }

    /// Append a terminal fault after the items already queued.
    ///
    /// Used by framing pumps that can still deliver everything parsed before
    /// the malformed region.
    pub fn and_fault(self, error: impl std::error::Error + 'static) -> Self {
        let fault = Emitted::Fault(Rc::new(error) as FlowError);
        match self.inner {
            Inner::Ready(mut queue) => {
                queue.push_back(fault);
                Self {
                    inner: Inner::Ready(queue),
                }
            }
            Inner::Lazy(iter) => Self {
                inner: Inner::Lazy(Box::new(iter.chain(std::iter::once(fault)))),
            },
        }
    }
}

impl<T: 'static> Default for Emission<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T: 'static> From<Vec<T>> for Emission<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            inner: Inner::Ready(items.into_iter().map(Emitted::Item).collect()),
        }
    }
}

impl<T: 'static> From<Option<T>> for Emission<T> {
    fn from(item: Option<T>) -> Self {
        match item {
            Some(item) => Self::single(item),
            None => Self::none(),
        }
    }
}

impl<T: 'static> FromIterator<T> for Emission<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            inner: Inner::Ready(iter.into_iter().map(Emitted::Item).collect()),
        }
    }
}

impl<T: 'static> Iterator for Emission<T> {
    type Item = Emitted<T>;

    fn next(&mut self) -> Option<Emitted<T>> {
        match &mut self.inner {
            Inner::Ready(queue) => queue.pop_front(),
            Inner::Lazy(iter) => iter.next(),
        }
    }
}

/// A transformation stage owned by a tube.
///
/// The owning tube invokes the lifecycle hooks at the matching points of the
/// flow: `started` once when the upstream attaches, `received` per input
/// item, `progressed` on out-of-band progress, `stopped` when the upstream
/// ends. Output elements returned from `started`/`received`/`stopped` are
/// delivered downstream, in order, before any later notification.
pub trait Pump {
    /// The type of item this pump consumes.
    type Input: 'static;
    /// The type of item this pump produces.
    type Output: 'static;

    /// The flow has started; `received` may be called from now on.
    fn started(&mut self) -> Emission<Self::Output> {
        Emission::none()
    }

    /// An input item arrived from upstream.
    fn received(&mut self, item: Self::Input) -> Emission<Self::Output>;

    /// Out-of-band progress was reported by the upstream.
    fn progressed(&mut self, _amount: Option<f32>) {}

    /// The upstream flow has ended. Output emitted here is delivered before
    /// the stop notification is forwarded downstream.
    fn stopped(&mut self, _reason: &StopReason) -> Emission<Self::Output> {
        Emission::none()
    }

    /// This pump is now owned by `tube`.
    ///
    /// A pump belongs to at most one tube at a time; the handle lets the pump
    /// reach its own tube, e.g. to [`switch`](TubeHandle::switch) it.
    fn attached(&mut self, _tube: TubeHandle<Self::Input, Self::Output>) {}

    /// This pump was replaced and no longer belongs to its tube.
    fn detached(&mut self) {}

    /// A short name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A pump that can reverse its transformation well enough to hand unconsumed
/// input over to a successor.
///
/// Required for mid-stream switching: when a tube is switched away from, the
/// output elements it had buffered but not yet delivered are passed to
/// [`reassemble`](SwitchablePump::reassemble), and the result is fed to the
/// new drain before normal flow resumes.
pub trait SwitchablePump: Pump {
    /// Reverse the transformation for `data`, the buffered-but-undelivered
    /// output items, returning input-shaped items for the new drain.
    ///
    /// The result does not need to be byte-identical to the original input as
    /// long as feeding it through `received` again would reproduce `data`.
    /// Input the pump itself buffered internally without yet producing output
    /// must be included as well.
    fn reassemble(&mut self, data: Vec<Self::Output>) -> Vec<Self::Input>;
}
