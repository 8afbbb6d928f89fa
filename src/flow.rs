//! Core flow-graph contracts: founts produce, drains consume.
//!
//! A pipeline is a strictly linear chain of founts feeding drains. Data moves
//! left to right through [`Drain::receive`]; backpressure moves right to left
//! as [`Pause`] tokens obtained from [`Fount::pause_flow`]. Termination is a
//! single channel: [`Drain::flow_stopped`] carries a [`StopReason`], whether
//! the flow ended cleanly or failed.
//!
//! # Design
//!
//! Everything here is single-threaded and cooperative. Handles are `Rc`-based
//! and deliberately not `Send`; all delivery happens synchronously on the
//! call stack of whatever external event produced the first item. See the
//! crate root for the full scheduling model.

use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::pause::Pause;

/// An application error carried by a failing flow.
///
/// Reference-counted so a single failure can be observed at several points of
/// a pipeline without cloning the underlying error.
pub type FlowError = Rc<dyn std::error::Error>;

/// Why a flow came to an end.
///
/// This is the only failure channel in the core: there is no error path
/// separate from "the flow stopped, and here is why".
#[derive(Clone, Debug)]
pub enum StopReason {
    /// The flow ended cleanly; the producer has nothing more to deliver.
    End,
    /// The flow terminated because of the carried error.
    Failed(FlowError),
}

impl StopReason {
    /// Build a failing stop reason from any error value.
    pub fn failed(error: impl std::error::Error + 'static) -> Self {
        Self::Failed(Rc::new(error))
    }

    /// Whether this is a clean end of flow.
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// The carried error, if the flow failed.
    pub fn error(&self) -> Option<&FlowError> {
        match self {
            Self::End => None,
            Self::Failed(error) => Some(error),
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::End => write!(f, "end of flow"),
            Self::Failed(error) => write!(f, "flow failed: {error}"),
        }
    }
}

/// Outcome of attaching a drain to a fount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wired {
    /// The drain is attached and will receive this fount's output.
    Flowing,
    /// The fount is permanently exhausted; the drain was not attached and its
    /// `flowing_from` was not invoked.
    Exhausted,
}

/// A producer of items.
///
/// A fount flows to at most one drain at a time and supports backpressure
/// (pause/resume via [`Pause`] tokens) and one-way cancellation
/// ([`stop_flow`](Fount::stop_flow)).
pub trait Fount {
    /// The type of item this fount produces.
    type Item: 'static;

    /// Attach a drain to consume this fount's output.
    ///
    /// Synchronously notifies the drain via
    /// [`flowing_from`](Drain::flowing_from), unless the fount is exhausted
    /// and will never produce again; in that case `Ok(Wired::Exhausted)` is
    /// returned and the drain is not notified.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyDraining`](crate::Error::AlreadyDraining) if a drain
    /// is already attached. Use [`redirect`](Fount::redirect) to re-point a
    /// flowing fount.
    fn flow_to(&self, drain: Rc<dyn Drain<Item = Self::Item>>) -> Result<Wired>;

    /// Detach the current drain, if any, and attach a new one in its place.
    ///
    /// This is the re-pointing operation behind mid-stream switching: future
    /// output goes to `drain`, the previous drain is simply no longer fed
    /// (it does *not* get a `flow_stopped`).
    fn redirect(&self, drain: Rc<dyn Drain<Item = Self::Item>>) -> Result<Wired>;

    /// Register one reason to suppress delivery.
    ///
    /// Delivery resumes once every outstanding token has been unpaused.
    fn pause_flow(&self) -> Pause;

    /// Request that this fount never deliver again.
    ///
    /// One-way and permanent. After this call the fount must not invoke
    /// anything on its drain except a final
    /// [`flow_stopped`](Drain::flow_stopped) once its own resources wind
    /// down.
    fn stop_flow(&self);
}

/// A consumer of items.
pub trait Drain {
    /// The type of item this drain accepts.
    type Item: 'static;

    /// Notification that `fount` will be feeding this drain from now on.
    fn flowing_from(&self, fount: Rc<dyn Fount<Item = Self::Item>>);

    /// Deliver one item.
    ///
    /// Returns a fullness estimate for the buffers between this drain and
    /// real processing, nominally in `0.0..=1.0`. Values above `1.0` mean
    /// the producer should really stop for a while; producers should treat
    /// out-of-range values as "unknown".
    fn receive(&self, item: Self::Item) -> f32;

    /// Out-of-band progress notification.
    ///
    /// Called when work is happening at a lower level but no finished item is
    /// ready yet, so that consumers implementing their own timeout logic can
    /// tell a slow flow from a dead one. `amount`, when given, estimates
    /// progress towards the next `receive` in `0.0..=1.0`; the core itself
    /// performs no time-based logic.
    fn progress(&self, amount: Option<f32>);

    /// Terminal notification: the flow has stopped for the given reason.
    ///
    /// After this call the upstream fount will issue no further calls to this
    /// drain, and this drain must stop invoking its fount.
    fn flow_stopped(&self, reason: StopReason);
}
