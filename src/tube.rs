//! The tube: pairing a pump with fount/drain views and doing all the
//! flow-control bookkeeping on its behalf.
//!
//! A [`Tube`] owns exactly one [`Pump`] and exposes one [`TubeDrain`] (its
//! input side) and one [`TubeFount`] (its output side). The views are thin
//! facades over the tube's shared state; everything interesting lives in the
//! delivery loop:
//!
//! - output from a pump callback is drained downstream strictly in order,
//!   through a pending queue guarded against re-entrant draining;
//! - an unresolved [`Later`] in the output suspends delivery, pauses the
//!   upstream, and splices its value back at the front of the remainder when
//!   it resolves;
//! - pausing the tube's fount transparently pauses the tube's own upstream,
//!   so backpressure compounds through a pipeline with no pump involvement;
//! - a stop notification is forwarded only after every produced item (sync
//!   or async) has been delivered;
//! - a switchable tube can be re-pointed mid-stream, handing its undelivered
//!   buffer to the new drain via [`SwitchablePump::reassemble`].
//!
//! Everything is single-threaded and cooperative; the `unbuffering` flag is a
//! re-entrancy guard for one logical thread of control, not a lock.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::error::{Error, Result};
use crate::flow::{Drain, FlowError, Fount, StopReason, Wired};
use crate::later::Later;
use crate::pause::{Pause, Pauser};
use crate::pump::{Emission, Emitted, Pump, SwitchablePump};

// ============================================================================
// Progress relay policy
// ============================================================================

/// When a tube forwards an out-of-band `progress` notification downstream
/// after a `receive` call.
///
/// The default forwards one only when the pump consumed input without
/// producing output, signalling "work happened, nothing finished yet" to
/// downstream timeout logic without implying more data arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressPolicy {
    /// Relay progress only when a `receive` produced no output items.
    #[default]
    WhenNoOutput,
    /// Relay progress after every `receive`.
    Always,
    /// Never relay progress.
    Never,
}

// ============================================================================
// Internal state
// ============================================================================

enum PumpHolder<In: 'static, Out: 'static> {
    Plain(Box<dyn Pump<Input = In, Output = Out>>),
    Switchable(Box<dyn SwitchablePump<Input = In, Output = Out>>),
}

impl<In: 'static, Out: 'static> PumpHolder<In, Out> {
    fn name(&self) -> &str {
        match self {
            Self::Plain(p) => p.name(),
            Self::Switchable(p) => p.name(),
        }
    }

    fn started(&mut self) -> Emission<Out> {
        match self {
            Self::Plain(p) => p.started(),
            Self::Switchable(p) => p.started(),
        }
    }

    fn received(&mut self, item: In) -> Emission<Out> {
        match self {
            Self::Plain(p) => p.received(item),
            Self::Switchable(p) => p.received(item),
        }
    }

    fn progressed(&mut self, amount: Option<f32>) {
        match self {
            Self::Plain(p) => p.progressed(amount),
            Self::Switchable(p) => p.progressed(amount),
        }
    }

    fn stopped(&mut self, reason: &StopReason) -> Emission<Out> {
        match self {
            Self::Plain(p) => p.stopped(reason),
            Self::Switchable(p) => p.stopped(reason),
        }
    }

    fn attached(&mut self, handle: TubeHandle<In, Out>) {
        match self {
            Self::Plain(p) => p.attached(handle),
            Self::Switchable(p) => p.attached(handle),
        }
    }

    fn detached(&mut self) {
        match self {
            Self::Plain(p) => p.detached(),
            Self::Switchable(p) => p.detached(),
        }
    }

    fn reassemble(&mut self, data: Vec<Out>) -> Option<Vec<In>> {
        match self {
            Self::Plain(_) => None,
            Self::Switchable(p) => Some(p.reassemble(data)),
        }
    }
}

/// Work items serialized through the tube when a delivery is in flight.
enum Work<In> {
    Started,
    Input(In),
    Stop(StopReason),
}

struct TubeCore<In: 'static, Out: 'static> {
    /// Taken out of the slot while one of its callbacks runs.
    pump: Option<PumpHolder<In, Out>>,
    switchable: bool,
    upstream: Option<Rc<dyn Fount<Item = In>>>,
    downstream: Option<Rc<dyn Drain<Item = Out>>>,
    /// Pauses against this tube's fount view; edges translate to pauses
    /// against the upstream fount.
    pauser: Rc<Pauser>,
    /// Resolved async results spliced ahead of the suspended emission.
    prefix: VecDeque<Out>,
    /// The in-progress lazy output of the last pump callback.
    pending: Option<Emission<Out>>,
    /// Inputs (and the stop notice) that arrived mid-delivery, FIFO.
    queued: VecDeque<Work<In>>,
    unbuffering: bool,
    /// An unresolved Later is holding up delivery.
    awaiting: bool,
    pause_because_no_drain: Option<Pause>,
    pause_because_paused: Option<Pause>,
    started: bool,
    /// Downstream called `stop_flow`; sticky, replayed onto late upstreams.
    flow_was_stopped: bool,
    /// Upstream called `flow_stopped`; duplicates are ignored.
    stop_received: bool,
    /// Stop reason ready to forward once the pending output drains.
    stop_staged: Option<StopReason>,
    stop_forwarded: bool,
    last_fullness: f32,
    progress_policy: ProgressPolicy,
}

type CoreRef<In, Out> = Rc<RefCell<TubeCore<In, Out>>>;

impl<In: 'static, Out: 'static> TubeCore<In, Out> {
    fn has_undelivered(&self) -> bool {
        !self.prefix.is_empty() || self.pending.is_some()
    }
}

// ============================================================================
// Pause plumbing: fount-side pauses compound onto the upstream fount
// ============================================================================

fn actually_pause<In: 'static, Out: 'static>(weak: &Weak<RefCell<TubeCore<In, Out>>>) {
    let Some(core) = weak.upgrade() else { return };
    let upstream = {
        let c = core.borrow();
        if c.pause_because_paused.is_some() {
            None
        } else {
            c.upstream.clone()
        }
    };
    if let Some(upstream) = upstream {
        let pause = upstream.pause_flow();
        core.borrow_mut().pause_because_paused = Some(pause);
    }
}

fn actually_resume<In: 'static, Out: 'static>(weak: &Weak<RefCell<TubeCore<In, Out>>>) {
    let Some(core) = weak.upgrade() else { return };
    let pause = core.borrow_mut().pause_because_paused.take();
    // Flush buffered output before the upstream starts pushing again, so
    // FIFO order at the tube boundary is preserved.
    unbuffer(&core);
    if let Some(pause) = pause {
        let _ = pause.unpause();
    }
}

// ============================================================================
// The delivery loop
// ============================================================================

/// Enqueue one unit of pump work and drive the delivery loop.
///
/// Returns the number of items delivered downstream before returning; zero
/// when the work was serialized behind an in-flight delivery or suspended on
/// an asynchronous value.
fn deliver_from<In: 'static, Out: 'static>(core: &CoreRef<In, Out>, work: Work<In>) -> usize {
    core.borrow_mut().queued.push_back(work);
    unbuffer(core)
}

enum Step<In: 'static, Out: 'static> {
    Deliver(Out, Rc<dyn Drain<Item = Out>>),
    Pull,
    Run(Work<In>),
    AcquireNoDrain(Rc<dyn Fount<Item = In>>),
    ForwardStop(StopReason, Rc<dyn Drain<Item = Out>>),
    Done,
}

/// Drive the pending delivery until it is exhausted, blocked, or pre-empted.
///
/// Re-entrant invocations are no-ops: a synchronous resume inside the loop
/// must not recurse into a second drain of the same tube.
fn unbuffer<In: 'static, Out: 'static>(core: &CoreRef<In, Out>) -> usize {
    {
        let mut c = core.borrow_mut();
        if c.unbuffering {
            return 0;
        }
        c.unbuffering = true;
    }
    let mut delivered = 0usize;
    loop {
        // Decide the next step with the state borrowed, then act on it with
        // the borrow released: every outward call below may re-enter.
        let step = {
            let mut guard = core.borrow_mut();
            let c = &mut *guard;
            if c.pauser.is_paused() || c.awaiting {
                Step::Done
            } else if c.flow_was_stopped {
                // Told to stop from below: undelivered output is dropped, but
                // the pump still hears `stopped` and the terminal notice is
                // still forwarded exactly once.
                c.prefix.clear();
                c.pending = None;
                c.queued.retain(|work| matches!(work, Work::Stop(_)));
                if let Some(work) = c.queued.pop_front() {
                    Step::Run(work)
                } else if let Some(reason) = c.stop_staged.take() {
                    match &c.downstream {
                        Some(d) => Step::ForwardStop(reason, Rc::clone(d)),
                        None => {
                            c.stop_staged = Some(reason);
                            Step::Done
                        }
                    }
                } else {
                    Step::Done
                }
            } else if c.has_undelivered() {
                match &c.downstream {
                    None => {
                        if c.prefix.is_empty() {
                            // Find out whether the emission holds anything
                            // before holding the upstream hostage for it.
                            Step::Pull
                        } else {
                            match (&c.pause_because_no_drain, &c.upstream) {
                                (None, Some(upstream)) => {
                                    Step::AcquireNoDrain(Rc::clone(upstream))
                                }
                                _ => Step::Done,
                            }
                        }
                    }
                    Some(d) => match c.prefix.pop_front() {
                        Some(item) => Step::Deliver(item, Rc::clone(d)),
                        None => Step::Pull,
                    },
                }
            } else if let Some(work) = c.queued.pop_front() {
                Step::Run(work)
            } else if let Some(reason) = c.stop_staged.take() {
                match &c.downstream {
                    Some(d) => Step::ForwardStop(reason, Rc::clone(d)),
                    None => {
                        // Hold the notice until a drain attaches.
                        c.stop_staged = Some(reason);
                        Step::Done
                    }
                }
            } else {
                Step::Done
            }
        };
        match step {
            Step::Done => break,
            Step::Deliver(item, drain) => {
                let fullness = drain.receive(item);
                delivered += 1;
                core.borrow_mut().last_fullness = fullness;
            }
            Step::Pull => {
                // The emission may be lazy user code; pull with the state
                // released and put the remainder back afterwards.
                let mut pending = core.borrow_mut().pending.take();
                let element = pending.as_mut().and_then(Iterator::next);
                match element {
                    None => {} // exhausted; pending stays empty
                    Some(element) => {
                        core.borrow_mut().pending = pending;
                        match element {
                            Emitted::Item(item) => core.borrow_mut().prefix.push_back(item),
                            Emitted::Later(value) => register_later(core, value),
                            Emitted::Fault(error) => {
                                fail_flow(core, error, None);
                                break;
                            }
                        }
                    }
                }
            }
            Step::Run(work) => {
                let mut pump = core.borrow_mut().pump.take();
                let Some(p) = pump.as_mut() else {
                    // A callback on the pump is running higher in the stack;
                    // put the work back and let that caller re-drive us.
                    core.borrow_mut().queued.push_front(work);
                    break;
                };
                let emission = match work {
                    Work::Started => p.started(),
                    Work::Input(item) => p.received(item),
                    Work::Stop(reason) => {
                        let emission = p.stopped(&reason);
                        core.borrow_mut().stop_staged = Some(reason);
                        emission
                    }
                };
                let mut c = core.borrow_mut();
                c.pump = pump;
                if !c.flow_was_stopped {
                    c.pending = Some(emission);
                }
            }
            Step::AcquireNoDrain(upstream) => {
                // Output with nowhere to go: hold the upstream until a drain
                // attaches instead of building an unbounded backlog.
                let pause = upstream.pause_flow();
                let mut c = core.borrow_mut();
                if c.pause_because_no_drain.is_none() {
                    c.pause_because_no_drain = Some(pause);
                } else {
                    drop(c);
                    let _ = pause.unpause();
                }
                break;
            }
            Step::ForwardStop(reason, drain) => {
                core.borrow_mut().stop_forwarded = true;
                tracing::debug!(reason = %reason, "forwarding flow_stopped downstream");
                drain.flow_stopped(reason);
                // The flow is over; break the wiring cycles.
                let tokens = {
                    let mut c = core.borrow_mut();
                    c.upstream = None;
                    c.downstream = None;
                    (c.pause_because_no_drain.take(), c.pause_because_paused.take())
                };
                if let Some(pause) = tokens.0 {
                    let _ = pause.unpause();
                }
                if let Some(pause) = tokens.1 {
                    let _ = pause.unpause();
                }
            }
        }
    }
    core.borrow_mut().unbuffering = false;
    delivered
}

/// Suspend delivery on an unresolved value: pause the upstream, and when the
/// value arrives splice it at the front of the remaining output.
fn register_later<In: 'static, Out: 'static>(core: &CoreRef<In, Out>, value: Later<Out>) {
    let upstream = core.borrow().upstream.clone();
    let pause = upstream.map(|u| u.pause_flow());
    core.borrow_mut().awaiting = true;
    let weak = Rc::downgrade(core);
    value.when_ready(move |outcome| {
        let Some(core) = weak.upgrade() else {
            if let Some(pause) = pause {
                let _ = pause.unpause();
            }
            return;
        };
        match outcome {
            Ok(item) => {
                {
                    let mut c = core.borrow_mut();
                    c.awaiting = false;
                    c.prefix.push_front(item);
                }
                // Deliver the spliced value (and anything behind it) before
                // letting the upstream push more input.
                unbuffer(&core);
                if let Some(pause) = pause {
                    let _ = pause.unpause();
                }
            }
            Err(error) => {
                core.borrow_mut().awaiting = false;
                fail_flow(&core, error, pause);
            }
        }
    });
}

/// A failed asynchronous value (or a pump fault) terminates the flow: the
/// upstream is stopped and the failure travels downstream as the stop reason.
fn fail_flow<In: 'static, Out: 'static>(
    core: &CoreRef<In, Out>,
    error: FlowError,
    pause: Option<Pause>,
) {
    tracing::error!(error = %error, "emission failed; stopping flow");
    let (upstream, downstream, tokens) = {
        let mut c = core.borrow_mut();
        c.prefix.clear();
        c.pending = None;
        c.queued.clear();
        c.stop_staged = None;
        c.stop_forwarded = true;
        let tokens = (c.pause_because_no_drain.take(), c.pause_because_paused.take());
        (c.upstream.take(), c.downstream.take(), tokens)
    };
    if let Some(pause) = pause {
        let _ = pause.unpause();
    }
    if let Some(pause) = tokens.0 {
        let _ = pause.unpause();
    }
    if let Some(pause) = tokens.1 {
        let _ = pause.unpause();
    }
    if let Some(upstream) = upstream {
        upstream.stop_flow();
    }
    if let Some(downstream) = downstream {
        downstream.flow_stopped(StopReason::Failed(error));
    }
}

// ============================================================================
// Views
// ============================================================================

/// The input side of a tube; attach it to a fount.
pub struct TubeDrain<In: 'static, Out: 'static> {
    core: CoreRef<In, Out>,
}

impl<In: 'static, Out: 'static> Drain for TubeDrain<In, Out> {
    type Item = In;

    fn flowing_from(&self, fount: Rc<dyn Fount<Item = In>>) {
        let was_stopped = {
            let mut c = self.core.borrow_mut();
            if c.upstream.is_some() {
                tracing::debug!("tube drain re-wired; pauses against the old upstream are abandoned");
            }
            // Tokens held against the old upstream are dropped, not moved.
            c.pause_because_no_drain.take();
            c.pause_because_paused.take();
            c.upstream = Some(Rc::clone(&fount));
            c.flow_was_stopped || c.stop_forwarded
        };
        if was_stopped {
            // Torn down from below before being wired from above: refuse.
            fount.stop_flow();
            return;
        }
        // An outstanding pause survives re-wiring: assert it against the new
        // upstream before anything can flow.
        let pauser = Rc::clone(&self.core.borrow().pauser);
        if pauser.is_paused() {
            let pause = fount.pause_flow();
            self.core.borrow_mut().pause_because_paused = Some(pause);
        }
        let needs_no_drain_pause = {
            let c = self.core.borrow();
            c.downstream.is_none() && c.has_undelivered()
        };
        if needs_no_drain_pause {
            let pause = fount.pause_flow();
            self.core.borrow_mut().pause_because_no_drain = Some(pause);
        }
        let start = {
            let mut c = self.core.borrow_mut();
            !std::mem::replace(&mut c.started, true)
        };
        if start {
            deliver_from(&self.core, Work::Started);
        } else {
            unbuffer(&self.core);
        }
    }

    fn receive(&self, item: In) -> f32 {
        let delivered = deliver_from(&self.core, Work::Input(item));
        let (policy, downstream, fullness) = {
            let c = self.core.borrow();
            (c.progress_policy, c.downstream.clone(), c.last_fullness)
        };
        let relay = match policy {
            ProgressPolicy::WhenNoOutput => delivered == 0,
            ProgressPolicy::Always => true,
            ProgressPolicy::Never => false,
        };
        if relay {
            if let Some(downstream) = downstream {
                downstream.progress(None);
            }
        }
        if delivered > 0 {
            fullness
        } else {
            // Nothing went downstream this call; report a neutral estimate.
            0.5
        }
    }

    fn progress(&self, amount: Option<f32>) {
        let mut pump = self.core.borrow_mut().pump.take();
        if let Some(pump) = pump.as_mut() {
            pump.progressed(amount);
        }
        self.core.borrow_mut().pump = pump;
        // Anything that arrived while the pump was checked out.
        unbuffer(&self.core);
    }

    fn flow_stopped(&self, reason: StopReason) {
        {
            let mut c = self.core.borrow_mut();
            if c.stop_received {
                tracing::debug!("duplicate flow_stopped ignored");
                return;
            }
            c.stop_received = true;
        }
        deliver_from(&self.core, Work::Stop(reason));
    }
}

/// The output side of a tube; flow it to a drain.
pub struct TubeFount<In: 'static, Out: 'static> {
    core: CoreRef<In, Out>,
}

impl<In: 'static, Out: 'static> TubeFount<In, Out> {
    fn attach(&self, drain: Rc<dyn Drain<Item = Out>>) -> Result<Wired> {
        self.core.borrow_mut().downstream = Some(Rc::clone(&drain));
        let fount: Rc<dyn Fount<Item = Out>> = Rc::new(TubeFount {
            core: Rc::clone(&self.core),
        });
        drain.flowing_from(fount);
        // Deliver anything buffered while there was no drain, then release
        // the hold on the upstream. The order matters: releasing first would
        // let new input overtake the buffer.
        unbuffer(&self.core);
        let release = self.core.borrow_mut().pause_because_no_drain.take();
        if let Some(pause) = release {
            let _ = pause.unpause();
        }
        Ok(Wired::Flowing)
    }
}

impl<In: 'static, Out: 'static> Fount for TubeFount<In, Out> {
    type Item = Out;

    fn flow_to(&self, drain: Rc<dyn Drain<Item = Out>>) -> Result<Wired> {
        {
            let c = self.core.borrow();
            if c.stop_forwarded {
                return Ok(Wired::Exhausted);
            }
            if c.downstream.is_some() {
                return Err(Error::AlreadyDraining);
            }
        }
        self.attach(drain)
    }

    fn redirect(&self, drain: Rc<dyn Drain<Item = Out>>) -> Result<Wired> {
        {
            let mut c = self.core.borrow_mut();
            if c.stop_forwarded {
                return Ok(Wired::Exhausted);
            }
            c.downstream = None;
        }
        self.attach(drain)
    }

    fn pause_flow(&self) -> Pause {
        let pauser = Rc::clone(&self.core.borrow().pauser);
        pauser.pause()
    }

    fn stop_flow(&self) {
        let upstream = {
            let mut c = self.core.borrow_mut();
            if c.flow_was_stopped {
                return;
            }
            c.flow_was_stopped = true;
            c.upstream.clone()
        };
        if let Some(upstream) = upstream {
            upstream.stop_flow();
        }
    }
}

// ============================================================================
// The tube itself
// ============================================================================

/// A pump wired for flow: owns the pump, hands out the paired views.
///
/// Dropping the `Tube` value does not tear the pipeline down; the shared
/// state stays alive for as long as anything is wired to either view.
pub struct Tube<In: 'static, Out: 'static> {
    core: CoreRef<In, Out>,
}

impl<In: 'static, Out: 'static> Tube<In, Out> {
    /// Wrap a pump.
    pub fn new<P>(pump: P) -> Self
    where
        P: Pump<Input = In, Output = Out> + 'static,
    {
        Self::build(PumpHolder::Plain(Box::new(pump)), false)
    }

    /// Wrap a pump that supports mid-stream switching.
    pub fn switchable<P>(pump: P) -> Self
    where
        P: SwitchablePump<Input = In, Output = Out> + 'static,
    {
        Self::build(PumpHolder::Switchable(Box::new(pump)), true)
    }

    fn build(holder: PumpHolder<In, Out>, switchable: bool) -> Self {
        let core = Rc::new_cyclic(|weak: &Weak<RefCell<TubeCore<In, Out>>>| {
            let on_pause = {
                let weak = weak.clone();
                move || actually_pause(&weak)
            };
            let on_resume = {
                let weak = weak.clone();
                move || actually_resume(&weak)
            };
            RefCell::new(TubeCore {
                pump: Some(holder),
                switchable,
                upstream: None,
                downstream: None,
                pauser: Pauser::new(on_pause, on_resume),
                prefix: VecDeque::new(),
                pending: None,
                queued: VecDeque::new(),
                unbuffering: false,
                awaiting: false,
                pause_because_no_drain: None,
                pause_because_paused: None,
                started: false,
                flow_was_stopped: false,
                stop_received: false,
                stop_staged: None,
                stop_forwarded: false,
                last_fullness: 0.0,
                progress_policy: ProgressPolicy::default(),
            })
        });
        let tube = Self { core };
        tube.notify_attached();
        tube
    }

    fn notify_attached(&self) {
        let handle = self.handle();
        let mut pump = self.core.borrow_mut().pump.take();
        if let Some(pump) = pump.as_mut() {
            pump.attached(handle);
        }
        self.core.borrow_mut().pump = pump;
    }

    /// The input view. Facades are cheap; every call returns an equivalent
    /// handle onto the same tube.
    pub fn drain(&self) -> Rc<TubeDrain<In, Out>> {
        Rc::new(TubeDrain {
            core: Rc::clone(&self.core),
        })
    }

    /// The output view.
    pub fn fount(&self) -> Rc<TubeFount<In, Out>> {
        Rc::new(TubeFount {
            core: Rc::clone(&self.core),
        })
    }

    /// A weak handle for reaching this tube from pump code.
    pub fn handle(&self) -> TubeHandle<In, Out> {
        TubeHandle {
            core: Rc::downgrade(&self.core),
        }
    }

    /// Replace the pump. The old pump is told it was detached; the new pump
    /// is attached and the tube loses any switching capability the old pump
    /// had.
    pub fn set_pump<P>(&self, pump: P)
    where
        P: Pump<Input = In, Output = Out> + 'static,
    {
        self.replace(PumpHolder::Plain(Box::new(pump)), false);
    }

    /// Replace the pump with a switchable one.
    pub fn set_switchable_pump<P>(&self, pump: P)
    where
        P: SwitchablePump<Input = In, Output = Out> + 'static,
    {
        self.replace(PumpHolder::Switchable(Box::new(pump)), true);
    }

    fn replace(&self, holder: PumpHolder<In, Out>, switchable: bool) {
        let old = {
            let mut c = self.core.borrow_mut();
            let old = c.pump.replace(holder);
            c.switchable = switchable;
            old
        };
        if let Some(mut old) = old {
            old.detached();
        }
        self.notify_attached();
        unbuffer(&self.core);
    }

    /// Whether the current pump supports [`TubeHandle::switch`].
    pub fn is_switchable(&self) -> bool {
        self.core.borrow().switchable
    }

    /// Configure when `progress` notifications are relayed downstream.
    pub fn set_progress_policy(&self, policy: ProgressPolicy) {
        self.core.borrow_mut().progress_policy = policy;
    }
}

/// A weak, cloneable reference to a tube, given to its pump on attachment.
///
/// The handle outlives nothing: once the tube's wiring is gone, operations
/// fail with [`Error::NotWired`].
pub struct TubeHandle<In: 'static, Out: 'static> {
    core: Weak<RefCell<TubeCore<In, Out>>>,
}

impl<In: 'static, Out: 'static> Clone for TubeHandle<In, Out> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<In: 'static, Out: 'static> TubeHandle<In, Out> {
    /// Whether the tube's pump supports switching.
    pub fn is_switchable(&self) -> bool {
        self.core
            .upgrade()
            .map(|core| core.borrow().switchable)
            .unwrap_or(false)
    }

    /// Re-point this tube's upstream fount at `new_drain`.
    ///
    /// Future raw input bypasses this tube entirely. Output this tube had
    /// produced but not yet delivered is reversed through the pump's
    /// [`reassemble`](SwitchablePump::reassemble) and fed to the new drain
    /// first, so nothing is lost or duplicated across the switch point.
    ///
    /// # Errors
    ///
    /// - [`Error::NotSwitchable`] if the pump cannot reassemble its input;
    /// - [`Error::NotWired`] if no upstream fount is attached;
    /// - [`Error::SwitchPending`] if an unresolved asynchronous emission is
    ///   in flight, or a pump with buffered output tries to switch its own
    ///   tube from inside one of its callbacks.
    pub fn switch(&self, new_drain: Rc<dyn Drain<Item = In>>) -> Result<()> {
        let core = match self.core.upgrade() {
            Some(core) => core,
            None => return Err(Error::NotWired),
        };
        let upstream = {
            let c = core.borrow();
            if !c.switchable {
                return Err(Error::NotSwitchable);
            }
            if c.awaiting {
                return Err(Error::SwitchPending);
            }
            match &c.upstream {
                Some(upstream) => Rc::clone(upstream),
                None => return Err(Error::NotWired),
            }
        };
        let hold = upstream.pause_flow();

        // Materialize output that was produced but never delivered. When a
        // delivery was in flight at all, the pump must get a `reassemble`
        // call even if nothing remained in it: input the pump buffered
        // internally (e.g. a framing pump's partial parse) is handed over
        // through the same path.
        let had_pending =
            !core.borrow().prefix.is_empty() || core.borrow().pending.is_some();
        let mut leftovers: Vec<Out> = core.borrow_mut().prefix.drain(..).collect();
        if let Some(mut pending) = core.borrow_mut().pending.take() {
            loop {
                match pending.next() {
                    None => break,
                    Some(Emitted::Item(item)) => leftovers.push(item),
                    Some(Emitted::Later(value)) => match value.take_now() {
                        Some(Ok(item)) => leftovers.push(item),
                        Some(Err(error)) => {
                            tracing::error!(error = %error, "dropping failed emission during switch");
                        }
                        None => {
                            let _ = hold.unpause();
                            return Err(Error::SwitchPending);
                        }
                    },
                    Some(Emitted::Fault(error)) => {
                        tracing::error!(error = %error, "dropping fault during switch");
                    }
                }
            }
        }
        // Raw inputs serialized behind the in-flight delivery never reached
        // the old pump; the new drain accepts the same item type directly.
        let queued: Vec<In> = {
            let mut c = core.borrow_mut();
            c.queued
                .drain(..)
                .filter_map(|work| match work {
                    Work::Input(item) => Some(item),
                    _ => None,
                })
                .collect()
        };

        let reassembled: Vec<In> = if !had_pending {
            Vec::new()
        } else {
            let mut pump = core.borrow_mut().pump.take();
            let result = pump.as_mut().and_then(|p| p.reassemble(leftovers));
            core.borrow_mut().pump = pump;
            match result {
                Some(items) => items,
                None => {
                    let _ = hold.unpause();
                    return Err(Error::SwitchPending);
                }
            }
        };

        {
            let c = core.borrow();
            tracing::debug!(
                pump = c.pump.as_ref().map(PumpHolder::name).unwrap_or("<busy>"),
                reassembled = reassembled.len(),
                "switching tube to a new drain"
            );
        }
        let tokens = {
            let mut c = core.borrow_mut();
            c.upstream = None;
            (c.pause_because_no_drain.take(), c.pause_because_paused.take())
        };
        upstream.redirect(Rc::clone(&new_drain))?;
        for item in reassembled {
            new_drain.receive(item);
        }
        for item in queued {
            new_drain.receive(item);
        }
        if let Some(pause) = tokens.0 {
            let _ = pause.unpause();
        }
        if let Some(pause) = tokens.1 {
            let _ = pause.unpause();
        }
        hold.unpause()?;
        Ok(())
    }
}
