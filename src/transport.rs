//! Adapting a raw bidirectional byte transport into a fount/drain pair.
//!
//! The event loop and the transport itself are not this crate's business;
//! they appear here only as the [`ByteTransport`] boundary. Whatever drives
//! the real I/O calls [`TransportFount::bytes_received`] for each inbound
//! segment and [`TransportFount::connection_lost`] when the connection ends;
//! in the other direction the flow core applies backpressure through
//! `pause_receiving`/`resume_receiving` and writes through `send`.
//!
//! ```rust,ignore
//! use siphon::prelude::*;
//! use siphon::transport::byte_flow;
//!
//! let (fount, drain) = byte_flow(my_transport);
//! fount.flow_to(series(bytes_to_lines()).to(my_sink))?;
//! // reactor side:
//! //   on data      -> fount.bytes_received(segment)
//! //   on close     -> fount.connection_lost(reason)
//! //   on writable  -> (transport's own business)
//! ```

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::flow::{Drain, Fount, StopReason, Wired};
use crate::pause::{Pause, Pauser};

/// The boundary contract for a raw byte transport.
///
/// Implementations wrap whatever actually moves bytes (a socket, a pipe, a
/// test double). All methods are invoked synchronously from flow code.
pub trait ByteTransport {
    /// Write one segment out.
    fn send(&self, data: Bytes);

    /// Stop delivering inbound segments for a while.
    fn pause_receiving(&self) {}

    /// Resume delivering inbound segments.
    fn resume_receiving(&self) {}

    /// Tear the connection down.
    fn shutdown(&self);

    /// Bytes accepted by `send` but not yet on the wire, if known.
    ///
    /// Used for the drain-side fullness estimate; returning 0 means
    /// "unknown or fully flushed".
    fn buffered(&self) -> usize {
        0
    }
}

/// Default high-water mark for the drain-side fullness estimate.
const DEFAULT_HIGH_WATER: usize = 64 * 1024;

struct FountState {
    drain: Option<Rc<dyn Drain<Item = Bytes>>>,
    buffer: VecDeque<Bytes>,
    pending_stop: Option<StopReason>,
    stopped: bool,
    exhausted: bool,
    delivering: bool,
}

/// The fount half of an adapted transport: inbound segments become flow
/// items.
///
/// Segments delivered before a drain attaches are buffered and unspooled, in
/// order, once `flow_to` is called. Pause tokens map onto the transport's
/// `pause_receiving`/`resume_receiving`.
pub struct TransportFount {
    transport: Rc<dyn ByteTransport>,
    state: RefCell<FountState>,
    pauser: Rc<Pauser>,
    this: Weak<TransportFount>,
}

/// The drain half of an adapted transport: flow items become outbound
/// writes.
pub struct TransportDrain {
    transport: Rc<dyn ByteTransport>,
    high_water: Cell<usize>,
    fount: RefCell<Option<Rc<dyn Fount<Item = Bytes>>>>,
}

/// Adapt a transport into its fount/drain pair.
pub fn byte_flow(transport: Rc<dyn ByteTransport>) -> (Rc<TransportFount>, Rc<TransportDrain>) {
    let fount = Rc::new_cyclic(|weak: &Weak<TransportFount>| {
        let pause_transport = {
            let transport = Rc::clone(&transport);
            move || transport.pause_receiving()
        };
        let resume_transport = {
            let weak = weak.clone();
            let transport = Rc::clone(&transport);
            move || {
                transport.resume_receiving();
                if let Some(fount) = weak.upgrade() {
                    fount.unspool();
                }
            }
        };
        TransportFount {
            transport: Rc::clone(&transport),
            state: RefCell::new(FountState {
                drain: None,
                buffer: VecDeque::new(),
                pending_stop: None,
                stopped: false,
                exhausted: false,
                delivering: false,
            }),
            pauser: Pauser::new(pause_transport, resume_transport),
            this: weak.clone(),
        }
    });
    let drain = Rc::new(TransportDrain {
        transport,
        high_water: Cell::new(DEFAULT_HIGH_WATER),
        fount: RefCell::new(None),
    });
    (fount, drain)
}

impl TransportFount {
    /// An inbound segment arrived from the transport.
    ///
    /// Delivered straight through when a drain is attached and the flow is
    /// not paused; buffered otherwise.
    pub fn bytes_received(&self, data: Bytes) {
        {
            let mut state = self.state.borrow_mut();
            if state.stopped || state.exhausted {
                tracing::debug!("segment after stop discarded");
                return;
            }
            state.buffer.push_back(data);
        }
        self.unspool();
    }

    /// The transport's connection ended; forward the terminal notice once
    /// all buffered segments are delivered.
    pub fn connection_lost(&self, reason: StopReason) {
        {
            let mut state = self.state.borrow_mut();
            if state.exhausted {
                return;
            }
            state.pending_stop = Some(reason);
        }
        self.unspool();
    }

    fn unspool(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.delivering {
                return;
            }
            state.delivering = true;
        }
        loop {
            enum Next {
                Deliver(Bytes, Rc<dyn Drain<Item = Bytes>>),
                Stop(StopReason, Rc<dyn Drain<Item = Bytes>>),
                Done,
            }
            let next = {
                let mut guard = self.state.borrow_mut();
                let state = &mut *guard;
                if state.stopped || self.pauser.is_paused() {
                    Next::Done
                } else {
                    match &state.drain {
                        None => Next::Done,
                        Some(drain) => match state.buffer.pop_front() {
                            Some(segment) => Next::Deliver(segment, Rc::clone(drain)),
                            None => match state.pending_stop.take() {
                                Some(reason) => {
                                    state.exhausted = true;
                                    let drain = Rc::clone(drain);
                                    state.drain = None;
                                    Next::Stop(reason, drain)
                                }
                                None => Next::Done,
                            },
                        },
                    }
                }
            };
            match next {
                Next::Done => break,
                Next::Deliver(segment, drain) => {
                    drain.receive(segment);
                }
                Next::Stop(reason, drain) => {
                    drain.flow_stopped(reason);
                    break;
                }
            }
        }
        self.state.borrow_mut().delivering = false;
    }

    fn attach(&self, drain: Rc<dyn Drain<Item = Bytes>>) -> Result<Wired> {
        self.state.borrow_mut().drain = Some(Rc::clone(&drain));
        let this = self
            .this
            .upgrade()
            .expect("attach on a transport fount that is being dropped");
        drain.flowing_from(this);
        self.unspool();
        Ok(Wired::Flowing)
    }
}

impl Fount for TransportFount {
    type Item = Bytes;

    fn flow_to(&self, drain: Rc<dyn Drain<Item = Bytes>>) -> Result<Wired> {
        {
            let state = self.state.borrow();
            if state.exhausted {
                return Ok(Wired::Exhausted);
            }
            if state.drain.is_some() {
                return Err(Error::AlreadyDraining);
            }
        }
        self.attach(drain)
    }

    fn redirect(&self, drain: Rc<dyn Drain<Item = Bytes>>) -> Result<Wired> {
        {
            let mut state = self.state.borrow_mut();
            if state.exhausted {
                return Ok(Wired::Exhausted);
            }
            state.drain = None;
        }
        self.attach(drain)
    }

    fn pause_flow(&self) -> Pause {
        self.pauser.pause()
    }

    fn stop_flow(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.stopped {
                return;
            }
            state.stopped = true;
            state.buffer.clear();
        }
        self.transport.shutdown();
    }
}

impl TransportDrain {
    /// Configure the high-water mark used for the fullness estimate.
    pub fn set_high_water(&self, bytes: usize) {
        self.high_water.set(bytes.max(1));
    }
}

impl Drain for TransportDrain {
    type Item = Bytes;

    fn flowing_from(&self, fount: Rc<dyn Fount<Item = Bytes>>) {
        *self.fount.borrow_mut() = Some(fount);
    }

    fn receive(&self, item: Bytes) -> f32 {
        self.transport.send(item);
        self.transport.buffered() as f32 / self.high_water.get() as f32
    }

    fn progress(&self, _amount: Option<f32>) {}

    fn flow_stopped(&self, reason: StopReason) {
        tracing::debug!(reason = %reason, "flow into transport stopped; shutting down");
        self.fount.borrow_mut().take();
        self.transport.shutdown();
    }
}
