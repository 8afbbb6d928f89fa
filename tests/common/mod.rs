//! Shared fixtures: controllable founts and recording drains.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use siphon::error::{Error, Result};
use siphon::flow::{Drain, Fount, StopReason, Wired};
use siphon::pause::{Pause, Pauser};

/// A fount driven by hand from test code, tracking its own pause state and
/// the pause/resume edges it observed.
pub struct FakeFount<T: 'static> {
    this: Weak<FakeFount<T>>,
    drain: RefCell<Option<Rc<dyn Drain<Item = T>>>>,
    pauser: Rc<Pauser>,
    pause_edges: Rc<Cell<usize>>,
    resume_edges: Rc<Cell<usize>>,
    stopped: Cell<bool>,
}

impl<T: 'static> FakeFount<T> {
    pub fn new() -> Rc<Self> {
        let pause_edges = Rc::new(Cell::new(0));
        let resume_edges = Rc::new(Cell::new(0));
        let on_pause = {
            let edges = pause_edges.clone();
            move || edges.set(edges.get() + 1)
        };
        let on_resume = {
            let edges = resume_edges.clone();
            move || edges.set(edges.get() + 1)
        };
        Rc::new_cyclic(|weak| Self {
            this: weak.clone(),
            drain: RefCell::new(None),
            pauser: Pauser::new(on_pause, on_resume),
            pause_edges,
            resume_edges,
            stopped: Cell::new(false),
        })
    }

    /// Push one item at the attached drain, returning its fullness estimate.
    pub fn deliver(&self, item: T) -> f32 {
        let drain = self
            .drain
            .borrow()
            .clone()
            .expect("FakeFount has no drain to deliver to");
        drain.receive(item)
    }

    pub fn drain(&self) -> Option<Rc<dyn Drain<Item = T>>> {
        self.drain.borrow().clone()
    }

    pub fn is_paused(&self) -> bool {
        self.pauser.is_paused()
    }

    pub fn pause_edges(&self) -> usize {
        self.pause_edges.get()
    }

    pub fn resume_edges(&self) -> usize {
        self.resume_edges.get()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }
}

impl<T: 'static> Fount for FakeFount<T> {
    type Item = T;

    fn flow_to(&self, drain: Rc<dyn Drain<Item = T>>) -> Result<Wired> {
        if self.drain.borrow().is_some() {
            return Err(Error::AlreadyDraining);
        }
        *self.drain.borrow_mut() = Some(Rc::clone(&drain));
        drain.flowing_from(self.this.upgrade().expect("fount gone"));
        Ok(Wired::Flowing)
    }

    fn redirect(&self, drain: Rc<dyn Drain<Item = T>>) -> Result<Wired> {
        *self.drain.borrow_mut() = Some(Rc::clone(&drain));
        drain.flowing_from(self.this.upgrade().expect("fount gone"));
        Ok(Wired::Flowing)
    }

    fn pause_flow(&self) -> Pause {
        self.pauser.pause()
    }

    fn stop_flow(&self) {
        self.stopped.set(true);
    }
}

/// A fount with an internal buffer that pushes as fast as its drain allows:
/// delivery runs whenever it is attached and unpaused, and resumes by itself
/// on unpause.
pub struct BufferedFount<T: 'static> {
    this: Weak<BufferedFount<T>>,
    drain: RefCell<Option<Rc<dyn Drain<Item = T>>>>,
    buffer: RefCell<VecDeque<T>>,
    pauser: Rc<Pauser>,
    going: Cell<bool>,
    stopped: Cell<bool>,
}

impl<T: 'static> BufferedFount<T> {
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<BufferedFount<T>>| {
            let on_resume = {
                let weak = weak.clone();
                move || {
                    if let Some(fount) = weak.upgrade() {
                        fount.go();
                    }
                }
            };
            Self {
                this: weak.clone(),
                drain: RefCell::new(None),
                buffer: RefCell::new(VecDeque::new()),
                pauser: Pauser::new(|| {}, on_resume),
                going: Cell::new(false),
                stopped: Cell::new(false),
            }
        })
    }

    pub fn buffer_up(&self, item: T) {
        self.buffer.borrow_mut().push_back(item);
        self.go();
    }

    pub fn buffered(&self) -> usize {
        self.buffer.borrow().len()
    }

    pub fn is_paused(&self) -> bool {
        self.pauser.is_paused()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    fn go(&self) {
        if self.going.replace(true) {
            return;
        }
        loop {
            if self.pauser.is_paused() || self.stopped.get() {
                break;
            }
            let drain = match self.drain.borrow().clone() {
                Some(drain) => drain,
                None => break,
            };
            let item = match self.buffer.borrow_mut().pop_front() {
                Some(item) => item,
                None => break,
            };
            drain.receive(item);
        }
        self.going.set(false);
    }
}

impl<T: 'static> Fount for BufferedFount<T> {
    type Item = T;

    fn flow_to(&self, drain: Rc<dyn Drain<Item = T>>) -> Result<Wired> {
        if self.drain.borrow().is_some() {
            return Err(Error::AlreadyDraining);
        }
        *self.drain.borrow_mut() = Some(Rc::clone(&drain));
        drain.flowing_from(self.this.upgrade().expect("fount gone"));
        self.go();
        Ok(Wired::Flowing)
    }

    fn redirect(&self, drain: Rc<dyn Drain<Item = T>>) -> Result<Wired> {
        *self.drain.borrow_mut() = Some(Rc::clone(&drain));
        drain.flowing_from(self.this.upgrade().expect("fount gone"));
        self.go();
        Ok(Wired::Flowing)
    }

    fn pause_flow(&self) -> Pause {
        self.pauser.pause()
    }

    fn stop_flow(&self) {
        self.stopped.set(true);
    }
}

/// A drain that records everything it sees.
pub struct FakeDrain<T: 'static> {
    pub received: RefCell<Vec<T>>,
    pub fount: RefCell<Option<Rc<dyn Fount<Item = T>>>>,
    pub stops: RefCell<Vec<StopReason>>,
    pub progressed: RefCell<Vec<Option<f32>>>,
    /// Fullness estimate returned from `receive`.
    pub fullness: Cell<f32>,
}

impl<T: 'static> FakeDrain<T> {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            received: RefCell::new(Vec::new()),
            fount: RefCell::new(None),
            stops: RefCell::new(Vec::new()),
            progressed: RefCell::new(Vec::new()),
            fullness: Cell::new(0.0),
        })
    }

    pub fn items(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.received.borrow().clone()
    }

    pub fn fount(&self) -> Rc<dyn Fount<Item = T>> {
        self.fount
            .borrow()
            .clone()
            .expect("FakeDrain has no fount yet")
    }
}

impl<T: 'static> Drain for FakeDrain<T> {
    type Item = T;

    fn flowing_from(&self, fount: Rc<dyn Fount<Item = T>>) {
        *self.fount.borrow_mut() = Some(fount);
    }

    fn receive(&self, item: T) -> f32 {
        self.received.borrow_mut().push(item);
        self.fullness.get()
    }

    fn progress(&self, amount: Option<f32>) {
        self.progressed.borrow_mut().push(amount);
    }

    fn flow_stopped(&self, reason: StopReason) {
        self.stops.borrow_mut().push(reason);
    }
}
