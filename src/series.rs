//! Chaining pumps into one linear pipeline.
//!
//! [`series`] starts a pipeline from a pump; [`Series::then`] appends
//! further stages, wiring each junction eagerly (so `started` hooks run at
//! composition time, exactly as they would if the tubes were flowed together
//! by hand); [`Series::to`] closes the pipeline onto a final drain and
//! returns the composed head drain, ready to be flowed to from any fount.
//!
//! Junction compatibility is part of the types: a stage can only follow
//! another stage whose output type it consumes.
//!
//! ```compile_fail
//! use siphon::prelude::*;
//! use siphon::pump::Emission;
//!
//! struct Ints;
//! impl Pump for Ints {
//!     type Input = u32;
//!     type Output = u32;
//!     fn received(&mut self, item: u32) -> Emission<u32> { Emission::single(item) }
//! }
//!
//! struct Texts;
//! impl Pump for Texts {
//!     type Input = String;
//!     type Output = String;
//!     fn received(&mut self, item: String) -> Emission<String> { Emission::single(item) }
//! }
//!
//! // A String-consuming stage cannot follow a u32-producing one.
//! let pipeline = series(Ints).then(Texts);
//! ```

use std::rc::Rc;

use crate::flow::{Drain, Fount};
use crate::pump::{Pump, SwitchablePump};
use crate::tube::Tube;

/// A partially built pipeline: a head drain accepting `In`, and the fount of
/// the most recently appended stage producing `Out`.
pub struct Series<In: 'static, Out: 'static> {
    head: Rc<dyn Drain<Item = In>>,
    tail: Rc<dyn Fount<Item = Out>>,
}

/// Begin a pipeline with a single pump stage.
pub fn series<P>(pump: P) -> Series<P::Input, P::Output>
where
    P: Pump + 'static,
    P::Input: 'static,
    P::Output: 'static,
{
    let tube = Tube::new(pump);
    Series {
        head: tube.drain(),
        tail: tube.fount(),
    }
}

/// Begin a pipeline with a switchable pump stage.
///
/// The stage's tube can later be re-pointed via the handle the pump received
/// in [`Pump::attached`].
pub fn series_switchable<P>(pump: P) -> Series<P::Input, P::Output>
where
    P: SwitchablePump + 'static,
    P::Input: 'static,
    P::Output: 'static,
{
    let tube = Tube::switchable(pump);
    Series {
        head: tube.drain(),
        tail: tube.fount(),
    }
}

impl<In: 'static, Out: 'static> Series<In, Out> {
    /// Append a pump stage consuming this pipeline's current output type.
    pub fn then<P>(self, pump: P) -> Series<In, P::Output>
    where
        P: Pump<Input = Out> + 'static,
        P::Output: 'static,
    {
        let tube = Tube::new(pump);
        self.tail
            .flow_to(tube.drain())
            .expect("freshly built tube fount cannot be draining");
        Series {
            head: self.head,
            tail: tube.fount(),
        }
    }

    /// Append a switchable pump stage.
    pub fn then_switchable<P>(self, pump: P) -> Series<In, P::Output>
    where
        P: SwitchablePump<Input = Out> + 'static,
        P::Output: 'static,
    {
        let tube = Tube::switchable(pump);
        self.tail
            .flow_to(tube.drain())
            .expect("freshly built tube fount cannot be draining");
        Series {
            head: self.head,
            tail: tube.fount(),
        }
    }

    /// Close the pipeline onto a final drain and return the head drain.
    ///
    /// The result is what an upstream fount flows to; output of the last
    /// stage arrives at `drain`.
    pub fn to(self, drain: Rc<dyn Drain<Item = Out>>) -> Rc<dyn Drain<Item = In>> {
        self.tail
            .flow_to(drain)
            .expect("freshly built tube fount cannot be draining");
        self.head
    }

    /// Take the pipeline apart without attaching a final drain: the head
    /// drain and the open tail fount.
    ///
    /// Output reaching the open end buffers inside the last tube (holding
    /// the upstream paused) until something flows from the tail fount.
    pub fn build(self) -> (Rc<dyn Drain<Item = In>>, Rc<dyn Fount<Item = Out>>) {
        (self.head, self.tail)
    }
}
