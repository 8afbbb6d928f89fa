//! # Siphon
//!
//! A push/pull, backpressure-aware data-flow core: founts produce, drains
//! consume, and tubes connect them through user-written pumps.
//!
//! Siphon pipelines are strictly linear. Data is pushed downstream item by
//! item; backpressure travels the other way as reference-counted pause
//! tokens, compounding transparently through every intermediate stage. A
//! pump only transforms data. Ordering, buffering, pause bookkeeping,
//! asynchronous results and mid-stream re-routing are all handled by the
//! tube that owns it.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use siphon::prelude::*;
//! use siphon::pumps::{bytes_to_lines, netstrings_to_strings};
//!
//! // A pipeline that turns raw segments into parsed lines.
//! let pipeline = series(bytes_to_lines()).to(my_sink);
//! my_fount.flow_to(pipeline)?;
//!
//! // Pumps can be switched mid-stream without losing buffered input,
//! // e.g. upgrading a line-oriented protocol to a framed one.
//! line_tube_handle.switch(series(netstrings_to_strings()).to(other_sink))?;
//! ```
//!
//! ## Scheduling model
//!
//! Single-threaded and cooperative. Every delivery happens synchronously on
//! the call stack of whatever external event produced the item; the only
//! logical suspension point is a pump emitting a [`Later`](later::Later)
//! value, which pauses the upstream until it resolves. Handles are
//! `Rc`-based and not `Send`. The sole re-entrancy primitive is a per-tube
//! guard flag; it protects against recursive drains of one tube on one
//! logical thread of control, and is **not** a lock. Driving a pipeline from
//! multiple threads is out of contract.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod flow;
pub mod later;
pub mod pause;
pub mod pump;
pub mod pumps;
pub mod series;
pub mod transport;
pub mod tube;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::flow::{Drain, Fount, StopReason, Wired};
    pub use crate::later::{later, Later, Resolver};
    pub use crate::pause::{Pause, Pauser};
    pub use crate::pump::{Emission, Emitted, Pump, SwitchablePump};
    pub use crate::series::{series, series_switchable, Series};
    pub use crate::tube::{ProgressPolicy, Tube, TubeHandle};
}

pub use error::{Error, Result};
