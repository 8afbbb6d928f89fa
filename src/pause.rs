//! Pause tokens and the pause coordinator.
//!
//! Backpressure in a pipeline is expressed as a set of outstanding [`Pause`]
//! tokens held against a fount. The [`Pauser`] reference-counts them: the
//! underlying resource is actually paused exactly once, on the 0→1 edge, and
//! actually resumed exactly once, on the 1→0 edge, no matter how many
//! overlapping holders there are or in which order they release.
//!
//! Tokens are single-use: releasing one twice is a programmer error and
//! reported as [`Error::AlreadyUnpaused`].

use std::cell::Cell;
use std::rc::{Rc, Weak};

use crate::error::{Error, Result};

/// Reference-counting coordinator for pause requests against one pausable
/// resource.
///
/// The two callbacks are invoked synchronously on the calling stack; nothing
/// is buffered or deferred.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use siphon::pause::Pauser;
///
/// let paused = Rc::new(Cell::new(false));
/// let (a, b) = (paused.clone(), paused.clone());
/// let pauser = Pauser::new(move || a.set(true), move || b.set(false));
///
/// let first = pauser.pause();
/// let second = pauser.pause();
/// assert!(paused.get());
///
/// first.unpause().unwrap();
/// assert!(paused.get()); // still one token outstanding
/// second.unpause().unwrap();
/// assert!(!paused.get());
/// ```
pub struct Pauser {
    this: Weak<Pauser>,
    outstanding: Cell<usize>,
    actually_pause: Box<dyn Fn()>,
    actually_resume: Box<dyn Fn()>,
}

impl Pauser {
    /// Create a coordinator with the given edge callbacks.
    pub fn new(
        actually_pause: impl Fn() + 'static,
        actually_resume: impl Fn() + 'static,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            this: weak.clone(),
            outstanding: Cell::new(0),
            actually_pause: Box::new(actually_pause),
            actually_resume: Box::new(actually_resume),
        })
    }

    /// Register one more reason the resource should not deliver.
    ///
    /// Invokes the pause callback if this is the first outstanding reason.
    /// Always succeeds and always returns a fresh live token.
    pub fn pause(&self) -> Pause {
        let count = self.outstanding.get();
        self.outstanding.set(count + 1);
        if count == 0 {
            (self.actually_pause)();
        }
        Pause {
            pauser: self.this.upgrade().expect("Pauser is only reachable via Rc"),
            live: Cell::new(true),
        }
    }

    /// Whether any pause is currently outstanding.
    pub fn is_paused(&self) -> bool {
        self.outstanding.get() > 0
    }

    fn release(&self) {
        let count = self.outstanding.get();
        debug_assert!(count > 0, "pause count underflow");
        self.outstanding.set(count - 1);
        if count == 1 {
            (self.actually_resume)();
        }
    }
}

/// A single outstanding reason that delivery is suppressed.
///
/// Obtained from [`Pauser::pause`] (usually via a fount's `pause_flow`).
/// Resolving the token with [`unpause`](Pause::unpause) removes the reason;
/// the flow resumes once every outstanding token has been resolved.
pub struct Pause {
    pauser: Rc<Pauser>,
    live: Cell<bool>,
}

impl Pause {
    /// Resolve this token.
    ///
    /// Returns [`Error::AlreadyUnpaused`] if the token was already resolved;
    /// a token cannot be re-paused.
    pub fn unpause(&self) -> Result<()> {
        if !self.live.replace(false) {
            return Err(Error::AlreadyUnpaused);
        }
        self.pauser.release();
        Ok(())
    }

    /// Whether this token still holds its flow paused.
    pub fn is_live(&self) -> bool {
        self.live.get()
    }
}

impl Drop for Pause {
    fn drop(&mut self) {
        if self.live.get() {
            // An abandoned token never resumes its flow; say so rather than
            // silently wedging the pipeline.
            tracing::debug!("live pause token dropped without unpause; flow stays paused");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_pauser() -> (Rc<Pauser>, Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let pauses = Rc::new(Cell::new(0));
        let resumes = Rc::new(Cell::new(0));
        let (p, r) = (pauses.clone(), resumes.clone());
        let pauser = Pauser::new(
            move || p.set(p.get() + 1),
            move || r.set(r.get() + 1),
        );
        (pauser, pauses, resumes)
    }

    #[test]
    fn test_first_pause_fires_callback() {
        let (pauser, pauses, resumes) = counting_pauser();
        let token = pauser.pause();
        assert_eq!(pauses.get(), 1);
        assert_eq!(resumes.get(), 0);
        token.unpause().unwrap();
        assert_eq!(resumes.get(), 1);
    }

    #[test]
    fn test_nested_pauses_fire_edges_once() {
        let (pauser, pauses, resumes) = counting_pauser();
        let tokens: Vec<Pause> = (0..5).map(|_| pauser.pause()).collect();
        assert_eq!(pauses.get(), 1);
        assert!(pauser.is_paused());

        // Release out of order; only the final release resumes.
        for token in tokens.into_iter().rev() {
            token.unpause().unwrap();
        }
        assert_eq!(pauses.get(), 1);
        assert_eq!(resumes.get(), 1);
        assert!(!pauser.is_paused());
    }

    #[test]
    fn test_double_unpause_fails() {
        let (pauser, _, resumes) = counting_pauser();
        let token = pauser.pause();
        token.unpause().unwrap();
        assert!(matches!(token.unpause(), Err(Error::AlreadyUnpaused)));
        assert_eq!(resumes.get(), 1);
        assert!(!token.is_live());
    }

    #[test]
    fn test_repause_after_full_resume() {
        let (pauser, pauses, resumes) = counting_pauser();
        pauser.pause().unpause().unwrap();
        pauser.pause().unpause().unwrap();
        assert_eq!(pauses.get(), 2);
        assert_eq!(resumes.get(), 2);
    }
}
