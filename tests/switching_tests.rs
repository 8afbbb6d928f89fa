//! Mid-stream switching: re-pointing a live pipeline at a new drain without
//! losing buffered data.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use bytes::Bytes;
use common::{BufferedFount, FakeDrain, FakeFount};
use siphon::prelude::*;
use siphon::pumps::{bytes_to_lines, netstrings_to_strings, PassThrough};

/// Prefixes everything it sees, marking items that crossed the switch point.
struct Switchee;

impl Pump for Switchee {
    type Input = String;
    type Output = String;

    fn received(&mut self, item: String) -> Emission<String> {
        Emission::single(format!("switched {item}"))
    }
}

/// Consumes everything; on "switch", re-points the target tube at a fresh
/// `Switchee` stage ending in `sink`.
struct Switcher {
    target: TubeHandle<String, String>,
    sink: Rc<FakeDrain<String>>,
}

impl Pump for Switcher {
    type Input = String;
    type Output = String;

    fn received(&mut self, item: String) -> Emission<String> {
        if item == "switch" {
            let new_drain = series(Switchee).to(self.sink.clone());
            self.target.switch(new_drain).unwrap();
        }
        Emission::none()
    }
}

#[test]
fn test_switch_re_points_future_input() {
    let ff = FakeFount::new();
    let fd = FakeDrain::new();
    let source = Tube::switchable(PassThrough::<String>::new());
    let second = series(Switcher {
        target: source.handle(),
        sink: fd.clone(),
    })
    .to(fd.clone());

    ff.flow_to(source.drain()).unwrap();
    source.fount().flow_to(second).unwrap();

    ff.deliver("switch".to_string());
    ff.deliver("to switchee".to_string());
    assert_eq!(fd.items(), vec!["switched to switchee".to_string()]);
}

#[test]
fn test_switch_reassembles_undelivered_output() {
    /// Splits its input on "BORK"; reassembly re-inserts the separator in
    /// front of every leftover piece.
    struct BorkSplitter;

    impl Pump for BorkSplitter {
        type Input = String;
        type Output = String;

        fn received(&mut self, item: String) -> Emission<String> {
            item.split("BORK")
                .map(str::to_string)
                .collect::<Vec<_>>()
                .into()
        }
    }

    impl SwitchablePump for BorkSplitter {
        fn reassemble(&mut self, data: Vec<String>) -> Vec<String> {
            let mut out = Vec::with_capacity(data.len() * 2);
            for piece in data {
                out.push("BORK".to_string());
                out.push(piece);
            }
            out
        }
    }

    let ff = FakeFount::new();
    let fd = FakeDrain::new();
    let source = Tube::switchable(BorkSplitter);
    let second = series(Switcher {
        target: source.handle(),
        sink: fd.clone(),
    })
    .to(fd.clone());

    ff.flow_to(source.drain()).unwrap();
    source.fount().flow_to(second).unwrap();

    ff.deliver("switchBORKto switchee".to_string());
    assert_eq!(
        fd.items(),
        vec![
            "switched BORK".to_string(),
            "switched to switchee".to_string()
        ]
    );
}

/// A switchable passthrough whose reassembly must never run; picks up its
/// own tube handle through `attached`.
struct NoReassembly {
    handle: Rc<RefCell<Option<TubeHandle<String, String>>>>,
}

impl Pump for NoReassembly {
    type Input = String;
    type Output = String;

    fn received(&mut self, item: String) -> Emission<String> {
        Emission::single(item)
    }

    fn attached(&mut self, tube: TubeHandle<String, String>) {
        *self.handle.borrow_mut() = Some(tube);
    }
}

impl SwitchablePump for NoReassembly {
    fn reassemble(&mut self, _data: Vec<String>) -> Vec<String> {
        panic!("should not actually be called");
    }
}

/// Forwards items; on "switch", re-points the tube whose handle sits in the
/// shared slot.
struct ForwardingSwitcher {
    target: Rc<RefCell<Option<TubeHandle<String, String>>>>,
    sink: Rc<FakeDrain<String>>,
}

impl Pump for ForwardingSwitcher {
    type Input = String;
    type Output = String;

    fn received(&mut self, item: String) -> Emission<String> {
        if item == "switch" {
            let new_drain = series(Switchee).to(self.sink.clone());
            self.target
                .borrow()
                .as_ref()
                .expect("target tube not attached yet")
                .switch(new_drain)
                .unwrap();
            Emission::none()
        } else {
            Emission::single(item)
        }
    }
}

#[test]
fn test_switching_a_tube_that_never_buffered_skips_reassembly() {
    let ff = FakeFount::new();
    let fd = FakeDrain::new();
    let slot = Rc::new(RefCell::new(None));
    let pipeline = series(ForwardingSwitcher {
        target: slot.clone(),
        sink: fd.clone(),
    })
    .then_switchable(NoReassembly {
        handle: slot.clone(),
    })
    .to(fd.clone());

    ff.flow_to(pipeline).unwrap();
    ff.deliver("before".to_string());
    ff.deliver("switch".to_string());
    ff.deliver("after".to_string());
    assert_eq!(
        fd.items(),
        vec!["before".to_string(), "switched after".to_string()]
    );
}

#[test]
fn test_switch_from_a_fount_that_pushes_on_resume() {
    // The switch happens inside a delivery driven by a self-pushing fount;
    // the resume it triggers must serialize, not recurse.
    let ff = BufferedFount::new();
    ff.buffer_up("before".to_string());
    ff.buffer_up("switch".to_string());
    ff.buffer_up("after".to_string());

    let fd = FakeDrain::new();
    let slot = Rc::new(RefCell::new(None));
    let pipeline = series(ForwardingSwitcher {
        target: slot.clone(),
        sink: fd.clone(),
    })
    .then_switchable(NoReassembly {
        handle: slot.clone(),
    })
    .to(fd.clone());

    ff.flow_to(pipeline).unwrap();
    assert_eq!(
        fd.items(),
        vec!["before".to_string(), "switched after".to_string()]
    );
}

#[test]
fn test_switch_carries_over_a_partial_parse() {
    /// Forwards lines; on "switch", hands the source tube over to a
    /// netstring decoder feeding `sink`.
    struct LineSwitcher {
        target: TubeHandle<Bytes, Bytes>,
        sink: Rc<FakeDrain<Bytes>>,
    }

    impl Pump for LineSwitcher {
        type Input = Bytes;
        type Output = Bytes;

        fn received(&mut self, line: Bytes) -> Emission<Bytes> {
            if line.as_ref() == b"switch" {
                let new_drain = series(netstrings_to_strings()).to(self.sink.clone());
                self.target.switch(new_drain).unwrap();
                Emission::none()
            } else {
                Emission::single(line)
            }
        }
    }

    let ff = FakeFount::<Bytes>::new();
    let fd = FakeDrain::<Bytes>::new();
    let source = Tube::switchable(bytes_to_lines());
    let second = series(LineSwitcher {
        target: source.handle(),
        sink: fd.clone(),
    })
    .to(fd.clone());

    ff.flow_to(source.drain()).unwrap();
    source.fount().flow_to(second).unwrap();

    // One segment holding: two complete lines, then netstring data that the
    // line splitter will have buffered but not parsed.
    ff.deliver(Bytes::from("before\r\nswitch\r\n7:hello\r\n,5:world,"));

    assert_eq!(
        fd.items(),
        vec![
            Bytes::from("before"),
            Bytes::from("hello\r\n"),
            Bytes::from("world"),
        ]
    );
}

#[test]
fn test_switch_refused_while_awaiting_an_async_value() {
    struct AsyncSwitchable {
        value: RefCell<Option<Later<String>>>,
    }

    impl Pump for AsyncSwitchable {
        type Input = String;
        type Output = String;

        fn received(&mut self, _item: String) -> Emission<String> {
            match self.value.borrow_mut().take() {
                Some(value) => Emission::later(value),
                None => Emission::none(),
            }
        }
    }

    impl SwitchablePump for AsyncSwitchable {
        fn reassemble(&mut self, data: Vec<String>) -> Vec<String> {
            data
        }
    }

    let (_resolver, value) = later::<String>();
    let ff = FakeFount::new();
    let fd = FakeDrain::new();
    let source = Tube::switchable(AsyncSwitchable {
        value: RefCell::new(Some(value)),
    });
    ff.flow_to(source.drain()).unwrap();
    source.fount().flow_to(fd.clone()).unwrap();

    ff.deliver("block".to_string());
    let elsewhere = Tube::new(PassThrough::<String>::new());
    assert!(matches!(
        source.handle().switch(elsewhere.drain()),
        Err(Error::SwitchPending)
    ));
}
