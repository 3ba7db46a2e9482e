use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use glview::{
    ConfigOverrides, Error, ExitReason, Frame, Surface, SurfaceEvent, Viewer, ViewerConfig,
};

/// Records presented frames; quits after `quit_after` presents.
#[derive(Default)]
struct Recorder {
    presented: Rc<RefCell<Vec<Frame>>>,
    events: VecDeque<SurfaceEvent>,
    quit_after: Option<usize>,
}

impl Surface for Recorder {
    fn present(&mut self, frame: &Frame) -> glview::Result<()> {
        frame.validate()?;
        self.presented.borrow_mut().push(frame.clone());
        if Some(self.presented.borrow().len()) == self.quit_after {
            self.events.push_back(SurfaceEvent::QuitKey);
        }
        Ok(())
    }

    fn resize(&mut self, _width: u32, _height: u32) {}

    fn poll_event(&mut self) -> Option<SurfaceEvent> {
        self.events.pop_front()
    }
}

fn quick_viewer() -> Viewer {
    let config = ViewerConfig { frame_interval_ms: 1, ..ViewerConfig::default() };
    Viewer::new(config)
}

#[test]
fn two_set_frames_before_a_drain_present_only_the_second() {
    let mut viewer = quick_viewer();
    let frames = viewer.frame_box();
    let mut calls = 0;
    viewer.set_frame_supplier(move || {
        calls += 1;
        if calls > 1 {
            anyhow::bail!("source exhausted");
        }
        frames.put(Frame::solid(2, 2, [1, 1, 1]));
        frames.put(Frame::solid(2, 2, [2, 2, 2]));
        Ok(())
    });

    let mut surface = Recorder::default();
    let presented = surface.presented.clone();
    let reason = viewer.run_on(&mut surface).unwrap();

    assert_eq!(reason, ExitReason::SupplierStopped("source exhausted".into()));
    let presented = presented.borrow();
    assert_eq!(presented.len(), 1);
    assert_eq!(presented[0], Frame::solid(2, 2, [2, 2, 2]));
}

#[test]
fn frame_set_before_run_is_shown_first() {
    let viewer = quick_viewer();
    viewer.set_frame(Frame::solid(1, 1, [7, 7, 7]));
    let mut surface = Recorder { quit_after: Some(1), ..Default::default() };
    let presented = surface.presented.clone();
    assert_eq!(viewer.run_on(&mut surface).unwrap(), ExitReason::UserQuit);
    assert_eq!(presented.borrow()[0].data, vec![7, 7, 7]);
}

#[test]
fn supplier_error_ends_run_and_skips_termination_handler() {
    let mut viewer = quick_viewer();
    let fired = Rc::new(Cell::new(0));
    let f = fired.clone();
    viewer.set_frame_supplier(|| Err(anyhow::anyhow!("camera unplugged")));
    viewer.set_termination_handler(move || f.set(f.get() + 1));

    let reason = viewer.run_on(&mut Recorder::default()).unwrap();
    assert!(matches!(reason, ExitReason::SupplierStopped(ref m) if m.contains("unplugged")));
    assert_eq!(fired.get(), 0);
}

#[test]
fn quit_key_runs_termination_handler_exactly_once() {
    let mut viewer = quick_viewer();
    let frames = viewer.frame_box();
    let fired = Rc::new(Cell::new(0));
    let f = fired.clone();
    viewer.set_frame_supplier(move || {
        frames.put(Frame::solid(4, 3, [0, 0, 0]));
        Ok(())
    });
    viewer.set_termination_handler(move || f.set(f.get() + 1));

    let mut surface = Recorder { quit_after: Some(3), ..Default::default() };
    let presented = surface.presented.clone();
    assert_eq!(viewer.run_on(&mut surface).unwrap(), ExitReason::UserQuit);
    assert_eq!(presented.borrow().len(), 3);
    assert_eq!(fired.get(), 1);
}

#[test]
fn malformed_frame_is_a_present_failure() {
    let viewer = quick_viewer();
    viewer.set_frame(Frame::new(10, 10, vec![0; 3]));
    let err = viewer.run_on(&mut Recorder::default()).unwrap_err();
    assert!(matches!(err, Error::MalformedFrame { width: 10, height: 10, len: 3 }));
}

#[test]
fn stop_handle_from_another_thread() {
    let viewer = quick_viewer();
    let stop = viewer.stop_handle();
    let stopper = std::thread::spawn(move || stop.stop());
    stopper.join().unwrap();
    assert_eq!(viewer.run_on(&mut Recorder::default()).unwrap(), ExitReason::Stopped);
}

#[test]
fn watched_controller_exit_ends_run() {
    let mut viewer = quick_viewer();
    let controller = std::thread::spawn(|| {});
    while !controller.is_finished() {
        std::thread::yield_now();
    }
    viewer.watch_thread(controller);
    assert_eq!(
        viewer.run_on(&mut Recorder::default()).unwrap(),
        ExitReason::ControllerExited
    );
}

#[test]
fn configure_applies_overrides() {
    let mut viewer = quick_viewer();
    viewer.configure(&ConfigOverrides {
        window_name: Some("Cam".into()),
        window_width: Some(512),
        window_height: Some(512),
        cpu: Some(true),
        ..Default::default()
    });
    let c = viewer.config();
    assert_eq!(c.window_name, "Cam");
    assert_eq!((c.width, c.height), (512, 512));
    assert!(c.cpu);
    assert_eq!(c.frame_interval_ms, 1);
}
