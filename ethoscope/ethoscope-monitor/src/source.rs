use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use chrono::{Local, NaiveDateTime, TimeDelta};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, error};

use crate::{Error, Frame, Result};

/// Frames for the [Monitor](crate::Monitor). `Ok(None)` ends the run.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// A blocking camera, driven on its own thread by [ThreadedFrameSource].
pub trait FrameGrabber: Send + 'static {
    fn grab(&mut self) -> Result<Option<Frame>>;
}

/// Runs a [FrameGrabber] on a background thread with a short queue.
///
/// A frame that does not arrive within the timeout is a fatal
/// [Error::CameraTimeout].
pub struct ThreadedFrameSource {
    rx: Option<Receiver<Result<Frame>>>,
    stop: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
    timeout: Duration,
}

impl ThreadedFrameSource {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn spawn<G: FrameGrabber>(mut grabber: G, timeout: Duration) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded(2);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let join_handle = std::thread::Builder::new()
            .name("frame-grabber".to_string())
            .spawn(move || {
                while !thread_stop.load(Ordering::SeqCst) {
                    match grabber.grab() {
                        Ok(Some(frame)) => {
                            if tx.send(Ok(frame)).is_err() {
                                break;
                            }
                        }
                        Ok(None) => {
                            debug!("frame grabber reached the end of its frames");
                            break;
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            break;
                        }
                    }
                }
            })
            .map_err(Error::Spawn)?;
        Ok(Self {
            rx: Some(rx),
            stop,
            join_handle: Some(join_handle),
            timeout,
        })
    }
}

impl FrameSource for ThreadedFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(rx) = &self.rx else {
            return Ok(None);
        };
        match rx.recv_timeout(self.timeout) {
            Ok(frame) => frame.map(Some),
            Err(RecvTimeoutError::Timeout) => {
                error!("camera timeout after {:?}", self.timeout);
                Err(Error::CameraTimeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}

impl Drop for ThreadedFrameSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // unblocks a grabber waiting on a full queue
        self.rx.take();
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                error!("frame grabber thread panicked");
            }
        }
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["bmp", "jpeg", "jpg", "png", "tif", "tiff"];

/// Replays the images of a directory, in file name order, as a camera.
pub struct ImageDirectoryGrabber {
    files: Vec<PathBuf>,
    period: Duration,
    next: usize,
    n_grabbed: u64,
    repeat: bool,
    max_frames: Option<u64>,
    realtime: bool,
    start_wall_clock: NaiveDateTime,
    start: Instant,
}

impl ImageDirectoryGrabber {
    pub fn new<P: AsRef<Path>>(dir: P, fps: f64) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if is_image {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(Error::NoImages(dir.to_path_buf()));
        }
        files.sort();
        let fps = if fps > 0.0 { fps } else { 1.0 };
        Ok(Self {
            files,
            period: Duration::from_secs_f64(1.0 / fps),
            next: 0,
            n_grabbed: 0,
            repeat: false,
            max_frames: None,
            realtime: false,
            start_wall_clock: Local::now().naive_local(),
            start: Instant::now(),
        })
    }

    /// Start over after the last image instead of ending.
    pub fn repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Pace frames at the configured rate instead of as fast as possible.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameGrabber for ImageDirectoryGrabber {
    fn grab(&mut self) -> Result<Option<Frame>> {
        if self.max_frames.is_some_and(|max| self.n_grabbed >= max) {
            return Ok(None);
        }
        if self.next >= self.files.len() {
            if !self.repeat {
                return Ok(None);
            }
            self.next = 0;
        }
        let image = image::open(&self.files[self.next])?.to_luma8();
        self.next += 1;

        let elapsed = self.period * self.n_grabbed as u32;
        if self.realtime {
            if let Some(wait) = elapsed.checked_sub(self.start.elapsed()) {
                std::thread::sleep(wait);
            }
        }
        self.n_grabbed += 1;
        let t_ms = elapsed.as_millis() as u64;
        Ok(Some(Frame {
            t_ms,
            wall_clock: self.start_wall_clock + TimeDelta::milliseconds(t_ms as i64),
            image,
        }))
    }
}
