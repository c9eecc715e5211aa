//! Frame acquisition: sources, the shared frame buffer and the capture loop.

use crate::{Error, Result};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Raw RGB camera frame
pub type Frame = image::RgbImage;

/// Pause after a failed capture before trying again
const CAPTURE_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Camera subscription delivering frames on demand
pub trait FrameSource: Send {
    /// Grab the next frame. `Ok(None)` means no frame is available right now.
    fn capture(&mut self) -> Result<Option<Frame>>;

    /// Unsubscribe from the camera; further captures may fail
    fn release(&mut self) {}
}

/// A frame tagged with its arrival order
#[derive(Debug, Clone)]
pub struct BufferedFrame {
    pub id: u64,
    pub frame: Arc<Frame>,
}

/// Bounded queue of recent frames shared by the capture and detection threads.
///
/// The producer never waits: pushing into a full buffer evicts the oldest frame.
#[derive(Debug)]
pub struct FrameBuffer {
    capacity: usize,
    frames: Mutex<VecDeque<BufferedFrame>>,
    next_id: AtomicU64,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            next_id: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<BufferedFrame>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a frame and return its id
    pub fn push(&self, frame: Frame) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut frames = self.lock();
        while frames.len() >= self.capacity {
            frames.pop_front();
        }
        frames.push_back(BufferedFrame {
            id,
            frame: Arc::new(frame),
        });
        id
    }

    /// Most recent frame, if any
    pub fn latest(&self) -> Option<BufferedFrame> {
        self.lock().back().cloned()
    }

    /// Most recent frame newer than `seen`
    pub fn latest_after(&self, seen: Option<u64>) -> Option<BufferedFrame> {
        self.latest().filter(|f| seen.map_or(true, |id| f.id > id))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Pulls frames from a source into a [`FrameBuffer`] until shut down
pub struct CaptureWorker {
    source: Box<dyn FrameSource>,
    buffer: Arc<FrameBuffer>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl CaptureWorker {
    pub fn new(
        source: Box<dyn FrameSource>,
        buffer: Arc<FrameBuffer>,
        interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            buffer,
            interval,
            shutdown,
        }
    }

    /// Capture until the shutdown flag is set, then release the source.
    /// Returns the number of frames captured.
    pub fn run(mut self) -> u64 {
        let mut captured = 0u64;
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.source.capture() {
                Ok(Some(frame)) => {
                    self.buffer.push(frame);
                    captured += 1;
                    thread::sleep(self.interval);
                }
                Ok(None) => thread::sleep(self.interval),
                Err(e) => {
                    warn!("Error capturing frame: {}", e);
                    thread::sleep(CAPTURE_ERROR_BACKOFF);
                }
            }
        }
        self.source.release();
        info!("Capture stopped after {} frames", captured);
        captured
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .map_or(false, |ext| matches!(ext.as_str(), "png" | "jpg" | "jpeg"))
}

/// Replays still images from a directory in file-name order
#[derive(Debug)]
pub struct ImageDirSource {
    paths: Vec<PathBuf>,
    position: usize,
    looping: bool,
    released: bool,
}

impl ImageDirSource {
    /// Collect the PNG and JPEG files of `dir`
    ///
    /// # Errors
    ///
    /// Returns I/O errors, or `Error::FrameSource` when the directory has no images
    pub fn open<P: AsRef<Path>>(dir: P, looping: bool) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_image_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        if paths.is_empty() {
            return Err(Error::FrameSource(format!(
                "No PNG or JPEG images in {}",
                dir.display()
            )));
        }
        info!("Replaying {} images from {}", paths.len(), dir.display());
        Ok(Self::from_paths(paths, looping))
    }

    pub fn from_paths(paths: Vec<PathBuf>, looping: bool) -> Self {
        Self {
            paths,
            position: 0,
            looping,
            released: false,
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub const fn is_released(&self) -> bool {
        self.released
    }
}

impl FrameSource for ImageDirSource {
    fn capture(&mut self) -> Result<Option<Frame>> {
        if self.released {
            return Err(Error::FrameSource("source released".to_string()));
        }
        if self.position >= self.paths.len() {
            if !self.looping || self.paths.is_empty() {
                return Ok(None);
            }
            self.position = 0;
        }
        let path = &self.paths[self.position];
        self.position += 1;
        debug!("Loading frame {}", path.display());
        Ok(Some(image::open(path)?.to_rgb8()))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            debug!("Image directory source released");
        }
    }
}
