//! Host services the runtime needs from its environment.
//!
//! A browser provides these as `fetch`, `requestAnimationFrame`, `location`
//! and `window.open`. The implementations here are for running the runtime
//! outside a browser: against files on disk or fully in memory.

use crate::error::{RuntimeError, RuntimeResult};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

/// Fetches the overlay artifact named by the config block
pub trait ArtifactLoader {
    fn load(&self, overlay_path: &str) -> RuntimeResult<String>;
}

/// Runs callbacks on the next animation frame
pub trait FrameScheduler {
    fn request_frame(&self, callback: Box<dyn FnOnce()>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    SameTab(String),
    NewTab(String),
}

pub trait Navigator {
    fn navigate(&self, navigation: &Navigation);
}

/// Delivers trace posts; failures are reported back and then ignored
pub trait TraceTransport {
    fn post(&self, endpoint: &str, body: &Value) -> Result<(), String>;
}

// -- loaders ------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    artifacts: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, overlay_path: impl Into<String>, body: impl Into<String>) -> Self {
        self.artifacts.insert(overlay_path.into(), body.into());
        self
    }
}

impl ArtifactLoader for MemoryLoader {
    fn load(&self, overlay_path: &str) -> RuntimeResult<String> {
        self.artifacts
            .get(overlay_path)
            .cloned()
            .ok_or_else(|| RuntimeError::artifact_load(overlay_path, "not found"))
    }
}

/// Resolves overlay web paths under a web root directory
#[derive(Debug, Clone)]
pub struct FsLoader {
    web_root: PathBuf,
}

impl FsLoader {
    pub fn new(web_root: impl Into<PathBuf>) -> Self {
        Self {
            web_root: web_root.into(),
        }
    }
}

impl ArtifactLoader for FsLoader {
    fn load(&self, overlay_path: &str) -> RuntimeResult<String> {
        let path = overlay_path.split(['?', '#']).next().unwrap_or_default();
        let mut file = self.web_root.clone();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if part == ".." {
                return Err(RuntimeError::artifact_load(overlay_path, "path escapes web root"));
            }
            file.push(part);
        }
        std::fs::read_to_string(&file).map_err(|err| RuntimeError::artifact_load(overlay_path, err.to_string()))
    }
}

// -- frames -------------------------------------------------------------------

/// Frame queue driven by the caller
#[derive(Default)]
pub struct FrameQueue {
    callbacks: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.callbacks.borrow().len()
    }

    /// Run the callbacks queued before this frame started. Returns how many ran.
    pub fn run_frame(&self) -> usize {
        let due: Vec<Box<dyn FnOnce()>> = self.callbacks.borrow_mut().drain(..).collect();
        let count = due.len();
        for callback in due {
            callback();
        }
        count
    }
}

impl std::fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameQueue").field("pending", &self.pending()).finish()
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&self, callback: Box<dyn FnOnce()>) {
        self.callbacks.borrow_mut().push_back(callback);
    }
}

// -- navigation and transport -------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: RefCell<Vec<Navigation>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Navigation> {
        self.history.borrow().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, navigation: &Navigation) {
        self.history.borrow_mut().push(navigation.clone());
    }
}

/// Drops every post
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

impl TraceTransport for NullTransport {
    fn post(&self, _endpoint: &str, _body: &Value) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    posts: RefCell<Vec<(String, Value)>>,
    failing: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records posts but reports every one as failed
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn posts(&self) -> Vec<(String, Value)> {
        self.posts.borrow().clone()
    }
}

impl TraceTransport for RecordingTransport {
    fn post(&self, endpoint: &str, body: &Value) -> Result<(), String> {
        self.posts.borrow_mut().push((endpoint.to_string(), body.clone()));
        if self.failing {
            return Err("connection refused".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_fs_loader_maps_web_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Uploads/1/.bugence/dve")).unwrap();
        std::fs::write(dir.path().join("Uploads/1/.bugence/dve/overlay-2.json"), "{}").unwrap();

        let loader = FsLoader::new(dir.path());
        assert_eq!(loader.load("/Uploads/1/.bugence/dve/overlay-2.json?v=1").unwrap(), "{}");
        assert!(loader.load("/Uploads/1/missing.json").is_err());
        assert!(loader.load("/../secret.json").is_err());
    }

    #[test]
    fn test_frames_queued_during_a_frame_wait_for_the_next() {
        let frames = Rc::new(FrameQueue::new());
        let counter = Rc::new(std::cell::Cell::new(0));
        let (inner_frames, inner_counter) = (frames.clone(), counter.clone());
        frames.request_frame(Box::new(move || {
            inner_counter.set(inner_counter.get() + 1);
            let again = inner_counter.clone();
            inner_frames.request_frame(Box::new(move || again.set(again.get() + 1)));
        }));

        assert_eq!(frames.run_frame(), 1);
        assert_eq!(counter.get(), 1);
        assert_eq!(frames.pending(), 1);
        assert_eq!(frames.run_frame(), 1);
        assert_eq!(counter.get(), 2);
    }
}
