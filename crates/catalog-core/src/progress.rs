//! Asset loading progress.
//!
//! [`LoadingManager`] counts asset fetches and produces the start / progress /
//! done / error stream. [`ProgressMeter`] is the consumer side: once a cycle
//! reports `Done` it ignores trailing events until a new cycle starts.

use fnv::FnvHashMap;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Start,
    Progress,
    Done,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub loaded: usize,
    pub total: usize,
    pub url: Option<String>,
}

impl ProgressEvent {
    fn new(phase: ProgressPhase, loaded: usize, total: usize, url: Option<&str>) -> Self {
        Self {
            phase,
            loaded,
            total,
            url: url.map(str::to_string),
        }
    }
}

/// Counts items in the current loading cycle.
#[derive(Debug, Default)]
pub struct LoadingManager {
    loading: bool,
    loaded: usize,
    total: usize,
    in_flight: FnvHashMap<String, usize>,
}

impl LoadingManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn item_start(&mut self, url: &str) -> Vec<ProgressEvent> {
        let mut out = Vec::new();
        *self.in_flight.entry(url.to_string()).or_insert(0) += 1;
        self.total += 1;
        if !self.loading {
            out.push(ProgressEvent::new(ProgressPhase::Start, self.loaded, self.total, Some(url)));
        }
        self.loading = true;
        out
    }

    /// Completions for URLs that were never started are ignored.
    pub fn item_end(&mut self, url: &str) -> Vec<ProgressEvent> {
        let mut out = Vec::new();
        match self.in_flight.get_mut(url) {
            Some(n) if *n > 1 => *n -= 1,
            Some(_) => {
                self.in_flight.remove(url);
            }
            None => return out,
        }
        self.loaded += 1;
        out.push(ProgressEvent::new(ProgressPhase::Progress, self.loaded, self.total, Some(url)));
        if self.loaded >= self.total {
            self.loading = false;
            out.push(ProgressEvent::new(ProgressPhase::Done, 1, 1, None));
            self.loaded = 0;
            self.total = 0;
        }
        out
    }

    /// A failed item still counts toward completion.
    pub fn item_error(&mut self, url: &str) -> Vec<ProgressEvent> {
        if !self.in_flight.contains_key(url) {
            return Vec::new();
        }
        let mut out = vec![ProgressEvent::new(ProgressPhase::Error, 0, 0, Some(url))];
        out.extend(self.item_end(url));
        out
    }

    /// Report a completed cycle with nothing to fetch.
    pub fn done_now(&self) -> ProgressEvent {
        ProgressEvent::new(ProgressPhase::Done, 1, 1, None)
    }
}

/// Consumer view of the progress stream for a loading overlay.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressMeter {
    pub loaded: usize,
    pub total: usize,
    pub done: bool,
}

impl ProgressMeter {
    pub fn apply(&mut self, ev: &ProgressEvent) {
        match ev.phase {
            ProgressPhase::Done => {
                self.done = true;
                self.loaded = 1;
                self.total = 1;
            }
            _ if self.done => {}
            ProgressPhase::Start | ProgressPhase::Progress => {
                self.loaded = ev.loaded;
                self.total = ev.total.max(ev.loaded);
            }
            ProgressPhase::Error => {}
        }
    }

    /// Re-arm for a new loading cycle.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn fraction(&self) -> f32 {
        if self.done {
            return 1.0;
        }
        if self.total == 0 {
            return 0.1;
        }
        (self.loaded as f32 / self.total as f32).clamp(0.0, 1.0)
    }
}
