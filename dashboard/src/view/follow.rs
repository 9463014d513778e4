//! Tail-follow for the build-log view

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::channel::{LogChannel, SubscriptionId};
use crate::models::log_line::LogLine;

/// The window of log lines currently in view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    /// Index of the first visible line
    pub first: usize,

    /// Number of lines the view can show
    pub height: usize,

    /// Length of the sequence the viewport was last reconciled against
    pub len: usize,
}

impl Viewport {
    /// Index of the last visible line, if any
    pub fn last(&self) -> Option<usize> {
        let end = (self.first + self.height).min(self.len);
        end.checked_sub(1).filter(|last| *last >= self.first)
    }
}

/// Keeps the newest log line in view.
///
/// Every append snaps the viewport to the tail, including after a manual
/// scroll: the user is never trapped, but the view does not stay where they
/// left it while lines keep arriving.
pub struct TailFollower {
    viewport: Mutex<Viewport>,
}

impl TailFollower {
    pub fn new(height: usize) -> Self {
        Self {
            viewport: Mutex::new(Viewport {
                first: 0,
                height: height.max(1),
                len: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Viewport> {
        self.viewport.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Follow the channel: reconcile after every appended line
    pub fn attach(self: &Arc<Self>, channel: &Arc<LogChannel>) -> SubscriptionId {
        let follower = Arc::downgrade(self);
        let source = Arc::downgrade(channel);
        channel.subscribe(move |_| {
            if let (Some(follower), Some(source)) = (follower.upgrade(), source.upgrade()) {
                follower.follow(source.len());
            }
        })
    }

    /// Bring the last of `len` lines into view.
    ///
    /// Returns whether the viewport moved; calling again with the same
    /// length is a no-op.
    pub fn follow(&self, len: usize) -> bool {
        let mut viewport = self.lock();
        let first = len.saturating_sub(viewport.height);
        if viewport.first == first && viewport.len == len {
            return false;
        }
        viewport.first = first;
        viewport.len = len;
        true
    }

    /// Manual scroll, clamped to the known sequence
    pub fn scroll_to(&self, first: usize) {
        let mut viewport = self.lock();
        viewport.first = first.min(viewport.len.saturating_sub(1));
    }

    pub fn viewport(&self) -> Viewport {
        *self.lock()
    }

    /// The visible slice of `lines`
    pub fn window<'a>(&self, lines: &'a [LogLine]) -> &'a [LogLine] {
        let viewport = self.viewport();
        let first = viewport.first.min(lines.len());
        let end = (first + viewport.height).min(lines.len());
        &lines[first..end]
    }
}
