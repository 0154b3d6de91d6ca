//! Host boundary
//!
//! The session never touches widgets. Everything the host has to react to
//! goes out through [`ViewerHost`]: notifications as [`ViewerEvent`]s, plus
//! scroll and presentation commands.

use std::sync::{Mutex, MutexGuard};

/// Notification forwarded to the host.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ViewerEvent {
    Error { message: String },
    LoadComplete { page_count: u32, width: f64, height: f64 },
    /// 1-based page number
    PageChanged { page: u32, total: u32 },
    ScaleChanged { scale: f64 },
    /// 1-based page number and viewport-relative tap position
    PageTapped { page: u32, x: f64, y: f64 },
}

impl ViewerEvent {
    /// Pipe-delimited encoding used by string-message hosts.
    pub fn to_message(&self) -> String {
        match self {
            Self::Error { message } => format!("error|{message}"),
            Self::LoadComplete { page_count, width, height } => {
                format!("loadComplete|{page_count}|{width}|{height}|")
            }
            Self::PageChanged { page, total } => format!("pageChanged|{page}|{total}"),
            Self::ScaleChanged { scale } => format!("scale|{scale}"),
            Self::PageTapped { page, x, y } => format!("pageSingleTap|{page}|{x}|{y}"),
        }
    }
}

/// Receiver for everything the session asks of its host.
///
/// Calls are made after the session has released its state lock, so a host
/// may call back into the session from inside them.
pub trait ViewerHost: Send + Sync {
    fn emit(&self, event: ViewerEvent);

    /// Move the scroll container to the given offsets.
    fn scroll_to(&self, _horizontal: f64, _vertical: f64) {}

    /// Replace the presented pages (storage indices, in presentation order).
    fn present(&self, _pages: &[usize]) {}
}

/// Everything a [`RecordingHost`] received, in order.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum HostCommand {
    Event { event: ViewerEvent },
    ScrollTo { horizontal: f64, vertical: f64 },
    Present { pages: Vec<usize> },
}

/// Host that records every call, for tests and headless drivers.
#[derive(Debug, Default)]
pub struct RecordingHost {
    commands: Mutex<Vec<HostCommand>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HostCommand>> {
        self.commands.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn commands(&self) -> Vec<HostCommand> {
        self.lock().clone()
    }

    pub fn events(&self) -> Vec<ViewerEvent> {
        self.lock()
            .iter()
            .filter_map(|command| match command {
                HostCommand::Event { event } => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    /// Drains the recorded commands.
    pub fn take(&self) -> Vec<HostCommand> {
        std::mem::take(&mut *self.lock())
    }

    pub fn last_scroll(&self) -> Option<(f64, f64)> {
        self.lock().iter().rev().find_map(|command| match command {
            HostCommand::ScrollTo { horizontal, vertical } => Some((*horizontal, *vertical)),
            _ => None,
        })
    }
}

impl ViewerHost for RecordingHost {
    fn emit(&self, event: ViewerEvent) {
        self.lock().push(HostCommand::Event { event });
    }

    fn scroll_to(&self, horizontal: f64, vertical: f64) {
        self.lock().push(HostCommand::ScrollTo { horizontal, vertical });
    }

    fn present(&self, pages: &[usize]) {
        self.lock().push(HostCommand::Present { pages: pages.to_vec() });
    }
}
