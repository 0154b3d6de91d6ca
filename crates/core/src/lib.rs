//! PDF Viewer Core Library
//!
//! Session state for an embeddable PDF viewer: configuration, page layout,
//! viewport tracking, render scheduling and the events sent back to the host
//! view.
//!
//! A host creates one [`DocumentSession`] per view, feeds it configuration
//! updates and scroll notifications, and receives [`ViewerEvent`]s and scroll
//! commands through its [`ViewerHost`] implementation.

pub mod config;
pub mod error;
pub mod event;
pub mod session;
pub mod viewport;

pub use config::{Argb, ConfigUpdate, ViewerConfig, ViewerSettings};
pub use error::{ConfigError, SessionError, SessionResult};
pub use event::{HostCommand, RecordingHost, ViewerEvent, ViewerHost};
pub use session::{DocumentSession, SessionState};
pub use viewport::{plan_scroll, ScrollPlan, ScrollTarget, ViewportState};
