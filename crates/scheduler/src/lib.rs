//! PDF Viewer Scheduler Library
//!
//! Per-page render scheduling for the viewer.
//!
//! Every page owns a [`RenderSlot`]. Before a page is rasterized the slot is
//! claimed at the requested scale; when the render finishes its bitmap is
//! published only if that claim is still the newest one. Renders for the same
//! page may therefore overlap and complete in any order, and the slot still
//! ends up holding the most recently requested scale.
//!
//! # Example
//!
//! ```
//! use pdf_viewer_scheduler::{ClaimRejected, RenderSlot, DOWNSCALE_THRESHOLD};
//!
//! let slot = RenderSlot::new();
//!
//! // Zooming to 2x claims the page for a 2x render
//! let claim = slot.claim(2.0, 2.0, DOWNSCALE_THRESHOLD).unwrap();
//!
//! // Zooming back to 1.5x keeps the 2x render, it is within the threshold
//! assert_eq!(slot.claim(1.5, 1.5, DOWNSCALE_THRESHOLD), Err(ClaimRejected::UpToDate));
//!
//! // The finished render is still the newest claim, so it is published
//! assert!(slot.publish(&claim, pdf_engine::RgbaImage::new(200, 400)));
//! assert_eq!(slot.bitmap().unwrap().scale, 2.0);
//! ```

mod coordinator;
mod slot;

// Re-export public API
pub use coordinator::{PageTarget, RenderCoordinator, RenderOutcome};
pub use slot::{
    needs_render, quantize_scale, Bitmap, Claim, ClaimRejected, RenderSlot, DOWNSCALE_THRESHOLD,
};
