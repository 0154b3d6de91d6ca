//! Render coordination
//!
//! Drives the claim / render / publish cycle of [`RenderSlot`]s against an
//! opened [`PdfDocument`]. Renders cannot be cancelled once started; a result
//! that lost its claim while in flight is dropped at publish time instead.

use crate::slot::{ClaimRejected, RenderSlot, DOWNSCALE_THRESHOLD};
use pdf_engine::{PdfDocument, RenderRequest};
use std::sync::Arc;

/// What happened to a single render request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The cached bitmap already suits the requested scale; nothing rendered
    UpToDate,

    /// An equal or larger scale was already claimed; nothing rendered
    Superseded,

    /// Rendered and stored as the page bitmap
    Published,

    /// Rendered, but a newer claim replaced this one before it finished
    Discarded,

    /// The engine failed; the claim was rolled back
    Failed,
}

/// A page to render, with the scale it is currently laid out at
#[derive(Debug, Clone)]
pub struct PageTarget {
    pub page_index: u32,
    pub slot: Arc<RenderSlot>,
    pub display_scale: f64,
}

impl PageTarget {
    pub fn new(page_index: u32, slot: Arc<RenderSlot>, display_scale: f64) -> Self {
        Self { page_index, slot, display_scale }
    }
}

/// Stateless render driver
///
/// All per-page state lives in the slots, so the coordinator is `Copy` and
/// can be moved into spawned futures freely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderCoordinator {
    downscale_threshold: f64,
    annotations: bool,
}

impl RenderCoordinator {
    /// Create a coordinator using `downscale_threshold` for staleness checks
    pub fn new(downscale_threshold: f64) -> Self {
        Self { downscale_threshold, annotations: false }
    }

    /// Draw annotation layers in every render issued by this coordinator
    pub fn with_annotations(mut self, annotations: bool) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn downscale_threshold(&self) -> f64 {
        self.downscale_threshold
    }

    pub fn needs_render(&self, slot: &RenderSlot, display_scale: f64) -> bool {
        slot.needs_render(display_scale, self.downscale_threshold)
    }

    /// Make sure the page is rendered at `target_scale`.
    ///
    /// Calling this again for the same scale while the first render is still
    /// in flight does not start a second render.
    pub async fn ensure_rendered(
        &self,
        document: &dyn PdfDocument,
        page_index: u32,
        slot: &RenderSlot,
        target_scale: f64,
    ) -> RenderOutcome {
        self.render_at(document, page_index, slot, target_scale, target_scale).await
    }

    /// Render the page at `render_scale` if it is stale for `display_scale`.
    pub async fn render_at(
        &self,
        document: &dyn PdfDocument,
        page_index: u32,
        slot: &RenderSlot,
        display_scale: f64,
        render_scale: f64,
    ) -> RenderOutcome {
        let claim = match slot.claim(display_scale, render_scale, self.downscale_threshold) {
            Ok(claim) => claim,
            Err(ClaimRejected::UpToDate) => return RenderOutcome::UpToDate,
            Err(ClaimRejected::Superseded { by }) => {
                log::trace!("page {page_index}: render at {render_scale} superseded by {by}");
                return RenderOutcome::Superseded;
            }
        };

        let request =
            RenderRequest { page_index, scale: claim.scale(), annotations: self.annotations };

        match document.render_page(request).await {
            Ok(image) => {
                if slot.publish(&claim, image) {
                    RenderOutcome::Published
                } else {
                    RenderOutcome::Discarded
                }
            }
            Err(err) => {
                log::warn!("page {page_index}: render at {} failed: {err}", claim.scale());
                slot.rollback(claim);
                RenderOutcome::Failed
            }
        }
    }

    /// Render `targets` one after another, in the order given.
    ///
    /// Each render is awaited before the next one starts, so at most one
    /// rasterization from this call is in flight at a time.
    pub async fn render_ahead(
        &self,
        document: &dyn PdfDocument,
        targets: &[PageTarget],
    ) -> Vec<(u32, RenderOutcome)> {
        let mut outcomes = Vec::with_capacity(targets.len());

        for target in targets {
            let outcome = self
                .ensure_rendered(document, target.page_index, &target.slot, target.display_scale)
                .await;
            outcomes.push((target.page_index, outcome));
        }

        outcomes
    }

    /// Render low-resolution previews of `targets`, never above
    /// `preview_zoom`.
    ///
    /// A page that already holds a render suitable for its display scale is
    /// left alone.
    pub async fn prime_previews(
        &self,
        document: &dyn PdfDocument,
        targets: &[PageTarget],
        preview_zoom: f64,
    ) -> usize {
        let mut published = 0;

        for target in targets {
            let scale = target.display_scale.min(preview_zoom);
            let outcome = self
                .render_at(document, target.page_index, &target.slot, target.display_scale, scale)
                .await;
            if outcome == RenderOutcome::Published {
                published += 1;
            }
        }

        log::debug!("primed {published} of {} previews", targets.len());
        published
    }
}

impl Default for RenderCoordinator {
    fn default() -> Self {
        Self::new(DOWNSCALE_THRESHOLD)
    }
}
