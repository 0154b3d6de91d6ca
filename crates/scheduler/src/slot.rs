//! Per-page render state
//!
//! A [`RenderSlot`] holds a marker for the page's newest render claim and the
//! last bitmap that was published for it. The marker is a single atomic word
//! so any number of in-flight renders for the same page can race on it
//! without a lock; only publishing the bitmap takes the slot's own mutex.
//!
//! The marker packs a claim sequence number (high 32 bits) with the claimed
//! scale as an `f32` (low 32 bits). Every claim bumps the sequence, so a
//! claim is recognised by the whole word and two claims at the same scale
//! never look alike.

use pdf_engine::RgbaImage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Factor above the display scale at which a cached bitmap counts as wasteful
/// and is re-rendered at the smaller scale.
pub const DOWNSCALE_THRESHOLD: f64 = 2.0;

/// Returns `true` if a bitmap rendered at `rendered` should be replaced for a
/// page displayed at `target`.
///
/// Zooming in past the cached resolution always refreshes. Zooming out only
/// refreshes once the cache is more than `threshold` times too large.
pub fn needs_render(rendered: f64, target: f64, threshold: f64) -> bool {
    rendered < target || rendered > target * threshold
}

/// Round `scale` to the precision a slot stores it at.
pub fn quantize_scale(scale: f64) -> f64 {
    f64::from(scale as f32)
}

fn pack(sequence: u32, scale: f32) -> u64 {
    (u64::from(sequence) << 32) | u64::from(scale.to_bits())
}

fn sequence_of(marker: u64) -> u32 {
    (marker >> 32) as u32
}

fn scale_of(marker: u64) -> f64 {
    f64::from(f32::from_bits(marker as u32))
}

/// A published page image together with the scale it was rasterized at.
#[derive(Debug)]
pub struct Bitmap {
    pub scale: f64,
    pub image: RgbaImage,
}

/// Permission to render a page at `scale`, obtained from
/// [`RenderSlot::claim`].
///
/// A claim stays valid only while no newer claim replaces it; that is
/// re-checked when the result is published.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Claim {
    marker: u64,
    previous: u64,
}

impl Claim {
    /// Scale this claim renders at
    pub fn scale(&self) -> f64 {
        scale_of(self.marker)
    }

    /// Scale the slot held before this claim
    pub fn previous(&self) -> f64 {
        scale_of(self.previous)
    }
}

/// Why [`RenderSlot::claim`] declined to start a render
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClaimRejected {
    /// The slot's current scale already suits the display scale
    UpToDate,

    /// Another request claimed an equal or larger scale first
    Superseded { by: f64 },
}

/// Render state of one page
#[derive(Debug)]
pub struct RenderSlot {
    /// Packed claim sequence and scale of the newest claim; scale `0.0`
    /// before any render.
    marker: AtomicU64,
    bitmap: Mutex<Option<Arc<Bitmap>>>,
}

impl RenderSlot {
    /// Create an empty slot with no render and no bitmap
    pub fn new() -> Self {
        Self { marker: AtomicU64::new(pack(0, 0.0)), bitmap: Mutex::new(None) }
    }

    /// Scale of the newest claim, which may still be in flight
    pub fn rendered_scale(&self) -> f64 {
        scale_of(self.marker.load(Ordering::Acquire))
    }

    /// Last published bitmap, if any
    pub fn bitmap(&self) -> Option<Arc<Bitmap>> {
        self.bitmap.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    /// Staleness of this slot for a page displayed at `display_scale`
    pub fn needs_render(&self, display_scale: f64, threshold: f64) -> bool {
        needs_render(self.rendered_scale(), quantize_scale(display_scale), threshold)
    }

    /// Claim the slot for a render at `render_scale`.
    ///
    /// Staleness is judged against `display_scale`, the scale the page is
    /// laid out at. A regular render passes the same value for both; a
    /// preview render asks for less than the display scale. Both are rounded
    /// with [`quantize_scale`] first.
    ///
    /// The claim marker is swapped in before any work starts. If a concurrent
    /// request has already claimed a scale of at least `render_scale` this
    /// one backs off.
    pub fn claim(
        &self,
        display_scale: f64,
        render_scale: f64,
        threshold: f64,
    ) -> Result<Claim, ClaimRejected> {
        let display_scale = quantize_scale(display_scale);
        let render_scale = render_scale as f32;
        let mut current_marker = self.marker.load(Ordering::Acquire);

        loop {
            let current = scale_of(current_marker);
            if !needs_render(current, display_scale, threshold) {
                return Err(ClaimRejected::UpToDate);
            }

            let next = pack(sequence_of(current_marker).wrapping_add(1), render_scale);
            match self.marker.compare_exchange_weak(
                current_marker,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    log::trace!("claimed render at {render_scale} (was {current})");
                    return Ok(Claim { marker: next, previous: current_marker });
                }
                Err(observed_marker) => {
                    let observed = scale_of(observed_marker);
                    // compare_exchange_weak may fail spuriously with nothing changed.
                    if observed_marker != current_marker && observed >= f64::from(render_scale) {
                        return Err(ClaimRejected::Superseded { by: observed });
                    }
                    current_marker = observed_marker;
                }
            }
        }
    }

    /// Store `image` as the page bitmap if `claim` is still the newest claim.
    ///
    /// Returns `false` and drops the image when a later claim has replaced
    /// it in the meantime.
    pub fn publish(&self, claim: &Claim, image: RgbaImage) -> bool {
        let mut bitmap = self.bitmap.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if self.marker.load(Ordering::Acquire) != claim.marker {
            log::trace!(
                "discarding render at {} (slot now at {})",
                claim.scale(),
                self.rendered_scale()
            );
            return false;
        }

        *bitmap = Some(Arc::new(Bitmap { scale: claim.scale(), image }));
        log::trace!("published render at {}", claim.scale());
        true
    }

    /// Undo `claim` after its render failed.
    ///
    /// The marker goes back to what the slot held before the claim, unless
    /// any later claim has been made, even one at the same scale. Returns
    /// whether the rollback happened.
    pub fn rollback(&self, claim: Claim) -> bool {
        self.marker
            .compare_exchange(claim.marker, claim.previous, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for RenderSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> RgbaImage {
        RgbaImage::new(1, 1)
    }

    #[test]
    fn test_needs_render_hysteresis() {
        assert!(needs_render(0.0, 1.0, DOWNSCALE_THRESHOLD));
        assert!(needs_render(0.9, 1.0, DOWNSCALE_THRESHOLD));
        assert!(!needs_render(1.0, 1.0, DOWNSCALE_THRESHOLD));
        assert!(!needs_render(2.0, 1.0, DOWNSCALE_THRESHOLD));
        assert!(needs_render(2.01, 1.0, DOWNSCALE_THRESHOLD));
    }

    #[test]
    fn test_claim_marks_slot_before_rendering() {
        let slot = RenderSlot::new();
        let claim = slot.claim(1.5, 1.5, DOWNSCALE_THRESHOLD).unwrap();

        assert_eq!(claim.scale(), 1.5);
        assert_eq!(claim.previous(), 0.0);
        assert_eq!(slot.rendered_scale(), 1.5);
        assert!(slot.bitmap().is_none());
    }

    #[test]
    fn test_second_claim_at_same_scale_is_up_to_date() {
        let slot = RenderSlot::new();
        slot.claim(1.0, 1.0, DOWNSCALE_THRESHOLD).unwrap();

        assert_eq!(slot.claim(1.0, 1.0, DOWNSCALE_THRESHOLD), Err(ClaimRejected::UpToDate));
    }

    #[test]
    fn test_preview_claim_judged_against_display_scale() {
        let slot = RenderSlot::new();
        let preview = slot.claim(1.0, 0.5, DOWNSCALE_THRESHOLD).unwrap();
        assert_eq!(preview.scale(), 0.5);

        // The preview leaves the page stale for its display scale.
        assert!(slot.needs_render(1.0, DOWNSCALE_THRESHOLD));
        let full = slot.claim(1.0, 1.0, DOWNSCALE_THRESHOLD).unwrap();
        assert_eq!(full.previous(), 0.5);
    }

    #[test]
    fn test_zoom_out_far_enough_reclaims_lower_scale() {
        let slot = RenderSlot::new();
        slot.claim(3.0, 3.0, DOWNSCALE_THRESHOLD).unwrap();

        assert_eq!(slot.claim(2.0, 2.0, DOWNSCALE_THRESHOLD), Err(ClaimRejected::UpToDate));
        let claim = slot.claim(1.0, 1.0, DOWNSCALE_THRESHOLD).unwrap();
        assert_eq!(claim.previous(), 3.0);
        assert_eq!(slot.rendered_scale(), 1.0);
    }

    #[test]
    fn test_publish_discards_superseded_claim() {
        let slot = RenderSlot::new();
        let low = slot.claim(1.0, 1.0, DOWNSCALE_THRESHOLD).unwrap();
        let high = slot.claim(2.0, 2.0, DOWNSCALE_THRESHOLD).unwrap();

        assert!(slot.publish(&high, image()));
        assert!(!slot.publish(&low, image()));
        assert_eq!(slot.bitmap().unwrap().scale, 2.0);
    }

    #[test]
    fn test_rollback_restores_previous_scale() {
        let slot = RenderSlot::new();
        let claim = slot.claim(1.0, 1.0, DOWNSCALE_THRESHOLD).unwrap();

        assert!(slot.rollback(claim));
        assert_eq!(slot.rendered_scale(), 0.0);
    }

    #[test]
    fn test_rollback_keeps_newer_claim() {
        let slot = RenderSlot::new();
        let first = slot.claim(1.0, 1.0, DOWNSCALE_THRESHOLD).unwrap();
        slot.claim(2.0, 2.0, DOWNSCALE_THRESHOLD).unwrap();

        assert!(!slot.rollback(first));
        assert_eq!(slot.rendered_scale(), 2.0);
    }

    #[test]
    fn test_rollback_ignores_newer_claim_at_same_scale() {
        let slot = RenderSlot::new();
        let first = slot.claim(1.0, 1.0, DOWNSCALE_THRESHOLD).unwrap();
        slot.claim(3.0, 3.0, DOWNSCALE_THRESHOLD).unwrap();
        let latest = slot.claim(1.0, 1.0, DOWNSCALE_THRESHOLD).unwrap();
        assert_eq!(latest.scale(), first.scale());

        assert!(!slot.rollback(first));
        assert_eq!(slot.rendered_scale(), 1.0);
        assert!(slot.publish(&latest, image()));
        assert_eq!(slot.bitmap().unwrap().scale, 1.0);
    }

    #[test]
    fn test_publish_rejects_older_claim_at_same_scale() {
        let slot = RenderSlot::new();
        let first = slot.claim(1.0, 1.0, DOWNSCALE_THRESHOLD).unwrap();
        slot.claim(3.0, 3.0, DOWNSCALE_THRESHOLD).unwrap();
        let latest = slot.claim(1.0, 1.0, DOWNSCALE_THRESHOLD).unwrap();

        assert!(!slot.publish(&first, image()));
        assert!(slot.publish(&latest, image()));
    }

    #[test]
    fn test_rollback_after_failed_newer_claim_revives_older_one() {
        let slot = RenderSlot::new();
        let low = slot.claim(1.0, 1.0, DOWNSCALE_THRESHOLD).unwrap();
        let high = slot.claim(2.0, 2.0, DOWNSCALE_THRESHOLD).unwrap();

        assert!(slot.rollback(high));
        assert_eq!(slot.rendered_scale(), 1.0);
        assert!(slot.publish(&low, image()));
    }

    #[test]
    fn test_claims_store_quantized_scale() {
        let slot = RenderSlot::new();
        let scale = 220.0 / 120.0;
        let claim = slot.claim(scale, scale, DOWNSCALE_THRESHOLD).unwrap();

        assert_eq!(claim.scale(), quantize_scale(scale));
        assert!((claim.scale() - scale).abs() < 1e-6);
        assert!(!slot.needs_render(scale, DOWNSCALE_THRESHOLD));
    }

    #[test]
    fn test_concurrent_claims_leave_a_winning_claim() {
        let slot = Arc::new(RenderSlot::new());
        let handles: Vec<_> = (1..=8)
            .map(|step| {
                let slot = Arc::clone(&slot);
                std::thread::spawn(move || {
                    let scale = step as f64 * 0.5;
                    slot.claim(scale, scale, DOWNSCALE_THRESHOLD).ok()
                })
            })
            .collect();

        let winners: Vec<f64> = handles
            .into_iter()
            .filter_map(|handle| handle.join().unwrap())
            .map(|claim| claim.scale())
            .collect();

        assert!(!winners.is_empty());
        assert!(winners.contains(&slot.rendered_scale()));
    }
}
