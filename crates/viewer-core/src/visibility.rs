use crate::layout::{Orientation, PageGeometry};

/// Share of the viewport and of the page below which the first visible page
/// yields to its successor.
const HANDOFF_RATIO: f64 = 0.5;

/// Length of the overlap between a page's primary extent and the viewport
/// interval `[start, end]`. The bounds may be supplied in either order.
pub fn visible_pixels(page: &PageGeometry, orientation: Orientation, start: f64, end: f64) -> f64 {
    let (start, end) = if end < start { (end, start) } else { (start, end) };
    let page_start = page.primary_offset;
    let page_end = page.primary_end(orientation);

    (page_end.min(end) - page_start.max(start)).max(0.0)
}

/// Resolves the page that should drive pagination for the viewport starting
/// at `offset_start` and spanning `viewport_size` along the primary axis.
///
/// Scans in storage order for the first page with a positive overlap. When
/// that page fills at most half the viewport, shows at most half of itself
/// and has a successor, the successor wins. With no overlap at all the last
/// page is returned. `None` only for an empty document.
pub fn current_page(
    pages: &[PageGeometry],
    orientation: Orientation,
    offset_start: f64,
    viewport_size: f64,
) -> Option<usize> {
    let last = pages.len().checked_sub(1)?;
    let offset_end = offset_start + viewport_size;

    let first_visible = pages.iter().enumerate().find_map(|(index, page)| {
        let pixels = visible_pixels(page, orientation, offset_start, offset_end);
        (pixels > 0.0).then_some((index, pixels))
    });

    let Some((index, pixels)) = first_visible else {
        return Some(last);
    };

    let viewport_covered = pixels / viewport_size.abs();
    let page_visible = pixels / pages[index].primary_size(orientation);

    if viewport_covered <= HANDOFF_RATIO && page_visible <= HANDOFF_RATIO && index < last {
        return Some(index + 1);
    }

    Some(index)
}

/// Every page whose primary extent overlaps `[start, end]`, in storage order.
pub fn overlapping_pages(
    pages: &[PageGeometry],
    orientation: Orientation,
    start: f64,
    end: f64,
) -> Vec<usize> {
    pages
        .iter()
        .enumerate()
        .filter(|(_, page)| visible_pixels(page, orientation, start, end) > 0.0)
        .map(|(index, _)| index)
        .collect()
}

/// First page (storage order) whose slot, including both scaled margins,
/// contains the primary-axis `position`.
pub fn page_at_position(
    pages: &[PageGeometry],
    orientation: Orientation,
    position: f64,
    scaled_margin: f64,
) -> Option<usize> {
    pages.iter().position(|page| {
        let end = page.primary_end(orientation) + 2.0 * scaled_margin;
        position >= page.primary_offset && position <= end
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{compute_layout, LayoutParams};

    fn strip(heights: &[f64], margin: f64) -> Vec<PageGeometry> {
        let mut pages: Vec<PageGeometry> =
            heights.iter().map(|&h| PageGeometry::new(100.0, h)).collect();
        compute_layout(&mut pages, &LayoutParams { margin, ..LayoutParams::default() });
        pages
    }

    #[test]
    fn visible_pixels_normalizes_reversed_bounds() {
        let pages = strip(&[100.0, 100.0], 0.0);
        let v = Orientation::Vertical;

        assert_eq!(visible_pixels(&pages[0], v, 50.0, 150.0), 50.0);
        assert_eq!(visible_pixels(&pages[0], v, 150.0, 50.0), 50.0);
        assert_eq!(visible_pixels(&pages[1], v, 0.0, 100.0), 0.0);
        assert_eq!(visible_pixels(&pages[1], v, 120.0, 150.0), 30.0);
        assert_eq!(visible_pixels(&pages[0], v, -20.0, 500.0), 100.0);
    }

    #[test]
    fn first_overlapping_page_is_current() {
        let pages = strip(&[100.0, 100.0, 100.0], 0.0);
        assert_eq!(current_page(&pages, Orientation::Vertical, 0.0, 100.0), Some(0));
        assert_eq!(current_page(&pages, Orientation::Vertical, 20.0, 100.0), Some(0));
    }

    #[test]
    fn boundary_at_half_hands_off_to_next_page() {
        let pages = strip(&[100.0, 100.0, 100.0], 0.0);
        assert_eq!(current_page(&pages, Orientation::Vertical, 50.0, 100.0), Some(1));
        assert_eq!(current_page(&pages, Orientation::Vertical, 49.0, 100.0), Some(0));
    }

    #[test]
    fn last_page_never_hands_off() {
        let pages = strip(&[100.0, 100.0], 0.0);
        assert_eq!(current_page(&pages, Orientation::Vertical, 180.0, 100.0), Some(1));
    }

    #[test]
    fn small_page_filling_little_of_a_large_viewport_stays_when_fully_visible() {
        let pages = strip(&[50.0, 1000.0], 0.0);
        // Page 0 shows entirely, so the handoff condition does not hold.
        assert_eq!(current_page(&pages, Orientation::Vertical, 0.0, 500.0), Some(0));
    }

    #[test]
    fn no_overlap_clamps_to_last_page() {
        let pages = strip(&[100.0, 100.0], 0.0);
        assert_eq!(current_page(&pages, Orientation::Vertical, 5000.0, 100.0), Some(1));
        assert_eq!(current_page(&[], Orientation::Vertical, 0.0, 100.0), None);
    }

    #[test]
    fn overlapping_pages_collects_every_hit() {
        let pages = strip(&[100.0, 100.0, 100.0, 100.0], 10.0);
        // Offsets: 0, 120, 240, 360.
        assert_eq!(overlapping_pages(&pages, Orientation::Vertical, 90.0, 250.0), vec![0, 1, 2]);
        assert!(overlapping_pages(&pages, Orientation::Vertical, 101.0, 119.0).is_empty());
    }

    #[test]
    fn hit_test_includes_margins() {
        let pages = strip(&[100.0, 100.0], 10.0);
        assert_eq!(page_at_position(&pages, Orientation::Vertical, 110.0, 10.0), Some(0));
        assert_eq!(page_at_position(&pages, Orientation::Vertical, 121.0, 10.0), Some(1));
        assert_eq!(page_at_position(&pages, Orientation::Vertical, 500.0, 10.0), None);
    }
}
