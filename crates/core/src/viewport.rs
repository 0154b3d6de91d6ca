use viewer_core::Orientation;

/// Visible window of the scroll container, in layout pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportState {
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewportState {
    pub fn new(offset_x: f64, offset_y: f64, width: f64, height: f64) -> Self {
        Self { offset_x, offset_y, width, height }
    }

    pub fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn primary_offset(&self, orientation: Orientation) -> f64 {
        match orientation {
            Orientation::Vertical => self.offset_y,
            Orientation::Horizontal => self.offset_x,
        }
    }

    pub fn primary_size(&self, orientation: Orientation) -> f64 {
        match orientation {
            Orientation::Vertical => self.height,
            Orientation::Horizontal => self.width,
        }
    }
}

/// Scroll offsets the session wants the host to move to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollTarget {
    pub horizontal: f64,
    pub vertical: f64,
}

impl ScrollTarget {
    pub fn new(horizontal: f64, vertical: f64) -> Self {
        Self { horizontal, vertical }
    }
}

/// How a scroll request is carried out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollPlan {
    /// Scroll right away, clamped to the scrollable range
    Now(ScrollTarget),
    /// The host has not laid out enough content yet; retry once it has
    Defer(ScrollTarget),
}

/// Decides whether `target` can be reached with the content size, as
/// `(width, height)`, that the host has laid out.
///
/// A target up to one viewport past the scrollable range is still reachable
/// when the viewport is larger than the remaining content; it is clamped.
/// Anything further away waits for the next layout pass.
pub fn plan_scroll(
    target: ScrollTarget,
    content: (f64, f64),
    viewport: &ViewportState,
) -> ScrollPlan {
    let (content_width, content_height) = content;
    let max_horizontal = (content_width - viewport.width).max(0.0);
    let max_vertical = (content_height - viewport.height).max(0.0);

    if target.horizontal <= max_horizontal + viewport.width
        && target.vertical <= max_vertical + viewport.height
    {
        ScrollPlan::Now(ScrollTarget::new(
            target.horizontal.min(max_horizontal),
            target.vertical.min(max_vertical),
        ))
    } else {
        ScrollPlan::Defer(target)
    }
}
