#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

impl Orientation {
    pub fn from_horizontal(horizontal: bool) -> Self {
        if horizontal {
            Self::Horizontal
        } else {
            Self::Vertical
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::Horizontal)
    }
}

/// On-screen geometry of one page.
///
/// Intrinsic sizes are fixed when the page is created; everything else is
/// rewritten by [`compute_layout`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub intrinsic_width: f64,
    pub intrinsic_height: f64,
    pub display_scale: f64,
    pub scaled_width: f64,
    pub scaled_height: f64,
    pub primary_offset: f64,
    pub secondary_offset: f64,
}

impl PageGeometry {
    pub fn new(intrinsic_width: f64, intrinsic_height: f64) -> Self {
        Self {
            intrinsic_width,
            intrinsic_height,
            display_scale: 1.0,
            scaled_width: intrinsic_width,
            scaled_height: intrinsic_height,
            primary_offset: 0.0,
            secondary_offset: 0.0,
        }
    }

    /// Scaled size along the scroll axis.
    pub fn primary_size(&self, orientation: Orientation) -> f64 {
        match orientation {
            Orientation::Vertical => self.scaled_height,
            Orientation::Horizontal => self.scaled_width,
        }
    }

    pub fn cross_size(&self, orientation: Orientation) -> f64 {
        match orientation {
            Orientation::Vertical => self.scaled_width,
            Orientation::Horizontal => self.scaled_height,
        }
    }

    pub fn primary_end(&self, orientation: Orientation) -> f64 {
        self.primary_offset + self.primary_size(orientation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub scale: f64,
    pub margin: f64,
    pub orientation: Orientation,
    pub reverse: bool,
}

impl LayoutParams {
    pub fn scaled_margin(&self) -> f64 {
        self.margin * self.scale
    }
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self { scale: 1.0, margin: 0.0, orientation: Orientation::Vertical, reverse: false }
    }
}

/// Total size of the laid-out page strip.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutExtent {
    pub primary: f64,
    pub cross: f64,
}

impl LayoutExtent {
    /// Extent as `(width, height)` for the given orientation.
    pub fn to_size(self, orientation: Orientation) -> (f64, f64) {
        match orientation {
            Orientation::Vertical => (self.cross, self.primary),
            Orientation::Horizontal => (self.primary, self.cross),
        }
    }
}

/// Lays out every page at `params.scale`.
///
/// Each page occupies its scaled primary size plus the scaled margin on both
/// sides; offsets accumulate in reading order, which is back-to-front when
/// `reverse` is set. Storage order of `pages` is never changed.
pub fn compute_layout(pages: &mut [PageGeometry], params: &LayoutParams) -> LayoutExtent {
    let scaled_margin = params.scaled_margin();
    let double_margin = scaled_margin * 2.0;
    let orientation = params.orientation;

    for page in pages.iter_mut() {
        page.display_scale = params.scale;
        page.scaled_width = page.intrinsic_width * params.scale;
        page.scaled_height = page.intrinsic_height * params.scale;
        page.secondary_offset = scaled_margin;
    }

    let mut cursor = 0.0;
    let mut place = |page: &mut PageGeometry| {
        page.primary_offset = cursor;
        cursor += page.primary_size(orientation) + double_margin;
    };

    if params.reverse {
        pages.iter_mut().rev().for_each(&mut place);
    } else {
        pages.iter_mut().for_each(&mut place);
    }

    let widest = pages.iter().map(|page| page.cross_size(orientation)).fold(0.0, f64::max);
    let cross = if pages.is_empty() { 0.0 } else { widest + double_margin };

    LayoutExtent { primary: cursor, cross }
}
