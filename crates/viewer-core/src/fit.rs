/// Rule used to derive the initial scale of a freshly loaded document from
/// the viewport and the first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitPolicy {
    Width,
    Height,
    #[default]
    Both,
    None,
}

impl FitPolicy {
    /// Decodes the host's integer code: 0 width, 1 height, 2 both, anything
    /// else leaves the scale alone.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Width,
            1 => Self::Height,
            2 => Self::Both,
            _ => Self::None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Width => 0,
            Self::Height => 1,
            Self::Both => 2,
            Self::None => -1,
        }
    }
}

/// Scale that fits a `page_width` x `page_height` page, padded by `margin` on
/// every side, into the viewport.
///
/// `None` when the policy does not fit or the result would not be a usable
/// scale (zero-sized viewport, degenerate page).
pub fn fit_scale(
    policy: FitPolicy,
    page_width: f64,
    page_height: f64,
    margin: f64,
    viewport_width: f64,
    viewport_height: f64,
) -> Option<f64> {
    let by_width = || viewport_width / (page_width + 2.0 * margin);
    let by_height = || viewport_height / (page_height + 2.0 * margin);

    let scale = match policy {
        FitPolicy::Width => by_width(),
        FitPolicy::Height => by_height(),
        FitPolicy::Both => by_width().min(by_height()),
        FitPolicy::None => return None,
    };

    (scale.is_finite() && scale > 0.0).then_some(scale)
}
