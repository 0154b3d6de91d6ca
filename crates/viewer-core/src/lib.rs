//! Pure page geometry for the viewer: layout, visibility, fit policy and
//! render-ahead ordering. Nothing here performs I/O or blocks.

pub mod fit;
pub mod layout;
pub mod prefetch;
pub mod visibility;

pub use fit::{fit_scale, FitPolicy};
pub use layout::{compute_layout, LayoutExtent, LayoutParams, Orientation, PageGeometry};
pub use prefetch::render_ahead_order;
pub use visibility::{current_page, overlapping_pages, page_at_position, visible_pixels};
