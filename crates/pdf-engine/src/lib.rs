//! Document decoding boundary for the viewer.
//!
//! The viewer never parses or rasterizes PDF content itself. It talks to a
//! [`PdfEngine`] to open a source and to the returned [`PdfDocument`] to query
//! intrinsic page sizes and rasterize whole pages at a given scale.

mod backend;
mod jobs;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

use futures::future::BoxFuture;
use image::{ImageBuffer, Rgba};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use backend::LopdfEngine;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Pending rasterization of one page.
pub type RenderFuture = BoxFuture<'static, Result<RgbaImage, EngineError>>;

/// Unscaled page size in document units (points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f64,
    pub height_pt: f64,
}

impl PageSize {
    pub fn new(width_pt: f64, height_pt: f64) -> Self {
        Self { width_pt, height_pt }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self { width_pt: 612.0, height_pt: 792.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f64,
    /// Draw the annotation layer on top of page content.
    pub annotations: bool,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0, annotations: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenSource {
    Path(PathBuf),
    Uri(String),
    Bytes(Vec<u8>),
}

impl OpenSource {
    /// Interprets a host-supplied source string.
    ///
    /// `file://` URIs and bare strings are treated as local paths; any other
    /// scheme is kept as a URI for engines that know how to resolve it.
    pub fn parse(source: &str) -> Self {
        if let Some(path) = source.strip_prefix("file://") {
            return Self::Path(PathBuf::from(path));
        }

        if source.contains("://") {
            return Self::Uri(source.to_owned());
        }

        Self::Path(PathBuf::from(source))
    }
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("password required or incorrect password")]
    Authentication,
    #[error("document is not a valid PDF: {0}")]
    Format(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("backend error: {0}")]
    Backend(String),
}

/// Coarse classification of [`EngineError`] used by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Format,
    Io,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication => ErrorKind::Authentication,
            Self::Format(_) | Self::Parse(_) | Self::PageOutOfRange { .. } => ErrorKind::Format,
            Self::Io(_) | Self::UnsupportedSource(_) | Self::Backend(_) => ErrorKind::Io,
        }
    }
}

pub trait PdfEngine: Send + Sync {
    fn open(
        &self,
        source: &OpenSource,
        password: Option<&str>,
    ) -> Result<Arc<dyn PdfDocument>, EngineError>;
}

/// An opened document.
///
/// Page sizes are fixed for the lifetime of the document. Renders may be in
/// flight for several pages at once and may complete in any order.
pub trait PdfDocument: Send + Sync {
    fn page_count(&self) -> u32;

    fn page_size(&self, page_index: u32) -> Result<PageSize, EngineError>;

    fn render_page(&self, request: RenderRequest) -> RenderFuture;
}

/// Pixel dimensions of a page rendered at `scale`, never smaller than 1x1.
pub fn raster_dimensions(size: PageSize, scale: f64) -> (u32, u32) {
    let scale = if scale <= 0.0 { 1.0 } else { scale };
    let width = (size.width_pt * scale).round().max(1.0) as u32;
    let height = (size.height_pt * scale).round().max(1.0) as u32;
    (width, height)
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_source_strips_file_scheme() {
        assert_eq!(
            OpenSource::parse("file:///tmp/doc.pdf"),
            OpenSource::Path(PathBuf::from("/tmp/doc.pdf"))
        );
        assert_eq!(OpenSource::parse("docs/a.pdf"), OpenSource::Path(PathBuf::from("docs/a.pdf")));
        assert_eq!(
            OpenSource::parse("bundle-assets://a.pdf"),
            OpenSource::Uri("bundle-assets://a.pdf".to_owned())
        );
    }

    #[test]
    fn error_kinds_collapse_to_session_categories() {
        assert_eq!(EngineError::Authentication.kind(), ErrorKind::Authentication);
        assert_eq!(EngineError::Format("bad".into()).kind(), ErrorKind::Format);
        assert_eq!(
            EngineError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing")).kind(),
            ErrorKind::Io
        );
        assert_eq!(EngineError::UnsupportedSource("x://y".into()).kind(), ErrorKind::Io);
    }

    #[test]
    fn raster_dimensions_round_and_clamp() {
        let size = PageSize::new(100.0, 200.0);
        assert_eq!(raster_dimensions(size, 1.5), (150, 300));
        assert_eq!(raster_dimensions(size, 0.001), (1, 1));
        assert_eq!(raster_dimensions(size, 0.0), (100, 200));
    }
}
