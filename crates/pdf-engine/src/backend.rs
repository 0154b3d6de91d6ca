use crate::jobs::JobQueue;
use crate::{
    raster_dimensions, EngineError, OpenSource, PageSize, PdfDocument, PdfEngine, RenderFuture,
    RenderRequest, RgbaImage,
};
use futures::FutureExt;
use image::Rgba;
use lopdf::{Dictionary, Document, Object};
use std::fs;
use std::sync::Arc;

const PAGE_BORDER: Rgba<u8> = Rgba([220, 220, 220, 255]);
const PAGE_FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Default engine: reads page geometry with lopdf and rasterizes page frames
/// on a background worker thread.
///
/// Encrypted documents are rejected with [`EngineError::Authentication`]; this
/// backend cannot decrypt them whatever password is supplied.
pub struct LopdfEngine {
    jobs: JobQueue,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self { jobs: JobQueue::new() }
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, EngineError> {
        if bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(EngineError::Authentication);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let dict = doc.get_dictionary(object_id)?;
            let size = media_box(&doc, dict).unwrap_or_default();
            sizes.push(size);
        }

        Ok(sizes)
    }
}

impl Default for LopdfEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads `/MediaBox`, following `/Parent` links for inherited boxes.
fn media_box(doc: &Document, dict: &Dictionary) -> Option<PageSize> {
    let mut current = dict;

    for _ in 0..32 {
        if let Some(size) = current.get(b"MediaBox").ok().and_then(box_size) {
            return Some(size);
        }

        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }

    None
}

fn box_size(obj: &Object) -> Option<PageSize> {
    let array = obj.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    let x0 = array[0].as_float().ok()?;
    let y0 = array[1].as_float().ok()?;
    let x1 = array[2].as_float().ok()?;
    let y1 = array[3].as_float().ok()?;

    Some(PageSize::new((x1 - x0).abs() as f64, (y1 - y0).abs() as f64))
}

impl PdfEngine for LopdfEngine {
    fn open(
        &self,
        source: &OpenSource,
        _password: Option<&str>,
    ) -> Result<Arc<dyn PdfDocument>, EngineError> {
        let page_sizes = match source {
            OpenSource::Path(path) => Self::parse_sizes(&fs::read(path)?)?,
            OpenSource::Bytes(bytes) => Self::parse_sizes(bytes)?,
            OpenSource::Uri(uri) => return Err(EngineError::UnsupportedSource(uri.clone())),
        };

        log::debug!("lopdf engine opened document with {} pages", page_sizes.len());

        Ok(Arc::new(LopdfDocument { page_sizes: page_sizes.into(), jobs: self.jobs.clone() }))
    }
}

struct LopdfDocument {
    page_sizes: Arc<[PageSize]>,
    jobs: JobQueue,
}

impl PdfDocument for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    fn page_size(&self, page_index: u32) -> Result<PageSize, EngineError> {
        self.page_sizes.get(page_index as usize).copied().ok_or(EngineError::PageOutOfRange {
            page: page_index,
            page_count: self.page_count(),
        })
    }

    fn render_page(&self, request: RenderRequest) -> RenderFuture {
        let size = match self.page_size(request.page_index) {
            Ok(size) => size,
            Err(err) => return futures::future::ready(Err(err)).boxed(),
        };

        self.jobs
            .execute(move || rasterize_frame(size, request.scale))
            .map(|result| {
                result.map_err(|_| EngineError::Backend("render worker stopped".to_owned()))
            })
            .boxed()
    }
}

/// Draws only a blank page with a one-pixel frame; page content is not rendered.
fn rasterize_frame(size: PageSize, scale: f64) -> RgbaImage {
    let (width, height) = raster_dimensions(size, scale);
    let mut image = RgbaImage::from_pixel(width, height, PAGE_FILL);

    if width >= 4 && height >= 4 {
        for x in 0..width {
            image.put_pixel(x, 0, PAGE_BORDER);
            image.put_pixel(x, height - 1, PAGE_BORDER);
        }
        for y in 0..height {
            image.put_pixel(0, y, PAGE_BORDER);
            image.put_pixel(width - 1, y, PAGE_BORDER);
        }
    }

    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::build_pdf;
    use futures::executor::block_on;

    #[test]
    fn opens_pdf_and_reads_page_sizes() {
        let engine = LopdfEngine::new();
        let bytes = build_pdf(&[(100, 200), (300, 150)]);
        let doc = engine.open(&OpenSource::Bytes(bytes), None).expect("open should succeed");

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page_size(0).expect("page 0"), PageSize::new(100.0, 200.0));
        assert_eq!(doc.page_size(1).expect("page 1"), PageSize::new(300.0, 150.0));
    }

    #[test]
    fn render_page_produces_scaled_image() {
        let engine = LopdfEngine::new();
        let doc = engine
            .open(&OpenSource::Bytes(build_pdf(&[(100, 200)])), None)
            .expect("open should succeed");

        let image = block_on(doc.render_page(RenderRequest {
            page_index: 0,
            scale: 2.0,
            annotations: false,
        }))
        .expect("render should succeed");

        assert_eq!((image.width(), image.height()), (200, 400));
        assert_eq!(*image.get_pixel(0, 0), PAGE_BORDER);
        assert_eq!(*image.get_pixel(100, 200), PAGE_FILL);
    }

    #[test]
    fn out_of_range_page_is_rejected() {
        let engine = LopdfEngine::new();
        let doc = engine
            .open(&OpenSource::Bytes(build_pdf(&[(100, 200)])), None)
            .expect("open should succeed");

        let err = block_on(doc.render_page(RenderRequest { page_index: 5, ..Default::default() }))
            .expect_err("page 5 does not exist");
        assert!(matches!(err, EngineError::PageOutOfRange { page: 5, page_count: 1 }));
    }

    #[test]
    fn garbage_bytes_are_a_format_error() {
        let engine = LopdfEngine::new();
        let err = engine
            .open(&OpenSource::Bytes(b"definitely not a pdf".to_vec()), None)
            .err()
            .expect("open should fail");

        assert_eq!(err.kind(), crate::ErrorKind::Format);
    }

    #[test]
    fn encrypted_documents_need_authentication() {
        let engine = LopdfEngine::new();
        let mut bytes = build_pdf(&[(100, 200)]);
        bytes.extend_from_slice(b"\n% /Encrypt 9 0 R\n");

        let err = engine.open(&OpenSource::Bytes(bytes), Some("secret")).err().expect("fails");
        assert!(matches!(err, EngineError::Authentication));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let engine = LopdfEngine::new();
        let err = engine
            .open(&OpenSource::parse("/nonexistent/file.pdf"), None)
            .err()
            .expect("open should fail");

        assert_eq!(err.kind(), crate::ErrorKind::Io);
    }
}
