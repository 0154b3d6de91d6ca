//! In-memory engine for exercising the viewer without real PDF files.
//!
//! Documents are registered by name, and renders can be gated so a test
//! decides exactly when (and in which order) each one completes.

use crate::{
    raster_dimensions, EngineError, OpenSource, PageSize, PdfDocument, PdfEngine, RenderFuture,
    RenderRequest, RgbaImage,
};
use futures::channel::oneshot;
use futures::FutureExt;
use image::Rgba;
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct ScriptedFile {
    pub pages: Vec<PageSize>,
    pub password: Option<String>,
    pub corrupt: bool,
}

impl ScriptedFile {
    pub fn uniform(count: usize, width_pt: f64, height_pt: f64) -> Self {
        Self { pages: vec![PageSize::new(width_pt, height_pt); count], ..Self::default() }
    }

    pub fn with_pages(pages: Vec<PageSize>) -> Self {
        Self { pages, ..Self::default() }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_owned());
        self
    }

    pub fn corrupt() -> Self {
        Self { corrupt: true, ..Self::default() }
    }
}

#[derive(Default)]
struct ControlState {
    gated: bool,
    pending: Vec<(RenderRequest, oneshot::Sender<Result<RgbaImage, EngineError>>)>,
    requests: Vec<RenderRequest>,
    failing: HashSet<u32>,
}

/// Handle for observing and steering renders issued by documents of a
/// [`ScriptedEngine`].
#[derive(Clone, Default)]
pub struct RenderControl {
    state: Arc<Mutex<ControlState>>,
}

impl RenderControl {
    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// When gated, renders stay pending until [`RenderControl::release`].
    pub fn set_gated(&self, gated: bool) {
        self.lock().gated = gated;
    }

    /// Makes every subsequent render of `page_index` fail.
    pub fn fail_page(&self, page_index: u32) {
        self.lock().failing.insert(page_index);
    }

    pub fn requests(&self) -> Vec<RenderRequest> {
        self.lock().requests.clone()
    }

    pub fn render_count(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn pending(&self) -> Vec<RenderRequest> {
        self.lock().pending.iter().map(|(request, _)| *request).collect()
    }

    /// Completes the `index`-th pending render. Returns false if there is no
    /// such render or its receiver is gone.
    pub fn release(&self, index: usize) -> bool {
        let entry = {
            let mut state = self.lock();
            if index >= state.pending.len() {
                return false;
            }
            state.pending.remove(index)
        };

        let (request, sender) = entry;
        sender.send(Ok(placeholder(request))).is_ok()
    }

    pub fn release_all(&self) -> usize {
        let pending = std::mem::take(&mut self.lock().pending);
        pending
            .into_iter()
            .map(|(request, sender)| sender.send(Ok(placeholder(request))).is_ok())
            .filter(|sent| *sent)
            .count()
    }

    fn submit(&self, request: RenderRequest) -> RenderFuture {
        let mut state = self.lock();
        state.requests.push(request);

        if state.failing.contains(&request.page_index) {
            return futures::future::ready(Err(EngineError::Backend(format!(
                "scripted failure on page {}",
                request.page_index
            ))))
            .boxed();
        }

        if !state.gated {
            return futures::future::ready(Ok(placeholder(request))).boxed();
        }

        let (tx, rx) = oneshot::channel();
        state.pending.push((request, tx));
        rx.map(|result| {
            result.unwrap_or_else(|_| Err(EngineError::Backend("render dropped".to_owned())))
        })
        .boxed()
    }
}

fn placeholder(request: RenderRequest) -> RgbaImage {
    let (width, height) = raster_dimensions(PageSize::new(1.0, 1.0), request.scale);
    RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
}

/// Engine whose documents are looked up by source name.
#[derive(Default)]
pub struct ScriptedEngine {
    files: Mutex<HashMap<String, ScriptedFile>>,
    control: RenderControl,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, file: ScriptedFile) {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.to_owned(), file);
    }

    pub fn control(&self) -> RenderControl {
        self.control.clone()
    }
}

impl PdfEngine for ScriptedEngine {
    fn open(
        &self,
        source: &OpenSource,
        password: Option<&str>,
    ) -> Result<Arc<dyn PdfDocument>, EngineError> {
        let key = match source {
            OpenSource::Path(path) => path.to_string_lossy().into_owned(),
            OpenSource::Uri(uri) => uri.clone(),
            OpenSource::Bytes(_) => {
                return Err(EngineError::UnsupportedSource("in-memory bytes".to_owned()))
            }
        };

        let file = self
            .files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
            .cloned()
            .ok_or_else(|| {
                EngineError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, key.clone()))
            })?;

        if file.corrupt {
            return Err(EngineError::Format(format!("{key} is not a PDF")));
        }

        if let Some(expected) = &file.password {
            if password != Some(expected.as_str()) {
                return Err(EngineError::Authentication);
            }
        }

        Ok(Arc::new(ScriptedDocument { pages: file.pages, control: self.control.clone() }))
    }
}

struct ScriptedDocument {
    pages: Vec<PageSize>,
    control: RenderControl,
}

impl PdfDocument for ScriptedDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page_index: u32) -> Result<PageSize, EngineError> {
        self.pages.get(page_index as usize).copied().ok_or(EngineError::PageOutOfRange {
            page: page_index,
            page_count: self.page_count(),
        })
    }

    fn render_page(&self, request: RenderRequest) -> RenderFuture {
        if let Err(err) = self.page_size(request.page_index) {
            return futures::future::ready(Err(err)).boxed();
        }
        self.control.submit(request)
    }
}

/// Serializes a minimal PDF with one empty page per `(width, height)` entry.
pub fn build_pdf(pages: &[(i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(pages.len());
    for &(width, height) in pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ],
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages.len() as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    if let Err(err) = doc.save_to(&mut bytes) {
        log::warn!("failed to serialize test PDF: {err}");
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn wrong_password_is_an_authentication_error() {
        let engine = ScriptedEngine::new();
        engine.insert("locked.pdf", ScriptedFile::uniform(2, 100.0, 100.0).with_password("pw"));

        let source = OpenSource::parse("locked.pdf");
        assert!(matches!(engine.open(&source, None).err(), Some(EngineError::Authentication)));
        assert!(matches!(
            engine.open(&source, Some("nope")).err(),
            Some(EngineError::Authentication)
        ));
        assert_eq!(engine.open(&source, Some("pw")).expect("unlocked").page_count(), 2);
    }

    #[test]
    fn gated_renders_wait_for_release() {
        let engine = ScriptedEngine::new();
        engine.insert("a.pdf", ScriptedFile::uniform(3, 100.0, 100.0));
        let control = engine.control();
        control.set_gated(true);

        let doc = engine.open(&OpenSource::parse("a.pdf"), None).expect("open");
        let first = doc.render_page(RenderRequest { page_index: 0, scale: 2.0, annotations: false });
        let second = doc.render_page(RenderRequest { page_index: 1, scale: 1.0, annotations: false });

        assert_eq!(control.pending().len(), 2);
        assert!(control.release(1));
        assert_eq!(block_on(second).expect("released").width(), 1);
        assert!(control.release(0));
        assert_eq!(block_on(first).expect("released").width(), 2);
        assert_eq!(control.render_count(), 2);
    }

    #[test]
    fn failing_pages_report_backend_errors() {
        let engine = ScriptedEngine::new();
        engine.insert("a.pdf", ScriptedFile::uniform(2, 100.0, 100.0));
        engine.control().fail_page(1);

        let doc = engine.open(&OpenSource::parse("a.pdf"), None).expect("open");
        let result = block_on(doc.render_page(RenderRequest { page_index: 1, ..Default::default() }));
        assert!(matches!(result, Err(EngineError::Backend(_))));
    }

    #[test]
    fn unknown_names_are_not_found() {
        let engine = ScriptedEngine::new();
        let err = engine.open(&OpenSource::parse("missing.pdf"), None).err().expect("missing");
        assert_eq!(err.kind(), crate::ErrorKind::Io);
    }
}
