//! Document session
//!
//! A [`DocumentSession`] owns the loaded document, its page layout and the
//! viewport, and turns host notifications into layout passes, render passes
//! and outbound events.
//!
//! All session state sits behind one reader/writer lock. The lock is never
//! held across an `.await`: state is read or mutated in a short critical
//! section, host calls are collected as effects and made after the lock is
//! released, and renders run against cloned page slots.

use crate::config::{Argb, ConfigUpdate, ViewerConfig, ViewerSettings};
use crate::error::{SessionError, SessionResult};
use crate::event::{ViewerEvent, ViewerHost};
use crate::viewport::{plan_scroll, ScrollPlan, ScrollTarget, ViewportState};
use futures::task::{Spawn, SpawnExt};
use pdf_engine::{OpenSource, PageSize, PdfDocument, PdfEngine};
use pdf_viewer_scheduler::{Bitmap, PageTarget, RenderCoordinator, RenderOutcome, RenderSlot};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use viewer_core::{
    compute_layout, current_page, fit_scale, overlapping_pages, page_at_position,
    render_ahead_order, visible_pixels, FitPolicy, LayoutExtent, LayoutParams, Orientation,
    PageGeometry,
};

/// Lifecycle of the loaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has been loaded yet
    Empty,

    /// A load is in progress
    Loading,

    /// Pages are laid out and can be rendered
    Ready,

    /// The last load failed; stays here until a new load is requested
    Error,
}

enum Effect {
    Emit(ViewerEvent),
    Scroll(ScrollTarget),
    Present(Vec<usize>),
}

/// Renders to run once the state lock is released.
struct RenderPlan {
    document: Arc<dyn PdfDocument>,
    coordinator: RenderCoordinator,
    targets: Vec<PageTarget>,
    generation: u64,
}

impl RenderPlan {
    async fn render_ahead(&self) -> Vec<(u32, RenderOutcome)> {
        self.coordinator.render_ahead(&*self.document, &self.targets).await
    }
}

struct Inner {
    state: SessionState,
    config: ViewerConfig,
    document: Option<Arc<dyn PdfDocument>>,
    pages: Vec<PageGeometry>,
    slots: Vec<Arc<RenderSlot>>,
    extent: LayoutExtent,
    /// Content size `(width, height)` the host last reported as laid out
    settled: (f64, f64),
    viewport: ViewportState,
    pending_scroll: Option<ScrollTarget>,
    current_page: usize,
    /// Bumped on every reload; work started under an older value is stale.
    generation: u64,
}

impl Inner {
    fn new(config: ViewerConfig) -> Self {
        Self {
            state: SessionState::Empty,
            config,
            document: None,
            pages: Vec::new(),
            slots: Vec::new(),
            extent: LayoutExtent::default(),
            settled: (0.0, 0.0),
            viewport: ViewportState::default(),
            pending_scroll: None,
            current_page: 0,
            generation: 0,
        }
    }

    fn orientation(&self) -> Orientation {
        self.config.orientation
    }

    fn layout_params(&self) -> LayoutParams {
        LayoutParams {
            scale: self.config.scale,
            margin: self.config.margin as f64,
            orientation: self.config.orientation,
            reverse: self.config.reverse,
        }
    }

    fn relayout(&mut self) {
        let params = self.layout_params();
        self.extent = compute_layout(&mut self.pages, &params);
    }

    fn clear_document(&mut self) {
        self.document = None;
        self.pages.clear();
        self.slots.clear();
        self.extent = LayoutExtent::default();
        self.pending_scroll = None;
    }

    fn coordinator(&self, settings: &ViewerSettings) -> RenderCoordinator {
        RenderCoordinator::new(settings.downscale_threshold)
            .with_annotations(self.config.annotations)
    }

    /// Storage indices in presentation order.
    fn presentation(&self) -> Vec<usize> {
        if self.pages.is_empty() {
            return Vec::new();
        }
        if self.config.paging {
            return vec![self.current_page];
        }
        if self.config.reverse {
            (0..self.pages.len()).rev().collect()
        } else {
            (0..self.pages.len()).collect()
        }
    }

    fn populate(&mut self, document: Arc<dyn PdfDocument>, sizes: &[PageSize]) {
        let policy = self.config.fit_policy;
        match sizes.first() {
            None if policy != FitPolicy::None => self.config.scale = 1.0,
            None => {}
            Some(first) => {
                let fitted = fit_scale(
                    policy,
                    first.width_pt,
                    first.height_pt,
                    self.config.margin as f64,
                    self.viewport.width,
                    self.viewport.height,
                );
                if let Some(scale) = fitted {
                    self.config.scale = scale;
                }
            }
        }

        self.pages =
            sizes.iter().map(|size| PageGeometry::new(size.width_pt, size.height_pt)).collect();
        self.slots = sizes.iter().map(|_| Arc::new(RenderSlot::new())).collect();
        self.relayout();

        self.current_page = if self.config.page < self.pages.len() { self.config.page } else { 0 };
        self.document = Some(document);
        self.state = SessionState::Ready;
    }

    fn plan(&self, order: &[usize], settings: &ViewerSettings) -> Option<RenderPlan> {
        let document = self.document.clone()?;
        let targets = order
            .iter()
            .filter_map(|&index| {
                let slot = self.slots.get(index)?;
                let page = self.pages.get(index)?;
                Some(PageTarget::new(index as u32, Arc::clone(slot), page.display_scale))
            })
            .collect();

        Some(RenderPlan {
            document,
            coordinator: self.coordinator(settings),
            targets,
            generation: self.generation,
        })
    }

    /// Current page first, then visible followers, then the render-ahead
    /// window on both sides.
    fn render_ahead_plan(&self, current: usize, settings: &ViewerSettings) -> Option<RenderPlan> {
        let orientation = self.orientation();
        let start = self.viewport.primary_offset(orientation);
        let end = start + self.viewport.primary_size(orientation);
        let paging = self.config.paging;

        let order = render_ahead_order(
            current,
            self.pages.len(),
            |index| !paging && visible_pixels(&self.pages[index], orientation, start, end) > 0.0,
            settings.look_ahead,
            settings.look_behind,
        );

        self.plan(&order, settings)
    }

    fn change_scroll(&mut self, target: ScrollTarget, effects: &mut Vec<Effect>) {
        match plan_scroll(target, self.settled, &self.viewport) {
            ScrollPlan::Now(target) => {
                self.viewport.offset_x = target.horizontal;
                self.viewport.offset_y = target.vertical;
                self.pending_scroll = None;
                effects.push(Effect::Scroll(target));
            }
            ScrollPlan::Defer(target) => {
                log::debug!(
                    "deferring scroll to ({}, {}) until layout settles",
                    target.horizontal,
                    target.vertical
                );
                self.pending_scroll = Some(target);
            }
        }
    }

    /// Re-lays out at a new scale and margin, keeping the viewport over the
    /// same content when `go_to_new_position` is set.
    fn rescale(
        &mut self,
        new_scale: f64,
        new_margin: u32,
        go_to_new_position: bool,
        effects: &mut Vec<Effect>,
    ) {
        let old_scale = self.config.scale;
        let old_margin = self.config.margin;
        if new_scale == old_scale && new_margin == old_margin {
            return;
        }

        let ratio = new_scale / old_scale;
        let mut horizontal = self.viewport.offset_x * ratio;
        let mut vertical = self.viewport.offset_y * ratio;

        if new_margin != old_margin {
            let delta = new_margin as f64 - old_margin as f64;
            let shift = self.current_page as f64 * 2.0 * delta * ratio;
            match self.orientation() {
                Orientation::Horizontal => vertical += shift,
                Orientation::Vertical => horizontal += shift,
            }
        }

        self.config.scale = new_scale;
        self.config.margin = new_margin;
        self.relayout();
        log::debug!("rescaled {old_scale} -> {new_scale}, margin {old_margin} -> {new_margin}");

        if go_to_new_position {
            self.change_scroll(ScrollTarget::new(horizontal, vertical), effects);
        }

        effects.push(Effect::Emit(ViewerEvent::ScaleChanged { scale: new_scale }));
    }

    /// Returns `false` for an out-of-range index, which is ignored.
    fn go_to_page(&mut self, index: usize, effects: &mut Vec<Effect>) -> bool {
        let Some(page) = self.pages.get(index) else {
            return false;
        };

        let offset = page.primary_offset;
        self.current_page = index;

        if self.config.paging {
            effects.push(Effect::Present(vec![index]));
        } else {
            let target = match self.orientation() {
                Orientation::Horizontal => ScrollTarget::new(offset, self.viewport.offset_y),
                Orientation::Vertical => ScrollTarget::new(self.viewport.offset_x, offset),
            };
            self.change_scroll(target, effects);
        }

        effects.push(Effect::Emit(ViewerEvent::PageChanged {
            page: index as u32 + 1,
            total: self.pages.len() as u32,
        }));
        true
    }

    fn update_in_place(&mut self, update: &ConfigUpdate, effects: &mut Vec<Effect>) {
        if self.state != SessionState::Ready {
            update.merge_into(&mut self.config);
            return;
        }

        if let Some(min_scale) = update.min_scale {
            self.config.min_scale = min_scale;
        }
        if let Some(max_scale) = update.max_scale {
            self.config.max_scale = max_scale;
        }
        if let Some(policy) = update.fit_policy() {
            self.config.fit_policy = policy;
        }
        if let Some(color) = update.background_color {
            self.config.background = Argb::from_packed(color as u32);
        }
        if let Some(annotations) = update.annotations {
            self.config.annotations = annotations;
        }

        let mut need_scroll = false;

        if let Some(horizontal) = update.horizontal {
            let orientation = Orientation::from_horizontal(horizontal);
            if orientation != self.config.orientation {
                self.config.orientation = orientation;
                self.relayout();
                need_scroll = true;
            }
        }

        if let Some(page) = update.page_index() {
            self.config.page = page;
            need_scroll = true;
        }

        let scale = update.scale.unwrap_or(self.config.scale);
        let margin = update.margin.unwrap_or(self.config.margin);
        self.rescale(scale, margin, !need_scroll, effects);

        if need_scroll {
            let page = update.page_index().unwrap_or(self.current_page);
            self.go_to_page(page, effects);
        }
    }
}

/// Viewer state for one embedded document view.
pub struct DocumentSession {
    engine: Arc<dyn PdfEngine>,
    host: Arc<dyn ViewerHost>,
    settings: ViewerSettings,
    spawner: Option<Arc<dyn Spawn + Send + Sync>>,
    inner: RwLock<Inner>,
}

impl DocumentSession {
    /// Create an empty session rendering through `engine` and reporting to
    /// `host`.
    ///
    /// Without a spawner, the low-resolution preview pass after a load runs
    /// inline, so `apply_config` only returns once every page has a preview.
    /// Hosts that must stay interactive during a load should attach an
    /// executor with [`DocumentSession::with_spawner`].
    pub fn new(engine: Arc<dyn PdfEngine>, host: Arc<dyn ViewerHost>) -> Self {
        Self {
            engine,
            host,
            settings: ViewerSettings::default(),
            spawner: None,
            inner: RwLock::new(Inner::new(ViewerConfig::default())),
        }
    }

    pub fn with_settings(mut self, settings: ViewerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Run background preview renders on `spawner` instead of inline.
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawn + Send + Sync>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn flush(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Emit(event) => self.host.emit(event),
                Effect::Scroll(target) => self.host.scroll_to(target.horizontal, target.vertical),
                Effect::Present(pages) => self.host.present(&pages),
            }
        }
    }

    /// Applies a configuration change from the host.
    ///
    /// Changing the source, password, reading direction, paging mode or
    /// single-page mode reloads the document. Anything else is applied to
    /// the loaded pages in place.
    pub async fn apply_config(&self, update: ConfigUpdate) -> SessionResult<()> {
        update.validate()?;

        let mut effects = Vec::new();
        let reload = {
            let mut inner = self.write();
            if update.requires_reload(&inner.config) {
                update.merge_into(&mut inner.config);
                inner.config.page = update.page_index().unwrap_or(0);
                true
            } else {
                inner.update_in_place(&update, &mut effects);
                false
            }
        };

        if reload {
            return self.reload().await;
        }

        self.flush(effects);
        self.refresh().await;
        Ok(())
    }

    /// Opens the configured source and rebuilds the page collection.
    ///
    /// Emits `Error` and leaves the session in [`SessionState::Error`] with
    /// no pages if the source cannot be opened.
    pub async fn reload(&self) -> SessionResult<()> {
        let (generation, config) = {
            let mut inner = self.write();
            inner.generation += 1;
            inner.state = SessionState::Loading;
            inner.clear_document();
            (inner.generation, inner.config.clone())
        };

        log::debug!("loading {:?} (generation {generation})", config.source);

        let opened = match config.source.as_deref() {
            None => Err(SessionError::NoSource),
            Some(source) => self
                .engine
                .open(&OpenSource::parse(source), config.password.as_deref())
                .map_err(SessionError::from),
        };

        let document = match opened {
            Ok(document) => document,
            Err(err) => return Err(self.fail_load(generation, err)),
        };

        let mut page_count = document.page_count();
        if config.single_page {
            page_count = page_count.min(1);
        }

        let sizes: Vec<PageSize> = match (0..page_count)
            .map(|index| document.page_size(index))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(sizes) => sizes,
            Err(err) => return Err(self.fail_load(generation, err.into())),
        };

        let mut effects = Vec::new();
        let first_render = {
            let mut inner = self.write();
            if inner.generation != generation {
                log::debug!("load of generation {generation} superseded");
                return Ok(());
            }

            inner.populate(document, &sizes);
            effects.push(Effect::Present(inner.presentation()));
            let current = inner.current_page;
            inner.plan(&[current], &self.settings)
        };
        self.flush(effects);

        if let Some(plan) = &first_render {
            plan.render_ahead().await;
        }

        let mut effects = Vec::new();
        let previews = {
            let mut inner = self.write();
            if inner.generation != generation {
                return Ok(());
            }

            let current = inner.current_page;
            inner.go_to_page(current, &mut effects);

            let (width, height) = inner
                .pages
                .first()
                .map_or((0.0, 0.0), |page| (page.intrinsic_width, page.intrinsic_height));
            effects.push(Effect::Emit(ViewerEvent::LoadComplete {
                page_count: inner.pages.len() as u32,
                width,
                height,
            }));

            let all: Vec<usize> = (0..inner.pages.len()).collect();
            inner.plan(&all, &self.settings)
        };
        self.flush(effects);

        if let Some(plan) = previews {
            self.prime_previews(plan).await;
        }

        Ok(())
    }

    fn fail_load(&self, generation: u64, err: SessionError) -> SessionError {
        log::warn!("failed to load document: {err}");

        let current = {
            let mut inner = self.write();
            let current = inner.generation == generation;
            if current {
                inner.state = SessionState::Error;
                inner.clear_document();
            }
            current
        };

        if current {
            self.host.emit(ViewerEvent::Error { message: err.to_string() });
        }
        err
    }

    async fn prime_previews(&self, plan: RenderPlan) {
        let zoom = self.settings.preview_zoom;
        let RenderPlan { document, coordinator, targets, .. } = plan;

        match &self.spawner {
            Some(spawner) => {
                let spawned = spawner.spawn(async move {
                    coordinator.prime_previews(&*document, &targets, zoom).await;
                });
                if let Err(err) = spawned {
                    log::warn!("could not spawn preview renders: {err}");
                }
            }
            None => {
                coordinator.prime_previews(&*document, &targets, zoom).await;
            }
        }
    }

    /// Renders around the current page at the current viewport without
    /// changing which page is current.
    async fn refresh(&self) {
        let plan = {
            let inner = self.read();
            if inner.state != SessionState::Ready {
                return;
            }
            inner.render_ahead_plan(inner.current_page, &self.settings)
        };

        if let Some(plan) = plan {
            plan.render_ahead().await;
        }
    }

    /// Handles a scroll or resize of the host's scroll container.
    ///
    /// Intermediate notifications (mid-gesture) only record the viewport.
    /// Otherwise the current page is resolved, pages around it are rendered,
    /// and `PageChanged` is emitted if the current page moved.
    pub async fn on_viewport_changed(&self, viewport: ViewportState, intermediate: bool) {
        let resolved = {
            let mut inner = self.write();
            inner.viewport = viewport;

            if intermediate
                || viewport.is_empty()
                || inner.pages.is_empty()
                || inner.state != SessionState::Ready
            {
                return;
            }

            let orientation = inner.orientation();
            let current = if inner.config.paging {
                inner.current_page
            } else {
                current_page(
                    &inner.pages,
                    orientation,
                    viewport.primary_offset(orientation),
                    viewport.primary_size(orientation),
                )
                .unwrap_or(0)
            };

            inner.render_ahead_plan(current, &self.settings).map(|plan| (current, plan))
        };

        let Some((current, plan)) = resolved else {
            return;
        };

        plan.render_ahead().await;

        let changed = {
            let mut inner = self.write();
            if inner.generation != plan.generation || inner.current_page == current {
                None
            } else {
                inner.current_page = current;
                Some(inner.pages.len() as u32)
            }
        };

        if let Some(total) = changed {
            self.host.emit(ViewerEvent::PageChanged { page: current as u32 + 1, total });
        }
    }

    /// Called by the host once it has applied the latest layout; performs a
    /// scroll that had to wait for it.
    pub fn on_layout_settled(&self) {
        let mut effects = Vec::new();
        {
            let mut inner = self.write();
            inner.settled = inner.extent.to_size(inner.orientation());

            if let Some(target) = inner.pending_scroll.take() {
                inner.viewport.offset_x = target.horizontal;
                inner.viewport.offset_y = target.vertical;
                effects.push(Effect::Scroll(target));
            }
        }
        self.flush(effects);
    }

    /// Jumps to the 0-based `index`. Out-of-range indices are ignored.
    ///
    /// In paging mode the page replaces the presented page and is rendered;
    /// otherwise the viewport scrolls to it.
    pub async fn go_to_page(&self, index: usize) {
        let mut effects = Vec::new();
        let render = {
            let mut inner = self.write();
            if !inner.go_to_page(index, &mut effects) || !inner.config.paging {
                None
            } else {
                inner.plan(&[index], &self.settings)
            }
        };
        self.flush(effects);

        if let Some(plan) = render {
            plan.render_ahead().await;
        }
    }

    /// Host command: jump to the 1-based `page_number`.
    pub async fn set_page(&self, page_number: u32) {
        if let Some(index) = (page_number as usize).checked_sub(1) {
            self.go_to_page(index).await;
        }
    }

    /// Zooms by `zoom_multiplier ^ delta` (one unit per wheel notch),
    /// clamped to the configured scale range.
    pub async fn zoom_by_wheel(&self, delta: f64) {
        self.zoom_with(|config, multiplier| {
            (config.scale * multiplier.powf(delta)).min(config.max_scale).max(config.min_scale)
        })
        .await;
    }

    /// Zooms in one step, up to the maximum scale.
    pub async fn zoom_double_tap(&self) {
        self.zoom_with(|config, multiplier| (config.scale * multiplier).min(config.max_scale))
            .await;
    }

    async fn zoom_with(&self, new_scale: impl FnOnce(&ViewerConfig, f64) -> f64) {
        let mut effects = Vec::new();
        {
            let mut inner = self.write();
            if inner.state != SessionState::Ready {
                return;
            }
            let scale = new_scale(&inner.config, self.settings.zoom_multiplier);
            let margin = inner.config.margin;
            inner.rescale(scale, margin, true, &mut effects);
        }
        self.flush(effects);
        self.refresh().await;
    }

    /// Handles a single tap at viewport-relative `(x, y)`.
    ///
    /// The tapped page is the first one whose slot contains the tap;
    /// taps between or past all pages are attributed to the current page.
    pub fn on_tap(&self, x: f64, y: f64) {
        let page = {
            let inner = self.read();
            if inner.pages.is_empty() {
                return;
            }

            let orientation = inner.orientation();
            let position = match orientation {
                Orientation::Horizontal => x + inner.viewport.offset_x,
                Orientation::Vertical => y + inner.viewport.offset_y,
            };
            let scaled_margin = inner.layout_params().scaled_margin();

            page_at_position(&inner.pages, orientation, position, scaled_margin)
                .unwrap_or(inner.current_page)
        };

        self.host.emit(ViewerEvent::PageTapped { page: page as u32 + 1, x, y });
    }

    /// Every page overlapping `[start, end]` on the primary axis.
    pub fn pages_at(&self, start: f64, end: f64) -> Vec<usize> {
        let inner = self.read();
        overlapping_pages(&inner.pages, inner.orientation(), start, end)
    }

    pub fn state(&self) -> SessionState {
        self.read().state
    }

    pub fn config(&self) -> ViewerConfig {
        self.read().config.clone()
    }

    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    pub fn page_count(&self) -> usize {
        self.read().pages.len()
    }

    pub fn current_page(&self) -> usize {
        self.read().current_page
    }

    pub fn scale(&self) -> f64 {
        self.read().config.scale
    }

    pub fn background(&self) -> Argb {
        self.read().config.background
    }

    pub fn viewport(&self) -> ViewportState {
        self.read().viewport
    }

    pub fn pending_scroll(&self) -> Option<ScrollTarget> {
        self.read().pending_scroll
    }

    /// Geometry of every page, in storage order.
    pub fn page_geometry(&self) -> Vec<PageGeometry> {
        self.read().pages.clone()
    }

    pub fn extent(&self) -> LayoutExtent {
        self.read().extent
    }

    pub fn presentation(&self) -> Vec<usize> {
        self.read().presentation()
    }

    pub fn bitmap(&self, index: usize) -> Option<Arc<Bitmap>> {
        self.read().slots.get(index)?.bitmap()
    }

    pub fn rendered_scale(&self, index: usize) -> Option<f64> {
        self.read().slots.get(index).map(|slot| slot.rendered_scale())
    }
}
