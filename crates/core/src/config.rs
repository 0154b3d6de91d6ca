//! Viewer configuration
//!
//! [`ViewerConfig`] is the full snapshot of host-supplied settings the session
//! works from; [`ConfigUpdate`] is the sparse diff a host sends when some of
//! them change. [`ViewerSettings`] holds process-level tunables.

use crate::error::ConfigError;
use serde::Deserialize;
use viewer_core::{FitPolicy, Orientation};

/// Packed background color as sent by hosts (`0xAARRGGBB`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argb {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Argb {
    pub fn from_packed(color: u32) -> Self {
        Self {
            a: (color >> 24) as u8,
            r: (color >> 16) as u8,
            g: (color >> 8) as u8,
            b: color as u8,
        }
    }

    pub fn to_packed(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }
}

impl Default for Argb {
    fn default() -> Self {
        Self::from_packed(0xFFFF_FFFF)
    }
}

/// Current viewer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Document source: a path, a `file://` URI or another host URI
    pub source: Option<String>,
    pub password: Option<String>,
    /// Requested page, 0-based
    pub page: usize,
    pub scale: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    /// Space around each page, in document units
    pub margin: u32,
    pub orientation: Orientation,
    pub fit_policy: FitPolicy,
    /// Lay pages out back-to-front
    pub reverse: bool,
    /// Present one page at a time
    pub paging: bool,
    /// Only load the first page
    pub single_page: bool,
    pub background: Argb,
    pub annotations: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            source: None,
            password: None,
            page: 0,
            scale: 1.0,
            min_scale: 1.0,
            max_scale: 3.0,
            margin: 10,
            orientation: Orientation::Vertical,
            fit_policy: FitPolicy::Both,
            reverse: false,
            paging: false,
            single_page: false,
            background: Argb::default(),
            annotations: false,
        }
    }
}

/// Sparse configuration change received from the host.
///
/// Absent fields leave the current value untouched. Field names follow the
/// host's camelCase property names; older property names are accepted as
/// aliases.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigUpdate {
    #[serde(alias = "path", alias = "uri")]
    pub source: Option<String>,
    pub password: Option<String>,
    /// 1-based page number
    pub page: Option<i64>,
    pub scale: Option<f64>,
    pub min_scale: Option<f64>,
    pub max_scale: Option<f64>,
    #[serde(alias = "orientation")]
    pub horizontal: Option<bool>,
    /// Host fit code: 0 width, 1 height, 2 both, anything else none
    pub fit_policy: Option<i32>,
    /// Legacy flag, superseded by `fitPolicy` when both are present
    pub fit_width: Option<bool>,
    #[serde(alias = "spacing")]
    pub margin: Option<u32>,
    #[serde(alias = "readingDirection", alias = "enableRTL")]
    pub reverse: Option<bool>,
    #[serde(alias = "pagingMode", alias = "enablePaging")]
    pub paging: Option<bool>,
    #[serde(alias = "singlePageMode")]
    pub single_page: Option<bool>,
    pub background_color: Option<i64>,
    #[serde(alias = "enableAnnotationRendering")]
    pub annotations: Option<bool>,
}

impl ConfigUpdate {
    /// Parses an update from the host's JSON property map.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|err| ConfigError::InvalidValue(err.to_string()))
    }

    /// Rejects values the session cannot lay out with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scales =
            [("scale", self.scale), ("minScale", self.min_scale), ("maxScale", self.max_scale)];
        for (name, value) in scales {
            if let Some(value) = value {
                if !value.is_finite() || value <= 0.0 {
                    return Err(ConfigError::InvalidValue(name.to_owned()));
                }
            }
        }

        Ok(())
    }

    /// 0-based page index, if a page was requested.
    pub fn page_index(&self) -> Option<usize> {
        self.page.map(|page| page.saturating_sub(1).max(0) as usize)
    }

    /// Fit policy requested by this update. `fitPolicy` wins over the legacy
    /// `fitWidth` flag, which selects Width whenever it is present, whatever
    /// its value.
    pub fn fit_policy(&self) -> Option<FitPolicy> {
        match (self.fit_policy, self.fit_width) {
            (Some(code), _) => Some(FitPolicy::from_code(code)),
            (None, Some(_)) => Some(FitPolicy::Width),
            (None, None) => None,
        }
    }

    /// Returns `true` if applying this update invalidates the loaded page
    /// collection and needs a full reload.
    pub fn requires_reload(&self, current: &ViewerConfig) -> bool {
        fn changed<T: PartialEq>(new: &Option<T>, old: &T) -> bool {
            new.as_ref().is_some_and(|new| new != old)
        }

        let source_changed = self
            .source
            .as_ref()
            .is_some_and(|source| current.source.as_deref() != Some(source.as_str()));
        let password_changed = self
            .password
            .as_ref()
            .is_some_and(|password| current.password.as_deref() != Some(password.as_str()));

        source_changed
            || password_changed
            || changed(&self.reverse, &current.reverse)
            || changed(&self.paging, &current.paging)
            || changed(&self.single_page, &current.single_page)
    }

    /// Folds every present field into `config`.
    pub fn merge_into(&self, config: &mut ViewerConfig) {
        if let Some(source) = &self.source {
            config.source = Some(source.clone());
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(page) = self.page_index() {
            config.page = page;
        }
        if let Some(scale) = self.scale {
            config.scale = scale;
        }
        if let Some(min_scale) = self.min_scale {
            config.min_scale = min_scale;
        }
        if let Some(max_scale) = self.max_scale {
            config.max_scale = max_scale;
        }
        if let Some(horizontal) = self.horizontal {
            config.orientation = Orientation::from_horizontal(horizontal);
        }
        if let Some(policy) = self.fit_policy() {
            config.fit_policy = policy;
        }
        if let Some(margin) = self.margin {
            config.margin = margin;
        }
        if let Some(reverse) = self.reverse {
            config.reverse = reverse;
        }
        if let Some(paging) = self.paging {
            config.paging = paging;
        }
        if let Some(single_page) = self.single_page {
            config.single_page = single_page;
        }
        if let Some(color) = self.background_color {
            config.background = Argb::from_packed(color as u32);
        }
        if let Some(annotations) = self.annotations {
            config.annotations = annotations;
        }
    }
}

/// Process-level tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSettings {
    /// Upper bound for the scale of background preview renders
    pub preview_zoom: f64,
    /// See [`pdf_viewer_scheduler::needs_render`]
    pub downscale_threshold: f64,
    /// Scale factor per wheel notch and per double tap
    pub zoom_multiplier: f64,
    /// Pages rendered past the visible edge
    pub look_ahead: usize,
    /// Pages rendered before the current page
    pub look_behind: usize,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            preview_zoom: 0.5,
            downscale_threshold: pdf_viewer_scheduler::DOWNSCALE_THRESHOLD,
            zoom_multiplier: 1.2,
            look_ahead: 1,
            look_behind: 2,
        }
    }
}

impl ViewerSettings {
    pub fn with_preview_zoom(mut self, preview_zoom: f64) -> Self {
        self.preview_zoom = preview_zoom;
        self
    }

    pub fn with_zoom_multiplier(mut self, zoom_multiplier: f64) -> Self {
        self.zoom_multiplier = zoom_multiplier;
        self
    }

    pub fn with_render_window(mut self, look_ahead: usize, look_behind: usize) -> Self {
        self.look_ahead = look_ahead;
        self.look_behind = look_behind;
        self
    }

    /// Loads settings from environment variables.
    ///
    /// Environment variables:
    /// - `PDF_VIEWER_PREVIEW_ZOOM` (default: 0.5)
    /// - `PDF_VIEWER_DOWNSCALE_THRESHOLD` (default: 2.0)
    /// - `PDF_VIEWER_ZOOM_MULTIPLIER` (default: 1.2)
    /// - `PDF_VIEWER_LOOK_AHEAD` (default: 1)
    /// - `PDF_VIEWER_LOOK_BEHIND` (default: 2)
    ///
    /// # Errors
    /// Returns an error if any variable holds a value that does not parse or
    /// is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Some(value) = positive_env("PDF_VIEWER_PREVIEW_ZOOM")? {
            settings.preview_zoom = value;
        }
        if let Some(value) = positive_env("PDF_VIEWER_DOWNSCALE_THRESHOLD")? {
            if value < 1.0 {
                return Err(ConfigError::InvalidValue("PDF_VIEWER_DOWNSCALE_THRESHOLD".into()));
            }
            settings.downscale_threshold = value;
        }
        if let Some(value) = positive_env("PDF_VIEWER_ZOOM_MULTIPLIER")? {
            settings.zoom_multiplier = value;
        }
        if let Some(value) = count_env("PDF_VIEWER_LOOK_AHEAD")? {
            settings.look_ahead = value;
        }
        if let Some(value) = count_env("PDF_VIEWER_LOOK_BEHIND")? {
            settings.look_behind = value;
        }

        Ok(settings)
    }
}

fn positive_env(name: &str) -> Result<Option<f64>, ConfigError> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };

    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(Some(value)),
        _ => Err(ConfigError::InvalidValue(name.to_owned())),
    }
}

fn count_env(name: &str) -> Result<Option<usize>, ConfigError> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };

    raw.trim().parse::<usize>().map(Some).map_err(|_| ConfigError::InvalidValue(name.to_owned()))
}
