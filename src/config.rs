//! Viewer configuration
//!
//! Every tunable of the viewport, scheduler, loader and gesture handling.
//! Loadable from JSON; missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse failed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Viewer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    /// Seconds a spring takes to reach its target
    pub animation_time: f64,
    /// Seconds a freshly loaded tile takes to fade in
    pub blend_time: f64,
    /// Keep multiplying blend opacity by the level opacity after the fade
    pub always_blend: bool,
    /// Prefetch for the current zoom instead of the target zoom
    pub immediate_render: bool,
    pub wrap_horizontal: bool,
    pub wrap_vertical: bool,
    /// How far out the user may zoom, relative to the home zoom
    pub min_zoom_image_ratio: f64,
    /// How many screen pixels one image pixel may cover at max zoom
    pub max_zoom_pixel_ratio: f64,
    /// Fraction of the viewport that must stay over the image
    pub visibility_ratio: f64,
    pub spring_stiffness: f64,
    /// Concurrent tile downloads (0 = unbounded)
    pub image_loader_limit: usize,
    /// Milliseconds before a press/release pair no longer counts as a click
    pub click_time_threshold: f64,
    /// Pixels a pointer may travel and still count as a click
    pub click_dist_threshold: f64,
    pub zoom_per_click: f64,
    pub zoom_per_scroll: f64,
    /// Pixels of pinch travel equivalent to one wheel line
    pub pixels_per_wheel_line: f64,
    /// Upper bound on tiles holding decoded bitmaps
    pub max_image_cache_count: usize,
    /// Screen pixels per tile pixel below which a level is too coarse to render
    pub min_pixel_ratio: f64,
    /// Milliseconds before an outstanding tile fetch is reported as failed
    pub timeout_ms: u64,
    /// Idle redraw rate
    pub target_fps: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            animation_time: 1.5,
            blend_time: 0.5,
            always_blend: false,
            immediate_render: false,
            wrap_horizontal: false,
            wrap_vertical: false,
            min_zoom_image_ratio: 0.8,
            max_zoom_pixel_ratio: 2.0,
            visibility_ratio: 0.5,
            spring_stiffness: 5.0,
            image_loader_limit: 2,
            click_time_threshold: 200.0,
            click_dist_threshold: 5.0,
            zoom_per_click: 2.0,
            zoom_per_scroll: 1.2,
            pixels_per_wheel_line: 40.0,
            max_image_cache_count: 100,
            min_pixel_ratio: 0.5,
            timeout_ms: 5000,
            target_fps: 60.0,
        }
    }
}

impl ViewerConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        tracing::info!("Loaded viewer config: {}", path.display());
        Ok(config)
    }

    /// Reject values the viewport or scheduler cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid { field, reason: format!("must be > 0, got {value}") })
            }
        }

        positive("springStiffness", self.spring_stiffness)?;
        positive("minZoomImageRatio", self.min_zoom_image_ratio)?;
        positive("maxZoomPixelRatio", self.max_zoom_pixel_ratio)?;
        positive("minPixelRatio", self.min_pixel_ratio)?;
        positive("zoomPerClick", self.zoom_per_click)?;
        positive("zoomPerScroll", self.zoom_per_scroll)?;
        positive("pixelsPerWheelLine", self.pixels_per_wheel_line)?;
        positive("targetFps", self.target_fps)?;

        if !(self.animation_time >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "animationTime",
                reason: format!("must be >= 0, got {}", self.animation_time),
            });
        }
        if !(self.blend_time >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "blendTime",
                reason: format!("must be >= 0, got {}", self.blend_time),
            });
        }
        if !(0.0..=1.0).contains(&self.visibility_ratio) {
            return Err(ConfigError::Invalid {
                field: "visibilityRatio",
                reason: format!("must be within [0, 1], got {}", self.visibility_ratio),
            });
        }
        if self.max_image_cache_count == 0 {
            return Err(ConfigError::Invalid {
                field: "maxImageCacheCount",
                reason: "must hold at least one tile".to_string(),
            });
        }
        Ok(())
    }

    /// Milliseconds between idle frames
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.target_fps
    }

    /// Snappy settings for embedding: no fades, short animations
    pub fn minimal() -> Self {
        Self {
            animation_time: 0.5,
            blend_time: 0.0,
            ..Default::default()
        }
    }

    /// Endless horizontal panning, e.g. for world maps
    pub fn for_wrapping_map() -> Self {
        Self {
            wrap_horizontal: true,
            ..Default::default()
        }
    }
}
