//! Display settings and process-level configuration.
//!
//! [`DisplayOptions`] carries the viewer sliders with their allowed ranges;
//! [`ViewerConfig`] is read once from the environment.

use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const REVISION_FILE_ENV: &str = "ANNOTATION_VIEWER_REVISION_FILE";
pub const REPOSITORY_ENV: &str = "ANNOTATION_VIEWER_REPOSITORY";
pub const OUT_DIR_ENV: &str = "ANNOTATION_VIEWER_OUT_DIR";

pub const DEFAULT_REVISION_FILE: &str = "revision.txt";
pub const DEFAULT_REPOSITORY: &str = "https://github.com/lfoppiano/structure-vision";
pub const DEFAULT_OUT_DIR: &str = ".annotation-viewer";

pub const OUTLINE_SIZE_RANGE: RangeInclusive<u32> = 1..=6;
pub const VERTICAL_SPACING_RANGE: RangeInclusive<u32> = 0..=10;
pub const RESOLUTION_BOOST_RANGE: RangeInclusive<u32> = 1..=10;
pub const SCROLL_RANGE: RangeInclusive<u32> = 1..=1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

/// Display settings passed to the rendering surface alongside the boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOptions {
    pub annotation_outline_size: u32,
    pub pages_vertical_spacing: u32,
    pub resolution_boost: u32,
    /// 1-based index of the annotation to bring into view.
    pub scroll_to_annotation: u32,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            annotation_outline_size: 1,
            pages_vertical_spacing: 3,
            resolution_boost: 1,
            scroll_to_annotation: 1,
        }
    }
}

impl DisplayOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "annotation_outline_size",
            self.annotation_outline_size,
            &OUTLINE_SIZE_RANGE,
        )?;
        check_range(
            "pages_vertical_spacing",
            self.pages_vertical_spacing,
            &VERTICAL_SPACING_RANGE,
        )?;
        check_range("resolution_boost", self.resolution_boost, &RESOLUTION_BOOST_RANGE)?;
        check_range("scroll_to_annotation", self.scroll_to_annotation, &SCROLL_RANGE)?;
        Ok(())
    }
}

fn check_range(
    field: &'static str,
    value: u32,
    range: &RangeInclusive<u32>,
) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

/// Process-level settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    pub revision_file: PathBuf,
    pub repository: String,
    pub out_dir: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            revision_file: PathBuf::from(DEFAULT_REVISION_FILE),
            repository: DEFAULT_REPOSITORY.to_string(),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
        }
    }
}

impl ViewerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            revision_file: get(REVISION_FILE_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.revision_file),
            repository: get(REPOSITORY_ENV)
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or(defaults.repository),
            out_dir: get(OUT_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.out_dir),
        }
    }
}
