//! Overlay surface over pre-rasterized document pages.
//!
//! Pages are stacked top to bottom on one canvas, upscaled by the resolution
//! boost and separated by the vertical spacing. Annotation boxes are drawn in
//! the page coordinate space scaled by the same boost, and the resulting
//! layout answers click and scroll queries.

use std::path::{Path, PathBuf};

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::annotation::{AnnotationBox, AnnotationClick, AnnotationSet};
use crate::config::{ConfigError, DisplayOptions};

const CANVAS_BACKGROUND: [u8; 4] = [224, 224, 224, 255];
const FALLBACK_STROKE: [u8; 4] = [255, 0, 0, 255];
const LABEL_TEXT: [u8; 4] = [255, 255, 255, 255];

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("failed to open page image {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no pages to display")]
    NoPages,
    #[error(transparent)]
    Options(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderStyle {
    Solid,
    Dashed,
    Dotted,
}

impl BorderStyle {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dashed" => BorderStyle::Dashed,
            "dotted" => BorderStyle::Dotted,
            _ => BorderStyle::Solid,
        }
    }

    fn pattern(self, thickness: u32) -> StrokePattern {
        let t = i64::from(thickness.max(1));
        match self {
            BorderStyle::Solid => StrokePattern { on: 1, off: 0 },
            BorderStyle::Dashed => StrokePattern { on: 4 * t, off: 3 * t },
            BorderStyle::Dotted => StrokePattern { on: t, off: t },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StrokePattern {
    on: i64,
    off: i64,
}

impl StrokePattern {
    fn is_on(self, pos: i64) -> bool {
        self.off == 0 || pos.rem_euclid(self.on + self.off) < self.on
    }
}

/// Rectangle on the canvas, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CanvasRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CanvasRect {
    fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagePlacement {
    pub page: i64,
    #[serde(skip)]
    image_index: usize,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
    pub pages: Vec<PagePlacement>,
}

impl Layout {
    pub fn placement(&self, page: i64) -> Option<&PagePlacement> {
        self.pages.iter().find(|p| p.page == page)
    }

    /// Where `b` lands on the canvas, `None` when its page is not displayed.
    pub fn box_rect(&self, b: &AnnotationBox) -> Option<CanvasRect> {
        let placement = self.placement(b.page)?;
        Some(CanvasRect {
            x: b.x * self.scale,
            y: f64::from(placement.top) + b.y * self.scale,
            width: b.width * self.scale,
            height: b.height * self.scale,
        })
    }

    /// Topmost box under the canvas point. Later boxes are drawn over
    /// earlier ones, so the search runs back to front.
    pub fn hit_test(
        &self,
        boxes: &[(usize, AnnotationBox)],
        x: f64,
        y: f64,
    ) -> Option<AnnotationClick> {
        boxes.iter().rev().find_map(|(index, b)| {
            let rect = self.box_rect(b)?;
            rect.contains(x, y).then_some(AnnotationClick {
                index: *index,
                page: b.page,
            })
        })
    }

    /// Canvas y offset of the `nth` (1-based) annotation of the set.
    pub fn scroll_offset(&self, boxes: &[(usize, AnnotationBox)], nth: u32) -> Option<u32> {
        let target = usize::try_from(nth).ok()?.checked_sub(1)?;
        let (_, b) = boxes.iter().find(|(index, _)| *index == target)?;
        let rect = self.box_rect(b)?;
        Some(rect.y.max(0.0).round() as u32)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DrawnBox {
    pub index: usize,
    pub page: i64,
    pub color: String,
    pub border: String,
    pub rect: CanvasRect,
}

#[derive(Debug, Clone)]
pub struct Rendered {
    pub image: RgbaImage,
    pub layout: Layout,
    pub drawn: Vec<DrawnBox>,
    /// Indices of annotations that could not be placed on a displayed page.
    pub skipped: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct PageOverlay {
    pages: Vec<RgbaImage>,
    page_base: i64,
    labels: bool,
}

impl PageOverlay {
    pub fn new(pages: Vec<RgbaImage>) -> Self {
        Self {
            pages,
            page_base: 1,
            labels: false,
        }
    }

    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self, OverlayError> {
        let mut pages = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let page = image::open(path).map_err(|source| OverlayError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            pages.push(page.to_rgba8());
        }
        Ok(Self::new(pages))
    }

    /// Page number carried by boxes on the first image.
    pub fn with_page_base(mut self, page_base: i64) -> Self {
        self.page_base = page_base;
        self
    }

    pub fn with_labels(mut self, labels: bool) -> Self {
        self.labels = labels;
        self
    }

    /// Place the displayed pages. An empty `selection` shows every page.
    pub fn layout(
        &self,
        options: &DisplayOptions,
        selection: &[i64],
    ) -> Result<Layout, OverlayError> {
        options.validate()?;
        let boost = options.resolution_boost;
        let gap = options.pages_vertical_spacing * boost;

        let mut placements = Vec::new();
        let mut cursor = 0u32;
        let mut width = 0u32;
        for (image_index, page) in self.pages.iter().enumerate() {
            let number = self.page_base + image_index as i64;
            if !selection.is_empty() && !selection.contains(&number) {
                continue;
            }
            if !placements.is_empty() {
                cursor += gap;
            }
            let (w, h) = (page.width() * boost, page.height() * boost);
            placements.push(PagePlacement {
                page: number,
                image_index,
                top: cursor,
                width: w,
                height: h,
            });
            cursor += h;
            width = width.max(w);
        }

        if placements.is_empty() {
            return Err(OverlayError::NoPages);
        }

        Ok(Layout {
            width,
            height: cursor,
            scale: f64::from(boost),
            pages: placements,
        })
    }

    pub fn render(
        &self,
        annotations: &AnnotationSet,
        options: &DisplayOptions,
        selection: &[i64],
    ) -> Result<Rendered, OverlayError> {
        let layout = self.layout(options, selection)?;
        let boost = options.resolution_boost;
        let mut canvas = RgbaImage::from_pixel(layout.width, layout.height, Rgba(CANVAS_BACKGROUND));

        for placement in &layout.pages {
            let page = &self.pages[placement.image_index];
            if boost == 1 {
                imageops::overlay(&mut canvas, page, 0, i64::from(placement.top));
            } else {
                let scaled =
                    imageops::resize(page, placement.width, placement.height, FilterType::Triangle);
                imageops::overlay(&mut canvas, &scaled, 0, i64::from(placement.top));
            }
        }

        let thickness = options.annotation_outline_size * boost;
        let mut drawn = Vec::new();
        let mut skipped = Vec::new();
        for (index, b) in annotations.boxes() {
            let Some(rect) = layout.box_rect(&b) else {
                warn!(index, page = b.page, "annotation page is not displayed");
                skipped.push(index);
                continue;
            };
            let stroke = parse_color(&b.color).unwrap_or_else(|| {
                debug!(index, color = %b.color, "unknown color, using red");
                Rgba(FALLBACK_STROKE)
            });
            let pattern = BorderStyle::parse(&b.border).pattern(thickness);
            draw_rect_outline(&mut canvas, rect, stroke, thickness, pattern);
            if self.labels {
                draw_index_label(&mut canvas, rect, index, stroke, boost);
            }
            drawn.push(DrawnBox {
                index,
                page: b.page,
                color: b.color,
                border: b.border,
                rect,
            });
        }

        Ok(Rendered {
            image: canvas,
            layout,
            drawn,
            skipped,
        })
    }
}

/// CSS-style color: a few common names, `#rrggbb`, `#rrggbbaa`, `rgb()`
/// and `rgba()`.
pub fn parse_color(raw: &str) -> Option<Rgba<u8>> {
    let s = raw.trim();
    if let Some(hex) = s.strip_prefix('#') {
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        return match hex.len() {
            6 => Some(Rgba([channel(0)?, channel(2)?, channel(4)?, 255])),
            8 => Some(Rgba([channel(0)?, channel(2)?, channel(4)?, channel(6)?])),
            _ => None,
        };
    }

    let lower = s.to_ascii_lowercase();
    if let Some(body) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return None;
        }
        let channel = |raw: &str| -> Option<u8> {
            Some(raw.parse::<f64>().ok()?.round().clamp(0.0, 255.0) as u8)
        };
        let a = match parts.get(3) {
            Some(raw) => {
                let alpha = raw.parse::<f64>().ok()?;
                if alpha <= 1.0 {
                    (alpha * 255.0).round().clamp(0.0, 255.0) as u8
                } else {
                    alpha.round().clamp(0.0, 255.0) as u8
                }
            }
            None => 255,
        };
        return Some(Rgba([channel(parts[0])?, channel(parts[1])?, channel(parts[2])?, a]));
    }

    let rgb = match lower.as_str() {
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "blue" => [0, 0, 255],
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "yellow" => [255, 255, 0],
        "orange" => [255, 165, 0],
        "purple" => [128, 0, 128],
        "magenta" | "fuchsia" => [255, 0, 255],
        "cyan" | "aqua" => [0, 255, 255],
        "gray" | "grey" => [128, 128, 128],
        "pink" => [255, 192, 203],
        "brown" => [165, 42, 42],
        "lime" => [0, 255, 0],
        "navy" => [0, 0, 128],
        "teal" => [0, 128, 128],
        "maroon" => [128, 0, 0],
        "olive" => [128, 128, 0],
        _ => return None,
    };
    Some(Rgba([rgb[0], rgb[1], rgb[2], 255]))
}

fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = f64::from(src[3]) / 255.0;
    if a <= 0.0 {
        return dst;
    }
    let inv = 1.0 - a;
    let mix = |d: u8, s: u8| (f64::from(d) * inv + f64::from(s) * a).round().clamp(0.0, 255.0) as u8;
    let out_a = (f64::from(dst[3]) + f64::from(src[3]) * inv)
        .round()
        .clamp(0.0, 255.0) as u8;
    Rgba([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2]), out_a])
}

fn plot(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x < 0 || y < 0 || x >= i64::from(img.width()) || y >= i64::from(img.height()) {
        return;
    }
    let dst = *img.get_pixel(x as u32, y as u32);
    img.put_pixel(x as u32, y as u32, blend_pixel(dst, color));
}

/// Round a canvas coordinate and pin it to `[lo, hi]`. Rects far outside the
/// canvas collapse onto its margin instead of overflowing.
fn pin(v: f64, lo: i64, hi: i64) -> i64 {
    (v.round() as i64).clamp(lo, hi)
}

fn draw_rect_outline(
    img: &mut RgbaImage,
    rect: CanvasRect,
    color: Rgba<u8>,
    thickness: u32,
    pattern: StrokePattern,
) {
    if !rect.is_finite() || rect.width <= 0.0 || rect.height <= 0.0 {
        return;
    }
    let (w, h) = (i64::from(img.width()), i64::from(img.height()));
    if w == 0 || h == 0 {
        return;
    }
    let t_max = i64::from(thickness.max(1));
    let (max_x, max_y) = (w - 1, h - 1);

    let x0 = pin(rect.x, -t_max - 1, w + t_max);
    let y0 = pin(rect.y, -t_max - 1, h + t_max);
    let x1 = (pin(rect.x + rect.width, -t_max, w + t_max + 1) - 1).max(x0);
    let y1 = (pin(rect.y + rect.height, -t_max, h + t_max + 1) - 1).max(y0);
    if x0 - t_max > max_x || y0 - t_max > max_y || x1 + t_max < 0 || y1 + t_max < 0 {
        return;
    }

    for t in 0..t_max {
        let (tx0, ty0, tx1, ty1) = (x0 - t, y0 - t, x1 + t, y1 + t);
        if tx0 > max_x || ty0 > max_y || tx1 < 0 || ty1 < 0 {
            continue;
        }

        for xx in tx0.max(0)..=tx1.min(max_x) {
            if pattern.is_on(xx - tx0) {
                plot(img, xx, ty0, color);
                plot(img, xx, ty1, color);
            }
        }
        for yy in ty0.max(0)..=ty1.min(max_y) {
            if pattern.is_on(yy - ty0) {
                plot(img, tx0, yy, color);
                plot(img, tx1, yy, color);
            }
        }
    }
}

fn draw_index_label(img: &mut RgbaImage, rect: CanvasRect, index: usize, color: Rgba<u8>, scale: u32) {
    if !rect.is_finite() {
        return;
    }
    let text = index.to_string();
    let scale_i = i64::from(scale.max(1));
    let glyph = 8 * scale_i;
    let pad = scale_i;
    let label_w = text.chars().count() as i64 * glyph + 2 * pad;
    let label_h = glyph + 2 * pad;
    let (w, h) = (i64::from(img.width()), i64::from(img.height()));

    let x = pin(rect.x, -label_w, w);
    let top = pin(rect.y, -label_h, h + label_h);
    let above = top - label_h;
    let y = if above >= 0 { above } else { top };
    if x >= w || y >= h || x + label_w <= 0 || y + label_h <= 0 {
        return;
    }

    for yy in y..y + label_h {
        for xx in x..x + label_w {
            plot(img, xx, yy, color);
        }
    }
    draw_bitmap_text(img, x + pad, y + pad, &text, Rgba(LABEL_TEXT), scale);
}

fn draw_bitmap_text(img: &mut RgbaImage, x: i64, y: i64, text: &str, color: Rgba<u8>, scale: u32) {
    let scale_i = i64::from(scale.max(1));
    let mut cursor_x = x;
    for ch in text.chars() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            cursor_x += 8 * scale_i;
            continue;
        };
        for (row_idx, row) in glyph.iter().enumerate() {
            for col_idx in 0..8 {
                if (*row >> col_idx) & 1 == 0 {
                    continue;
                }
                let px = cursor_x + col_idx * scale_i;
                let py = y + row_idx as i64 * scale_i;
                for sy in 0..scale_i {
                    for sx in 0..scale_i {
                        plot(img, px + sx, py + sy, color);
                    }
                }
            }
        }
        cursor_x += 8 * scale_i;
    }
}
