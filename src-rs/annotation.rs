//! Canonical annotation records.
//!
//! A decode produces an [`AnnotationSet`]: either the structured JSON array
//! exactly as the user wrote it, or the boxes built from the shorthand text.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const DEFAULT_COLOR: &str = "red";
pub const DEFAULT_BORDER: &str = "dashed";

/// One rectangle overlay on a document page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationBox {
    pub page: i64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_border")]
    pub border: String,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_border() -> String {
    DEFAULT_BORDER.to_string()
}

impl AnnotationBox {
    pub fn new(page: i64, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            page,
            x,
            y,
            width,
            height,
            color: default_color(),
            border: default_border(),
        }
    }

    pub fn with_style(mut self, color: impl Into<String>, border: impl Into<String>) -> Self {
        self.color = color.into();
        self.border = border.into();
        self
    }

    /// Lenient projection of an arbitrary structured record.
    ///
    /// Structured input is trusted verbatim by the decoder, so anything that
    /// needs real geometry (drawing, hit-testing) goes through here. Records
    /// without the five required numbers yield `None`; numbers written as
    /// strings are accepted.
    pub fn from_record(record: &Map<String, Value>) -> Option<Self> {
        let page = value_to_f64(record.get("page"))?;
        if page.fract() != 0.0 {
            return None;
        }
        Some(Self {
            page: page as i64,
            x: value_to_f64(record.get("x"))?,
            y: value_to_f64(record.get("y"))?,
            width: value_to_f64(record.get("width"))?,
            height: value_to_f64(record.get("height"))?,
            color: value_to_string(record.get("color")).unwrap_or_else(default_color),
            border: value_to_string(record.get("border")).unwrap_or_else(default_border),
        })
    }
}

/// Click notification from the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationClick {
    pub index: usize,
    pub page: i64,
}

impl AnnotationClick {
    /// The payload shown to the user for a clicked box.
    pub fn report(&self) -> Value {
        json!({"Index": self.index, "Page": self.page})
    }
}

/// Where a decoded set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationSource {
    Structured,
    Shorthand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationSet {
    /// Parsed JSON array, kept verbatim.
    Structured(Vec<Value>),
    Shorthand(Vec<AnnotationBox>),
}

impl Default for AnnotationSet {
    fn default() -> Self {
        AnnotationSet::Shorthand(Vec::new())
    }
}

impl AnnotationSet {
    pub fn source(&self) -> AnnotationSource {
        match self {
            AnnotationSet::Structured(_) => AnnotationSource::Structured,
            AnnotationSet::Shorthand(_) => AnnotationSource::Shorthand,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AnnotationSet::Structured(records) => records.len(),
            AnnotationSet::Shorthand(boxes) => boxes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The set as the JSON array handed to the rendering surface.
    pub fn to_json(&self) -> Value {
        match self {
            AnnotationSet::Structured(records) => Value::Array(records.clone()),
            AnnotationSet::Shorthand(boxes) => {
                Value::Array(boxes.iter().map(box_to_value).collect())
            }
        }
    }

    /// Drawable boxes paired with their index in the set.
    ///
    /// Indices are positions in the full set, so a skipped structured record
    /// never shifts the index reported for the records after it.
    pub fn boxes(&self) -> Vec<(usize, AnnotationBox)> {
        match self {
            AnnotationSet::Shorthand(boxes) => boxes.iter().cloned().enumerate().collect(),
            AnnotationSet::Structured(records) => records
                .iter()
                .enumerate()
                .filter_map(|(idx, record)| {
                    let parsed = record.as_object().and_then(AnnotationBox::from_record);
                    if parsed.is_none() {
                        tracing::warn!(index = idx, "structured record has no drawable geometry");
                    }
                    parsed.map(|b| (idx, b))
                })
                .collect(),
        }
    }
}

// JSON has no NaN or infinity; such coordinates come out as `null`.
fn box_to_value(b: &AnnotationBox) -> Value {
    json!({
        "page": b.page,
        "x": b.x,
        "y": b.y,
        "width": b.width,
        "height": b.height,
        "color": b.color,
        "border": b.border,
    })
}

fn value_to_f64(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn value_to_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => {
            let v = s.trim();
            if v.is_empty() {
                None
            } else {
                Some(v.to_string())
            }
        }
        _ => None,
    }
}
