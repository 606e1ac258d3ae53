//! Annotation text decoder.
//!
//! Two stages, first match wins:
//!
//! 1. the text is a JSON array with at least one element: it is returned
//!    verbatim as the annotation list;
//! 2. otherwise it is read as shorthand, one `page,x,y,width,height[,color[,border]]`
//!    item per `;` (or per line when the text has no `;`).
//!
//! Shorthand items with fewer than five fields are dropped without error. A
//! field that is not a number fails the whole decode.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::annotation::{AnnotationBox, AnnotationSet, DEFAULT_BORDER, DEFAULT_COLOR};

pub const FORMAT_HINT: &str =
    "Invalid annotations format. Please use the format: page,x,y,width,height;page,x,y,width,height;...";

const MIN_FIELDS: usize = 5;
const NUMERIC_FIELDS: [&str; MIN_FIELDS] = ["page", "x", "y", "width", "height"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("annotation {item}: {field} is not a valid number: {value:?}")]
    Numeric {
        item: usize,
        field: &'static str,
        value: String,
    },
}

enum Structured {
    Usable(Vec<Value>),
    Unusable(&'static str),
}

/// Decode user-entered annotation text.
///
/// `color` and `border`, when given, replace whatever the shorthand says for
/// every box. They are not applied to structured input.
pub fn decode(
    raw: &str,
    color: Option<&str>,
    border: Option<&str>,
) -> Result<AnnotationSet, DecodeError> {
    match try_structured(raw) {
        Structured::Usable(records) => {
            debug!(records = records.len(), "decoded structured annotations");
            Ok(AnnotationSet::Structured(records))
        }
        Structured::Unusable(reason) => {
            debug!(reason, "falling back to shorthand annotations");
            let boxes = decode_shorthand(raw, color, border)?;
            debug!(boxes = boxes.len(), "decoded shorthand annotations");
            Ok(AnnotationSet::Shorthand(boxes))
        }
    }
}

fn try_structured(raw: &str) -> Structured {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) if !items.is_empty() => Structured::Usable(items),
        Ok(Value::Array(_)) => Structured::Unusable("empty array"),
        Ok(_) => Structured::Unusable("not an array"),
        Err(_) => Structured::Unusable("not JSON"),
    }
}

pub fn decode_shorthand(
    raw: &str,
    color: Option<&str>,
    border: Option<&str>,
) -> Result<Vec<AnnotationBox>, DecodeError> {
    let delimiter = if raw.contains(';') { ';' } else { '\n' };
    let mut boxes = Vec::new();

    for (item_idx, item) in raw.split(delimiter).enumerate() {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }

        let parts: Vec<&str> = item.split(',').collect();
        if parts.len() < MIN_FIELDS {
            debug!(item = item_idx, fields = parts.len(), "dropping short annotation");
            continue;
        }

        let numeric = |field: usize| -> Result<f64, DecodeError> {
            parse_number(parts[field], item_idx, NUMERIC_FIELDS[field])
        };

        let page = parse_page(parts[0], item_idx)?;
        let mut b = AnnotationBox::new(page, numeric(1)?, numeric(2)?, numeric(3)?, numeric(4)?);

        b.color = resolve_style(color, parts.get(5).copied(), DEFAULT_COLOR);
        b.border = resolve_style(border, parts.get(6).copied(), DEFAULT_BORDER);
        boxes.push(b);
    }

    Ok(boxes)
}

fn parse_page(raw: &str, item: usize) -> Result<i64, DecodeError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| numeric_error(raw, item, NUMERIC_FIELDS[0]))
}

fn parse_number(raw: &str, item: usize, field: &'static str) -> Result<f64, DecodeError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| numeric_error(raw, item, field))
}

fn numeric_error(raw: &str, item: usize, field: &'static str) -> DecodeError {
    DecodeError::Numeric {
        item,
        field,
        value: raw.trim().to_string(),
    }
}

fn resolve_style(forced: Option<&str>, given: Option<&str>, fallback: &str) -> String {
    if let Some(forced) = forced {
        return forced.to_string();
    }
    match given {
        Some(raw) => strip_quotes(raw),
        None => fallback.to_string(),
    }
}

fn strip_quotes(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '"' | '\''))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shorthand(raw: &str) -> Vec<AnnotationBox> {
        match decode(raw, None, None).unwrap() {
            AnnotationSet::Shorthand(boxes) => boxes,
            other => panic!("expected shorthand, got {other:?}"),
        }
    }

    #[test]
    fn five_fields_take_default_style() {
        let boxes = shorthand("3,10,20.5,30,40");
        assert_eq!(boxes, vec![AnnotationBox::new(3, 10.0, 20.5, 30.0, 40.0)]);
    }

    #[test]
    fn sixth_field_sets_color() {
        let boxes = shorthand("1,10,20,30,40,blue");
        assert_eq!(boxes[0].color, "blue");
        assert_eq!(boxes[0].border, "dashed");
    }

    #[test]
    fn quoted_style_fields_are_stripped() {
        let boxes = shorthand("1,10,20,30,40,\"blue\", 'solid' ");
        assert_eq!(boxes[0].color, "blue");
        assert_eq!(boxes[0].border, "solid");
    }

    #[test]
    fn fields_past_border_are_ignored() {
        let boxes = shorthand("1,10,20,30,40,blue,solid,extra,more");
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].border, "solid");
    }

    #[test]
    fn short_items_are_dropped_silently() {
        let boxes = shorthand("1,10,20,30;2,5,5,15,15;3,1");
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].page, 2);
    }

    #[test]
    fn semicolon_items_keep_input_order() {
        let boxes = shorthand("1,10,20,30,40;2,5,5,15,15");
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].page, 1);
        assert_eq!(boxes[1].page, 2);
        assert_eq!(boxes[1].width, 15.0);
    }

    #[test]
    fn newline_items_match_semicolon_items() {
        assert_eq!(
            shorthand("1,10,20,30,40\n2,5,5,15,15"),
            shorthand("1,10,20,30,40;2,5,5,15,15")
        );
        assert_eq!(shorthand("1,10,20,30,40\r\n\r\n2,5,5,15,15\n").len(), 2);
    }

    #[test]
    fn semicolon_wins_over_newline() {
        // The newline is not a delimiter here, so the first item only has
        // four comma separated fields.
        let boxes = shorthand("1,10,20\n30,40;2,5,5,15,15");
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].page, 2);
    }

    #[test]
    fn non_numeric_field_fails_whole_decode() {
        let err = decode("1,10,20,30,40;1,a,20,30,40", None, None).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Numeric {
                item: 1,
                field: "x",
                value: "a".to_string()
            }
        );
    }

    #[test]
    fn fractional_page_is_rejected() {
        let err = decode("1.5,10,20,30,40", None, None).unwrap_err();
        assert!(matches!(err, DecodeError::Numeric { field: "page", .. }));
    }

    #[test]
    fn empty_input_yields_nothing() {
        let set = decode("", None, None).unwrap();
        assert!(set.is_empty());
        assert!(decode("  \n ;; ", None, None).unwrap().is_empty());
    }

    #[test]
    fn overrides_replace_shorthand_style() {
        let set = decode("1,10,20,30,40,blue,solid;2,1,1,1,1", Some("green"), Some("dotted")).unwrap();
        let AnnotationSet::Shorthand(boxes) = set else {
            panic!("expected shorthand");
        };
        assert!(boxes.iter().all(|b| b.color == "green" && b.border == "dotted"));
    }

    #[test]
    fn structured_array_is_kept_verbatim() {
        let raw = r#"[{"page":1,"x":0,"y":0,"width":1,"height":1}]"#;
        let set = decode(raw, Some("green"), None).unwrap();
        assert_eq!(
            set,
            AnnotationSet::Structured(vec![json!({"page":1,"x":0,"y":0,"width":1,"height":1})])
        );
    }

    #[test]
    fn structured_output_redecodes_identically() {
        let raw = r#"[{"page":1,"x":0,"y":0,"width":1,"height":1,"label":"title"}, 7]"#;
        let first = decode(raw, None, None).unwrap();
        let reserialized = serde_json::to_string(&first.to_json()).unwrap();
        let second = decode(&reserialized, None, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_or_non_array_json_falls_back() {
        assert_eq!(decode("[]", None, None).unwrap(), AnnotationSet::Shorthand(vec![]));
        assert_eq!(decode("{}", None, None).unwrap(), AnnotationSet::Shorthand(vec![]));
        assert_eq!(decode("42", None, None).unwrap(), AnnotationSet::Shorthand(vec![]));
    }

    #[test]
    fn bare_json_object_falls_back_to_shorthand() {
        // The object has five comma separated chunks but none of them is a number.
        let err = decode(r#"{"a":1,"b":2,"c":3,"d":4,"e":5}"#, None, None).unwrap_err();
        assert!(matches!(err, DecodeError::Numeric { field: "page", .. }));
    }
}
