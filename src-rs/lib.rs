//! Decode annotation boxes for PDF pages and inspect them visually.
//!
//! Annotations come either as a JSON array of records or as shorthand text
//! (`page,x,y,width,height[,color[,border]]` items separated by `;` or by
//! newlines). [`decode`] turns either form into an [`AnnotationSet`];
//! [`ViewerSession`] holds one user's state across edits and
//! [`PageOverlay`] draws the boxes over rasterized pages.

pub mod annotation;
pub mod config;
pub mod decode;
pub mod fingerprint;
pub mod overlay;
pub mod revision;
pub mod session;

pub use annotation::{AnnotationBox, AnnotationClick, AnnotationSet, AnnotationSource};
pub use config::{ConfigError, DisplayOptions, ViewerConfig};
pub use decode::{decode, DecodeError};
pub use overlay::{OverlayError, PageOverlay};
pub use session::{StyleOverrides, ViewerSession};
