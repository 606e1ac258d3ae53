//! Per-session viewer state.
//!
//! The session owns everything the viewer keeps between user events: the
//! uploaded document, the current annotation set and the display settings.
//! Annotation edits follow a last-known-good policy: a text that fails to
//! decode leaves the previous set in place and raises a dismissible notice.

use serde::Serialize;
use tracing::{info, warn};

use crate::annotation::{AnnotationClick, AnnotationSet};
use crate::config::{ConfigError, DisplayOptions, ViewerConfig};
use crate::decode::{decode, DecodeError, FORMAT_HINT};
use crate::fingerprint::fingerprint_bytes;
use crate::revision::{read_revision, revision_link};

#[derive(Debug, Clone)]
pub struct Document {
    bytes: Vec<u8>,
    fingerprint: String,
}

impl Document {
    pub fn new(bytes: Vec<u8>) -> Self {
        let fingerprint = fingerprint_bytes(&bytes);
        Self { bytes, fingerprint }
    }

    /// Whether the content starts with the PDF header.
    pub fn is_pdf(&self) -> bool {
        self.bytes.starts_with(b"%PDF-")
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// User-visible, dismissible warning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub message: String,
    pub detail: String,
}

/// Forced styling applied to every shorthand box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleOverrides {
    pub color: Option<String>,
    pub border: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ViewerSession {
    document: Option<Document>,
    annotations: AnnotationSet,
    revision: String,
    repository: String,
    page_selection: Vec<i64>,
    display: DisplayOptions,
    style: StyleOverrides,
    notice: Option<Notice>,
    last_click: Option<AnnotationClick>,
}

impl ViewerSession {
    pub fn new(revision: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            repository: repository.into(),
            ..Self::default()
        }
    }

    /// Fresh session with the revision read once from the configured file.
    pub fn bootstrap(config: &ViewerConfig) -> Self {
        let revision = read_revision(&config.revision_file);
        info!(%revision, "session started");
        Self::new(revision, config.repository.clone())
    }

    pub fn with_style(mut self, style: StyleOverrides) -> Self {
        self.style = style;
        self
    }

    /// Replace the document. Page selection belongs to the old document and
    /// is cleared.
    pub fn load_document(&mut self, bytes: Vec<u8>) -> &Document {
        let document = Document::new(bytes);
        info!(
            fingerprint = document.fingerprint(),
            bytes = document.len(),
            "document loaded"
        );
        if !document.is_pdf() {
            warn!(fingerprint = document.fingerprint(), "document has no PDF header");
        }
        self.page_selection.clear();
        self.last_click = None;
        self.document.insert(document)
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Decode `raw` and make it the current annotation set.
    ///
    /// On failure the previous set stays current and a notice is raised; the
    /// error is returned so callers can report it too.
    pub fn apply_annotation_text(&mut self, raw: &str) -> Result<usize, DecodeError> {
        match decode(raw, self.style.color.as_deref(), self.style.border.as_deref()) {
            Ok(set) => {
                let count = set.len();
                self.annotations = set;
                self.notice = None;
                Ok(count)
            }
            Err(err) => {
                warn!(%err, kept = self.annotations.len(), "annotation edit rejected");
                self.notice = Some(Notice {
                    message: FORMAT_HINT.to_string(),
                    detail: err.to_string(),
                });
                Err(err)
            }
        }
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    pub fn record_click(&mut self, click: AnnotationClick) -> serde_json::Value {
        info!(index = click.index, page = click.page, "annotation clicked");
        self.last_click = Some(click);
        click.report()
    }

    pub fn last_click(&self) -> Option<AnnotationClick> {
        self.last_click
    }

    pub fn set_page_selection(&mut self, pages: Vec<i64>) {
        self.page_selection = pages;
    }

    /// Selected pages; empty means every page is shown.
    pub fn page_selection(&self) -> &[i64] {
        &self.page_selection
    }

    pub fn display_options(&self) -> DisplayOptions {
        self.display
    }

    pub fn set_display_options(&mut self, options: DisplayOptions) -> Result<(), ConfigError> {
        options.validate()?;
        self.display = options;
        Ok(())
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn revision_link(&self) -> Option<String> {
        revision_link(&self.repository, &self.revision)
    }
}
