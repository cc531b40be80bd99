//! Recognition engine handle
//!
//! The [`RecognitionEngine`] owns the single recognizer instance for a run.
//! Backends that hold per-language state are serialized: a language switch
//! and the recognition that needed it happen under one exclusive lock.
//! Re-entrant backends take the language with every call and run
//! concurrently under a shared lock.

use anyhow::{bail, Result};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use crate::vision::TextRegion;

/// Text recognition backend
pub trait TextRecognizer: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Language code currently loaded
    fn active_language(&self) -> &str;

    /// Load another language. Called only when the code differs from
    /// [`TextRecognizer::active_language`].
    fn set_language(&mut self, language_code: &str) -> Result<()>;

    /// Recognize text fragments in an image file with the active language
    fn recognize(&mut self, image: &Path) -> Result<Vec<TextRegion>>;

    /// True when [`TextRecognizer::recognize_in`] may run concurrently
    fn is_reentrant(&self) -> bool {
        false
    }

    /// Recognize in `language_code` without touching the active language.
    /// Only called when [`TextRecognizer::is_reentrant`] is true.
    fn recognize_in(&self, image: &Path, language_code: &str) -> Result<Vec<TextRegion>> {
        let _ = (image, language_code);
        bail!("{} does not support concurrent recognition", self.name())
    }
}

/// Run-scoped owner of the recognition backend.
///
/// Safe to share between worker threads. A serialized backend never lets a
/// call observe another call's language; a re-entrant one never shares a
/// language at all.
pub struct RecognitionEngine {
    recognizer: RwLock<Box<dyn TextRecognizer>>,
    reentrant: bool,
    language_switches: AtomicUsize,
    calls: AtomicUsize,
}

impl RecognitionEngine {
    /// Take ownership of a recognizer for the duration of a run
    pub fn new(recognizer: Box<dyn TextRecognizer>) -> Self {
        let reentrant = recognizer.is_reentrant();
        info!(
            "Recognition engine acquired: {} (language: {}, {})",
            recognizer.name(),
            recognizer.active_language(),
            if reentrant { "concurrent" } else { "serialized" }
        );
        Self {
            recognizer: RwLock::new(recognizer),
            reentrant,
            language_switches: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Recognize `image` in `language_code`
    pub fn recognize(&self, image: &Path, language_code: &str) -> Result<Vec<TextRegion>> {
        if language_code.trim().is_empty() {
            bail!("Empty language code");
        }

        if self.reentrant {
            let recognizer = self.recognizer.read();
            self.calls.fetch_add(1, Ordering::Relaxed);
            return recognizer.recognize_in(image, language_code);
        }

        let mut recognizer = self.recognizer.write();
        if recognizer.active_language() != language_code {
            debug!(
                "Switching {} from '{}' to '{}'",
                recognizer.name(),
                recognizer.active_language(),
                language_code
            );
            recognizer.set_language(language_code)?;
            self.language_switches.fetch_add(1, Ordering::Relaxed);
        }
        self.calls.fetch_add(1, Ordering::Relaxed);
        recognizer.recognize(image)
    }

    pub fn active_language(&self) -> String {
        self.recognizer.read().active_language().to_string()
    }

    /// Number of language reloads so far
    pub fn language_switches(&self) -> usize {
        self.language_switches.load(Ordering::Relaxed)
    }

    /// Number of recognition calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Drop for RecognitionEngine {
    fn drop(&mut self) {
        info!(
            "Recognition engine released after {} calls ({} language switches, last language: {})",
            self.calls(),
            self.language_switches(),
            self.active_language()
        );
    }
}
