//! # Fake Collaborators
//!
//! Deterministic stand-ins for OCR, language detection, translation and the
//! notification providers. Each fake records what it was asked to do and can
//! be told to fail its next calls.

use crate::collaborators::{
    CallNotifier, CollaboratorError, CollaboratorResult, Collaborators, InMemoryBlobStore,
    LanguageDetection, LanguageDetector, ObjectRef, SmsNotifier, TextDetector, Translator,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Number of upcoming calls that should fail
#[derive(Debug, Default)]
struct FailureBudget(AtomicUsize);

impl FailureBudget {
    fn set(&self, count: usize) {
        self.0.store(count, Ordering::SeqCst);
    }

    fn take(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// OCR fake returning configured text per object name
#[derive(Debug)]
pub struct StaticTextDetector {
    texts: RwLock<HashMap<String, String>>,
    default_text: String,
    calls: AtomicUsize,
    failures: FailureBudget,
}

impl StaticTextDetector {
    pub fn new(default_text: impl Into<String>) -> Self {
        Self {
            texts: RwLock::new(HashMap::new()),
            default_text: default_text.into(),
            calls: AtomicUsize::new(0),
            failures: FailureBudget::default(),
        }
    }

    pub fn set_text(&self, name: impl Into<String>, text: impl Into<String>) {
        self.texts.write().insert(name.into(), text.into());
    }

    pub fn fail_next(&self, count: usize) {
        self.failures.set(count);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextDetector for StaticTextDetector {
    async fn detect_text(&self, image: &ObjectRef) -> CollaboratorResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.take() {
            return Err(CollaboratorError::unavailable(
                "text_detector",
                format!("injected failure for {image}"),
            ));
        }
        Ok(self
            .texts
            .read()
            .get(&image.name)
            .cloned()
            .unwrap_or_else(|| self.default_text.clone()))
    }
}

/// Language detection fake keyed by exact text
#[derive(Debug)]
pub struct StaticLanguageDetector {
    languages: RwLock<HashMap<String, String>>,
    default_language: String,
}

impl StaticLanguageDetector {
    pub fn new(default_language: impl Into<String>) -> Self {
        Self {
            languages: RwLock::new(HashMap::new()),
            default_language: default_language.into(),
        }
    }

    pub fn set_language(&self, text: impl Into<String>, language: impl Into<String>) {
        self.languages.write().insert(text.into(), language.into());
    }
}

#[async_trait]
impl LanguageDetector for StaticLanguageDetector {
    async fn detect_language(&self, text: &str) -> CollaboratorResult<LanguageDetection> {
        let language = self
            .languages
            .read()
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.default_language.clone());
        Ok(LanguageDetection {
            language,
            confidence: Some(1.0),
        })
    }
}

/// (text, from, to) as received by the translator
pub type TranslatorCall = (String, Option<String>, String);

/// Translator fake with a fixed dictionary; unknown text becomes `"[to] text"`
#[derive(Debug, Default)]
pub struct DictionaryTranslator {
    entries: RwLock<HashMap<(String, String), String>>,
    calls: Mutex<Vec<TranslatorCall>>,
    failures: FailureBudget,
}

impl DictionaryTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, text: impl Into<String>, to: impl Into<String>, translation: impl Into<String>) {
        self.entries
            .write()
            .insert((text.into(), to.into()), translation.into());
    }

    pub fn fail_next(&self, count: usize) {
        self.failures.set(count);
    }

    pub fn calls(&self) -> Vec<TranslatorCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Translator for DictionaryTranslator {
    async fn translate(&self, text: &str, from: Option<&str>, to: &str) -> CollaboratorResult<String> {
        self.calls
            .lock()
            .push((text.to_string(), from.map(str::to_string), to.to_string()));
        if self.failures.take() {
            return Err(CollaboratorError::unavailable(
                "translator",
                format!("injected failure translating into {to}"),
            ));
        }
        Ok(self
            .entries
            .read()
            .get(&(text.to_string(), to.to_string()))
            .cloned()
            .unwrap_or_else(|| format!("[{to}] {text}")))
    }
}

#[derive(Debug, Default)]
pub struct RecordingSmsNotifier {
    sent: Mutex<Vec<String>>,
    failures: FailureBudget,
    stall: Mutex<Option<Duration>>,
    attempts: AtomicUsize,
}

impl RecordingSmsNotifier {
    pub fn fail_next(&self, count: usize) {
        self.failures.set(count);
    }

    /// The next send waits `duration` before it is recorded
    pub fn stall_next(&self, duration: Duration) {
        *self.stall.lock() = Some(duration);
    }

    /// Sends started, including ones that failed or never finished
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Bodies of every SMS accepted so far
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl SmsNotifier for RecordingSmsNotifier {
    async fn send(&self, body: &str) -> CollaboratorResult<String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let stall = self.stall.lock().take();
        if let Some(duration) = stall {
            tokio::time::sleep(duration).await;
        }
        if self.failures.take() {
            return Err(CollaboratorError::rejected("sms", "injected provider rejection"));
        }
        let mut sent = self.sent.lock();
        sent.push(body.to_string());
        Ok(format!("SM{:04}", sent.len()))
    }
}

#[derive(Debug, Default)]
pub struct RecordingCallNotifier {
    placed: Mutex<Vec<String>>,
    failures: FailureBudget,
}

impl RecordingCallNotifier {
    pub fn fail_next(&self, count: usize) {
        self.failures.set(count);
    }

    /// Webhook URLs of every call placed so far
    pub fn placed(&self) -> Vec<String> {
        self.placed.lock().clone()
    }
}

#[async_trait]
impl CallNotifier for RecordingCallNotifier {
    async fn place(&self, webhook_url: &str) -> CollaboratorResult<String> {
        if self.failures.take() {
            return Err(CollaboratorError::unavailable("call", "injected provider outage"));
        }
        let mut placed = self.placed.lock();
        placed.push(webhook_url.to_string());
        Ok(format!("CA{:04}", placed.len()))
    }
}

/// Concrete handles to every fake, so tests can configure and inspect them
/// after handing [`TestCollaborators::bundle`] to a stage or pipeline.
#[derive(Debug, Clone)]
pub struct TestCollaborators {
    pub text_detector: Arc<StaticTextDetector>,
    pub language_detector: Arc<StaticLanguageDetector>,
    pub translator: Arc<DictionaryTranslator>,
    pub blob_store: Arc<InMemoryBlobStore>,
    pub sms: Arc<RecordingSmsNotifier>,
    pub call: Arc<RecordingCallNotifier>,
}

impl TestCollaborators {
    /// Fakes that read "sample text" in English from every image
    pub fn new() -> Self {
        Self {
            text_detector: Arc::new(StaticTextDetector::new("sample text")),
            language_detector: Arc::new(StaticLanguageDetector::new("en")),
            translator: Arc::new(DictionaryTranslator::new()),
            blob_store: Arc::new(InMemoryBlobStore::new()),
            sms: Arc::new(RecordingSmsNotifier::default()),
            call: Arc::new(RecordingCallNotifier::default()),
        }
    }

    /// Image `name` contains `text` written in `language`
    pub fn with_text(self, name: &str, text: &str, language: &str) -> Self {
        self.text_detector.set_text(name, text);
        self.language_detector.set_language(text, language);
        self
    }

    pub fn with_translation(self, text: &str, to: &str, translation: &str) -> Self {
        self.translator.insert(text, to, translation);
        self
    }

    pub fn with_blob_store(mut self, blob_store: Arc<InMemoryBlobStore>) -> Self {
        self.blob_store = blob_store;
        self
    }

    pub fn bundle(&self) -> Collaborators {
        Collaborators {
            text_detector: self.text_detector.clone(),
            language_detector: self.language_detector.clone(),
            translator: self.translator.clone(),
            blob_store: self.blob_store.clone(),
            sms: self.sms.clone(),
            call: self.call.clone(),
        }
    }
}

impl Default for TestCollaborators {
    fn default() -> Self {
        Self::new()
    }
}
