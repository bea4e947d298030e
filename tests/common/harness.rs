//! In-memory pipeline harness for end-to-end tests

use ocr_pipeline::collaborators::InMemoryBlobStore;
use ocr_pipeline::config::PipelineConfig;
use ocr_pipeline::messaging::{encode_payload, InMemoryBus, MessagePublisher, UploadEvent};
use ocr_pipeline::orchestration::{HostStats, Pipeline, PipelineHost};
use ocr_pipeline::test_helpers::{init_test_logging, test_config, TestCollaborators};
use std::sync::Arc;

pub const UPLOAD_BUCKET: &str = "uploads";
pub const MAX_ROUNDS: usize = 10_000;

pub struct PipelineHarness {
    pub bus: Arc<InMemoryBus>,
    pub fakes: TestCollaborators,
    pub host: Arc<PipelineHost>,
}

impl PipelineHarness {
    pub fn new(targets: &[&str]) -> Self {
        Self::with_config(test_config(targets), TestCollaborators::new())
    }

    pub fn with_fakes(targets: &[&str], fakes: TestCollaborators) -> Self {
        Self::with_config(test_config(targets), fakes)
    }

    pub fn with_config(config: PipelineConfig, fakes: TestCollaborators) -> Self {
        init_test_logging();
        let bus = Arc::new(InMemoryBus::new());
        let pipeline =
            Pipeline::new(config, bus.clone(), fakes.bundle()).expect("valid test configuration");
        let host = Arc::new(PipelineHost::new(Arc::new(pipeline), bus.clone()));
        Self { bus, fakes, host }
    }

    pub fn config(&self) -> &PipelineConfig {
        self.host.pipeline().config()
    }

    pub fn store(&self) -> &Arc<InMemoryBlobStore> {
        &self.fakes.blob_store
    }

    pub async fn publish_upload(&self, event: &UploadEvent) {
        let message = encode_payload(event).expect("upload encodes");
        self.bus
            .publish(&self.config().topics.uploads, message)
            .await
            .expect("upload published");
    }

    pub async fn upload(&self, name: &str) {
        self.publish_upload(&UploadEvent::new(UPLOAD_BUCKET, name)).await;
    }

    pub async fn run(&self) -> HostStats {
        self.host
            .run_until_idle(MAX_ROUNDS)
            .await
            .expect("pipeline goes idle")
    }

    /// Artifact content as text, ignoring visibility lag
    pub fn artifact(&self, key: &str) -> Option<String> {
        self.store()
            .contents(&self.config().storage.result_bucket, key)
            .map(|bytes| String::from_utf8(bytes).expect("utf-8 artifact"))
    }

    pub fn artifact_keys(&self) -> Vec<String> {
        self.store().keys(&self.config().storage.result_bucket)
    }
}
