//! End-to-end pipeline tests over the in-memory bus and fake collaborators

mod common;

use common::{PipelineHarness, UPLOAD_BUCKET};
use ocr_pipeline::collaborators::InMemoryBlobStore;
use ocr_pipeline::messaging::{
    encode_payload, MessagePublisher, ReadRequest, TranslationRequest, UploadEvent,
};
use ocr_pipeline::test_helpers::{test_config, TestCollaborators};
use std::sync::Arc;
use std::time::Duration;

fn sorted(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values
}

#[tokio::test(start_paused = true)]
async fn test_same_language_upload_skips_translation() {
    let fakes = TestCollaborators::new().with_text("cf.png", "hello", "en");
    let harness = PipelineHarness::with_fakes(&["en"], fakes);

    harness.upload("cf.png").await;
    let stats = harness.run().await;

    assert_eq!(harness.artifact("cf.png_to_en.txt").as_deref(), Some("hello"));
    assert!(harness.fakes.translator.calls().is_empty());
    assert_eq!(harness.fakes.sms.sent(), vec!["hello".to_string()]);
    assert_eq!(harness.fakes.call.placed().len(), 1);
    // upload, result, read
    assert_eq!(stats.acked, 3);
    assert!(harness.bus.published(&harness.config().topics.translate).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_upload_fans_out_to_every_target() {
    let fakes = TestCollaborators::new()
        .with_text("menu.jpg", "hello", "en")
        .with_translation("hello", "fr", "bonjour");
    let harness = PipelineHarness::with_fakes(&["en", "fr"], fakes);

    harness.upload("menu.jpg").await;
    harness.run().await;

    assert_eq!(
        harness.artifact_keys(),
        vec!["menu.jpg_to_en.txt".to_string(), "menu.jpg_to_fr.txt".to_string()]
    );
    assert_eq!(harness.artifact("menu.jpg_to_fr.txt").as_deref(), Some("bonjour"));
    assert_eq!(
        sorted(harness.fakes.sms.sent()),
        vec!["bonjour".to_string(), "hello".to_string()]
    );
    assert_eq!(harness.fakes.call.placed().len(), 2);
    assert_eq!(harness.bus.total_pending().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_deletion_notification_produces_nothing() {
    let harness = PipelineHarness::new(&["en", "fr"]);

    harness
        .publish_upload(&UploadEvent::deletion(UPLOAD_BUCKET, "gone.jpg"))
        .await;
    let stats = harness.run().await;

    assert_eq!(stats.acked, 1);
    assert_eq!(harness.fakes.text_detector.calls(), 0);
    assert!(harness.artifact_keys().is_empty());
    assert!(harness.fakes.sms.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_upload_without_name_is_dropped() {
    let harness = PipelineHarness::new(&["en"]);

    let event = UploadEvent {
        bucket: Some(UPLOAD_BUCKET.to_string()),
        ..Default::default()
    };
    harness.publish_upload(&event).await;
    let stats = harness.run().await;

    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.redelivered, 0);
    assert!(harness.artifact_keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_read_of_never_written_artifact_never_notifies() {
    let harness = PipelineHarness::new(&["en"]);

    let read = encode_payload(&ReadRequest::new("ghost.jpg", "en")).unwrap();
    harness
        .bus
        .publish(&harness.config().topics.read, read)
        .await
        .unwrap();
    let stats = harness.run().await;

    let max_attempts = harness.config().host.max_delivery_attempts as usize;
    assert_eq!(stats.redelivered, max_attempts - 1);
    assert_eq!(stats.dead_lettered, 1);
    assert!(harness.fakes.sms.sent().is_empty());
    assert!(harness.fakes.call.placed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_translator_outage_is_retried_without_duplicate_notifications() {
    let fakes = TestCollaborators::new().with_text("sign.jpg", "hola", "es");
    fakes.translator.fail_next(2);
    let harness = PipelineHarness::with_fakes(&["en"], fakes);

    harness.upload("sign.jpg").await;
    let stats = harness.run().await;

    assert_eq!(stats.redelivered, 2);
    assert_eq!(harness.fakes.translator.calls().len(), 3);
    assert_eq!(harness.artifact("sign.jpg_to_en.txt").as_deref(), Some("[en] hola"));
    assert_eq!(harness.fakes.sms.sent(), vec!["[en] hola".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_upload_notifies_once_per_artifact() {
    let fakes = TestCollaborators::new().with_text("dup.jpg", "hello", "en");
    let harness = PipelineHarness::with_fakes(&["en", "de"], fakes);

    harness.upload("dup.jpg").await;
    harness.upload("dup.jpg").await;
    harness.run().await;

    // both runs wrote the same content, so only the first is announced
    assert_eq!(harness.store().write_count(), 4);
    assert_eq!(harness.fakes.sms.sent().len(), 2);
    assert_eq!(harness.fakes.call.placed().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_changed_content_is_announced_again() {
    let harness = PipelineHarness::new(&["en"]);
    let topic = harness.config().topics.translate.clone();

    for text in ["first", "second"] {
        let request = encode_payload(&TranslationRequest::new(text, "doc.png", "en", "fr")).unwrap();
        harness.bus.publish(&topic, request).await.unwrap();
        harness.run().await;
    }

    assert_eq!(
        harness.fakes.sms.sent(),
        vec!["[en] first".to_string(), "[en] second".to_string()]
    );
    assert_eq!(harness.artifact("doc.png_to_en.txt").as_deref(), Some("[en] second"));
}

#[tokio::test(start_paused = true)]
async fn test_notification_interrupted_by_stage_timeout_is_redelivered() {
    let fakes = TestCollaborators::new().with_text("late.jpg", "hello", "en");
    let harness = PipelineHarness::with_fakes(&["en"], fakes);
    harness
        .fakes
        .sms
        .stall_next(harness.config().host.stage_timeout() * 2);

    harness.upload("late.jpg").await;
    let stats = harness.run().await;

    assert_eq!(stats.redelivered, 1);
    assert_eq!(stats.acked, 3);
    assert_eq!(harness.fakes.sms.attempts(), 2);
    assert_eq!(harness.fakes.sms.sent(), vec!["hello".to_string()]);
    assert_eq!(harness.fakes.call.placed().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retrieval_waits_out_storage_lag() {
    let mut config = test_config(&["en"]);
    config.persistence.read_delay_ms = 0;
    let store = Arc::new(InMemoryBlobStore::new().with_visibility_lag(Duration::from_millis(900)));
    let fakes = TestCollaborators::new()
        .with_text("slow.jpg", "eventually", "en")
        .with_blob_store(store);
    let harness = PipelineHarness::with_config(config, fakes);

    harness.upload("slow.jpg").await;
    let stats = harness.run().await;

    assert_eq!(stats.redelivered, 0);
    assert_eq!(harness.fakes.sms.sent(), vec!["eventually".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_blank_image_sends_placeholder() {
    let fakes = TestCollaborators::new().with_text("blank.jpg", "", "en");
    let harness = PipelineHarness::with_fakes(&["en", "fr"], fakes);

    harness.upload("blank.jpg").await;
    harness.run().await;

    assert_eq!(harness.artifact("blank.jpg_to_fr.txt").as_deref(), Some(""));
    assert!(harness.fakes.translator.calls().is_empty());
    let placeholder = harness.config().notifications.empty_body_placeholder.clone();
    // identical empty content under two artifact names: both are announced
    assert_eq!(harness.fakes.sms.sent(), vec![placeholder.clone(), placeholder]);
}

#[tokio::test(start_paused = true)]
async fn test_notifications_can_be_disabled() {
    let mut config = test_config(&["en"]);
    config.notifications.enabled = false;
    let harness = PipelineHarness::with_config(config, TestCollaborators::new());

    harness.upload("quiet.jpg").await;
    harness.run().await;

    assert_eq!(harness.artifact("quiet.jpg_to_en.txt").as_deref(), Some("sample text"));
    assert!(harness.fakes.sms.sent().is_empty());
    assert!(harness.fakes.call.placed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_background_host_processes_uploads_until_stopped() {
    let fakes = TestCollaborators::new().with_text("bg.jpg", "hello", "en");
    let harness = PipelineHarness::with_fakes(&["en"], fakes);
    let handle = Arc::clone(&harness.host).spawn();

    harness.upload("bg.jpg").await;
    tokio::time::sleep(harness.config().persistence.read_delay() + Duration::from_secs(5)).await;

    let stats = handle.stop().await.unwrap();
    assert_eq!(stats.acked, 3);
    assert_eq!(harness.fakes.sms.sent(), vec!["hello".to_string()]);
}
