mod common;

use common::strategies::*;
use ocr_pipeline::artifact::{ArtifactName, ARTIFACT_EXTENSION, LANGUAGE_SEPARATOR};
use ocr_pipeline::collaborators::{BlobStore, InMemoryBlobStore};
use ocr_pipeline::messaging::{
    decode_payload, encode_payload, routing_attributes, TranslationRequest, ATTR_IDEMPOTENCY_KEY,
};
use ocr_pipeline::messaging::{InMemoryBus, ReadRequest, TranslationResult, UploadEvent};
use ocr_pipeline::stages::{
    ExtractionOutcome, ExtractionStage, InMemoryNotificationLedger, InvocationContext,
    PersistenceStage, RetrievalOutcome, RetrievalStage,
};
use ocr_pipeline::test_helpers::{test_config, TestCollaborators};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

proptest! {
    /// Property: artifact names are a pure function of filename and language
    #[test]
    fn artifact_names_are_deterministic(filename in filename_strategy(), lang in language_strategy()) {
        let first = ArtifactName::derive(&filename, &lang);
        let second = ArtifactName::derive(&filename, &lang);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(
            first.as_str(),
            format!("{filename}{LANGUAGE_SEPARATOR}{lang}{ARTIFACT_EXTENSION}")
        );
    }

    /// Property: different languages never share an artifact
    #[test]
    fn artifact_names_differ_per_language(filename in filename_strategy(), a in language_strategy(), b in language_strategy()) {
        prop_assume!(a != b);
        prop_assert_ne!(ArtifactName::derive(&filename, &a), ArtifactName::derive(&filename, &b));
    }

    /// Property: any request survives the bus envelope unchanged
    #[test]
    fn envelope_preserves_requests(
        text in content_strategy(),
        filename in filename_strategy(),
        lang in language_strategy(),
        from in prop::option::of(language_strategy()),
    ) {
        let request = TranslationRequest { text: Some(text), filename: Some(filename), lang: Some(lang), from };
        let decoded: TranslationRequest = decode_payload(&encode_payload(&request).unwrap()).unwrap();
        prop_assert_eq!(decoded, request);
    }

    /// Property: reruns of the same logical message carry the same idempotency key
    #[test]
    fn idempotency_keys_are_stable(filename in filename_strategy(), lang in language_strategy()) {
        let first = routing_attributes("translation", &filename, &lang);
        let second = routing_attributes("translation", &filename, &lang);
        prop_assert_eq!(first.get(ATTR_IDEMPOTENCY_KEY), second.get(ATTR_IDEMPOTENCY_KEY));
    }

    /// Property: persisted content reads back byte-for-byte regardless of chunking
    #[test]
    fn blob_store_round_trips_content(content in content_strategy(), chunk_size in 1usize..16) {
        let store = InMemoryBlobStore::new().with_chunk_size(chunk_size);
        let read_back = tokio_test::block_on(async {
            store.write("results", "a.jpg_to_en.txt", content.clone().into_bytes()).await.unwrap();
            store.read_stream("results", "a.jpg_to_en.txt").await.unwrap().read_to_end().await.unwrap()
        });
        prop_assert_eq!(String::from_utf8(read_back).unwrap(), content);
    }

    /// Property: text persisted for an artifact is retrieved byte-for-byte,
    /// whatever the chunking of the read stream
    #[test]
    fn persisted_text_is_retrieved_unchanged(
        text in content_strategy(),
        filename in filename_strategy(),
        lang in language_strategy(),
        chunk_size in 1usize..8,
    ) {
        let mut config = test_config(&[lang.as_str()]);
        config.persistence.read_delay_ms = 0;
        let bus = Arc::new(InMemoryBus::new());
        let store = Arc::new(InMemoryBlobStore::new().with_chunk_size(chunk_size));
        let fakes = TestCollaborators::new().with_blob_store(store);
        let persistence = PersistenceStage::new(&config, bus.clone(), &fakes.bundle());
        let ledger = Arc::new(InMemoryNotificationLedger::new(config.notifications.dedup_ttl()));
        let retrieval = RetrievalStage::new(&config, &fakes.bundle(), ledger);
        let ctx = InvocationContext::detached(Duration::from_secs(30));

        let outcome = tokio_test::block_on(async {
            persistence
                .handle(&TranslationResult::new(text.clone(), filename.clone(), lang.clone()), &ctx)
                .await
                .unwrap();
            let reads: Vec<ReadRequest> = bus.published_payloads(&config.topics.read).await.unwrap();
            assert_eq!(reads.len(), 1);
            retrieval.handle(&reads[0], &ctx).await.unwrap()
        });

        match outcome {
            RetrievalOutcome::Delivered { content, .. } => prop_assert_eq!(content, text),
            other => prop_assert!(false, "unexpected outcome: {:?}", other),
        }
    }

    /// Property: extraction publishes exactly one message per target language
    #[test]
    fn extraction_fans_out_once_per_target(targets in targets_strategy(), source in language_strategy()) {
        let target_refs: Vec<&str> = targets.iter().map(String::as_str).collect();
        let config = test_config(&target_refs);
        let bus = Arc::new(InMemoryBus::new());
        let fakes = TestCollaborators::new().with_text("p.jpg", "some text", &source);
        let stage = ExtractionStage::new(&config, bus.clone(), &fakes.bundle());

        let (outcome, translate, result) = tokio_test::block_on(async {
            let outcome = stage
                .handle(&UploadEvent::new("uploads", "p.jpg"), &InvocationContext::detached(Duration::from_secs(5)))
                .await
                .unwrap();
            let translate = bus.published(&config.topics.translate).await.len();
            let result = bus.published(&config.topics.result).await.len();
            (outcome, translate, result)
        });

        prop_assert_eq!(outcome.published(), targets.len());
        prop_assert_eq!(translate + result, targets.len());
        let expected_direct = usize::from(targets.contains(&source));
        prop_assert_eq!(result, expected_direct);
        let is_fanned_out = matches!(outcome, ExtractionOutcome::FannedOut { .. });
        prop_assert!(is_fanned_out);
    }
}
