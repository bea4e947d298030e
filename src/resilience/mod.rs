//! # Resilience Module
//!
//! Fault tolerance helpers for calls into external collaborators.
//!
//! ## Usage
//!
//! ```rust
//! use ocr_pipeline::resilience::RetryPolicy;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy::new(3, Duration::from_millis(1), 2.0, Duration::from_millis(4));
//! let result: Result<&str, String> = policy
//!     .run("example", None, |_attempt| async { Ok("done") }, |_err| true)
//!     .await;
//! assert_eq!(result, Ok("done"));
//! # });
//! ```

pub mod backoff;

pub use backoff::RetryPolicy;
