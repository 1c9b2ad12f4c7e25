//! # Feedback Pipeline
//!
//! Asynchronous path from explicit user feedback to profile vector updates.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Feedback Pipeline                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  POST /api/v1/feedback                                           │
//! │          │                                                       │
//! │          ▼                                                       │
//! │  ┌──────────────┐  validate, 202   ┌──────────────┐              │
//! │  │  Ingestion   │ ───────────────► │ Partitioned  │              │
//! │  │   Service    │                  │    Queue     │              │
//! │  └──────────────┘                  └──────────────┘              │
//! │                                           │ hash(user_id)        │
//! │                                           ▼                      │
//! │                                    ┌──────────────┐              │
//! │                                    │ Worker Pool  │ ──► DLQ      │
//! │                                    └──────────────┘              │
//! │                                           │                      │
//! │                                           ▼                      │
//! │                          Classifier ─► Update Engine ─► Store    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod dead_letter;
pub mod deferred;
pub mod error;
pub mod event;
pub mod ingest;
pub mod queue;
pub mod worker;

pub use api::{ErrorBody, FEEDBACK_PATH, HEALTH_PATH, HealthResponse, router, serve};
pub use config::{EmbeddingSettings, PipelineConfig, ServerConfig, WorkerConfig};
pub use dead_letter::{DeadLetter, DeadLetterSink, InMemoryDeadLetters, JsonLinesDeadLetters};
pub use deferred::{Deferral, DeferredFeedbackLog};
pub use error::{FeedbackError, Result};
pub use event::{FeedbackEvent, FeedbackReceipt, FeedbackRequest, ReceiptStatus};
pub use ingest::IngestionService;
pub use queue::{FeedbackQueue, partition_for};
pub use worker::{FeedbackProcessor, ProcessOutcome, WorkerPool, WorkerStats};
