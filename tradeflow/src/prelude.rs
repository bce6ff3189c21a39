//! Common imports for tradeflow usage.
//!
//! ```
//! use tradeflow::prelude::*;
//! ```

pub use crate::assistant::Assistant;
pub use crate::config::AppConfig;
pub use crate::errors::Error;

// Recovery
pub use tradeflow_recovery::{extract_structured, recover_array, recover_object, Expect, Stage};

// Retry and progress
pub use tradeflow_retry::{
    with_retry, AdminRetryConfig, ProgressEvent, ProgressReporter, ProgressSink, Retry,
    RetryConfigCache, RetryPolicy, Transience,
};

// Generation
pub use tradeflow_llm::{CompletionBackend, GenerationConfig, Generated, RecordGenerator};

// OCR
pub use tradeflow_ocr::{OcrPipeline, OcrResult, OcrService};
