//! Prompt processing: text encoders and view-dependent prompting.

mod dreamfusion;
mod encoder;

pub use dreamfusion::{DreamFusionPromptProcessor, PromptProcessorConfig, ViewDirection};
pub use encoder::{HashingTextEncoder, TextEncoder};
