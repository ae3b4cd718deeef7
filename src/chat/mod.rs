//! Chat message model and the delivery pipeline.

mod pipeline;
mod types;

pub use pipeline::{DeliveryResult, MessagePipeline, PipelineConfig, PipelineStatsSnapshot};
pub use types::{ChatMessage, OutboundChatMessage};
