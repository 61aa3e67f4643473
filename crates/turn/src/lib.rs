//! # chatloom Turn Pipeline
//!
//! Everything that happens between a user message arriving and the bot's
//! streamed answer being finalized:
//!
//! 1. **Token accounting** — one shrinking budget per turn ([`tokens`])
//! 2. **Component extraction** — audience and intent sub-completions
//!    ([`extractor`])
//! 3. **Memory retrieval** — concurrent container fan-out with
//!    balance-tuned thresholds and greedy packing ([`retriever`])
//! 4. **Assembly and streaming** — the sequential turn state machine
//!    ([`assembler`])
//! 5. **Memory distillation** — the detached post-turn extraction job
//!    ([`memory_extract`])

pub mod assembler;
pub mod extractor;
pub mod memory_extract;
pub mod plan;
pub mod prompts;
pub mod retriever;
pub mod tokens;

pub use assembler::{TurnAssembler, TurnOutcome, TurnRequest};
pub use extractor::{ExtractedComponent, PromptComponentExtractor};
pub use memory_extract::{MemoryExtractor, SemanticMemoryItem};
pub use plan::{usage_keys, PromptPlan, TurnContext};
pub use retriever::{
    relevance_threshold, MemoryKind, MemoryRelevanceRetriever, MemoryRetrieval,
};
pub use tokens::{count_tokens, message_cost, messages_cost, TokenBudget};
