//! Token estimation and the per-turn token budget.
//!
//! Uses a character-based heuristic: ~4 characters per token. This
//! approximation is accurate within ~10% for BPE tokenizers on English
//! text, and — what the budget arithmetic actually requires — it is
//! referentially stable: the same input always yields the same count.

use chatloom_core::completion::PromptMessage;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn count_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.len() + 3) / 4
}

/// Cost of one prompt message including provider framing overhead.
///
/// Counted as `"role:" + role` plus `"content:" + content + "\n"`, which
/// approximates how providers frame each message on the wire.
pub fn message_cost(role: &str, content: &str) -> usize {
    count_tokens(&format!("role:{role}")) + count_tokens(&format!("content:{content}\n"))
}

/// Total cost of a message list.
pub fn messages_cost(messages: &[PromptMessage]) -> usize {
    messages
        .iter()
        .map(|m| message_cost(m.role.as_str(), &m.content))
        .sum()
}

/// The shrinking token allowance for one turn's prompt construction.
///
/// Every consumer checks before committing a cost; the counter can reach
/// zero but never goes negative.
#[derive(Debug)]
pub struct TokenBudget {
    remaining: usize,
}

impl TokenBudget {
    /// A budget with the given allowance.
    pub fn new(limit: usize) -> Self {
        Self { remaining: limit }
    }

    /// A fresh turn budget: context window minus the response, tool-call,
    /// and fixed-overhead reserves.
    pub fn for_turn(config: &chatloom_config::TurnConfig) -> Self {
        Self::new(config.initial_budget())
    }

    /// Tokens still available.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Commit `cost` tokens if they fit; returns whether they did.
    pub fn try_charge(&mut self, cost: usize) -> bool {
        if cost <= self.remaining {
            self.remaining -= cost;
            true
        } else {
            false
        }
    }

    /// A whole-token share of the remaining allowance.
    pub fn fraction(&self, weight: f32) -> usize {
        (self.remaining as f32 * weight) as usize
    }
}
