//! The turn assembler — the orchestrator of one conversation turn.
//!
//! Steps run strictly in sequence because each consumes from the same
//! shrinking token budget: persona, audience, intent, memory retrieval
//! (which fans out concurrently inside), history fill, then the streamed
//! response. Memory extraction runs afterwards as a detached task and
//! never delays the caller-visible response.

use chatloom_config::{AppConfig, PersonaConfig, TurnConfig};
use chatloom_core::completion::{
    CompletionService, PromptMessage, PromptRole, TokenUsage,
};
use chatloom_core::error::TurnError;
use chatloom_core::event::{Broadcaster, ChatEvent};
use chatloom_core::memory::MemoryStore;
use chatloom_core::message::{AuthorRole, ChatMessage, ChatMessageKind};
use chatloom_core::session::ANONYMOUS_USER_ID;
use chatloom_core::store::{MessageStore, ParticipantStore, SessionStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::extractor::PromptComponentExtractor;
use crate::memory_extract::MemoryExtractor;
use crate::plan::{usage_keys, PromptPlan, TurnContext};
use crate::prompts;
use crate::retriever::MemoryRelevanceRetriever;
use crate::tokens::{count_tokens, message_cost, TokenBudget};

/// An inbound user message to process.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub chat_id: String,
    pub user_id: String,
    pub user_name: String,
    pub content: String,
}

/// The completed turn: the final bot message and the plan that produced it.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub message: ChatMessage,
    pub plan: PromptPlan,
}

/// The pipeline's sequential phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnPhase {
    Init,
    PersonaRendered,
    AudienceExtracted,
    IntentExtracted,
    MemoriesRetrieved,
    HistoryFilled,
    Streaming,
    Finalized,
}

impl TurnPhase {
    fn status(&self) -> &'static str {
        match self {
            Self::Init => "processing the message",
            Self::PersonaRendered => "rendering the persona",
            Self::AudienceExtracted => "extracting the audience",
            Self::IntentExtracted => "extracting the user intent",
            Self::MemoriesRetrieved => "retrieving relevant memories",
            Self::HistoryFilled => "filling the chat history",
            Self::Streaming => "generating the bot response",
            Self::Finalized => "finalizing",
        }
    }
}

/// Orchestrates one user-message-to-bot-response cycle.
pub struct TurnAssembler {
    persona: PersonaConfig,
    turn_config: TurnConfig,
    completion: Arc<dyn CompletionService>,
    retriever: MemoryRelevanceRetriever,
    extractor: PromptComponentExtractor,
    memory_extractor: Arc<MemoryExtractor>,
    messages: Arc<dyn MessageStore>,
    sessions: Arc<dyn SessionStore>,
    participants: Arc<dyn ParticipantStore>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl TurnAssembler {
    /// Wire up an assembler from configuration and collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AppConfig,
        completion: Arc<dyn CompletionService>,
        memory: Arc<dyn MemoryStore>,
        messages: Arc<dyn MessageStore>,
        sessions: Arc<dyn SessionStore>,
        participants: Arc<dyn ParticipantStore>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        let retriever = MemoryRelevanceRetriever::new(memory.clone(), config.memory.clone());
        let extractor = PromptComponentExtractor::new(
            completion.clone(),
            config.turn.extraction_sampling.clone(),
            config.turn.template_overhead_tokens,
        );
        let memory_extractor = Arc::new(MemoryExtractor::new(
            completion.clone(),
            memory,
            config.memory.clone(),
            config.turn.extraction_sampling.clone(),
            config.turn.extraction_token_reserve,
        ));

        Self {
            persona: config.persona,
            turn_config: config.turn,
            completion,
            retriever,
            extractor,
            memory_extractor,
            messages,
            sessions,
            participants,
            broadcaster,
        }
    }

    /// Process one turn. Cancelling the token mid-stream aborts the
    /// remaining steps and reports a timeout; content already flushed to
    /// the message store is kept.
    pub async fn run(
        &self,
        request: TurnRequest,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        let chat_id = request.chat_id.clone();
        match self.run_inner(&request, &cancel).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.broadcaster.notify(ChatEvent::TurnFailed {
                    chat_id,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        request: &TurnRequest,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        // ── Init: budget, authorization, persist the user message ──────────
        self.advance(TurnPhase::Init, &request.chat_id);

        let session = self
            .sessions
            .find_by_id(&request.chat_id)
            .await?
            .ok_or_else(|| TurnError::SessionNotFound(request.chat_id.clone()))?;

        if !self
            .participants
            .is_participant(&request.user_id, &request.chat_id)
            .await?
        {
            return Err(TurnError::NotAParticipant {
                user_id: request.user_id.clone(),
                chat_id: request.chat_id.clone(),
            });
        }

        let mut budget = TokenBudget::for_turn(&self.turn_config);
        let mut ctx = TurnContext::new();

        info!(
            chat_id = %request.chat_id,
            budget = budget.remaining(),
            "Processing turn"
        );

        let user_message =
            ChatMessage::user(&request.chat_id, &request.user_name, &request.content);
        self.messages.create(user_message).await?;

        // ── Persona ────────────────────────────────────────────────────────
        self.advance(TurnPhase::PersonaRendered, &request.chat_id);
        let persona = prompts::render_persona(&self.persona, &session.system_description);

        let shared_context = self.extraction_context(&request.chat_id).await?;

        // ── Audience (skipped for the anonymous identity) ──────────────────
        let audience = if request.user_id == ANONYMOUS_USER_ID {
            String::new()
        } else {
            self.advance(TurnPhase::AudienceExtracted, &request.chat_id);
            self.extract_component(
                prompts::audience_instructions(),
                &shared_context,
                usage_keys::AUDIENCE_EXTRACTION,
                &mut budget,
                &mut ctx,
            )
            .await
        };

        // ── Intent (degrades to empty on failure) ──────────────────────────
        self.advance(TurnPhase::IntentExtracted, &request.chat_id);
        let intent = self
            .extract_component(
                prompts::intent_instructions(),
                &shared_context,
                usage_keys::INTENT_EXTRACTION,
                &mut budget,
                &mut ctx,
            )
            .await;

        // ── Memories: a weighted share of what's left ──────────────────────
        self.advance(TurnPhase::MemoriesRetrieved, &request.chat_id);
        let query = if intent.is_empty() {
            request.content.as_str()
        } else {
            intent.as_str()
        };
        let memories_allowance = budget.fraction(self.turn_config.memories_response_context_weight);
        let mut memories_budget = TokenBudget::new(memories_allowance);
        let retrieval = self
            .retriever
            .retrieve(
                &request.chat_id,
                query,
                session.memory_balance,
                &mut memories_budget,
                cancel,
            )
            .await?;
        budget.try_charge(memories_allowance - memories_budget.remaining());

        // ── History: fill the rest of the budget, newest backwards ─────────
        self.advance(TurnPhase::HistoryFilled, &request.chat_id);
        let (history_messages, chat_history) =
            self.fill_history(&request.chat_id, &mut budget).await?;

        // ── Assemble the ordered message list ──────────────────────────────
        let mut system_sections = vec![persona.clone()];
        if !audience.is_empty() {
            system_sections.push(prompts::audience_section(&audience));
        }
        if !intent.is_empty() {
            system_sections.push(prompts::intent_section(&intent));
        }
        if !retrieval.text.is_empty() {
            system_sections.push(retrieval.text.clone());
        }

        let mut messages = vec![PromptMessage::system(system_sections.join("\n\n"))];
        messages.extend(history_messages);

        let plan = PromptPlan {
            persona,
            audience,
            intent,
            past_memories: retrieval.text,
            chat_history,
            messages,
        };

        // ── Stream the response ────────────────────────────────────────────
        self.advance(TurnPhase::Streaming, &request.chat_id);
        let mut bot_message = ChatMessage::bot(&request.chat_id, &self.persona.name);
        bot_message.prompt_used = Some(plan.rendered());
        bot_message.citations = retrieval.citations;
        self.messages.create(bot_message.clone()).await?;

        let params = self
            .turn_config
            .response_sampling
            .with_max_tokens(self.turn_config.response_token_reserve as u32);
        let mut stream = self
            .completion
            .stream(&plan.messages, &params)
            .await
            .map_err(TurnError::ResponseFailed)?;

        let mut response_usage: Option<TokenUsage> = None;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    // Content flushed so far stays persisted as-is.
                    warn!(chat_id = %request.chat_id, "Turn cancelled mid-stream");
                    return Err(TurnError::Timeout);
                }
                chunk = stream.recv() => match chunk {
                    None => break,
                    Some(Ok(delta)) => {
                        if let Some(content) = delta.content {
                            bot_message.content.push_str(&content);
                            self.messages.upsert(bot_message.clone()).await?;
                            self.broadcaster.notify(ChatEvent::MessageUpdated {
                                chat_id: request.chat_id.clone(),
                                message_id: bot_message.id.clone(),
                                content: bot_message.content.clone(),
                            });
                        }
                        if delta.usage.is_some() {
                            response_usage = delta.usage;
                        }
                        if delta.done {
                            break;
                        }
                    }
                    Some(Err(e)) => return Err(TurnError::ResponseFailed(e)),
                }
            }
        }

        // ── Finalize: usage accounting, final flush, detached extraction ───
        self.advance(TurnPhase::Finalized, &request.chat_id);
        let response_tokens = response_usage
            .map(|u| u.completion_tokens as u64)
            .unwrap_or_else(|| count_tokens(&bot_message.content) as u64);
        ctx.record_usage(usage_keys::RESPONSE_COMPLETION, response_tokens);

        bot_message.token_usage_by_function = ctx.token_usage_by_function.clone();
        self.messages.upsert(bot_message.clone()).await?;
        self.broadcaster.notify(ChatEvent::TurnCompleted {
            chat_id: request.chat_id.clone(),
            message_id: bot_message.id.clone(),
        });

        // Best-effort memory distillation, detached from this turn.
        let memory_extractor = self.memory_extractor.clone();
        let chat_id = request.chat_id.clone();
        let transcript = vec![
            PromptMessage::user(&request.content),
            PromptMessage::assistant(&bot_message.content),
        ];
        tokio::spawn(async move {
            memory_extractor.extract_and_store(&chat_id, &transcript).await;
        });

        info!(
            chat_id = %request.chat_id,
            response_tokens,
            remaining_budget = budget.remaining(),
            "Turn complete"
        );

        Ok(TurnOutcome {
            message: bot_message,
            plan,
        })
    }

    /// Run one extraction sub-completion, record its usage, and charge the
    /// extracted text to the budget. Failures degrade to an empty
    /// component; only the final response is worth failing a turn over.
    async fn extract_component(
        &self,
        instructions: &str,
        shared_context: &[PromptMessage],
        usage_key: &str,
        budget: &mut TokenBudget,
        ctx: &mut TurnContext,
    ) -> String {
        match self
            .extractor
            .extract(instructions, shared_context, budget)
            .await
        {
            Ok(component) => {
                if let Some(usage) = component.usage {
                    ctx.record_usage(usage_key, usage.total_tokens as u64);
                }
                if budget.try_charge(count_tokens(&component.text)) {
                    component.text
                } else {
                    warn!(usage_key, "Extracted component does not fit the budget, dropping it");
                    String::new()
                }
            }
            Err(e) => {
                warn!(usage_key, error = %e, "Extraction failed, continuing without it");
                String::new()
            }
        }
    }

    /// Recent history rendered for the extraction sub-completions.
    async fn extraction_context(
        &self,
        chat_id: &str,
    ) -> Result<Vec<PromptMessage>, TurnError> {
        let recent = self.messages.find_by_chat(chat_id, 0, Some(10)).await?;
        let lines: Vec<String> = recent
            .iter()
            .rev() // chronological
            .filter(|m| m.kind != ChatMessageKind::Document)
            .map(|m| m.prompt_line())
            .collect();
        Ok(vec![PromptMessage::user(format!(
            "Chat history:\n{}",
            lines.join("\n")
        ))])
    }

    /// Walk stored messages newest-first, accumulating until the budget
    /// runs out, and return them oldest-first for the prompt.
    async fn fill_history(
        &self,
        chat_id: &str,
        budget: &mut TokenBudget,
    ) -> Result<(Vec<PromptMessage>, String), TurnError> {
        let stored = self.messages.find_by_chat(chat_id, 0, None).await?;

        let mut collected: Vec<PromptMessage> = Vec::new();
        for message in &stored {
            if message.kind == ChatMessageKind::Document {
                continue;
            }
            // The in-progress bot placeholder has nothing to contribute
            if message.author_role == AuthorRole::Bot && message.content.is_empty() {
                continue;
            }
            let role = match message.author_role {
                AuthorRole::User => PromptRole::User,
                AuthorRole::Bot => PromptRole::Assistant,
            };
            let line = message.prompt_line();
            let cost = message_cost(role.as_str(), &line);
            if !budget.try_charge(cost) {
                break;
            }
            collected.push(PromptMessage {
                role,
                content: line,
            });
        }

        // Accumulated newest-first; the prompt wants chronological order.
        collected.reverse();

        let text = collected
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Ok((collected, text))
    }

    fn advance(&self, phase: TurnPhase, chat_id: &str) {
        debug!(chat_id, phase = ?phase, "Turn phase");
        self.broadcaster.notify(ChatEvent::StatusUpdated {
            chat_id: chat_id.to_string(),
            status: phase.status().to_string(),
        });
    }
}
