//! The per-turn message pipeline.
//!
//! A strict linear state machine: safety-in → persist + context build
//! → dynamic context → prompt assembly → generate → critic → output
//! scan → persist → fire-and-forget side effects. Both persisted turn
//! messages are durable before the reply is returned.

use std::time::Instant;

use orion_domain::chat::ChatMessage;
use orion_domain::config::TaskType;
use orion_domain::trace::TraceEvent;
use orion_engines::GenerateRequest;
use orion_memory::{SaveOptions, TaskFeedback};
use orion_store::StoredMessage;

use crate::runtime::{critic, dynamic, usage};
use crate::state::HostContext;
use crate::workspace::{ContextBuilder, SessionMode};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub user_id: String,
    pub channel_id: String,
    pub text: String,
}

/// Returned to the dispatcher; `retrieved_memory_ids` must be handed
/// back through [`feedback_for_previous_turn`] when the next turn
/// arrives for MemRL learning to occur.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: String,
    pub retrieved_memory_ids: Vec<String>,
    pub provisional_reward: f64,
    pub blocked: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// run_turn
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn run_turn(ctx: &HostContext, req: TurnRequest) -> TurnOutcome {
    let started = Instant::now();
    let user_id = req.user_id.as_str();
    let channel_id = req.channel_id.as_str();

    // First contact before this turn touches the session store?
    let first_contact = ctx.channels.sessions.last_activity(user_id).is_none();

    // ── 1. Safety-in ───────────────────────────────────────────────
    let verdict = ctx.security.check_inbound(&req.text).await;
    let sanitized = verdict.sanitized.clone();

    if !verdict.allowed {
        return blocked_turn(ctx, &req, &sanitized).await;
    }

    // ── 2. Persist user message ∥ build memory context ─────────────
    ctx.channels
        .sessions
        .append(user_id, channel_id, ChatMessage::user(sanitized.clone()));

    let memory_limit = ctx.config.pipeline.memory_limit;
    let (persisted, memory_context, _saved) = tokio::join!(
        ctx.store.append_message(StoredMessage::new(
            user_id,
            channel_id,
            "user",
            &sanitized
        )),
        ctx.memory.build_context(user_id, &sanitized, memory_limit),
        ctx.memory.save(
            user_id,
            &sanitized,
            SaveOptions {
                level: Some(0),
                category: Some("chat".into()),
                ..SaveOptions::default()
            }
        ),
    );
    if let Err(e) = persisted {
        // User-message durability is a precondition for replying.
        tracing::error!(error = %e, "failed to persist user message");
        return TurnOutcome {
            response: "Something went wrong while saving your message. Please try again.".into(),
            retrieved_memory_ids: Vec::new(),
            provisional_reward: 0.0,
            blocked: false,
        };
    }
    let memory_context = memory_context.unwrap_or_default();

    // ── 3. Dynamic context ─────────────────────────────────────────
    let profile = ctx.memory.profiles.get(user_id);
    let dyn_ctx = dynamic::detect(&sanitized, &profile);

    // ── 4. System prompt assembly ──────────────────────────────────
    let mode = if first_contact {
        SessionMode::Bootstrap
    } else {
        SessionMode::Normal
    };
    let sections = ctx.workspace.read_all();
    let builder = ContextBuilder::new(ctx.config.workspace.total_max_chars);
    let profile_block = profile.render(8);
    let memory_block = if profile_block.is_empty() {
        memory_context.system_context.clone()
    } else {
        format!("{}\n\n{}", profile_block, memory_context.system_context)
    };
    let (system_prompt, _report) = builder.build(
        &sections,
        mode,
        &dyn_ctx.render(),
        &ctx.tools.render_index(),
        &memory_block,
    );

    // ── 5. Generate ────────────────────────────────────────────────
    let window = ctx.channels.sessions.window(user_id, channel_id);
    let generate_req = GenerateRequest {
        prompt: sanitized.clone(),
        system_prompt: Some(system_prompt),
        context: window,
        ..GenerateRequest::default()
    };
    let prompt_chars = generate_req.prompt.len();
    let outcome = match ctx
        .orchestrator
        .generate_full(TaskType::Reasoning, generate_req)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(error = %e, "no engine available for the turn");
            return degraded_turn(ctx, &req, &memory_context.retrieved_memory_ids).await;
        }
    };
    ctx.usage.record(usage::usage_event_for(
        user_id,
        TaskType::Reasoning.as_str(),
        &outcome.provider,
        &outcome.engine,
        prompt_chars,
        outcome.text.len(),
        outcome.latency_ms,
    ));
    if outcome.text.is_empty() {
        return degraded_turn(ctx, &req, &memory_context.retrieved_memory_ids).await;
    }

    // ── 6. Critic ──────────────────────────────────────────────────
    let critic_outcome = critic::refine(
        &ctx.orchestrator,
        &ctx.config.pipeline.critic,
        &sanitized,
        &outcome.text,
    )
    .await;

    // ── 7. Output scan ─────────────────────────────────────────────
    let scanned = ctx.security.scanner.scan(&critic_outcome.text);
    let response = scanned.sanitized;

    // ── 8. Persist assistant message + vector mirror + window ──────
    ctx.channels
        .sessions
        .append(user_id, channel_id, ChatMessage::assistant(response.clone()));
    let exchange = format!("User: {sanitized}\nAssistant: {response}");
    let (persisted, _mirrored) = tokio::join!(
        ctx.store.append_message(StoredMessage::new(
            user_id,
            channel_id,
            "assistant",
            &response
        )),
        ctx.memory.save(
            user_id,
            &exchange,
            SaveOptions {
                category: Some("exchange".into()),
                ..SaveOptions::default()
            }
        ),
    );
    if let Err(e) = persisted {
        tracing::error!(error = %e, "failed to persist assistant message");
    }

    // ── 9. Fire-and-forget side effects ────────────────────────────
    spawn_side_effects(ctx, &req, &sanitized, &response);

    // ── 10. Outcome ────────────────────────────────────────────────
    let provisional_reward =
        (0.4 + 0.4 * critic_outcome.score - if scanned.flagged { 0.3 } else { 0.0 })
            .clamp(0.0, 1.0);

    TraceEvent::TurnCompleted {
        user_id: user_id.into(),
        channel_id: channel_id.into(),
        duration_ms: started.elapsed().as_millis() as u64,
        retrieved_memories: memory_context.retrieved_memory_ids.len(),
    }
    .emit();

    TurnOutcome {
        response,
        retrieved_memory_ids: memory_context.retrieved_memory_ids,
        provisional_reward,
        blocked: false,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Degraded paths
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Safety-in blocked the turn: canned refusal, no generate call; the
/// sanitized input is still recorded in memory and history.
async fn blocked_turn(ctx: &HostContext, req: &TurnRequest, sanitized: &str) -> TurnOutcome {
    let refusal = ctx.config.pipeline.refusal_message.clone();

    ctx.channels.sessions.append(
        &req.user_id,
        &req.channel_id,
        ChatMessage::user(sanitized.to_string()),
    );
    let (user_persist, assistant_persist, _saved) = tokio::join!(
        ctx.store.append_message(StoredMessage::new(
            &req.user_id,
            &req.channel_id,
            "user",
            sanitized
        )),
        ctx.store.append_message(StoredMessage::new(
            &req.user_id,
            &req.channel_id,
            "assistant",
            &refusal
        )),
        ctx.memory.save(
            &req.user_id,
            sanitized,
            SaveOptions {
                level: Some(0),
                category: Some("blocked".into()),
                ..SaveOptions::default()
            }
        ),
    );
    for result in [user_persist, assistant_persist] {
        if let Err(e) = result {
            tracing::error!(error = %e, "failed to persist blocked turn");
        }
    }

    TurnOutcome {
        response: refusal,
        retrieved_memory_ids: Vec::new(),
        provisional_reward: 0.0,
        blocked: true,
    }
}

/// All engines failed or none are configured: graceful error reply.
async fn degraded_turn(
    ctx: &HostContext,
    req: &TurnRequest,
    retrieved: &[String],
) -> TurnOutcome {
    let response =
        "I can't reach any reasoning engine right now. Give me a moment and try again.".to_string();
    if let Err(e) = ctx
        .store
        .append_message(StoredMessage::new(
            &req.user_id,
            &req.channel_id,
            "assistant",
            &response,
        ))
        .await
    {
        tracing::error!(error = %e, "failed to persist degraded reply");
    }
    TurnOutcome {
        response,
        retrieved_memory_ids: retrieved.to_vec(),
        provisional_reward: 0.0,
        blocked: false,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Side effects
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Profile extraction, causal-graph update, and compression check run
/// on the bounded worker pool. Their failures log and vanish.
fn spawn_side_effects(ctx: &HostContext, req: &TurnRequest, sanitized: &str, response: &str) {
    // Profile extraction through the fast engine.
    if ctx.config.pipeline.profile_extraction {
        let ctx = ctx.clone();
        let user_id = req.user_id.clone();
        let text = sanitized.to_string();
        let reply = response.to_string();
        ctx.workers.clone().submit(async move {
            let prompt = format!(
                "Extract durable user facts, opinions, and topics from this exchange.\n\
                 Reply with JSON only: {{\"facts\": {{\"<snake_key>\": {{\"value\": \"..\", \
                 \"confidence\": <0..1>}}}}, \"opinions\": {{}}, \"topics\": []}}\n\n\
                 User: {text}\nAssistant: {reply}"
            );
            match ctx
                .orchestrator
                .generate(TaskType::Fast, GenerateRequest::prompt(prompt))
                .await
            {
                Ok(raw) if !raw.is_empty() => {
                    if let Some(update) = orion_memory::profile::parse_extraction(&raw) {
                        ctx.memory.profiles.merge_into(&user_id, update);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "profile extraction skipped"),
            }
        });
    }

    // Causal update: link the previous turn's topic to this one's.
    {
        let ctx = ctx.clone();
        let user_id = req.user_id.clone();
        let channel_id = req.channel_id.clone();
        let current = topic_label(sanitized);
        ctx.workers.clone().submit(async move {
            let window = ctx.channels.sessions.window(&user_id, &channel_id);
            let previous = window
                .iter()
                .rev()
                .filter(|m| m.role == orion_domain::chat::Role::User)
                .nth(1)
                .map(|m| topic_label(&m.content));
            if let Some(previous) = previous {
                if previous != current {
                    ctx.memory.causal.link(&user_id, &previous, &current);
                }
            }
        });
    }

    // Compression check.
    {
        let ctx = ctx.clone();
        let user_id = req.user_id.clone();
        ctx.workers.clone().submit(async move {
            if let Err(e) = ctx.memory.compress(&user_id).await {
                tracing::debug!(error = %e, "compression pass failed");
            }
        });
    }
}

/// A short stable label for causal-graph nodes.
fn topic_label(text: &str) -> String {
    text.split_whitespace()
        .filter(|w| w.len() > 2)
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Next-turn feedback
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert the previous turn's outcome into MemRL feedback, scored by
/// how quickly the user came back.
pub fn feedback_for_previous_turn(
    user_id: &str,
    previous: &TurnOutcome,
    gap: chrono::Duration,
) -> Option<TaskFeedback> {
    if previous.retrieved_memory_ids.is_empty() {
        return None;
    }
    let engagement = if gap < chrono::Duration::minutes(5) {
        1.0
    } else if gap < chrono::Duration::hours(1) {
        0.6
    } else {
        0.2
    };
    Some(TaskFeedback {
        user_id: user_id.to_string(),
        memory_ids: previous.retrieved_memory_ids.clone(),
        task_success: !previous.blocked && previous.provisional_reward > 0.2,
        engagement,
    })
}
