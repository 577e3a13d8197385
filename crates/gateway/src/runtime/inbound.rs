//! Inbound dispatch with strict per-session ordering.
//!
//! Every `(user, channel)` session gets its own FIFO worker; events on
//! the same session process in receive order, different sessions run
//! concurrently. The dispatcher also closes the MemRL loop: when a new
//! turn arrives, the previous turn's retrieved memories receive their
//! feedback, scored by how quickly the user came back.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use orion_domain::event::BusEvent;

use crate::runtime::pipeline::{self, TurnOutcome, TurnRequest};
use crate::state::HostContext;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct InboundEvent {
    pub request: TurnRequest,
    /// When present, the caller wants the outcome back (HTTP/WS);
    /// otherwise the reply goes out through the channel manager.
    pub reply: Option<oneshot::Sender<TurnOutcome>>,
}

const SESSION_QUEUE_DEPTH: usize = 64;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// InboundDispatcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct InboundDispatcher {
    ctx: HostContext,
    queues: Mutex<HashMap<(String, String), mpsc::Sender<InboundEvent>>>,
}

impl InboundDispatcher {
    pub fn new(ctx: HostContext) -> Self {
        Self {
            ctx,
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Enqueue one inbound event. Returns `false` when the session's
    /// queue is full (backpressure: the transport should retry).
    pub fn dispatch(&self, event: InboundEvent) -> bool {
        self.ctx.bus.publish(BusEvent::InboundMessage {
            user_id: event.request.user_id.clone(),
            channel_id: event.request.channel_id.clone(),
            chars: event.request.text.len(),
        });

        let key = (
            event.request.user_id.clone(),
            event.request.channel_id.clone(),
        );
        let sender = {
            let mut queues = self.queues.lock();
            match queues.get(&key) {
                Some(sender) if !sender.is_closed() => sender.clone(),
                _ => {
                    let sender = spawn_session_worker(self.ctx.clone());
                    queues.insert(key, sender.clone());
                    sender
                }
            }
        };

        match sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("session queue full, rejecting inbound event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("session worker died, dropping inbound event");
                false
            }
        }
    }

    /// Dispatch and wait for the turn's outcome (HTTP/WS path).
    pub async fn dispatch_and_wait(&self, request: TurnRequest) -> Option<TurnOutcome> {
        let (tx, rx) = oneshot::channel();
        if !self.dispatch(InboundEvent {
            request,
            reply: Some(tx),
        }) {
            return None;
        }
        rx.await.ok()
    }

    pub fn active_sessions(&self) -> usize {
        self.queues.lock().len()
    }
}

/// One worker per session: strict FIFO, MemRL feedback between turns.
fn spawn_session_worker(ctx: HostContext) -> mpsc::Sender<InboundEvent> {
    let (tx, mut rx) = mpsc::channel::<InboundEvent>(SESSION_QUEUE_DEPTH);

    tokio::spawn(async move {
        let mut previous: Option<(TurnOutcome, chrono::DateTime<chrono::Utc>)> = None;

        while let Some(event) = rx.recv().await {
            let user_id = event.request.user_id.clone();
            let channel_id = event.request.channel_id.clone();

            // Close the learning loop for the previous turn.
            if let Some((outcome, at)) = previous.take() {
                let gap = chrono::Utc::now() - at;
                if let Some(feedback) =
                    pipeline::feedback_for_previous_turn(&user_id, &outcome, gap)
                {
                    if let Err(e) = ctx.memory.provide_feedback(feedback).await {
                        tracing::warn!(error = %e, "memory feedback failed");
                    }
                }
            }

            let outcome = pipeline::run_turn(&ctx, event.request).await;
            previous = Some((outcome.clone(), chrono::Utc::now()));

            match event.reply {
                Some(reply) => {
                    let _ = reply.send(outcome);
                }
                None => {
                    let delivered = ctx.channels.send(&user_id, &outcome.response).await;
                    if delivered.is_some() {
                        ctx.bus.publish(BusEvent::ReplySent {
                            user_id: user_id.clone(),
                            channel_id: channel_id.clone(),
                            chars: outcome.response.len(),
                        });
                    } else {
                        tracing::warn!(user_id = %user_id, "no channel accepted the reply");
                    }
                }
            }
        }
    });

    tx
}
