//! Shared host context passed to every handler and runtime task.
//!
//! All services are constructed once in [`HostContext::build`] and
//! passed by reference — there are no global singletons and no
//! initialization-order hazards.

use std::sync::Arc;

use orion_acp::{AcpHandler, AcpMessage, AcpRouter};
use orion_channels::{Channel, ChannelManager, PairingStore};
use orion_domain::config::Config;
use orion_domain::error::{Error, Result};
use orion_domain::event::EventBus;
use orion_engines::{Engine, EngineRegistry, Orchestrator};
use orion_memory::{EmbedderChain, InMemoryAnnIndex, MemoryStore, SaveOptions};
use orion_security::SecurityChain;
use orion_store::{NotesWriter, Persistence};
use orion_tools::ToolRegistry;

use crate::runtime::usage::UsageRecorder;
use crate::runtime::workers::WorkerPool;
use crate::workspace::WorkspaceReader;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HostContext
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything the runtime needs, grouped by concern:
/// - **Decisions** — config, engine orchestrator, security chain
/// - **State** — memory, persistence, sessions (inside channels)
/// - **I/O** — channels, tools, ACP router, event bus
/// - **Housekeeping** — usage recorder, worker pool, workspace
#[derive(Clone)]
pub struct HostContext {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
    pub security: Arc<SecurityChain>,
    pub memory: Arc<MemoryStore>,
    pub store: Arc<dyn Persistence>,
    pub channels: Arc<ChannelManager>,
    pub pairing: Arc<PairingStore>,
    pub tools: Arc<ToolRegistry>,
    pub acp: Arc<AcpRouter>,
    pub bus: EventBus,
    pub usage: Arc<UsageRecorder>,
    pub workers: Arc<WorkerPool>,
    pub workspace: Arc<WorkspaceReader>,
    pub notes: Arc<NotesWriter>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl HostContext {
    /// Wire the host. Engine candidates are probed; channel adapters
    /// are registered but not yet started. Persistence-port init
    /// failure is fatal by design.
    pub async fn build(
        config: Config,
        engine_candidates: Vec<Arc<dyn Engine>>,
        channel_adapters: Vec<Arc<dyn Channel>>,
        store: Arc<dyn Persistence>,
    ) -> Result<Self> {
        for issue in config.validate() {
            match issue.severity {
                orion_domain::config::ConfigSeverity::Error => {
                    return Err(Error::Config(issue.to_string()));
                }
                orion_domain::config::ConfigSeverity::Warning => {
                    tracing::warn!(issue = %issue, "config warning");
                }
            }
        }

        store.init().await?;

        let bus = EventBus::new();
        let registry = EngineRegistry::probe(engine_candidates).await;
        let orchestrator = Arc::new(
            Orchestrator::new(registry, config.engines.clone()).with_bus(bus.clone()),
        );

        let security = Arc::new(SecurityChain::new(&config.security, orchestrator.clone()));

        let memory = Arc::new(
            MemoryStore::new(
                config.memory.clone(),
                Arc::new(InMemoryAnnIndex::new(config.memory.vector_dim)),
                EmbedderChain::new(Vec::new(), config.memory.vector_dim),
            )
            .with_orchestrator(orchestrator.clone())
            .with_bus(bus.clone()),
        );

        let channels = Arc::new(ChannelManager::new(&config.transport));
        for adapter in channel_adapters {
            channels.register(adapter);
        }
        let pairing = Arc::new(PairingStore::new(config.transport.pairing.clone()));

        let tools = Arc::new(ToolRegistry::new(&config.tools));
        let acp = Arc::new(AcpRouter::new(config.acp.handler_timeout_secs));
        let usage = Arc::new(UsageRecorder::new(config.usage.clone(), store.clone()));
        let workers = WorkerPool::start(256, 4);
        let workspace = Arc::new(WorkspaceReader::new(
            &config.workspace.root,
            config.workspace.per_file_max_chars,
        ));
        let notes = Arc::new(NotesWriter::new(
            &config.workspace.root,
            &config.workspace.notes_dir,
        ));

        let ctx = Self {
            config: Arc::new(config),
            orchestrator,
            security,
            memory,
            store,
            channels,
            pairing,
            tools,
            acp,
            bus,
            usage,
            workers,
            workspace,
            notes,
            started_at: chrono::Utc::now(),
        };

        ctx.register_builtin_agents();
        Ok(ctx)
    }

    /// The in-process agents every deployment carries.
    fn register_builtin_agents(&self) {
        self.acp.register(
            "memory",
            vec!["memory.save".into(), "memory.search".into()],
            Arc::new(MemoryAgent {
                memory: self.memory.clone(),
            }),
        );
        self.acp.register(
            "notes",
            vec!["notes.append".into()],
            Arc::new(NotesAgent {
                notes: self.notes.clone(),
            }),
        );
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Builtin ACP agents
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct MemoryAgent {
    memory: Arc<MemoryStore>,
}

#[async_trait::async_trait]
impl AcpHandler for MemoryAgent {
    async fn handle(&self, msg: &AcpMessage) -> Result<serde_json::Value> {
        let user_id = msg.payload["user_id"]
            .as_str()
            .ok_or_else(|| Error::Acp {
                code: "bad_payload".into(),
                message: "user_id is required".into(),
            })?;

        match msg.action.as_str() {
            "memory.save" => {
                let content = msg.payload["content"].as_str().unwrap_or_default();
                let id = self
                    .memory
                    .save(user_id, content, SaveOptions::default())
                    .await?;
                Ok(serde_json::json!({ "id": id }))
            }
            "memory.search" => {
                let query = msg.payload["query"].as_str().unwrap_or_default();
                let k = msg.payload["k"].as_u64().unwrap_or(5) as usize;
                let hits = self.memory.search(user_id, query, k).await?;
                let rows: Vec<serde_json::Value> = hits
                    .iter()
                    .map(|h| {
                        serde_json::json!({
                            "id": h.entry.id,
                            "content": h.entry.content,
                            "score": h.score,
                        })
                    })
                    .collect();
                Ok(serde_json::json!({ "results": rows }))
            }
            other => Err(Error::Acp {
                code: "unknown_action".into(),
                message: format!("memory agent cannot handle '{other}'"),
            }),
        }
    }
}

struct NotesAgent {
    notes: Arc<NotesWriter>,
}

#[async_trait::async_trait]
impl AcpHandler for NotesAgent {
    async fn handle(&self, msg: &AcpMessage) -> Result<serde_json::Value> {
        let text = msg.payload["text"].as_str().unwrap_or_default();
        if text.is_empty() {
            return Err(Error::Acp {
                code: "bad_payload".into(),
                message: "text is required".into(),
            });
        }
        self.notes.append(text)?;
        Ok(serde_json::json!({ "appended": true }))
    }
}
