//! Process wiring: open the stores, build every component, and run the
//! long-lived loops (queue worker, scheduler engine) until shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use argus_agent::{Agent, AgentDeps};
use argus_browser::fetch::{HttpLinkExtractor, HttpPageFetcher};
use argus_browser::Browser;
use argus_core::config::ArgusConfig;
use argus_core::provider::{
    Embedder, LinkExtractor, MediaStore, MessageSender, PageFetcher, SearchProvider,
    SpeechSynthesizer, SpeechTranscriber, TextCompleter, ToolCompleter, VisionAnalyzer,
};
use argus_knowledge::KnowledgeBase;
use argus_memory::{ContextStore, HistoryStore, ProcessedMessages, SummaryStore, UserProfileStore};
use argus_queue::{worker, ActionQueue};
use argus_scheduler::{SchedulerDeps, SchedulerEngine};

use crate::error::Result;
use crate::handler::InboundHandler;

/// Per-request timeout for the default HTTP fetchers.
const FETCH_TIMEOUT_SECS: u64 = 20;

/// All external collaborators, injected by the embedding application.
///
/// `fetcher`/`extractor` default to the in-tree reqwest implementations
/// when left `None`; everything else has no sensible default here.
pub struct ExternalProviders {
    pub text_completer: Arc<dyn TextCompleter>,
    pub tool_completer: Arc<dyn ToolCompleter>,
    pub embedder: Arc<dyn Embedder>,
    pub vision: Arc<dyn VisionAnalyzer>,
    pub transcriber: Arc<dyn SpeechTranscriber>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub search: Arc<dyn SearchProvider>,
    pub sender: Arc<dyn MessageSender>,
    pub media: Arc<dyn MediaStore>,
    pub fetcher: Option<Arc<dyn PageFetcher>>,
    pub extractor: Option<Arc<dyn LinkExtractor>>,
}

pub struct ArgusApp {
    pub config: ArgusConfig,
    pub contexts: Arc<ContextStore>,
    pub summaries: Arc<SummaryStore>,
    pub history: Arc<HistoryStore>,
    pub profiles: Arc<UserProfileStore>,
    pub processed: Arc<ProcessedMessages>,
    pub kb: Arc<KnowledgeBase>,
    pub browser: Arc<Browser>,
    pub queue: Arc<ActionQueue>,
    pub agent: Arc<Agent>,
    pub scheduler: Arc<SchedulerEngine>,
    pub handler: InboundHandler,
    shutdown_tx: watch::Sender<bool>,
}

impl ArgusApp {
    /// Build the full component graph. Nothing starts running until
    /// [`ArgusApp::spawn`].
    pub fn build(config: ArgusConfig, providers: ExternalProviders) -> Result<Arc<Self>> {
        let data_dir = PathBuf::from(&config.data_dir);
        std::fs::create_dir_all(&data_dir)?;
        if let Some(parent) = PathBuf::from(&config.database.path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let open = || Connection::open(&config.database.path);

        let contexts = Arc::new(ContextStore::new(
            data_dir.join("context_state.json"),
            config.context.ttl_secs,
            config.context.analysis_interval,
        ));
        contexts.set_deep_completer(Arc::clone(&providers.text_completer));

        let summaries = Arc::new(SummaryStore::new(open()?)?);
        let history = Arc::new(HistoryStore::new(open()?)?);
        let profiles = Arc::new(UserProfileStore::new(open()?)?);
        let processed = Arc::new(ProcessedMessages::new(open()?)?);
        let kb = Arc::new(KnowledgeBase::new(
            open()?,
            Arc::clone(&providers.embedder),
            config.knowledge.similarity_threshold,
            config.knowledge.freshness_boost_age_hours,
        )?);

        let fetcher = providers
            .fetcher
            .unwrap_or_else(|| Arc::new(HttpPageFetcher::new(FETCH_TIMEOUT_SECS)));
        let extractor = providers
            .extractor
            .unwrap_or_else(|| Arc::new(HttpLinkExtractor::new(FETCH_TIMEOUT_SECS)));
        let browser = Arc::new(Browser::new(
            &data_dir,
            &config.browser,
            fetcher,
            extractor,
            Arc::clone(&providers.text_completer),
            Arc::clone(&providers.search),
            Arc::clone(&kb),
        ));

        let queue = Arc::new(ActionQueue::new(&config.queue));
        queue.register_sender(Arc::clone(&providers.sender));

        let agent = Arc::new(Agent::new(
            AgentDeps {
                contexts: Arc::clone(&contexts),
                summaries: Arc::clone(&summaries),
                history: Arc::clone(&history),
                profiles: Arc::clone(&profiles),
                kb: Arc::clone(&kb),
                browser: Arc::clone(&browser),
                text_completer: Arc::clone(&providers.text_completer),
                tool_completer: Arc::clone(&providers.tool_completer),
                search: Arc::clone(&providers.search),
            },
            &config.persona,
            &config.agent,
        ));

        let scheduler = Arc::new(SchedulerEngine::new(
            SchedulerDeps {
                contexts: Arc::clone(&contexts),
                summaries: Arc::clone(&summaries),
                kb: Arc::clone(&kb),
                browser: Arc::clone(&browser),
                queue: Arc::clone(&queue),
                agent: Arc::clone(&agent),
                text_completer: Arc::clone(&providers.text_completer),
            },
            &config,
        ));

        let handler = InboundHandler::new(
            Arc::clone(&agent),
            Arc::clone(&queue),
            Arc::clone(&processed),
            Arc::clone(&scheduler),
            providers.media,
            providers.vision,
            providers.transcriber,
            providers.synthesizer,
        );

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Arc::new(Self {
            config,
            contexts,
            summaries,
            history,
            profiles,
            processed,
            kb,
            browser,
            queue,
            agent,
            scheduler,
            handler,
            shutdown_tx,
        }))
    }

    /// Start the queue worker and the scheduler engine.
    pub fn spawn(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        info!("starting argus background loops");
        let worker_handle = tokio::spawn(worker::run(
            Arc::clone(&self.queue),
            self.shutdown_tx.subscribe(),
        ));
        let scheduler_handle = tokio::spawn(
            Arc::clone(&self.scheduler).run(self.shutdown_tx.subscribe()),
        );
        vec![worker_handle, scheduler_handle]
    }

    /// Ask every loop to stop after its current step.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use argus_core::types::UserId;

    #[tokio::test]
    async fn build_spawn_and_shutdown() {
        tracing_subscriber::fmt()
            .with_env_filter("argus_gateway=debug")
            .try_init()
            .ok();
        let dir = tempfile::tempdir().unwrap();
        let app = testutil::build_app(&dir, "pong");

        let handles = app.spawn();
        let reply = app
            .handler
            .handle_incoming_message(&UserId::from("u1"), "ping", "m1")
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("pong"));

        app.shutdown();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn worker_delivers_through_the_registered_sender() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(testutil::RecordingSender::default());
        let app = testutil::build_app_with_sender(&dir, "pong", Arc::clone(&sender));
        let handles = app.spawn();

        app.handler
            .handle_incoming_message(&UserId::from("u1"), "ping", "m1")
            .await
            .unwrap();

        // The 1s worker poll needs a moment to pick the action up.
        for _ in 0..80 {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            if !sender.sent.lock().unwrap().is_empty() {
                break;
            }
        }
        let sent = sender.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "pong");

        app.shutdown();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
