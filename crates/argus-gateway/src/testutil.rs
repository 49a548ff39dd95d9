//! Deterministic provider stubs and app builders shared by the gateway tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use argus_core::config::ArgusConfig;
use argus_core::provider::{
    ArticleLink, Embedder, LinkExtractor, MediaStore, MessageSender, PageFetcher, ProviderError,
    SearchHit, SearchProvider, SpeechSynthesizer, SpeechTranscriber, TextCompleter,
    ToolChatRequest, ToolChatResponse, ToolCompleter, VisionAnalyzer,
};
use argus_core::types::{MessageKind, UserId};

use crate::app::{ArgusApp, ExternalProviders};

pub struct StubEmbedder;

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(vec![1.0, 0.0])
    }
}

/// Inert web: no pages, no links, no search hits.
pub struct NoPages;

#[async_trait]
impl PageFetcher for NoPages {
    async fn fetch(&self, _url: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Unavailable("no fetcher in tests".into()))
    }
}

#[async_trait]
impl LinkExtractor for NoPages {
    async fn extract_links(&self, _hub: &str) -> Result<Vec<ArticleLink>, ProviderError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl SearchProvider for NoPages {
    async fn search(&self, _q: &str, _n: usize) -> Result<Vec<SearchHit>, ProviderError> {
        Ok(Vec::new())
    }
}

pub struct CannedText(pub &'static str);

#[async_trait]
impl TextCompleter for CannedText {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
        Ok(self.0.to_string())
    }
}

/// Ends every tool loop immediately with a fixed reply.
pub struct FinalText(pub &'static str);

#[async_trait]
impl ToolCompleter for FinalText {
    async fn complete_with_tools(
        &self,
        _req: &ToolChatRequest,
    ) -> Result<ToolChatResponse, ProviderError> {
        Ok(ToolChatResponse {
            content: self.0.to_string(),
            stop_reason: "end_turn".to_string(),
            tool_calls: vec![],
        })
    }
}

pub struct FailingTools;

#[async_trait]
impl ToolCompleter for FailingTools {
    async fn complete_with_tools(
        &self,
        _req: &ToolChatRequest,
    ) -> Result<ToolChatResponse, ProviderError> {
        Err(ProviderError::Unavailable("llm down".into()))
    }
}

pub struct StubMedia;

#[async_trait]
impl MediaStore for StubMedia {
    async fn download(&self, _id: &str) -> Result<Vec<u8>, ProviderError> {
        Ok(b"media bytes".to_vec())
    }
    async fn upload(&self, _data: &[u8], _mime: &str) -> Result<String, ProviderError> {
        Ok("media-ref-1".to_string())
    }
}

pub struct StubVision;

#[async_trait]
impl VisionAnalyzer for StubVision {
    async fn analyze(&self, _image: &[u8], _mime: &str) -> Result<String, ProviderError> {
        Ok("a cat on a sofa".to_string())
    }
}

pub struct StubSpeech;

#[async_trait]
impl SpeechTranscriber for StubSpeech {
    async fn transcribe(&self, _audio: &[u8], _mime: &str) -> Result<String, ProviderError> {
        Ok("what did I miss".to_string())
    }
}

#[async_trait]
impl SpeechSynthesizer for StubSpeech {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, ProviderError> {
        Ok(b"ogg bytes".to_vec())
    }
}

/// Captures everything sent through the transport.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(UserId, String, MessageKind)>>,
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(
        &self,
        user_id: &UserId,
        content: &str,
        kind: MessageKind,
    ) -> Result<(), ProviderError> {
        self.sent
            .lock()
            .unwrap()
            .push((user_id.clone(), content.to_string(), kind));
        Ok(())
    }
}

pub fn test_config(dir: &tempfile::TempDir) -> ArgusConfig {
    let mut config = ArgusConfig::default();
    config.data_dir = dir.path().join("data").to_string_lossy().into_owned();
    config.database.path = dir
        .path()
        .join("data/argus.db")
        .to_string_lossy()
        .into_owned();
    config
}

pub fn build_app(dir: &tempfile::TempDir, reply: &'static str) -> Arc<ArgusApp> {
    build_app_with(dir, Arc::new(FinalText(reply)), Arc::new(RecordingSender::default()))
}

pub fn build_app_with_sender(
    dir: &tempfile::TempDir,
    reply: &'static str,
    sender: Arc<RecordingSender>,
) -> Arc<ArgusApp> {
    build_app_with(dir, Arc::new(FinalText(reply)), sender)
}

pub fn build_app_with_tools(
    dir: &tempfile::TempDir,
    tools: Arc<dyn ToolCompleter>,
) -> Arc<ArgusApp> {
    build_app_with(dir, tools, Arc::new(RecordingSender::default()))
}

fn build_app_with(
    dir: &tempfile::TempDir,
    tools: Arc<dyn ToolCompleter>,
    sender: Arc<RecordingSender>,
) -> Arc<ArgusApp> {
    let providers = ExternalProviders {
        text_completer: Arc::new(CannedText("canned text")),
        tool_completer: tools,
        embedder: Arc::new(StubEmbedder),
        vision: Arc::new(StubVision),
        transcriber: Arc::new(StubSpeech),
        synthesizer: Arc::new(StubSpeech),
        search: Arc::new(NoPages),
        sender,
        media: Arc::new(StubMedia),
        fetcher: Some(Arc::new(NoPages)),
        extractor: Some(Arc::new(NoPages)),
    };
    ArgusApp::build(test_config(dir), providers).expect("app builds")
}
