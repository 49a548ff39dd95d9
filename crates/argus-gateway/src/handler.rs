//! Inbound message handling: replay dedup, crawl interruption, the agent
//! pipeline, and outbound enqueueing for text, image, and audio messages.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use argus_agent::Agent;
use argus_core::provider::{MediaStore, SpeechSynthesizer, SpeechTranscriber, VisionAnalyzer};
use argus_core::types::{MessageKind, UserId};
use argus_memory::ProcessedMessages;
use argus_queue::{ActionKind, ActionQueue, EnqueueRequest};
use argus_scheduler::SchedulerEngine;

use crate::error::Result;

/// Direct replies outrank everything else in the queue, including the
/// priority-8 news digests: a user waiting on an answer never queues
/// behind a push.
const REPLY_PRIORITY: u8 = 9;

pub struct InboundHandler {
    agent: Arc<Agent>,
    queue: Arc<ActionQueue>,
    processed: Arc<ProcessedMessages>,
    scheduler: Arc<SchedulerEngine>,
    media: Arc<dyn MediaStore>,
    vision: Arc<dyn VisionAnalyzer>,
    transcriber: Arc<dyn SpeechTranscriber>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl InboundHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent: Arc<Agent>,
        queue: Arc<ActionQueue>,
        processed: Arc<ProcessedMessages>,
        scheduler: Arc<SchedulerEngine>,
        media: Arc<dyn MediaStore>,
        vision: Arc<dyn VisionAnalyzer>,
        transcriber: Arc<dyn SpeechTranscriber>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            agent,
            queue,
            processed,
            scheduler,
            media,
            vision,
            transcriber,
            synthesizer,
        }
    }

    /// Handle an inbound text message.
    ///
    /// Returns `None` on a replayed `message_id` — no reply, no history
    /// rows, no send. Otherwise the reply is enqueued and returned.
    pub async fn handle_incoming_message(
        &self,
        user_id: &UserId,
        text: &str,
        message_id: &str,
    ) -> Result<Option<String>> {
        if !self
            .processed
            .mark(message_id, user_id.as_str(), MessageKind::Text)?
        {
            info!(message_id, "replayed message ignored");
            return Ok(None);
        }

        // Inbound traffic outranks the crawl; yield it now.
        self.scheduler.interrupt();

        let reply = self.agent.handle_user_message(user_id, text).await;
        self.queue.enqueue(
            EnqueueRequest::new(ActionKind::Message, user_id.clone(), reply.clone())
                .with_priority(REPLY_PRIORITY),
        );
        Ok(Some(reply))
    }

    /// Handle an inbound image: download, run vision analysis, and feed the
    /// composed description through the text pipeline.
    pub async fn handle_image_message(
        &self,
        user_id: &UserId,
        media_id: &str,
        mime_type: &str,
        sha256_hex: &str,
        caption: Option<&str>,
    ) -> Result<Option<String>> {
        if !self
            .processed
            .mark(media_id, user_id.as_str(), MessageKind::Image)?
        {
            info!(media_id, "replayed image ignored");
            return Ok(None);
        }
        self.scheduler.interrupt();

        let bytes = self.media.download(media_id).await?;
        check_integrity(media_id, &bytes, sha256_hex);

        let analysis = self.vision.analyze(&bytes, mime_type).await?;
        let caption = caption.unwrap_or("");
        let composed =
            format!("[USER SENT AN IMAGE]\n\nImage Analysis:\n{analysis}\n\n{caption}");

        let reply = self.agent.handle_user_message(user_id, &composed).await;
        self.queue.enqueue(
            EnqueueRequest::new(ActionKind::Message, user_id.clone(), reply.clone())
                .with_priority(REPLY_PRIORITY),
        );
        Ok(Some(reply))
    }

    /// Handle an inbound voice note: transcribe, answer, synthesize the
    /// reply, upload it, and enqueue the media reference. Synthesis failure
    /// degrades to a plain text reply rather than losing the turn.
    pub async fn handle_audio_message(
        &self,
        user_id: &UserId,
        media_id: &str,
        mime_type: &str,
    ) -> Result<Option<String>> {
        if !self
            .processed
            .mark(media_id, user_id.as_str(), MessageKind::Audio)?
        {
            info!(media_id, "replayed audio ignored");
            return Ok(None);
        }
        self.scheduler.interrupt();

        let bytes = self.media.download(media_id).await?;
        let transcript = self.transcriber.transcribe(&bytes, mime_type).await?;
        let reply = self.agent.handle_user_message(user_id, &transcript).await;

        match self.synthesize_and_upload(&reply).await {
            Ok(media_ref) => {
                self.queue.enqueue(
                    EnqueueRequest::new(ActionKind::Media, user_id.clone(), media_ref)
                        .with_priority(REPLY_PRIORITY)
                        .with_metadata(serde_json::json!({ "transcript": reply.clone() })),
                );
            }
            Err(e) => {
                warn!(error = %e, "speech synthesis failed, replying as text");
                self.queue.enqueue(
                    EnqueueRequest::new(ActionKind::Message, user_id.clone(), reply.clone())
                        .with_priority(REPLY_PRIORITY),
                );
            }
        }
        Ok(Some(reply))
    }

    async fn synthesize_and_upload(&self, text: &str) -> Result<String> {
        let audio = self.synthesizer.synthesize(text).await?;
        Ok(self.media.upload(&audio, "audio/ogg").await?)
    }
}

/// Compare downloaded bytes against the transport-provided digest. A
/// mismatch is logged but not fatal; some transports omit or re-encode.
fn check_integrity(media_id: &str, bytes: &[u8], expected_sha256_hex: &str) {
    if expected_sha256_hex.is_empty() {
        return;
    }
    let actual = hex::encode(Sha256::digest(bytes));
    if !actual.eq_ignore_ascii_case(expected_sha256_hex) {
        warn!(media_id, "media digest mismatch");
    }
}
