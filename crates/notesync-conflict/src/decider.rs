//! Channel-backed conflict decision callback
//!
//! The engine side holds a [`ChannelConflictDecider`]; the presentation side
//! drains [`ConflictPrompt`]s from the paired receiver and answers each one
//! through its oneshot reply. A dropped prompt or a closed channel leaves
//! the decision to the policy engine.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use notesync_core::domain::{ConflictResolution, ConflictSummary};
use notesync_core::ports::IConflictDecider;

/// A pending question about one conflict
#[derive(Debug)]
pub struct ConflictPrompt {
    pub summary: ConflictSummary,
    reply: oneshot::Sender<ConflictResolution>,
}

impl ConflictPrompt {
    /// Answer the prompt. Answers arriving after the decision timeout are
    /// discarded.
    pub fn respond(self, resolution: ConflictResolution) {
        if self.reply.send(resolution).is_err() {
            debug!(
                path = %self.summary.local_path,
                "Conflict answer arrived after the engine stopped waiting"
            );
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelConflictDecider {
    prompts: mpsc::Sender<ConflictPrompt>,
}

impl ChannelConflictDecider {
    /// Create a decider and the receiver its prompts are delivered to
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ConflictPrompt>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { prompts: tx }, rx)
    }
}

#[async_trait::async_trait]
impl IConflictDecider for ChannelConflictDecider {
    async fn decide(&self, summary: &ConflictSummary) -> Option<ConflictResolution> {
        let (reply, answer) = oneshot::channel();
        let prompt = ConflictPrompt {
            summary: summary.clone(),
            reply,
        };
        if self.prompts.send(prompt).await.is_err() {
            warn!(path = %summary.local_path, "Conflict prompt receiver is gone");
            return None;
        }
        answer.await.ok()
    }
}
