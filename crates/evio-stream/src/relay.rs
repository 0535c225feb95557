//! Relay task: copies one attachment source into its slot pipe.
//!
//! The copy runs on its own task so the side supplying the source is never
//! the same call stack as the side reading the placeholder handle. The
//! task's lifetime is bounded by "copy completes or source errors"; the
//! registry can abort it through its join handle.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::PipelineError;
use crate::registry::{SlotShared, SlotState};
use crate::source::AttachmentSource;

pub(crate) async fn run<S: AttachmentSource>(
    slot: usize,
    mut source: S,
    tx: mpsc::Sender<std::result::Result<Bytes, PipelineError>>,
    shared: Arc<SlotShared>,
) {
    let mut total: u64 = 0;
    loop {
        match source.next_chunk().await {
            Ok(Some(chunk)) => {
                total += chunk.len() as u64;
                if tx.send(Ok(chunk)).await.is_err() {
                    shared.set(SlotState::Failed);
                    tracing::debug!(slot, "attachment reader dropped mid-relay");
                    return;
                }
            }
            Ok(None) => {
                // Mark Done before the sender drops so the reader observes
                // a clean end when the pipe closes.
                shared.set(SlotState::Done);
                tracing::debug!(slot, bytes = total, "attachment relay complete");
                return;
            }
            Err(e) => {
                shared.set(SlotState::Failed);
                tracing::warn!(slot, error = %e, "attachment source failed");
                let _ = tx
                    .send(Err(PipelineError::SourceFailed {
                        slot,
                        reason: e.to_string(),
                    }))
                    .await;
                return;
            }
        }
    }
}
