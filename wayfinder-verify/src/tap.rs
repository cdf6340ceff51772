use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::strategy::VerificationStrategy;
use wayfinder_core::WayfinderError;

/// Tees a retrieved byte stream to a consumer while accumulating it for
/// verification.
///
/// Non-strict mode forwards each chunk to `sink` as it arrives — the
/// `mpsc::Sender::send` backpressure means a slow consumer naturally slows
/// the retrieval, same as any bounded-channel pipeline — and verification
/// runs only after the stream ends, surfacing its result as an event rather
/// than blocking delivery. Strict mode withholds every byte from `sink`
/// until the whole body is verified, then releases it in one shot; a failed
/// verification in strict mode means nothing is ever delivered.
pub struct StreamTapper {
    strategy: Arc<dyn VerificationStrategy>,
    strict: bool,
}

impl StreamTapper {
    pub fn new(strategy: Arc<dyn VerificationStrategy>, strict: bool) -> Self {
        Self { strategy, strict }
    }

    pub async fn tap<S>(
        &self,
        tx_id: &str,
        mut stream: S,
        sink: mpsc::Sender<Bytes>,
        headers: &HashMap<String, String>,
        raw: bool,
    ) -> Result<(), WayfinderError>
    where
        S: Stream<Item = Result<Bytes, WayfinderError>> + Unpin,
    {
        let mut buffer = BytesMut::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !self.strict && sink.send(chunk.clone()).await.is_err() {
                return Err(WayfinderError::Cancelled);
            }
            buffer.extend_from_slice(&chunk);
        }

        let data = buffer.freeze();
        let verify_result = self.strategy.verify(tx_id, &data, headers, raw).await;

        if self.strict {
            match &verify_result {
                Ok(()) => {
                    if sink.send(data).await.is_err() {
                        return Err(WayfinderError::Cancelled);
                    }
                }
                Err(_) => return verify_result,
            }
        }

        verify_result
    }
}
