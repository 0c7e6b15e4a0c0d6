//! Per-stream driver task

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;

use super::handle::StreamShared;
use super::{Control, ReconnectPolicy};
use crate::transport::{Credentials, FrameStream, Transport, TransportError};

/// How reading an open stream ended
enum Pumped {
    Failed(TransportError),
    Interrupted(Control),
}

pub(super) struct Driver {
    pub(super) shared: Arc<StreamShared>,
    pub(super) transport: Arc<dyn Transport>,
    pub(super) credentials: Credentials,
    pub(super) policy: ReconnectPolicy,
    pub(super) control: mpsc::UnboundedReceiver<Control>,
}

impl Driver {
    /// Open, read and reconnect until shut down
    pub(super) async fn run(mut self) {
        let endpoint = self.shared.endpoint.clone();
        let mut attempts: u32 = 0;

        loop {
            let opened = tokio::select! {
                biased;
                control = next_control(&mut self.control) => match control {
                    Control::Reset => {
                        attempts = 0;
                        continue;
                    }
                    Control::Shutdown => break,
                },
                opened = self.transport.open(&endpoint, &self.credentials) => opened,
            };

            let failure = match opened {
                Ok(frames) => {
                    attempts = 0;
                    self.shared.on_open();
                    match self.pump(frames).await {
                        Pumped::Failed(e) => e,
                        Pumped::Interrupted(Control::Reset) => {
                            self.shared.on_reset();
                            continue;
                        }
                        Pumped::Interrupted(Control::Shutdown) => break,
                    }
                }
                Err(e) => e,
            };

            tracing::warn!(
                endpoint = %self.shared.key,
                error = %failure,
                attempt = attempts,
                "Sync stream disconnected"
            );
            self.shared.on_failure(&failure);

            if !failure.is_retryable() || !self.policy.allows(attempts) {
                tracing::error!(
                    endpoint = %self.shared.key,
                    attempts,
                    retryable = failure.is_retryable(),
                    "Giving up on sync stream until reset"
                );
                match next_control(&mut self.control).await {
                    Control::Reset => {
                        attempts = 0;
                        self.shared.set_reconnect_attempts(0);
                        continue;
                    }
                    Control::Shutdown => break,
                }
            }

            attempts += 1;
            self.shared.set_reconnect_attempts(attempts);
            let delay = self.policy.delay_for(attempts);
            tracing::debug!(
                endpoint = %self.shared.key,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting sync stream"
            );

            tokio::select! {
                biased;
                control = next_control(&mut self.control) => match control {
                    Control::Reset => {
                        attempts = 0;
                        self.shared.set_reconnect_attempts(0);
                    }
                    Control::Shutdown => break,
                },
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.shared.on_stopped();
        tracing::debug!(endpoint = %self.shared.key, "Sync stream driver stopped");
    }

    /// Route frames until the stream fails or a control command arrives
    async fn pump(&mut self, mut frames: FrameStream) -> Pumped {
        loop {
            tokio::select! {
                biased;
                control = next_control(&mut self.control) => return Pumped::Interrupted(control),
                frame = frames.next() => match frame {
                    Some(Ok(raw)) => {
                        self.shared.router.route(&raw);
                    }
                    // The transport resumes at the next line
                    Some(Err(TransportError::FrameTooLarge { max_bytes })) => {
                        tracing::warn!(
                            endpoint = %self.shared.key,
                            max_bytes,
                            "Dropping oversized sync frame"
                        );
                    }
                    Some(Err(e)) => return Pumped::Failed(e),
                    None => return Pumped::Failed(TransportError::Closed),
                },
            }
        }
    }
}

/// Next command; a closed channel means nobody can reach this stream again
async fn next_control(control: &mut mpsc::UnboundedReceiver<Control>) -> Control {
    control.recv().await.unwrap_or(Control::Shutdown)
}
