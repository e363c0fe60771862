//! Serving loop.

use crate::{CommandEvent, CommandOutcome, CommandSource, Pipeline, TokenSweeper};
use lifeline_security::{AuditField, AuditStatus};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

/// Feeds events from a [`CommandSource`] through the [`Pipeline`] one at a time.
#[derive(Debug)]
pub struct LifelineServer {
    pipeline: Arc<Pipeline>,
    sweeper: Option<TokenSweeper>,
}

impl LifelineServer {
    /// Create a server around `pipeline`.
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            sweeper: None,
        }
    }

    /// Run `sweeper` alongside the loop.
    pub fn with_sweeper(mut self, sweeper: TokenSweeper) -> Self {
        self.sweeper = Some(sweeper);
        self
    }

    /// Pipeline driven by this server.
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Process events until the source is exhausted or `shutdown` becomes `true`.
    ///
    /// On exit the sweeper is stopped and pending reply deletions are cancelled.
    /// Returns the number of events handled.
    #[instrument(skip_all)]
    pub async fn run<S>(&self, mut source: S, mut shutdown: watch::Receiver<bool>) -> usize
    where
        S: CommandSource,
    {
        let sweeper = self
            .sweeper
            .clone()
            .map(|sweeper| sweeper.spawn(shutdown.clone()));

        info!("Lifeline server started");
        let mut handled = 0;

        loop {
            if *shutdown.borrow() {
                info!("Shutdown requested");
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("Shutdown channel closed");
                        break;
                    }
                }
                event = source.next_event() => {
                    let Some(event) = event else {
                        info!("Command source exhausted");
                        break;
                    };
                    self.process(event).await;
                    handled += 1;
                }
            }
        }

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        self.pipeline.deletions().shutdown();

        info!(handled, "Lifeline server stopped");
        handled
    }

    /// Handle one event in its own task; a panic is logged and audited, never propagated.
    async fn process(&self, event: CommandEvent) -> Option<CommandOutcome> {
        let pipeline = Arc::clone(&self.pipeline);
        let principal = event.principal;
        let text = event.text.clone();

        match tokio::spawn(async move { pipeline.handle(event).await }).await {
            Ok(outcome) => {
                debug!(%principal, %outcome, "Event handled");
                Some(outcome)
            }
            Err(e) => {
                error!(%principal, error = %e, "Event handler panicked");
                self.pipeline.guards().audit.write(
                    principal,
                    "panic",
                    AuditStatus::Error,
                    vec![AuditField::new("text", text)],
                );
                None
            }
        }
    }
}
