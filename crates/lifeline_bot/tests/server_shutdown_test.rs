//! Serving loop behavior: ordering, exhaustion, and shutdown.

use async_trait::async_trait;
use lifeline_actions::{ActionExecutor, ActionOutput, ActionRequest, ActionResult};
use lifeline_bot::{
    CommandEvent, CommandSource, Guards, LifelineServer, MessageId, Pipeline, PipelineResult,
    Reply, Responder, TokenSweeper,
};
use lifeline_security::{
    Allowlist, AuditLogger, ConfirmationManager, ModeManager, OperatingMode, Principal,
    SlidingWindowLimiter,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

struct EchoExecutor;

#[async_trait]
impl ActionExecutor for EchoExecutor {
    async fn execute(&self, request: &ActionRequest) -> ActionResult<ActionOutput> {
        Ok(ActionOutput::text(format!("{} ok", request.command)))
    }

    fn supports_command(&self, _command: &str) -> bool {
        true
    }
}

#[derive(Default)]
struct Transcript {
    replies: Mutex<Vec<String>>,
}

#[async_trait]
impl Responder for Transcript {
    async fn send(&self, _principal: Principal, reply: Reply) -> PipelineResult<MessageId> {
        let mut replies = self.replies.lock();
        replies.push(reply.text);
        Ok(MessageId(replies.len() as i64))
    }

    async fn delete(&self, _principal: Principal, _message: MessageId) -> PipelineResult<()> {
        Ok(())
    }
}

struct ScriptedSource {
    events: VecDeque<CommandEvent>,
}

#[async_trait]
impl CommandSource for ScriptedSource {
    async fn next_event(&mut self) -> Option<CommandEvent> {
        self.events.pop_front()
    }
}

/// Never yields an event.
struct SilentSource;

#[async_trait]
impl CommandSource for SilentSource {
    async fn next_event(&mut self) -> Option<CommandEvent> {
        std::future::pending().await
    }
}

fn server(dir: &TempDir, transcript: Arc<Transcript>) -> LifelineServer {
    let guards = Guards {
        allowlist: Arc::new(Allowlist::new([Principal(1)])),
        limiter: Arc::new(SlidingWindowLimiter::new(10, Duration::from_secs(60))),
        modes: Arc::new(ModeManager::new(OperatingMode::ReadOnly)),
        confirm: Arc::new(ConfirmationManager::new(Duration::from_secs(60))),
        audit: Arc::new(AuditLogger::new(dir.path().join("audit.log"))),
    };
    let sweeper = TokenSweeper::new(
        Arc::clone(&guards.confirm),
        Arc::clone(&guards.limiter),
        Duration::from_secs(30),
    );
    let pipeline = Pipeline::new(guards, Arc::new(EchoExecutor), transcript);
    LifelineServer::new(Arc::new(pipeline)).with_sweeper(sweeper)
}

#[tokio::test]
async fn test_events_are_handled_in_order_until_exhausted() {
    let dir = TempDir::new().unwrap();
    let transcript = Arc::new(Transcript::default());
    let server = server(&dir, Arc::clone(&transcript));

    let events = ["/status", "/mode", "/health"]
        .into_iter()
        .filter_map(|text| CommandEvent::parse(Principal(1), text))
        .chain(CommandEvent::parse(Principal(2), "/status"))
        .collect();
    let (_tx, rx) = watch::channel(false);

    let handled = server.run(ScriptedSource { events }, rx).await;

    assert_eq!(handled, 4);
    assert_eq!(
        *transcript.replies.lock(),
        vec![
            "status ok".to_string(),
            "Current mode: readonly".to_string(),
            "health ok".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_shutdown_stops_idle_server() {
    let dir = TempDir::new().unwrap();
    let server = Arc::new(server(&dir, Arc::new(Transcript::default())));
    let (tx, rx) = watch::channel(false);

    let running = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run(SilentSource, rx).await }
    });

    tokio::task::yield_now().await;
    tx.send(true).unwrap();

    let handled = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(handled, 0);
    assert_eq!(server.pipeline().deletions().pending(), 0);
}

#[tokio::test]
async fn test_shutdown_already_requested() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir, Arc::new(Transcript::default()));
    let events = CommandEvent::parse(Principal(1), "/status").into_iter().collect();
    let (_tx, rx) = watch::channel(true);

    assert_eq!(server.run(ScriptedSource { events }, rx).await, 0);
}
