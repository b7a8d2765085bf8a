//! Dispatch sink and command refinement
//!
//! The dispatch side of the session tee: a pump that drains the dispatch
//! channel into an event handler, and the refinement step that turns message
//! events into invocable commands.

use crate::events::DispatchEvent;
use crate::protocol::GatewayMessage;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Consumer contract for the dispatch side of the session tee
///
/// The sink observes every inbound gateway message in arrival order,
/// control messages included.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called for every message the session forwards downstream
    async fn on_message(&self, message: &GatewayMessage);

    /// Called for dispatch events specifically
    async fn on_dispatch(&self, seq: u64, event: &DispatchEvent) {
        let _ = (seq, event);
    }
}

/// Drain the dispatch channel into a handler until the session ends
pub async fn run_sink(mut rx: mpsc::Receiver<GatewayMessage>, handler: Arc<dyn EventHandler>) {
    while let Some(message) = rx.recv().await {
        handler.on_message(&message).await;

        if let GatewayMessage::Dispatch { seq, event } = &message {
            handler.on_dispatch(*seq, event).await;
        }
    }

    debug!("dispatch sink closed");
}

/// Context passed explicitly through command refinement
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Channel the message was posted in
    pub channel_id: String,
    /// Author of the message
    pub author_id: String,
    /// Whether the author is a bot
    pub author_is_bot: bool,
    /// Raw message content
    pub content: String,
}

/// An asynchronous predicate applied during refinement
#[async_trait]
pub trait CommandFilter: Send + Sync {
    /// Whether the message may proceed to command handling
    async fn allow(&self, ctx: &CommandContext) -> bool;
}

/// Command settings, each exposed as a deferred value
///
/// `prefix` and `aliases` may consult external state (per-guild settings, a
/// cache) and are therefore async; `filters` run in order with short-circuit.
#[async_trait]
pub trait CommandSpec: Send + Sync {
    /// The invocation prefix for this context
    async fn prefix(&self, ctx: &CommandContext) -> String;

    /// Command names accepted after the prefix
    async fn aliases(&self, ctx: &CommandContext) -> Vec<String>;

    /// Predicates applied after the name matches
    fn filters(&self) -> Vec<Arc<dyn CommandFilter>> {
        Vec::new()
    }
}

/// A message refined into an invocable command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinedCommand {
    /// Matched command name
    pub name: String,
    /// Remaining whitespace-separated arguments
    pub args: Vec<String>,
}

/// Refine a message into a command
///
/// A straight sequence of checks with short-circuit: prefix match, alias
/// match, then each filter in order. Returns None as soon as any step
/// rejects.
pub async fn refine(spec: &dyn CommandSpec, ctx: &CommandContext) -> Option<RefinedCommand> {
    let prefix = spec.prefix(ctx).await;
    let rest = ctx.content.strip_prefix(&prefix)?;

    let mut parts = rest.split_whitespace();
    let name = parts.next()?.to_string();

    let aliases = spec.aliases(ctx).await;
    if !aliases.iter().any(|a| a.eq_ignore_ascii_case(&name)) {
        return None;
    }

    for filter in spec.filters() {
        if !filter.allow(ctx).await {
            return None;
        }
    }

    Some(RefinedCommand {
        name,
        args: parts.map(str::to_string).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestSpec {
        filters: Vec<Arc<dyn CommandFilter>>,
    }

    #[async_trait]
    impl CommandSpec for TestSpec {
        async fn prefix(&self, _ctx: &CommandContext) -> String {
            "!".to_string()
        }

        async fn aliases(&self, _ctx: &CommandContext) -> Vec<String> {
            vec!["ping".to_string(), "p".to_string()]
        }

        fn filters(&self) -> Vec<Arc<dyn CommandFilter>> {
            self.filters.clone()
        }
    }

    struct NoBots;

    #[async_trait]
    impl CommandFilter for NoBots {
        async fn allow(&self, ctx: &CommandContext) -> bool {
            !ctx.author_is_bot
        }
    }

    struct CountingFilter {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CommandFilter for CountingFilter {
        async fn allow(&self, _ctx: &CommandContext) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn ctx(content: &str) -> CommandContext {
        CommandContext {
            channel_id: "chan".to_string(),
            author_id: "user".to_string(),
            author_is_bot: false,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_refine_matches_alias_and_args() {
        let spec = TestSpec { filters: vec![] };

        let command = refine(&spec, &ctx("!ping one two")).await.unwrap();
        assert_eq!(command.name, "ping");
        assert_eq!(command.args, vec!["one", "two"]);

        let short = refine(&spec, &ctx("!p")).await.unwrap();
        assert_eq!(short.name, "p");
        assert!(short.args.is_empty());
    }

    #[tokio::test]
    async fn test_refine_rejects_wrong_prefix_and_name() {
        let spec = TestSpec { filters: vec![] };

        assert!(refine(&spec, &ctx("ping")).await.is_none());
        assert!(refine(&spec, &ctx("!pong")).await.is_none());
        assert!(refine(&spec, &ctx("!")).await.is_none());
    }

    #[tokio::test]
    async fn test_filters_short_circuit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = TestSpec {
            filters: vec![
                Arc::new(NoBots),
                Arc::new(CountingFilter {
                    calls: calls.clone(),
                }),
            ],
        };

        let mut bot_ctx = ctx("!ping");
        bot_ctx.author_is_bot = true;

        assert!(refine(&spec, &bot_ctx).await.is_none());
        // The second filter never ran
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(refine(&spec, &ctx("!ping")).await.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct Recorder {
        seen: tokio::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn on_message(&self, message: &GatewayMessage) {
            self.seen.lock().await.push(message.to_string());
        }
    }

    #[tokio::test]
    async fn test_sink_drains_in_order() {
        let (tx, rx) = mpsc::channel(8);
        let recorder = Arc::new(Recorder {
            seen: tokio::sync::Mutex::new(Vec::new()),
        });

        tx.send(GatewayMessage::HeartbeatAck).await.unwrap();
        tx.send(GatewayMessage::Reconnect).await.unwrap();
        drop(tx);

        run_sink(rx, recorder.clone()).await;

        let seen = recorder.seen.lock().await;
        assert_eq!(*seen, vec!["HeartbeatAck", "Reconnect"]);
    }
}
