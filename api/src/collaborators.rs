//! Contracts for the external collaborators the engine talks to: the NL
//! preference parser, the exercise matcher, the outbound transport, and the
//! dashboard notifier. All four are injected at engine construction; the
//! engine never reaches for a global.
//!
//! Parser and matcher calls are bounded by a timeout and degrade
//! deterministically: a slow or failing collaborator turns into "nothing
//! parsed" / "no match", never a stalled conversation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use coachline_core::disambiguation::ExerciseOption;
use coachline_core::error::EngineError;
use coachline_core::preferences::{PartialPreferences, PreferenceRecord};
use uuid::Uuid;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const DEFAULT_PARSER_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MATCHER_TIMEOUT_MS: u64 = 5_000;

/// Whether a phrase should be added to or removed from the workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchIntent {
    Include,
    Avoid,
}

impl MatchIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchIntent::Include => "include",
            MatchIntent::Avoid => "avoid",
        }
    }
}

/// How the matcher arrived at its candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    Exact,
    Pattern,
    Llm,
}

/// Ranked candidates for one phrase. Empty means no match; more than one
/// triggers the disambiguation sub-protocol.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub candidates: Vec<ExerciseOption>,
    pub method: MatchMethod,
}

/// Extracts preference fields from free text. Implementations must return
/// an empty partial rather than erroring on arbitrary text.
pub trait PreferenceParser: Send + Sync {
    fn parse<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<PartialPreferences, EngineError>>;
}

/// Resolves a free-text exercise phrase against a business's catalog.
pub trait ExerciseMatcher: Send + Sync {
    fn match_phrase<'a>(
        &'a self,
        phrase: &'a str,
        business_id: Uuid,
        intent: MatchIntent,
    ) -> BoxFuture<'a, Result<MatchOutcome, EngineError>>;
}

/// Fire-and-forget reply dispatch. Retries and delivery guarantees belong
/// to the transport, not the engine.
pub trait OutboundSender: Send + Sync {
    fn send<'a>(&'a self, user_id: Uuid, text: &'a str) -> BoxFuture<'a, Result<(), EngineError>>;
}

/// Best-effort quick-projection broadcast for dashboards. Never relied on
/// for correctness; the authoritative write is the store upsert.
pub trait PreferenceNotifier: Send + Sync {
    fn preferences_updated<'a>(
        &'a self,
        session_id: Uuid,
        user_id: Uuid,
        record: &'a PreferenceRecord,
    ) -> BoxFuture<'a, ()>;
}

/// Default notifier: does nothing.
pub struct NoopNotifier;

impl PreferenceNotifier for NoopNotifier {
    fn preferences_updated<'a>(
        &'a self,
        _session_id: Uuid,
        _user_id: Uuid,
        _record: &'a PreferenceRecord,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}

fn timeout_from_env(var: &str, default_ms: u64) -> Duration {
    let ms = std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

/// Run the parser under its timeout, degrading to "nothing parsed".
pub async fn parse_with_timeout(
    parser: &Arc<dyn PreferenceParser>,
    text: &str,
) -> PartialPreferences {
    let timeout = timeout_from_env("COACHLINE_PARSER_TIMEOUT_MS", DEFAULT_PARSER_TIMEOUT_MS);
    match tokio::time::timeout(timeout, parser.parse(text)).await {
        Ok(Ok(parsed)) => parsed,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "preference parser failed; treating as no fields parsed");
            PartialPreferences::default()
        }
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "preference parser timed out");
            PartialPreferences::default()
        }
    }
}

/// Run the matcher under its timeout, degrading to "no match".
pub async fn match_with_timeout(
    matcher: &Arc<dyn ExerciseMatcher>,
    phrase: &str,
    business_id: Uuid,
    intent: MatchIntent,
) -> MatchOutcome {
    let timeout = timeout_from_env("COACHLINE_MATCHER_TIMEOUT_MS", DEFAULT_MATCHER_TIMEOUT_MS);
    match tokio::time::timeout(timeout, matcher.match_phrase(phrase, business_id, intent)).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, phrase, "exercise matcher failed; treating as no match");
            MatchOutcome { candidates: Vec::new(), method: MatchMethod::Exact }
        }
        Err(_) => {
            tracing::warn!(phrase, "exercise matcher timed out; treating as no match");
            MatchOutcome { candidates: Vec::new(), method: MatchMethod::Exact }
        }
    }
}
