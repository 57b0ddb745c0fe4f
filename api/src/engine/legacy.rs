//! The built-in 7-step flow: initial collection, optional disambiguation,
//! one targeted follow-up, then active-mode amendments.

use coachline_core::disambiguation::{
    AmbiguousMatch, DisambiguationContext, DisambiguationKind, selection_prompt,
};
use coachline_core::error::EngineError;
use coachline_core::followup;
use coachline_core::merge::merge;
use coachline_core::messages::{InboundMessage, TurnReply, preference_prompt};
use coachline_core::preferences::{PartialPreferences, PreferenceRecord};
use coachline_core::steps::ConversationStep;

use super::{ConversationEngine, disambiguation, update};
use crate::collaborators::{MatchIntent, match_with_timeout, parse_with_timeout};

/// Outcome of running a batch of phrases through the matcher.
pub(crate) struct MatchedPhrases {
    /// Canonical names for phrases that resolved to exactly one exercise,
    /// plus raw phrases the catalog had no match for (noted as-is)
    pub resolved: Vec<String>,
    /// Phrases with more than one candidate
    pub ambiguous: Vec<AmbiguousMatch>,
}

pub(crate) async fn match_phrases(
    engine: &ConversationEngine,
    msg: &InboundMessage,
    phrases: &[String],
    intent: MatchIntent,
) -> MatchedPhrases {
    let mut resolved = Vec::new();
    let mut ambiguous = Vec::new();

    for phrase in phrases {
        let outcome =
            match_with_timeout(&engine.matcher, phrase, msg.business_id, intent).await;
        match outcome.candidates.len() {
            0 => resolved.push(phrase.clone()),
            1 => resolved.push(outcome.candidates[0].name.clone()),
            _ => ambiguous.push(AmbiguousMatch {
                phrase: phrase.clone(),
                candidates: outcome.candidates,
            }),
        }
    }

    MatchedPhrases { resolved, ambiguous }
}

pub async fn handle(
    engine: &ConversationEngine,
    msg: &InboundMessage,
) -> Result<TurnReply, EngineError> {
    let existing = engine.preferences.get(msg.user_id, msg.session_id).await?;
    let step = existing.as_ref().map(|r| r.step).unwrap_or(ConversationStep::NotStarted);

    // A pending disambiguation always gets the next word, whether it came
    // from initial collection or an active-mode amendment.
    match step {
        ConversationStep::DisambiguationPending | ConversationStep::DisambiguationClarifying => {
            return disambiguation::handle(engine, msg, existing).await;
        }
        ConversationStep::PreferencesActive => {
            if engine
                .disambiguations
                .get_pending(msg.user_id, msg.session_id)
                .await?
                .is_some()
            {
                return disambiguation::handle(engine, msg, existing).await;
            }
            return update::handle(engine, msg, existing).await;
        }
        _ => {}
    }

    collect(engine, msg, existing, step).await
}

/// Initial and follow-up collection turns.
async fn collect(
    engine: &ConversationEngine,
    msg: &InboundMessage,
    existing: Option<PreferenceRecord>,
    step: ConversationStep,
) -> Result<TurnReply, EngineError> {
    // A bare check-in ping before anything was said gets the greeting.
    if msg.text.trim().is_empty() && existing.is_none() {
        return Ok(TurnReply {
            reply: preference_prompt(None),
            step: ConversationStep::NotStarted,
        });
    }

    let parsed = parse_with_timeout(&engine.parser, &msg.text).await;
    let is_followup = step == ConversationStep::FollowupSent;

    let avoid_phrases = parsed.avoid_exercises.clone().unwrap_or_default();
    let include_phrases = parsed.include_exercises.clone().unwrap_or_default();

    // Matcher lookups are independent reads; run both intents concurrently.
    let (avoid, include) = tokio::join!(
        match_phrases(engine, msg, &avoid_phrases, MatchIntent::Avoid),
        match_phrases(engine, msg, &include_phrases, MatchIntent::Include),
    );

    // The follow-up turn cannot branch into disambiguation (the table goes
    // straight to active), so its ambiguous phrases are noted as typed.
    if (!avoid.ambiguous.is_empty() || !include.ambiguous.is_empty()) && !is_followup {
        let mut ambiguous = avoid.ambiguous;
        ambiguous.extend(include.ambiguous);
        return start_disambiguation(engine, msg, existing.as_ref(), step, &parsed, avoid.resolved, ambiguous)
            .await;
    }

    // Replace raw phrases with what the matcher resolved, keeping the
    // absent-vs-cleared distinction the parser reported.
    let mut effective = parsed.clone();
    if effective.avoid_exercises.is_some() {
        let mut names = avoid.resolved;
        names.extend(avoid.ambiguous.into_iter().map(|m| m.phrase));
        effective.avoid_exercises = Some(names);
    }
    if effective.include_exercises.is_some() {
        let mut names = include.resolved;
        names.extend(include.ambiguous.into_iter().map(|m| m.phrase));
        effective.include_exercises = Some(names);
    }

    let mut merged = merge(existing.as_ref(), &effective);
    merged.step = if is_followup {
        engine.apply_transition(msg, step, ConversationStep::PreferencesActive)
    } else {
        let collected = if step == ConversationStep::NotStarted {
            engine.apply_transition(msg, step, ConversationStep::InitialCollected)
        } else {
            step
        };
        engine.apply_transition(msg, collected, ConversationStep::FollowupSent)
    };

    engine.save_preferences(msg, &merged).await?;

    let reply = if is_followup {
        followup::final_response().to_string()
    } else {
        followup::followup_question(&merged)
    };

    tracing::info!(
        user_id = %msg.user_id,
        session_id = %msg.session_id,
        step = merged.step.as_str(),
        "collection turn complete"
    );

    Ok(TurnReply { reply, step: merged.step })
}

/// Persist what resolved unambiguously, park the rest in a context, and ask
/// the client to pick by number.
async fn start_disambiguation(
    engine: &ConversationEngine,
    msg: &InboundMessage,
    existing: Option<&PreferenceRecord>,
    step: ConversationStep,
    parsed: &PartialPreferences,
    resolved_avoids: Vec<String>,
    ambiguous: Vec<AmbiguousMatch>,
) -> Result<TurnReply, EngineError> {
    // Everything except the ambiguous includes is saved up front so a later
    // abandonment loses nothing.
    let mut partial = parsed.clone();
    partial.include_exercises = None;
    partial.avoid_exercises = parsed.avoid_exercises.as_ref().map(|_| resolved_avoids);

    let mut record = merge(existing, &partial);
    let collected = if step == ConversationStep::NotStarted {
        engine.apply_transition(msg, step, ConversationStep::InitialCollected)
    } else {
        step
    };
    record.step =
        engine.apply_transition(msg, collected, ConversationStep::DisambiguationPending);
    engine.save_preferences(msg, &record).await?;

    let context = DisambiguationContext::from_matches(DisambiguationKind::PreferenceInitial, &ambiguous);
    engine
        .disambiguations
        .put(msg.user_id, msg.session_id, msg.business_id, &context)
        .await?;

    tracing::info!(
        user_id = %msg.user_id,
        session_id = %msg.session_id,
        ambiguous_phrases = context.phrases.len(),
        options = context.options.len(),
        "disambiguation required"
    );

    Ok(TurnReply { reply: selection_prompt(&ambiguous), step: record.step })
}
