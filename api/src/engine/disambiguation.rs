//! Turns that answer a pending disambiguation: classify the reply, clarify
//! once on garbage, abandon on the second failure, resolve valid picks.
//!
//! Out-of-range selections are their own case: the client gets told the
//! valid range, the context survives untouched, and no clarification
//! attempt is spent.

use coachline_core::disambiguation::{
    DisambiguationContext, DisambiguationKind, ParsedReply, clarification_message,
    out_of_range_message, parse_reply, resolution_confirmation, resolve_selections,
};
use coachline_core::error::EngineError;
use coachline_core::followup;
use coachline_core::merge::merge;
use coachline_core::messages::{InboundMessage, TurnReply};
use coachline_core::preferences::{PartialPreferences, PreferenceRecord};
use coachline_core::steps::ConversationStep;
use coachline_core::update::UpdatedField;

use super::ConversationEngine;

pub async fn handle(
    engine: &ConversationEngine,
    msg: &InboundMessage,
    existing: Option<PreferenceRecord>,
) -> Result<TurnReply, EngineError> {
    let step = existing.as_ref().map(|r| r.step).unwrap_or(ConversationStep::NotStarted);

    let Some(context) = engine.disambiguations.get_pending(msg.user_id, msg.session_id).await?
    else {
        return Ok(TurnReply {
            reply: "No pending exercise selection found. Please send your workout preferences again."
                .to_string(),
            step,
        });
    };

    match parse_reply(&msg.text) {
        ParsedReply::Invalid(error) if context.clarification_attempts == 0 => {
            let bumped = DisambiguationContext {
                clarification_attempts: 1,
                ..context.clone()
            };
            engine
                .disambiguations
                .put(msg.user_id, msg.session_id, msg.business_id, &bumped)
                .await?;

            // Initial-collection contexts move the step to clarifying;
            // active-mode contexts leave the record in its self-loop.
            let next = if context.kind == DisambiguationKind::PreferenceInitial {
                let next = engine.apply_transition(
                    msg,
                    step,
                    ConversationStep::DisambiguationClarifying,
                );
                if let Some(record) = existing.as_ref() {
                    let mut record = record.clone();
                    record.step = next;
                    engine.save_preferences(msg, &record).await?;
                }
                next
            } else {
                step
            };

            Ok(TurnReply {
                reply: clarification_message(error, context.options.len()),
                step: next,
            })
        }
        ParsedReply::Invalid(_) => abandon(engine, msg, existing, step, &context).await,
        ParsedReply::Selections(selections) => {
            match resolve_selections(&context, &selections) {
                Err(out_of_range) => Ok(TurnReply {
                    reply: out_of_range_message(&out_of_range, context.options.len()),
                    step,
                }),
                Ok(selected) => {
                    let names: Vec<String> =
                        selected.iter().map(|o| o.name.clone()).collect();
                    let updates = PartialPreferences {
                        include_exercises: Some(names),
                        ..Default::default()
                    };
                    let mut merged = merge(existing.as_ref(), &updates);

                    merged.step = match context.kind {
                        DisambiguationKind::PreferenceInitial => {
                            let resolved = engine.apply_transition(
                                msg,
                                step,
                                ConversationStep::DisambiguationResolved,
                            );
                            engine.apply_transition(msg, resolved, ConversationStep::FollowupSent)
                        }
                        DisambiguationKind::PreferenceUpdate => engine.apply_transition(
                            msg,
                            step,
                            ConversationStep::PreferencesActive,
                        ),
                    };

                    engine.save_preferences(msg, &merged).await?;
                    engine.disambiguations.delete(msg.user_id, msg.session_id).await?;

                    tracing::info!(
                        user_id = %msg.user_id,
                        session_id = %msg.session_id,
                        selected = selected.len(),
                        "disambiguation resolved"
                    );

                    let tail = match context.kind {
                        DisambiguationKind::PreferenceInitial => {
                            followup::followup_question(&merged)
                        }
                        DisambiguationKind::PreferenceUpdate => {
                            followup::update_confirmation(&[UpdatedField::IncludeExercises])
                        }
                    };

                    Ok(TurnReply {
                        reply: format!("{}{tail}", resolution_confirmation(&selected)),
                        step: merged.step,
                    })
                }
            }
        }
    }
}

/// Second failed clarification: give up on the selection, note nothing, and
/// move the conversation along.
async fn abandon(
    engine: &ConversationEngine,
    msg: &InboundMessage,
    existing: Option<PreferenceRecord>,
    step: ConversationStep,
    context: &DisambiguationContext,
) -> Result<TurnReply, EngineError> {
    engine.disambiguations.delete(msg.user_id, msg.session_id).await?;

    tracing::info!(
        user_id = %msg.user_id,
        session_id = %msg.session_id,
        attempts = context.clarification_attempts + 1,
        "abandoning disambiguation after repeated clarification failures"
    );

    match context.kind {
        DisambiguationKind::PreferenceInitial => {
            let mut record = existing.unwrap_or_default();
            let resolved =
                engine.apply_transition(msg, step, ConversationStep::DisambiguationResolved);
            record.step =
                engine.apply_transition(msg, resolved, ConversationStep::FollowupSent);
            engine.save_preferences(msg, &record).await?;

            Ok(TurnReply {
                reply: format!(
                    "I'll note that for your workout. {}",
                    followup::followup_question(&record)
                ),
                step: record.step,
            })
        }
        DisambiguationKind::PreferenceUpdate => Ok(TurnReply {
            reply: "I'll note that for your workout. Let me know if you need any other changes."
                .to_string(),
            step,
        }),
    }
}
