//! Active-mode amendments: once a session reaches `preferences_active`,
//! every message is read as a possible incremental change to the record.

use coachline_core::disambiguation::{
    DisambiguationContext, DisambiguationKind, selection_prompt,
};
use coachline_core::error::EngineError;
use coachline_core::followup;
use coachline_core::merge::merge;
use coachline_core::messages::{InboundMessage, TurnReply};
use coachline_core::preferences::PreferenceRecord;
use coachline_core::steps::ConversationStep;
use coachline_core::update::{self, ExerciseAction, UpdatedField};

use super::{ConversationEngine, legacy};
use crate::collaborators::MatchIntent;

pub async fn handle(
    engine: &ConversationEngine,
    msg: &InboundMessage,
    existing: Option<PreferenceRecord>,
) -> Result<TurnReply, EngineError> {
    let Some(current) = existing else {
        return Ok(TurnReply {
            reply: "No preferences found for this session. Please send your initial preferences first."
                .to_string(),
            step: ConversationStep::NotStarted,
        });
    };

    let parsed = update::parse_update(&msg.text);
    let mut updates = parsed.updates.clone();
    let mut fields = parsed.fields.clone();

    // Exercise phrases go through the same matcher contract as initial
    // collection; ambiguity re-enters the disambiguation sub-protocol with
    // an update-flavored context.
    if let Some(action) = parsed.exercise_action {
        let intent = match action {
            ExerciseAction::Add => MatchIntent::Include,
            ExerciseAction::Remove => MatchIntent::Avoid,
        };
        let matched =
            legacy::match_phrases(engine, msg, &parsed.exercise_phrases, intent).await;

        if !matched.ambiguous.is_empty() {
            let context = DisambiguationContext::from_matches(
                DisambiguationKind::PreferenceUpdate,
                &matched.ambiguous,
            );
            engine
                .disambiguations
                .put(msg.user_id, msg.session_id, msg.business_id, &context)
                .await?;

            tracing::info!(
                user_id = %msg.user_id,
                session_id = %msg.session_id,
                options = context.options.len(),
                "amendment needs disambiguation"
            );

            return Ok(TurnReply {
                reply: selection_prompt(&matched.ambiguous),
                step: current.step,
            });
        }

        if !matched.resolved.is_empty() {
            match action {
                ExerciseAction::Add => {
                    updates.include_exercises = Some(matched.resolved);
                    fields.push(UpdatedField::IncludeExercises);
                }
                ExerciseAction::Remove => {
                    updates.avoid_exercises = Some(matched.resolved);
                    fields.push(UpdatedField::AvoidExercises);
                }
            }
        }
    }

    if fields.is_empty() {
        let reply = if update::is_general_query(&msg.text) {
            followup::general_query_reply()
        } else {
            followup::nothing_to_change()
        };
        return Ok(TurnReply { reply: reply.to_string(), step: current.step });
    }

    let mut merged = merge(Some(&current), &updates);
    merged.step = engine.apply_transition(msg, current.step, ConversationStep::PreferencesActive);
    engine.save_preferences(msg, &merged).await?;

    tracing::info!(
        user_id = %msg.user_id,
        session_id = %msg.session_id,
        fields = fields.len(),
        "amendment applied"
    );

    Ok(TurnReply { reply: followup::update_confirmation(&fields), step: merged.step })
}
