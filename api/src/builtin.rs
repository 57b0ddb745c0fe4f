//! Default collaborator implementations the service ships with: a keyword
//! preference parser and a catalog-backed exercise matcher. Deployments
//! that route these concerns to richer services (an LLM parser, a hosted
//! matcher) swap them out at engine construction; the engine only sees the
//! traits.

use std::sync::LazyLock;

use coachline_core::disambiguation::ExerciseOption;
use coachline_core::error::EngineError;
use coachline_core::preferences::{Intensity, PartialPreferences, SessionGoal};
use regex::Regex;
use sqlx::PgPool;
use uuid::Uuid;

use crate::collaborators::{
    BoxFuture, ExerciseMatcher, MatchIntent, MatchMethod, MatchOutcome, OutboundSender,
    PreferenceParser,
};

static LOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(easy|light|low|gentle|recovery|tired)\b|take\s+it\s+easy")
        .expect("valid low regex")
});
static HIGH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(hard|heavy|intense|high|crush|destroy)\b|kick\s+(my\s+)?(butt|ass)|all\s+out")
        .expect("valid high regex")
});
static MODERATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(moderate|medium|normal|regular)\b").expect("valid moderate regex")
});
static STRENGTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(strength|strong)\b").expect("valid strength regex"));
static STABILITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(stability|balance|control)\b").expect("valid stability regex")
});
static MUSCLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(chest|shoulders|arms|legs|glutes|core|abs|triceps|biceps|quads|hamstrings|calves|delts|lats|traps)\b")
        .expect("valid muscle regex")
});
static AVOID_SENTIMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(sore|tired|rest|avoid|skip|lay\s+off)\b").expect("valid avoid regex")
});
static JOINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(knees?|shoulders?|wrists?|elbows?|ankles?|hips?|neck)\b")
        .expect("valid joint regex")
});
static JOINT_ISSUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(hurt|hurting|pain|sore|protect|careful|bad)\b")
        .expect("valid joint-issue regex")
});
static INCLUDE_PHRASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:add|include|do|want)\s+(?:(?:some|the)\s+)?([a-z][a-z '\-]+?)(?:\s+(?:please|today|now)\b|[,.!?]|$)")
        .expect("valid include-phrase regex")
});
static AVOID_PHRASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:avoid|skip|no|without)\s+(?:(?:some|the|any)\s+)?([a-z][a-z '\-]+?)(?:\s+(?:please|today|now)\b|[,.!?]|$)")
        .expect("valid avoid-phrase regex")
});

fn captured_phrases(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_lowercase())
        .filter(|p| p.len() > 2 && !MUSCLE_RE.is_match(p))
        .collect()
}

/// Keyword-driven preference extraction. Deliberately conservative: a field
/// comes back present only when the message clearly mentions it, so the
/// merge engine's absent-means-unchanged rule holds.
pub struct KeywordPreferenceParser;

impl PreferenceParser for KeywordPreferenceParser {
    fn parse<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<PartialPreferences, EngineError>> {
        Box::pin(async move {
            let mut parsed = PartialPreferences::default();

            if LOW_RE.is_match(text) {
                parsed.intensity = Some(Intensity::Low);
            } else if HIGH_RE.is_match(text) {
                parsed.intensity = Some(Intensity::High);
            } else if MODERATE_RE.is_match(text) {
                parsed.intensity = Some(Intensity::Moderate);
            }

            if STABILITY_RE.is_match(text) {
                parsed.session_goal = Some(SessionGoal::Stability);
            } else if STRENGTH_RE.is_match(text) {
                parsed.session_goal = Some(SessionGoal::Strength);
            }

            let muscles: Vec<String> =
                MUSCLE_RE.find_iter(text).map(|m| m.as_str().to_lowercase()).collect();
            if !muscles.is_empty() {
                if AVOID_SENTIMENT_RE.is_match(text) {
                    parsed.muscle_lessens = Some(muscles);
                } else {
                    parsed.muscle_targets = Some(muscles);
                }
            }

            if JOINT_ISSUE_RE.is_match(text) {
                let joints: Vec<String> = JOINT_RE
                    .find_iter(text)
                    .map(|m| m.as_str().to_lowercase().trim_end_matches('s').to_string())
                    .collect();
                if !joints.is_empty() {
                    parsed.avoid_joints = Some(joints);
                }
            }

            let includes = captured_phrases(&INCLUDE_PHRASE_RE, text);
            if !includes.is_empty() {
                parsed.include_exercises = Some(includes);
            }
            let avoids = captured_phrases(&AVOID_PHRASE_RE, text);
            if !avoids.is_empty() {
                parsed.avoid_exercises = Some(avoids);
            }

            Ok(parsed)
        })
    }
}

#[derive(sqlx::FromRow)]
struct CatalogRow {
    id: Uuid,
    name: String,
    exercise_type: Option<String>,
}

/// Matches free-text phrases against a business's exercise catalog: exact
/// name match first, then exercise-type grouping (the step that yields
/// multiple candidates and hence disambiguation), then fuzzy name similarity.
pub struct CatalogExerciseMatcher {
    pool: PgPool,
}

impl CatalogExerciseMatcher {
    pub fn new(pool: PgPool) -> Self {
        CatalogExerciseMatcher { pool }
    }

    fn exercise_type_for(phrase: &str) -> Option<&'static str> {
        match phrase {
            "squat" | "squats" => Some("squat"),
            "lunge" | "lunges" => Some("lunge"),
            "deadlift" | "deadlifts" => Some("deadlift"),
            "row" | "rows" => Some("row"),
            "press" | "presses" | "bench" | "bench press" | "bench presses" => Some("press"),
            "curl" | "curls" => Some("curl"),
            "plank" | "planks" => Some("plank"),
            "carry" | "carries" => Some("carry"),
            "pull-up" | "pull-ups" | "pull up" | "pull ups" | "pullup" | "pullups" => {
                Some("pull_up")
            }
            "push-up" | "push-ups" | "push up" | "push ups" | "pushup" | "pushups" => {
                Some("push_up")
            }
            "dip" | "dips" => Some("dip"),
            "swing" | "swings" => Some("swing"),
            _ => None,
        }
    }
}

const FUZZY_THRESHOLD: f64 = 0.88;

impl ExerciseMatcher for CatalogExerciseMatcher {
    fn match_phrase<'a>(
        &'a self,
        phrase: &'a str,
        business_id: Uuid,
        _intent: MatchIntent,
    ) -> BoxFuture<'a, Result<MatchOutcome, EngineError>> {
        Box::pin(async move {
            let rows = sqlx::query_as::<_, CatalogRow>(
                r#"
                SELECT id, name, exercise_type
                FROM business_exercises
                WHERE business_id = $1
                "#,
            )
            .bind(business_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::ExternalService(e.to_string()))?;

            let normalized = phrase.trim().to_lowercase();

            let exact: Vec<ExerciseOption> = rows
                .iter()
                .filter(|row| row.name.eq_ignore_ascii_case(&normalized))
                .map(|row| ExerciseOption { id: row.id, name: row.name.clone() })
                .collect();
            if !exact.is_empty() {
                return Ok(MatchOutcome { candidates: exact, method: MatchMethod::Exact });
            }

            if let Some(exercise_type) = Self::exercise_type_for(&normalized) {
                let typed: Vec<ExerciseOption> = rows
                    .iter()
                    .filter(|row| row.exercise_type.as_deref() == Some(exercise_type))
                    .map(|row| ExerciseOption { id: row.id, name: row.name.clone() })
                    .collect();
                if !typed.is_empty() {
                    return Ok(MatchOutcome { candidates: typed, method: MatchMethod::Pattern });
                }
            }

            let fuzzy: Vec<ExerciseOption> = rows
                .iter()
                .filter(|row| {
                    strsim::jaro_winkler(&row.name.to_lowercase(), &normalized) >= FUZZY_THRESHOLD
                })
                .map(|row| ExerciseOption { id: row.id, name: row.name.clone() })
                .collect();

            Ok(MatchOutcome { candidates: fuzzy, method: MatchMethod::Pattern })
        })
    }
}

/// Default outbound sender: the reply is already persisted in the message
/// log (which in-app clients read), so this just records the dispatch.
/// Deployments wire the SMS gateway adapter here.
pub struct LoggingSender;

impl OutboundSender for LoggingSender {
    fn send<'a>(&'a self, user_id: Uuid, text: &'a str) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            tracing::info!(user_id = %user_id, chars = text.len(), "outbound reply dispatched");
            Ok(())
        })
    }
}
