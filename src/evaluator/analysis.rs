//! Candidate profiling and mood analysis on top of a `TextEvaluator`

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use super::traits::{EvaluationError, TextEvaluator};
use crate::db::schemas::{LeadershipProfile, LeadershipStyle};

/// What the evaluator sees about a candidate
#[derive(Debug, Clone)]
pub struct CandidateInput {
    pub username: String,
    pub manifesto: String,
    pub background: String,
    pub reason_for_contesting: String,
    pub experience: String,
}

/// Collective mood as stored and served
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodReading {
    /// 0 is deeply anxious, 100 highly hopeful
    pub percentage: i32,
    pub sentiment: String,
    pub summary: String,
}

impl Default for MoodReading {
    fn default() -> Self {
        Self {
            percentage: 50,
            sentiment: "Neutral".to_string(),
            summary: "Waiting for enough data to form a consensus.".to_string(),
        }
    }
}

/// Profile returned when no evaluator credential is configured
pub fn mock_profile() -> LeadershipProfile {
    LeadershipProfile {
        personality_summary:
            "Mock Profile: API Key Missing. A determined individual with hidden potential."
                .to_string(),
        strengths: vec![
            "Resilience".to_string(),
            "Ambition".to_string(),
            "Technological Adaptability".to_string(),
        ],
        weaknesses: vec!["Transparency".to_string(), "Experience".to_string()],
        leadership_style: LeadershipStyle::Strategic,
        agenda_score: 75,
    }
}

/// Profile returned when the evaluator fails or answers nonsense
pub fn fallback_profile() -> LeadershipProfile {
    LeadershipProfile {
        personality_summary: "Evaluation unavailable due to neural network congestion."
            .to_string(),
        strengths: vec!["Unknown".to_string()],
        weaknesses: vec!["Unknown".to_string()],
        leadership_style: LeadershipStyle::Diplomatic,
        agenda_score: 50,
    }
}

fn candidate_prompt(input: &CandidateInput) -> String {
    format!(
        r#"Evaluate this candidate for an online election.
Candidate: {}
Manifesto: "{}"
Background: "{}"
Reason for Contesting: "{}"
Experience: "{}"

Analyze their leadership potential.
Return JSON with:
- personalitySummary: 2 sentences describing their political persona.
- strengths: 3 key leadership strengths.
- weaknesses: 2 potential pitfalls.
- leadershipStyle: One of ['Visionary', 'Strategic', 'Aggressive', 'Diplomatic', 'Servant'].
- agendaScore: A number 0-100 representing how well their manifesto aligns with modern digital society values."#,
        input.username,
        input.manifesto,
        input.background,
        input.reason_for_contesting,
        input.experience
    )
}

fn mood_prompt(questions: &[String]) -> String {
    let polls = questions
        .iter()
        .map(|q| format!("\"{}\"", q))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"Analyze the collective mood of these poll questions.
Respond with ONLY a valid JSON object. Do not use Markdown.
Format:
{{
  "percentage": <number 0-100, where 0 is deeply anxious/pessimistic and 100 is highly hopeful/optimistic>,
  "sentiment": "<one word: Anxious, Hopeful, Neutral, Chaotic, Stable, etc.>",
  "summary": "<one short simple sentence describing the vibe. Max 15 words.>"
}}

Polls:
{}"#,
        polls
    )
}

/// Run one evaluation under `timeout`
async fn evaluate_within(
    evaluator: &dyn TextEvaluator,
    prompt: &str,
    timeout: Duration,
) -> Result<serde_json::Value, EvaluationError> {
    tokio::time::timeout(timeout, evaluator.evaluate(prompt))
        .await
        .map_err(|_| EvaluationError::TimedOut)?
}

fn clamp_score(score: f64) -> i32 {
    if score.is_nan() {
        return 50;
    }
    score.round().clamp(0.0, 100.0) as i32
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProfile {
    personality_summary: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    leadership_style: LeadershipStyle,
    agenda_score: f64,
}

/// Produce a leadership profile. Never fails: no evaluator gives the mock
/// profile, any evaluation problem gives the fallback profile.
pub async fn evaluate_candidate(
    evaluator: Option<&dyn TextEvaluator>,
    input: &CandidateInput,
    timeout: Duration,
) -> LeadershipProfile {
    let Some(evaluator) = evaluator else {
        warn!("No evaluator configured, returning mock profile");
        return mock_profile();
    };

    let parsed = evaluate_within(evaluator, &candidate_prompt(input), timeout)
        .await
        .and_then(|value| {
            serde_json::from_value::<RawProfile>(value)
                .map_err(|e| EvaluationError::Parse(e.to_string()))
        });

    match parsed {
        Ok(raw) => LeadershipProfile {
            personality_summary: raw.personality_summary,
            strengths: raw.strengths,
            weaknesses: raw.weaknesses,
            leadership_style: raw.leadership_style,
            agenda_score: clamp_score(raw.agenda_score),
        },
        Err(e) => {
            warn!(error = %e, candidate = %input.username, "Candidate evaluation failed");
            fallback_profile()
        }
    }
}

#[derive(Deserialize)]
struct RawMood {
    percentage: f64,
    sentiment: String,
    summary: String,
}

/// Ask the evaluator for the mood of a batch of poll questions
pub async fn evaluate_mood(
    evaluator: &dyn TextEvaluator,
    questions: &[String],
    timeout: Duration,
) -> Result<MoodReading, EvaluationError> {
    let value = evaluate_within(evaluator, &mood_prompt(questions), timeout).await?;
    let raw: RawMood =
        serde_json::from_value(value).map_err(|e| EvaluationError::Parse(e.to_string()))?;

    let sentiment = raw.sentiment.trim();
    if sentiment.is_empty() {
        return Err(EvaluationError::Parse("empty sentiment".into()));
    }

    Ok(MoodReading {
        percentage: clamp_score(raw.percentage),
        sentiment: sentiment.to_string(),
        summary: raw.summary.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::MockEvaluator;
    use serde_json::json;

    fn input() -> CandidateInput {
        CandidateInput {
            username: "vera".into(),
            manifesto: "Open data".into(),
            background: "Librarian".into(),
            reason_for_contesting: "Transparency".into(),
            experience: "Ten years".into(),
        }
    }

    #[tokio::test]
    async fn test_no_evaluator_gives_mock_profile() {
        let profile = evaluate_candidate(None, &input(), Duration::from_secs(1)).await;
        assert_eq!(profile, mock_profile());
        assert_eq!(profile.agenda_score, 75);
    }

    #[tokio::test]
    async fn test_score_is_clamped() {
        let mock = MockEvaluator::returning(json!({
            "personalitySummary": "Bold.",
            "strengths": ["x"],
            "weaknesses": ["y"],
            "leadershipStyle": "Visionary",
            "agendaScore": 140.4
        }));
        let profile = evaluate_candidate(Some(&mock), &input(), Duration::from_secs(1)).await;
        assert_eq!(profile.agenda_score, 100);
        assert_eq!(profile.leadership_style, LeadershipStyle::Visionary);
    }

    #[tokio::test]
    async fn test_malformed_output_gives_fallback() {
        let mock = MockEvaluator::returning(json!({ "leadershipStyle": "Tyrant" }));
        let profile = evaluate_candidate(Some(&mock), &input(), Duration::from_secs(1)).await;
        assert_eq!(profile, fallback_profile());
    }

    #[tokio::test]
    async fn test_failure_gives_fallback() {
        let mock = MockEvaluator::failing("503");
        let profile = evaluate_candidate(Some(&mock), &input(), Duration::from_secs(1)).await;
        assert_eq!(profile.agenda_score, 50);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mood_parses_and_clamps() {
        let mock = MockEvaluator::returning(json!({
            "percentage": -3,
            "sentiment": " Anxious ",
            "summary": "Everyone is worried."
        }));
        let reading = evaluate_mood(&mock, &["Q?".to_string()], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reading.percentage, 0);
        assert_eq!(reading.sentiment, "Anxious");
    }

    #[tokio::test]
    async fn test_mood_times_out() {
        let mock = MockEvaluator::returning(json!({})).with_delay(Duration::from_secs(5));
        let result = evaluate_mood(&mock, &[], Duration::from_millis(50)).await;
        assert!(matches!(result, Err(EvaluationError::TimedOut)));
    }

    #[test]
    fn test_mood_prompt_lists_questions() {
        let prompt = mood_prompt(&["A?".to_string(), "B?".to_string()]);
        assert!(prompt.ends_with("\"A?\"\n\"B?\""));
    }
}
