use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_ADJUSTMENTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Perfect,
    Good,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
}

impl MatchStatus {
    pub fn label(self) -> &'static str {
        match self {
            MatchStatus::Perfect => "Perfect",
            MatchStatus::Good => "Good",
            MatchStatus::NeedsImprovement => "Needs Improvement",
        }
    }
}

/// Result of grading one frame against the suggested pose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseFeedback {
    pub score: u8,
    pub match_status: MatchStatus,
    pub adjustments: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFeedback {
    score: f64,
    match_status: MatchStatus,
    #[serde(default)]
    adjustments: Vec<String>,
}

impl PoseFeedback {
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let raw: RawFeedback = serde_json::from_value(value.clone())
            .map_err(|err| format!("feedback payload malformed: {err}"))?;
        if !raw.score.is_finite() {
            return Err("feedback payload malformed: score is not a number".to_string());
        }
        let rounded = raw.score.round();
        if !(0.0..=100.0).contains(&rounded) {
            return Err(format!(
                "feedback payload malformed: score {} outside 0-100",
                raw.score
            ));
        }
        let adjustments = raw
            .adjustments
            .iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .take(MAX_ADJUSTMENTS)
            .collect();
        Ok(Self {
            score: rounded as u8,
            match_status: raw.match_status,
            adjustments,
        })
    }
}
