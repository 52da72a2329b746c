use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightingQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClutterLevel {
    Clean,
    Moderate,
    Cluttered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lighting {
    pub quality: LightingQuality,
    pub direction: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Background {
    pub clutter_level: ClutterLevel,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedPose {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub steps: Vec<String>,
}

impl SuggestedPose {
    /// Text handed to reference generation and grading as the target pose.
    pub fn target_description(&self) -> String {
        let mut text = format!("{}: {}", self.title, self.description);
        if !self.steps.is_empty() {
            text.push_str(" Steps: ");
            text.push_str(&self.steps.join("; "));
        }
        text
    }
}

/// Scene analysis returned by one analyze cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub environment: String,
    pub lighting: Lighting,
    pub background: Background,
    pub suggested_pose: SuggestedPose,
}

impl AnalysisResult {
    /// Parses the structured payload returned by the remote service.
    ///
    /// Unknown enum labels, missing fields, blank text fields and a pose with
    /// no usable steps are all rejected.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let mut parsed: AnalysisResult = serde_json::from_value(value.clone())
            .map_err(|err| format!("analysis payload malformed: {err}"))?;

        parsed.environment = required_text("environment", &parsed.environment)?;
        parsed.lighting.direction = required_text("lighting.direction", &parsed.lighting.direction)?;
        parsed.lighting.suggestion =
            required_text("lighting.suggestion", &parsed.lighting.suggestion)?;
        parsed.background.suggestion =
            required_text("background.suggestion", &parsed.background.suggestion)?;
        let pose = &mut parsed.suggested_pose;
        pose.title = required_text("suggestedPose.title", &pose.title)?;
        pose.description = required_text("suggestedPose.description", &pose.description)?;
        pose.steps = pose
            .steps
            .iter()
            .map(|step| step.trim().to_string())
            .filter(|step| !step.is_empty())
            .collect();
        if pose.steps.is_empty() {
            return Err("analysis payload malformed: suggestedPose.steps is empty".to_string());
        }
        Ok(parsed)
    }
}

pub(crate) fn required_text(field: &str, raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(format!("payload malformed: {field} is blank"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AnalysisResult, ClutterLevel, Difficulty, LightingQuality};

    fn payload() -> serde_json::Value {
        json!({
            "environment": "Bedroom",
            "lighting": {
                "quality": "Good",
                "direction": "Window light from the left",
                "suggestion": "Turn slightly toward the window",
            },
            "background": {
                "clutterLevel": "Moderate",
                "suggestion": "Move the laundry basket out of frame",
            },
            "suggestedPose": {
                "title": "Candid Lean",
                "description": "Lean against the wall with one shoulder",
                "difficulty": "Easy",
                "steps": ["Rest a shoulder on the wall", "  ", "Cross one ankle", "Look off camera"],
            },
        })
    }

    #[test]
    fn analysis_parses_camel_case_payload() {
        let parsed = AnalysisResult::from_value(&payload()).unwrap();
        assert_eq!(parsed.environment, "Bedroom");
        assert_eq!(parsed.lighting.quality, LightingQuality::Good);
        assert_eq!(parsed.background.clutter_level, ClutterLevel::Moderate);
        assert_eq!(parsed.suggested_pose.difficulty, Difficulty::Easy);
        assert_eq!(parsed.suggested_pose.steps.len(), 3);
    }

    #[test]
    fn analysis_rejects_unknown_enum_label() {
        let mut raw = payload();
        raw["lighting"]["quality"] = json!("Spectacular");
        let err = AnalysisResult::from_value(&raw).err().unwrap_or_default();
        assert!(err.contains("malformed"), "unexpected: {err}");
    }

    #[test]
    fn analysis_rejects_blank_title_and_empty_steps() {
        let mut raw = payload();
        raw["suggestedPose"]["title"] = json!("   ");
        assert!(AnalysisResult::from_value(&raw).is_err());

        let mut raw = payload();
        raw["suggestedPose"]["steps"] = json!([" ", ""]);
        let err = AnalysisResult::from_value(&raw).err().unwrap_or_default();
        assert!(err.contains("steps is empty"), "unexpected: {err}");
    }

    #[test]
    fn target_description_includes_steps() {
        let parsed = AnalysisResult::from_value(&payload()).unwrap();
        let text = parsed.suggested_pose.target_description();
        assert!(text.starts_with("Candid Lean: Lean against the wall"));
        assert!(text.contains("Cross one ankle; Look off camera"));
    }
}
