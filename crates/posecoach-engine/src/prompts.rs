//! Prompt templates and structured-output schemas for the remote model.

use posecoach_contracts::pose::{BodyPart, Gender, Style};
use serde_json::{json, Map, Value};

pub fn analyze_instruction(gender: Gender, style: Style) -> String {
    format!(
        "You are a professional portrait photographer coaching {subject} in front of a phone camera. \
Study this frame and describe the environment, the lighting (quality, direction, one concrete fix) \
and the background (clutter level, one concrete fix). Then suggest ONE photogenic pose that fits \
the space and a {style} style ({mood}). Give the pose a short catchy title, a one-sentence \
description, a difficulty, and 3-5 short imperative steps. Respond with JSON only.",
        subject = gender.subject(),
        style = style.label().to_ascii_lowercase(),
        mood = style.mood(),
    )
}

pub fn reference_instruction(pose_description: &str, gender: Gender, style: Style) -> String {
    format!(
        "Full-body photo of {subject} demonstrating this pose: {pose_description}. \
Style: {style}, {mood}. Plain light-grey studio backdrop, even soft lighting, the whole body \
visible and centered, camera at chest height, no text or watermarks.",
        subject = gender.subject(),
        style = style.label(),
        mood = style.mood(),
    )
}

pub fn evaluate_instruction(target_pose_description: &str) -> String {
    format!(
        "Compare the person in this photo against the target pose: {target_pose_description}. \
Score how closely they match from 0 to 100, classify the match as Perfect, Good or \
Needs Improvement, and give 2-3 short corrective instructions (under six words each) \
the person can act on immediately. Respond with JSON only."
    )
}

pub fn landmarks_instruction() -> String {
    format!(
        "Locate the body landmarks of the single person in this image. For each of: {} \
return x and y as percentages (0-100) of image width and height, measured from the top-left. \
Omit any landmark you cannot see clearly. If there is no person, return an empty object. \
Respond with JSON only.",
        BodyPart::ALL.map(BodyPart::key).join(", ")
    )
}

fn string_schema() -> Value {
    json!({"type": "STRING"})
}

fn enum_schema(values: &[&str]) -> Value {
    json!({"type": "STRING", "enum": values})
}

pub fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "environment": string_schema(),
            "lighting": {
                "type": "OBJECT",
                "properties": {
                    "quality": enum_schema(&["Excellent", "Good", "Fair", "Poor"]),
                    "direction": string_schema(),
                    "suggestion": string_schema(),
                },
                "required": ["quality", "direction", "suggestion"],
            },
            "background": {
                "type": "OBJECT",
                "properties": {
                    "clutterLevel": enum_schema(&["Clean", "Moderate", "Cluttered"]),
                    "suggestion": string_schema(),
                },
                "required": ["clutterLevel", "suggestion"],
            },
            "suggestedPose": {
                "type": "OBJECT",
                "properties": {
                    "title": string_schema(),
                    "description": string_schema(),
                    "difficulty": enum_schema(&["Easy", "Medium", "Hard"]),
                    "steps": {"type": "ARRAY", "items": string_schema()},
                },
                "required": ["title", "description", "difficulty", "steps"],
            },
        },
        "required": ["environment", "lighting", "background", "suggestedPose"],
    })
}

pub fn feedback_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "score": {"type": "INTEGER"},
            "matchStatus": enum_schema(&["Perfect", "Good", "Needs Improvement"]),
            "adjustments": {"type": "ARRAY", "items": string_schema()},
        },
        "required": ["score", "matchStatus", "adjustments"],
    })
}

pub fn landmarks_schema() -> Value {
    let point = json!({
        "type": "OBJECT",
        "properties": {
            "x": {"type": "NUMBER"},
            "y": {"type": "NUMBER"},
        },
        "required": ["x", "y"],
    });
    let mut properties = Map::new();
    for part in BodyPart::ALL {
        properties.insert(part.key().to_string(), point.clone());
    }
    json!({
        "type": "OBJECT",
        "properties": Value::Object(properties),
    })
}

#[cfg(test)]
mod tests {
    use posecoach_contracts::pose::{Gender, Style};
    use serde_json::json;

    use super::{
        analysis_schema, analyze_instruction, feedback_schema, landmarks_instruction,
        landmarks_schema, reference_instruction,
    };

    #[test]
    fn analyze_instruction_mentions_subject_and_style() {
        let text = analyze_instruction(Gender::Male, Style::Streetwear);
        assert!(text.contains("coaching a man"));
        assert!(text.contains("streetwear style (bold, urban and effortless)"));
        assert!(text.contains("JSON only"));
    }

    #[test]
    fn reference_instruction_embeds_pose() {
        let text = reference_instruction("Candid Lean: lean on the wall", Gender::Female, Style::Casual);
        assert!(text.contains("a woman demonstrating this pose: Candid Lean: lean on the wall."));
    }

    #[test]
    fn landmarks_prompt_and_schema_cover_every_part() {
        let text = landmarks_instruction();
        assert!(text.contains("nose, leftShoulder, rightShoulder"));
        let schema = landmarks_schema();
        assert_eq!(schema["properties"].as_object().map(|p| p.len()), Some(9));
        assert_eq!(schema["properties"]["rightHip"]["required"], json!(["x", "y"]));
    }

    #[test]
    fn schemas_use_wire_labels() {
        assert_eq!(
            feedback_schema()["properties"]["matchStatus"]["enum"],
            json!(["Perfect", "Good", "Needs Improvement"])
        );
        assert_eq!(
            analysis_schema()["properties"]["background"]["required"],
            json!(["clutterLevel", "suggestion"])
        );
    }
}
