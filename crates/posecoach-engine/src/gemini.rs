use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use posecoach_contracts::data_url::sniff_mime;
use posecoach_contracts::models::{ModelSelector, CAPABILITY_IMAGE, CAPABILITY_VISION};
use posecoach_contracts::pose::{AnalysisResult, Gender, PoseFeedback, PoseLandmarks, Style};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};

use crate::config::EngineConfig;
use crate::prompts;
use crate::PoseService;

const PROVIDER: &str = "gemini";

pub struct GeminiPoseService {
    api_base: String,
    api_key: Option<String>,
    vision_model: String,
    image_model: String,
    request_timeout: Duration,
    transport_retries: usize,
    retry_backoff_s: f64,
    http: HttpClient,
}

impl GeminiPoseService {
    pub fn new(config: &EngineConfig) -> Self {
        let selector = ModelSelector::new(None);
        let vision_model = select_model(&selector, config.vision_model.as_deref(), CAPABILITY_VISION)
            .unwrap_or_else(|| "gemini-2.5-flash".to_string());
        let image_model = select_model(&selector, config.image_model.as_deref(), CAPABILITY_IMAGE)
            .unwrap_or_else(|| "gemini-2.5-flash-image".to_string());
        Self {
            api_base: config.gemini_api_base.clone(),
            api_key: config.gemini_api_key.clone(),
            vision_model,
            image_model,
            request_timeout: config.request_timeout(),
            transport_retries: config.transport_retries,
            retry_backoff_s: config.retry_backoff_s,
            http: HttpClient::new(),
        }
    }

    pub fn vision_model(&self) -> &str {
        &self.vision_model
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("GEMINI_API_KEY or GOOGLE_API_KEY not set"))
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn post_with_transport_retries(&self, endpoint: &str, payload: &Value) -> Result<HttpResponse> {
        let api_key = self.api_key()?;
        for attempt in 0..=self.transport_retries {
            let response = self
                .http
                .post(endpoint)
                .query(&[("key", api_key)])
                .timeout(self.request_timeout)
                .json(payload)
                .send();

            match response {
                Ok(ok) => return Ok(ok),
                Err(raw) => {
                    let err = anyhow::Error::new(raw)
                        .context(format!("Gemini request failed ({endpoint})"));
                    if !is_retryable_transport_error(&err) || attempt >= self.transport_retries {
                        return Err(err);
                    }
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.transport_retries,
                        "Gemini transport retry after transient request failure"
                    );
                    let delay_s = self.retry_backoff_s * (attempt as f64 + 1.0);
                    thread::sleep(Duration::from_secs_f64(delay_s));
                }
            }
        }

        unreachable!("Gemini transport retry loop should always return a response or error")
    }

    /// One `generateContent` call constrained to `schema`; returns the parsed JSON.
    fn generate_json(&self, image: &[u8], instruction: String, schema: Value) -> Result<Value> {
        let endpoint = self.endpoint_for_model(&self.vision_model);
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [image_part(image), {"text": instruction}],
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
                "temperature": 0.4,
            },
        });
        tracing::debug!(model = %self.vision_model, bytes = image.len(), "Gemini structured request");
        let response = self.post_with_transport_retries(&endpoint, &payload)?;
        let response_payload = response_json_or_error("Gemini", response)?;
        let text = extract_text(&response_payload);
        if text.trim().is_empty() {
            bail!("Gemini returned no structured result");
        }
        parse_json_text(&text).ok_or_else(|| anyhow!("Gemini returned invalid JSON payload"))
    }
}

impl PoseService for GeminiPoseService {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn analyze_scene(&self, image: &[u8], gender: Gender, style: Style) -> Result<AnalysisResult> {
        let value = self.generate_json(
            image,
            prompts::analyze_instruction(gender, style),
            prompts::analysis_schema(),
        )?;
        AnalysisResult::from_value(&value).map_err(|err| anyhow!(err))
    }

    fn generate_reference(
        &self,
        pose_description: &str,
        gender: Gender,
        style: Style,
    ) -> Result<Vec<u8>> {
        let endpoint = self.endpoint_for_model(&self.image_model);
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": prompts::reference_instruction(pose_description, gender, style)}],
            }],
            "generationConfig": {
                "candidateCount": 1,
                "responseModalities": ["IMAGE"],
                "imageConfig": {"aspectRatio": "3:4"},
            },
        });
        tracing::debug!(model = %self.image_model, "Gemini reference image request");
        let response = self.post_with_transport_retries(&endpoint, &payload)?;
        let response_payload = response_json_or_error("Gemini", response)?;
        extract_image_items(&response_payload)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Gemini returned no images"))
    }

    fn evaluate_match(
        &self,
        image: &[u8],
        target_pose_description: &str,
    ) -> Result<PoseFeedback> {
        let value = self.generate_json(
            image,
            prompts::evaluate_instruction(target_pose_description),
            prompts::feedback_schema(),
        )?;
        PoseFeedback::from_value(&value).map_err(|err| anyhow!(err))
    }

    fn extract_landmarks(&self, image: &[u8]) -> Result<Option<PoseLandmarks>> {
        let value = self.generate_json(
            image,
            prompts::landmarks_instruction(),
            prompts::landmarks_schema(),
        )?;
        Ok(PoseLandmarks::from_value(&value))
    }
}

fn select_model(selector: &ModelSelector, requested: Option<&str>, capability: &str) -> Option<String> {
    match selector.select(PROVIDER, requested, capability) {
        Ok(selection) => {
            if let (Some(reason), Some(_)) = (&selection.fallback_reason, &selection.requested) {
                tracing::warn!(model = %selection.model.name, "{reason}");
            }
            Some(selection.model.name)
        }
        Err(err) => {
            tracing::warn!("{err}");
            None
        }
    }
}

fn image_part(bytes: &[u8]) -> Value {
    let mime = match sniff_mime(bytes) {
        "application/octet-stream" => "image/jpeg",
        mime => mime,
    };
    json!({
        "inlineData": {
            "mimeType": mime,
            "data": BASE64.encode(bytes),
        }
    })
}

fn candidate_parts(response_payload: &Value) -> Vec<Value> {
    response_payload
        .get("candidates")
        .and_then(Value::as_array)
        .map(|candidates| {
            candidates
                .iter()
                .filter_map(|candidate| {
                    candidate
                        .get("content")
                        .and_then(|content| content.get("parts"))
                        .and_then(Value::as_array)
                })
                .flatten()
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn extract_text(response_payload: &Value) -> String {
    candidate_parts(response_payload)
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<&str>>()
        .join("")
}

fn extract_image_items(response_payload: &Value) -> Result<Vec<Vec<u8>>> {
    let mut out = Vec::new();
    for part in candidate_parts(response_payload) {
        let inline = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let bytes = BASE64
            .decode(data.as_bytes())
            .context("Gemini image base64 decode failed")?;
        out.push(bytes);
    }
    Ok(out)
}

fn parse_json_text(text: &str) -> Option<Value> {
    let raw = strip_code_fence(text);
    if let Ok(parsed) = serde_json::from_str::<Value>(&raw) {
        if parsed.is_object() {
            return Some(parsed);
        }
    }
    let (start, end) = (raw.find('{')?, raw.rfind('}')?);
    if end <= start {
        return None;
    }
    serde_json::from_str::<Map<String, Value>>(&raw[start..=end])
        .ok()
        .map(Value::Object)
}

fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().trim_end_matches("```").trim().to_string()
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn is_retryable_transport_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map(|reqwest_err| {
                reqwest_err.is_timeout() || reqwest_err.is_connect() || reqwest_err.is_request()
            })
            .unwrap_or(false)
    })
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
