use std::env;
use std::time::Duration;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Engine settings resolved from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub provider: String,
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub vision_model: Option<String>,
    pub image_model: Option<String>,
    /// Per HTTP request, seconds.
    pub request_timeout_s: f64,
    pub transport_retries: usize,
    pub retry_backoff_s: f64,
    /// Whole analyze/grade pipeline, seconds.
    pub pipeline_timeout_s: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: "dryrun".to_string(),
            gemini_api_key: None,
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            vision_model: None,
            image_model: None,
            request_timeout_s: 90.0,
            transport_retries: 2,
            retry_backoff_s: 1.2,
            pipeline_timeout_s: 240.0,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolves settings through `lookup` so tests don't touch process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let gemini_api_key = get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY"));
        let provider = get("POSECOACH_PROVIDER")
            .map(|value| value.to_ascii_lowercase())
            .unwrap_or_else(|| {
                if gemini_api_key.is_some() {
                    "gemini".to_string()
                } else {
                    defaults.provider.clone()
                }
            });

        Self {
            provider,
            gemini_api_key,
            gemini_api_base: get("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.gemini_api_base),
            vision_model: get("POSECOACH_VISION_MODEL"),
            image_model: get("POSECOACH_IMAGE_MODEL"),
            request_timeout_s: parse_clamped(
                get("POSECOACH_REQUEST_TIMEOUT"),
                defaults.request_timeout_s,
                5.0,
                300.0,
            ),
            transport_retries: parse_clamped(
                get("POSECOACH_TRANSPORT_RETRIES"),
                defaults.transport_retries as f64,
                0.0,
                4.0,
            )
            .round() as usize,
            retry_backoff_s: parse_clamped(
                get("POSECOACH_RETRY_BACKOFF"),
                defaults.retry_backoff_s,
                0.1,
                10.0,
            ),
            pipeline_timeout_s: parse_clamped(
                get("POSECOACH_PIPELINE_TIMEOUT"),
                defaults.pipeline_timeout_s,
                10.0,
                900.0,
            ),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_s)
    }

    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.pipeline_timeout_s)
    }
}

fn parse_clamped(raw: Option<String>, default: f64, min: f64, max: f64) -> f64 {
    raw.and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
        .clamp(min, max)
}
