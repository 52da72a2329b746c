use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use posecoach_contracts::pose::{AnalysisResult, Gender, PoseFeedback, PoseLandmarks, Style};

pub mod capture;
pub mod config;
pub mod driver;
pub mod overlay;

mod dryrun;
mod gemini;
mod prompts;

pub use capture::{CaptureDevice, StillCapture};
pub use config::EngineConfig;
pub use driver::{DispatchReport, SessionDriver};
pub use dryrun::DryrunPoseService;
pub use gemini::GeminiPoseService;

/// The remote vision/generation service.
///
/// Calls block until the service answers or the request times out.
/// Implementations must treat malformed structured output as an error.
pub trait PoseService: Send + Sync {
    fn name(&self) -> &str;

    fn analyze_scene(&self, image: &[u8], gender: Gender, style: Style) -> Result<AnalysisResult>;

    /// Returns encoded image bytes depicting the pose.
    fn generate_reference(
        &self,
        pose_description: &str,
        gender: Gender,
        style: Style,
    ) -> Result<Vec<u8>>;

    fn evaluate_match(&self, image: &[u8], target_pose_description: &str)
        -> Result<PoseFeedback>;

    /// `Ok(None)` means no pose could be located, which is not a failure.
    fn extract_landmarks(&self, image: &[u8]) -> Result<Option<PoseLandmarks>>;
}

#[derive(Default)]
pub struct ServiceRegistry {
    services: BTreeMap<String, Arc<dyn PoseService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: PoseService + 'static>(&mut self, service: S) {
        self.services
            .insert(service.name().to_string(), Arc::new(service));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PoseService>> {
        self.services.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }
}

pub fn default_service_registry(config: &EngineConfig) -> ServiceRegistry {
    let mut services = ServiceRegistry::new();
    services.register(DryrunPoseService::new());
    services.register(GeminiPoseService::new(config));
    services
}

/// Looks up the service named by `config.provider`.
pub fn service_from_config(config: &EngineConfig) -> Result<Arc<dyn PoseService>> {
    let registry = default_service_registry(config);
    let Some(service) = registry.get(&config.provider) else {
        bail!(
            "unknown provider '{}' (available: {})",
            config.provider,
            registry.names().join(", ")
        );
    };
    Ok(service)
}

pub(crate) fn timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
