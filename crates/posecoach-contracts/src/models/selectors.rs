use super::registry::{ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    pub fn select(
        &self,
        provider: &str,
        requested: Option<&str>,
        capability: &str,
    ) -> Result<ModelSelection, String> {
        let (fallback_reason, requested_text) = if let Some(requested_value) = requested {
            if let Some(model) = self.registry.ensure(provider, requested_value, capability) {
                return Ok(ModelSelection {
                    model,
                    requested: Some(requested_value.to_string()),
                    fallback_reason: None,
                });
            }
            (
                Some(format!(
                    "Requested model '{requested_value}' unavailable for {provider} capability '{capability}'."
                )),
                Some(requested_value.to_string()),
            )
        } else {
            (Some("No model specified; using default.".to_string()), None)
        };

        let candidates = self.registry.by_capability(provider, capability);
        let Some(model) = candidates.first().cloned() else {
            return Err(format!(
                "No {provider} models available for capability '{capability}'."
            ));
        };
        Ok(ModelSelection {
            model,
            requested: requested_text,
            fallback_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::ModelSelector;
    use crate::models::{ModelRegistry, ModelSpec, CAPABILITY_IMAGE, CAPABILITY_VISION};

    fn model(name: &str, provider: &str, capability: &str) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            provider: provider.to_string(),
            capabilities: vec![capability.to_string()],
        }
    }

    #[test]
    fn selector_keeps_requested_model_when_capable() {
        let selection = ModelSelector::new(None)
            .select("gemini", Some("gemini-2.5-pro"), CAPABILITY_VISION)
            .unwrap();
        assert_eq!(selection.model.name, "gemini-2.5-pro");
        assert_eq!(selection.fallback_reason, None);
    }

    #[test]
    fn selector_falls_back_when_requested_model_lacks_capability() {
        let selection = ModelSelector::new(None)
            .select("gemini", Some("gemini-2.5-flash"), CAPABILITY_IMAGE)
            .unwrap();
        assert_eq!(selection.model.name, "gemini-2.5-flash-image");
        assert_eq!(selection.requested.as_deref(), Some("gemini-2.5-flash"));
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'gemini-2.5-flash' unavailable for gemini capability 'image'.")
        );
    }

    #[test]
    fn selector_does_not_cross_providers() {
        let selection = ModelSelector::new(None)
            .select("dryrun", Some("gemini-2.5-flash"), CAPABILITY_VISION)
            .unwrap();
        assert_eq!(selection.model.name, "dryrun-vision-1");
    }

    #[test]
    fn selector_no_request_uses_default_with_explanation() {
        let selection = ModelSelector::new(None)
            .select("gemini", None, CAPABILITY_VISION)
            .unwrap();
        assert_eq!(selection.model.name, "gemini-2.5-flash");
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("No model specified; using default.")
        );
    }

    #[test]
    fn selector_errors_when_no_models_for_capability() {
        let mut models = IndexMap::new();
        models.insert(
            "vision-only".to_string(),
            model("vision-only", "gemini", CAPABILITY_VISION),
        );
        let err = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select("gemini", None, CAPABILITY_IMAGE)
            .err()
            .unwrap_or_default();
        assert_eq!(err, "No gemini models available for capability 'image'.");
    }
}
