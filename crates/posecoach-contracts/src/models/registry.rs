use indexmap::IndexMap;

/// Reads an image and answers with structured JSON.
pub const CAPABILITY_VISION: &str = "vision";
/// Produces an image from a prompt.
pub const CAPABILITY_IMAGE: &str = "image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    /// Models for `provider` supporting `capability`, in registration order.
    pub fn by_capability(&self, provider: &str, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.provider == provider && model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, provider: &str, name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.provider == provider && model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, provider: &str, capabilities: &[&str]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
            },
        );
    };

    insert("dryrun-vision-1", "dryrun", &[CAPABILITY_VISION]);
    insert("dryrun-image-1", "dryrun", &[CAPABILITY_IMAGE]);
    insert("gemini-2.5-flash", "gemini", &[CAPABILITY_VISION]);
    insert("gemini-2.5-pro", "gemini", &[CAPABILITY_VISION]);
    insert("gemini-3-pro-preview", "gemini", &[CAPABILITY_VISION]);
    insert("gemini-2.5-flash-image", "gemini", &[CAPABILITY_IMAGE]);
    insert("gemini-3-pro-image-preview", "gemini", &[CAPABILITY_IMAGE]);

    map
}
