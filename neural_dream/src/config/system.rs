//! Scene optimization system configuration.

use burn::config::Config;
use serde_json::Value;

use super::schedule::LossWeights;

fn empty_options() -> Value {
    Value::Object(Default::default())
}

/// Configuration of the latent-space scene optimization system.
///
/// Each component is named by a registry tag and receives its own options
/// record, which the component's factory deserializes into its typed config.
#[derive(Config, Debug)]
pub struct SystemConfig {
    /// Geometry registry tag.
    #[config(default = "String::from(\"implicit-volume\")")]
    pub geometry_type: String,

    /// Geometry options.
    #[config(default = "empty_options()")]
    pub geometry: Value,

    /// Material registry tag.
    #[config(default = "String::from(\"no-material\")")]
    pub material_type: String,

    /// Material options.
    #[config(default = "empty_options()")]
    pub material: Value,

    /// Background registry tag.
    #[config(default = "String::from(\"solid-color-background\")")]
    pub background_type: String,

    /// Background options.
    #[config(default = "empty_options()")]
    pub background: Value,

    /// Renderer registry tag.
    #[config(default = "String::from(\"nerf-volume-renderer\")")]
    pub renderer_type: String,

    /// Renderer options.
    #[config(default = "empty_options()")]
    pub renderer: Value,

    /// Guidance registry tag.
    #[config(default = "String::from(\"score-distillation-guidance\")")]
    pub guidance_type: String,

    /// Guidance options.
    #[config(default = "empty_options()")]
    pub guidance: Value,

    /// Prompt processor registry tag.
    #[config(default = "String::from(\"dreamfusion-prompt-processor\")")]
    pub prompt_processor_type: String,

    /// Prompt processor options.
    #[config(default = "empty_options()")]
    pub prompt_processor: Value,

    /// Optional OBJ file used as a shape prior.
    pub guide_shape: Option<String>,

    /// Render in pixel space instead of latent space.
    #[config(default = false)]
    pub refinement: bool,

    /// Loss weights by term name.
    #[config(default = "LossWeights::latent_nerf()")]
    pub loss: LossWeights,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        let tags = [
            ("geometry_type", &self.geometry_type),
            ("material_type", &self.material_type),
            ("background_type", &self.background_type),
            ("renderer_type", &self.renderer_type),
            ("guidance_type", &self.guidance_type),
            ("prompt_processor_type", &self.prompt_processor_type),
        ];
        for (field, tag) in tags {
            if tag.is_empty() {
                return Err(format!("{field} must not be empty"));
            }
        }

        let options = [
            ("geometry", &self.geometry),
            ("material", &self.material),
            ("background", &self.background),
            ("renderer", &self.renderer),
            ("guidance", &self.guidance),
            ("prompt_processor", &self.prompt_processor),
        ];
        for (field, value) in options {
            if !value.is_object() {
                return Err(format!("{field} options must be a JSON object"));
            }
        }

        if let Some(path) = &self.guide_shape {
            if path.is_empty() {
                return Err("guide_shape must not be empty when set".to_string());
            }
        }

        Ok(())
    }
}
