//! Component registry.
//!
//! Maps string tags from [`SystemConfig`](crate::config::SystemConfig) to
//! constructor closures. Each closure receives the component's JSON option
//! record and the device, and deserializes the options into the
//! component's own typed config.
//!
//! ```ignore
//! let mut registry = Registry::<MyBackend>::with_builtins();
//! registry.register_geometry("my-geometry", |options, device| {
//!     let config: MyGeometryConfig = parse_options("geometry", "my-geometry", options)?;
//!     Ok(Box::new(MyGeometry::new(config, device)?))
//! });
//! ```

use std::collections::BTreeMap;

use burn::prelude::*;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{DreamError, Result};
use crate::models::{
    Background, DreamFusionPromptProcessor, Geometry, Guidance, ImplicitVolume,
    ImplicitVolumeConfig, Material, NerfRendererConfig, NerfVolumeRenderer, NoMaterial,
    NoMaterialConfig, PromptProcessor, PromptProcessorConfig, Renderer, ScoreDistillationConfig,
    ScoreDistillationGuidance, SolidColorBackground, SolidColorBackgroundConfig,
};

/// Constructor closure for one component kind.
pub type Factory<B, T> = Box<dyn Fn(&Value, &<B as Backend>::Device) -> Result<Box<T>>>;

/// Factories of one component kind, keyed by tag.
struct FactoryMap<B: Backend, T: ?Sized> {
    kind: &'static str,
    factories: BTreeMap<String, Factory<B, T>>,
}

impl<B: Backend, T: ?Sized> FactoryMap<B, T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            factories: BTreeMap::new(),
        }
    }

    fn insert(&mut self, name: &str, factory: Factory<B, T>) {
        if self.factories.insert(name.to_string(), factory).is_some() {
            log::warn!("Replacing {} factory '{}'", self.kind, name);
        }
    }

    fn build(&self, name: &str, options: &Value, device: &B::Device) -> Result<Box<T>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| DreamError::UnknownComponent {
                kind: self.kind,
                name: name.to_string(),
            })?;
        log::debug!("Building {} '{}'", self.kind, name);
        factory(options, device)
    }

    fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

/// Deserialize a component's option record into its typed config.
///
/// A JSON `null` is treated as an empty record.
pub fn parse_options<C: DeserializeOwned>(kind: &'static str, name: &str, options: &Value) -> Result<C> {
    let options = match options {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(options).map_err(|source| DreamError::InvalidOptions {
        kind,
        name: name.to_string(),
        source,
    })
}

/// Factories for every component kind.
pub struct Registry<B: Backend> {
    geometry: FactoryMap<B, dyn Geometry<B>>,
    material: FactoryMap<B, dyn Material<B>>,
    background: FactoryMap<B, dyn Background<B>>,
    renderer: FactoryMap<B, dyn Renderer<B>>,
    guidance: FactoryMap<B, dyn Guidance<B>>,
    prompt_processor: FactoryMap<B, dyn PromptProcessor<B>>,
}

impl<B: Backend> Default for Registry<B> {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl<B: Backend> Registry<B> {
    /// Registry with no factories.
    pub fn empty() -> Self {
        Self {
            geometry: FactoryMap::new("geometry"),
            material: FactoryMap::new("material"),
            background: FactoryMap::new("background"),
            renderer: FactoryMap::new("renderer"),
            guidance: FactoryMap::new("guidance"),
            prompt_processor: FactoryMap::new("prompt_processor"),
        }
    }

    /// Registry with the built-in components.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();

        registry.register_geometry("implicit-volume", |options, device| {
            let config: ImplicitVolumeConfig = parse_options("geometry", "implicit-volume", options)?;
            Ok(Box::new(ImplicitVolume::new(config, device)?))
        });
        // "nomaterial" is the spelling older experiment configs use.
        for tag in ["no-material", "nomaterial"] {
            registry.register_material(tag, move |options, _device| {
                let config: NoMaterialConfig = parse_options("material", tag, options)?;
                Ok(Box::new(NoMaterial::new(config)?))
            });
        }
        registry.register_background("solid-color-background", |options, device| {
            let config: SolidColorBackgroundConfig =
                parse_options("background", "solid-color-background", options)?;
            Ok(Box::new(SolidColorBackground::new(config, device)?))
        });
        registry.register_renderer("nerf-volume-renderer", |options, _device| {
            let config: NerfRendererConfig = parse_options("renderer", "nerf-volume-renderer", options)?;
            Ok(Box::new(NerfVolumeRenderer::new(config)?))
        });
        registry.register_guidance("score-distillation-guidance", |options, device| {
            let config: ScoreDistillationConfig =
                parse_options("guidance", "score-distillation-guidance", options)?;
            Ok(Box::new(ScoreDistillationGuidance::new(config, device)?))
        });
        registry.register_prompt_processor("dreamfusion-prompt-processor", |options, device| {
            let config: PromptProcessorConfig =
                parse_options("prompt_processor", "dreamfusion-prompt-processor", options)?;
            Ok(Box::new(DreamFusionPromptProcessor::new(config, device)?))
        });

        registry
    }

    /// Register a geometry factory.
    pub fn register_geometry<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Value, &B::Device) -> Result<Box<dyn Geometry<B>>> + 'static,
    {
        self.geometry.insert(name, Box::new(factory));
    }

    /// Register a material factory.
    pub fn register_material<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Value, &B::Device) -> Result<Box<dyn Material<B>>> + 'static,
    {
        self.material.insert(name, Box::new(factory));
    }

    /// Register a background factory.
    pub fn register_background<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Value, &B::Device) -> Result<Box<dyn Background<B>>> + 'static,
    {
        self.background.insert(name, Box::new(factory));
    }

    /// Register a renderer factory.
    pub fn register_renderer<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Value, &B::Device) -> Result<Box<dyn Renderer<B>>> + 'static,
    {
        self.renderer.insert(name, Box::new(factory));
    }

    /// Register a guidance factory.
    pub fn register_guidance<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Value, &B::Device) -> Result<Box<dyn Guidance<B>>> + 'static,
    {
        self.guidance.insert(name, Box::new(factory));
    }

    /// Register a prompt processor factory.
    pub fn register_prompt_processor<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Value, &B::Device) -> Result<Box<dyn PromptProcessor<B>>> + 'static,
    {
        self.prompt_processor.insert(name, Box::new(factory));
    }

    /// Build a geometry by tag.
    pub fn geometry(&self, name: &str, options: &Value, device: &B::Device) -> Result<Box<dyn Geometry<B>>> {
        self.geometry.build(name, options, device)
    }

    /// Build a material by tag.
    pub fn material(&self, name: &str, options: &Value, device: &B::Device) -> Result<Box<dyn Material<B>>> {
        self.material.build(name, options, device)
    }

    /// Build a background by tag.
    pub fn background(
        &self,
        name: &str,
        options: &Value,
        device: &B::Device,
    ) -> Result<Box<dyn Background<B>>> {
        self.background.build(name, options, device)
    }

    /// Build a renderer by tag.
    pub fn renderer(&self, name: &str, options: &Value, device: &B::Device) -> Result<Box<dyn Renderer<B>>> {
        self.renderer.build(name, options, device)
    }

    /// Build a guidance by tag.
    pub fn guidance(&self, name: &str, options: &Value, device: &B::Device) -> Result<Box<dyn Guidance<B>>> {
        self.guidance.build(name, options, device)
    }

    /// Build a prompt processor by tag.
    pub fn prompt_processor(
        &self,
        name: &str,
        options: &Value,
        device: &B::Device,
    ) -> Result<Box<dyn PromptProcessor<B>>> {
        self.prompt_processor.build(name, options, device)
    }

    /// Registered tags per component kind.
    pub fn names(&self) -> BTreeMap<&'static str, Vec<&str>> {
        BTreeMap::from([
            (self.geometry.kind, self.geometry.names()),
            (self.material.kind, self.material.names()),
            (self.background.kind, self.background.names()),
            (self.renderer.kind, self.renderer.names()),
            (self.guidance.kind, self.guidance.names()),
            (self.prompt_processor.kind, self.prompt_processor.names()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use serde_json::json;

    type TestBackend = NdArray;

    #[test]
    fn test_builtins_registered() {
        let registry = Registry::<TestBackend>::with_builtins();
        let names = registry.names();
        assert_eq!(names["geometry"], vec!["implicit-volume"]);
        assert_eq!(names["guidance"], vec!["score-distillation-guidance"]);
        assert_eq!(names["prompt_processor"], vec!["dreamfusion-prompt-processor"]);
    }

    #[test]
    fn test_build_with_options() {
        let registry = Registry::<TestBackend>::with_builtins();
        let device = Default::default();
        let geometry = registry
            .geometry("implicit-volume", &json!({"grid_resolution": 4, "n_feature_dims": 2}), &device)
            .unwrap();
        assert_eq!(geometry.n_feature_dims(), 2);

        let material = registry.material("no-material", &Value::Null, &device).unwrap();
        assert_eq!(material.n_output_dims(), 4);
    }

    #[test]
    fn test_nomaterial_alias() {
        let registry = Registry::<TestBackend>::with_builtins();
        let material = registry
            .material("nomaterial", &json!({"n_output_dims": 3}), &Default::default())
            .unwrap();
        assert_eq!(material.n_output_dims(), 3);
        assert!(registry.names()["material"].contains(&"nomaterial"));
    }

    #[test]
    fn test_unknown_tag() {
        let registry = Registry::<TestBackend>::with_builtins();
        let err = registry
            .geometry("neus", &json!({}), &Default::default())
            .err()
            .unwrap();
        assert!(matches!(err, DreamError::UnknownComponent { kind: "geometry", .. }));
    }

    #[test]
    fn test_bad_options() {
        let registry = Registry::<TestBackend>::with_builtins();
        let err = registry
            .renderer("nerf-volume-renderer", &json!({"num_samples_per_ray": "many"}), &Default::default())
            .err()
            .unwrap();
        assert!(matches!(err, DreamError::InvalidOptions { kind: "renderer", .. }));
    }

    #[test]
    fn test_custom_factory() {
        let mut registry = Registry::<TestBackend>::empty();
        registry.register_material("wide", |_, _| {
            Ok(Box::new(NoMaterial::new(NoMaterialConfig::new().with_n_output_dims(3))?))
        });
        let material = registry.material("wide", &json!({}), &Default::default()).unwrap();
        assert_eq!(material.n_output_dims(), 3);
        assert!(registry.material("no-material", &json!({}), &Default::default()).is_err());
    }
}
