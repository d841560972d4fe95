use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Parameters for a single txt2img generation.
///
/// Only the prompt is required. Every other field is an override: `None`
/// falls back to the client's [`GenerationDefaults`](crate::GenerationDefaults),
/// while `Some(value)` is sent as-is, so `seed(0)` really means seed 0.
///
/// # Example
/// ```
/// use drawthings_rs::GenerationRequest;
///
/// let request = GenerationRequest::new("A red cube")
///     .size(256, 256)
///     .steps(10)
///     .seed(7)
///     .model("standard");
///
/// assert_eq!(request.width, Some(256));
/// assert_eq!(request.sampler, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub steps: Option<u32>,
    pub seed: Option<i64>,
    pub model: Option<String>,
    pub guidance_scale: Option<f64>,
    pub sampler: Option<String>,
    pub clip_skip: Option<u32>,
    pub loras: Option<Vec<String>>,
}

impl GenerationRequest {
    /// Create a request with a prompt and no overrides.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Set the negative prompt.
    pub fn negative(mut self, prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(prompt.into());
        self
    }

    /// Set output dimensions.
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Set the number of sampling steps.
    pub fn steps(mut self, steps: u32) -> Self {
        self.steps = Some(steps);
        self
    }

    /// Set a specific seed. -1 asks the service for a random one.
    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the model identifier.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the classifier-free guidance scale.
    pub fn guidance_scale(mut self, cfg: f64) -> Self {
        self.guidance_scale = Some(cfg);
        self
    }

    /// Set the sampler (e.g. "DPM++ 2M Karras", "Euler a").
    pub fn sampler(mut self, sampler: impl Into<String>) -> Self {
        self.sampler = Some(sampler.into());
        self
    }

    /// Set how many late CLIP layers to skip.
    pub fn clip_skip(mut self, clip_skip: u32) -> Self {
        self.clip_skip = Some(clip_skip);
        self
    }

    /// Set the LoRA list. An empty list overrides any configured LoRAs.
    pub fn loras<I, S>(mut self, loras: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.loras = Some(loras.into_iter().map(Into::into).collect());
        self
    }
}

/// Base64-encoded images returned by one txt2img call, in service order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub images: Vec<String>,
}

impl GenerationResult {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// An image written to disk by [`DrawThingsClient::save`](crate::DrawThingsClient::save).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedImage {
    /// 1-based position in the saved batch.
    pub index: usize,
    pub path: PathBuf,
}

/// What happened to one model in a per-model batch.
#[derive(Debug)]
pub enum ModelOutcome {
    /// Generation and save succeeded.
    Saved(Vec<SavedImage>),
    /// Generation or save failed; the batch moved on.
    Failed(GenerationError),
}

/// Per-model entry of a [`BatchReport`].
#[derive(Debug)]
pub struct ModelReport {
    pub model: String,
    pub outcome: ModelOutcome,
}

impl ModelReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ModelOutcome::Saved(_))
    }
}

/// Result of [`DrawThingsClient::generate_for_each_model`](crate::DrawThingsClient::generate_for_each_model).
///
/// Entries are in model-list order. Models not reached because the batch was
/// cancelled have no entry.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<ModelReport>,
    pub cancelled: bool,
}

impl BatchReport {
    /// Every saved image across all successful models, in model-list order.
    pub fn saved_images(&self) -> Vec<&SavedImage> {
        self.items
            .iter()
            .filter_map(|item| match &item.outcome {
                ModelOutcome::Saved(images) => Some(images.iter()),
                ModelOutcome::Failed(_) => None,
            })
            .flatten()
            .collect()
    }

    /// Paths of [`saved_images`](Self::saved_images).
    pub fn saved_paths(&self) -> Vec<PathBuf> {
        self.saved_images()
            .into_iter()
            .map(|img| img.path.clone())
            .collect()
    }

    /// `(model, error)` for every model that failed.
    pub fn failures(&self) -> Vec<(&str, &GenerationError)> {
        self.items
            .iter()
            .filter_map(|item| match &item.outcome {
                ModelOutcome::Failed(err) => Some((item.model.as_str(), err)),
                ModelOutcome::Saved(_) => None,
            })
            .collect()
    }

    /// True when no model failed and the batch ran to the end.
    pub fn is_complete_success(&self) -> bool {
        !self.cancelled && self.items.iter().all(ModelReport::is_success)
    }
}
