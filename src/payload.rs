use serde::{Deserialize, Serialize};

use crate::config::GenerationDefaults;
use crate::error::{GenerationError, Result};
use crate::types::GenerationRequest;

/// Denoising strength sent with every txt2img call. Only consulted by the
/// service when high-res fix is on, which this client never enables.
pub const DENOISING_STRENGTH: f64 = 0.75;

/// A LoRA entry in the request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraRef {
    pub model: String,
}

/// JSON body of a txt2img POST.
///
/// Produced by [`Txt2ImgPayload::resolve`], which merges a
/// [`GenerationRequest`] over the configured defaults.
///
/// # Example
/// ```
/// use drawthings_rs::{GenerationDefaults, GenerationRequest, Txt2ImgPayload};
///
/// let request = GenerationRequest::new("a cat in space").size(512, 768).seed(42);
/// let payload = Txt2ImgPayload::resolve(&request, &GenerationDefaults::default()).unwrap();
///
/// assert_eq!(payload.width, 512);
/// assert_eq!(payload.batch_size, 1);
/// assert!(payload.loras.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Txt2ImgPayload {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    pub sampler_name: String,
    pub seed: i64,
    pub clip_skip: u32,
    pub model: String,
    pub batch_size: u32,
    pub n_iter: u32,
    pub restore_faces: bool,
    pub enable_hr: bool,
    pub denoising_strength: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loras: Vec<LoraRef>,
}

impl Txt2ImgPayload {
    /// Fill unset request fields from `defaults` and validate the result.
    ///
    /// Width, height and steps must be positive. The seed is passed through
    /// untouched, including 0 and -1.
    pub fn resolve(request: &GenerationRequest, defaults: &GenerationDefaults) -> Result<Self> {
        let width = request.width.unwrap_or(defaults.width);
        let height = request.height.unwrap_or(defaults.height);
        let steps = request.steps.unwrap_or(defaults.steps);

        for (name, value) in [("width", width), ("height", height), ("steps", steps)] {
            if value == 0 {
                return Err(GenerationError::InvalidRequest(format!(
                    "{} must be positive",
                    name
                )));
            }
        }

        let loras = request
            .loras
            .as_ref()
            .unwrap_or(&defaults.loras)
            .iter()
            .map(|name| LoraRef {
                model: name.clone(),
            })
            .collect();

        Ok(Self {
            prompt: request.prompt.clone(),
            negative_prompt: request
                .negative_prompt
                .clone()
                .unwrap_or_else(|| defaults.negative_prompt.clone()),
            width,
            height,
            steps,
            cfg_scale: request.guidance_scale.unwrap_or(defaults.guidance_scale),
            sampler_name: request
                .sampler
                .clone()
                .unwrap_or_else(|| defaults.sampler.clone()),
            seed: request.seed.unwrap_or(defaults.seed),
            clip_skip: request.clip_skip.unwrap_or(defaults.clip_skip),
            model: request
                .model
                .clone()
                .unwrap_or_else(|| defaults.model.clone()),
            batch_size: 1,
            n_iter: 1,
            restore_faces: false,
            enable_hr: false,
            denoising_strength: DENOISING_STRENGTH,
            loras,
        })
    }
}
