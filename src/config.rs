use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{GenerationError, Result};

/// Default txt2img endpoint of a local Draw Things / SD-WebUI instance.
pub const DEFAULT_API_URL: &str = "http://localhost:7860/sdapi/v1/txt2img";

const ENV_PREFIX: &str = "DRAWTHINGS_";

/// Generation parameters used when a request leaves a field unset.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationDefaults {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    /// -1 lets the service pick a random seed.
    pub seed: i64,
    pub model: String,
    pub guidance_scale: f64,
    pub sampler: String,
    pub clip_skip: u32,
    pub loras: Vec<String>,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            prompt: "A beautiful sunset over mountains".to_string(),
            negative_prompt: String::new(),
            width: 1088,
            height: 1920,
            steps: 32,
            seed: -1,
            model: "icatcher_realistic_f16.ckpt".to_string(),
            guidance_scale: 5.8,
            sampler: "DPM++ 2M Karras".to_string(),
            clip_skip: 1,
            loras: Vec::new(),
        }
    }
}

/// Process-wide client configuration.
///
/// Built once at startup, either with [`Settings::builder()`] or
/// [`Settings::from_env()`], and handed to
/// [`DrawThingsClient`](crate::DrawThingsClient). It is never mutated
/// afterwards; per-call overrides go through
/// [`GenerationRequest`](crate::GenerationRequest).
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// txt2img endpoint (POST).
    pub api_url: String,
    /// Model-listing endpoint (GET). `None` = sibling `models` path of `api_url`.
    pub models_url: Option<String>,
    /// Per-request timeout (default: 120s).
    pub timeout: Duration,
    /// Default output directory. `None` = current directory.
    pub output_dir: Option<PathBuf>,
    pub defaults: GenerationDefaults,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            models_url: None,
            timeout: Duration::from_secs(120),
            output_dir: None,
            defaults: GenerationDefaults::default(),
        }
    }
}

impl Settings {
    /// Start building settings with the builder pattern.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Load settings from `DRAWTHINGS_*` environment variables, reading a
    /// `.env` file first if one exists. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Settings::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        let mut settings = Settings::default();

        if let Some(url) = get("API_URL") {
            settings.api_url = url;
        }
        settings.models_url = get("MODELS_URL");
        if let Some(secs) = get("TIMEOUT_SECS") {
            settings.timeout = Duration::from_secs(parse_var("TIMEOUT_SECS", &secs)?);
        }
        settings.output_dir = get("OUTPUT_DIR").map(PathBuf::from);

        let d = &mut settings.defaults;
        if let Some(v) = get("PROMPT") {
            d.prompt = v;
        }
        if let Some(v) = get("NEGATIVE_PROMPT") {
            d.negative_prompt = v;
        }
        if let Some(v) = get("WIDTH") {
            d.width = parse_var("WIDTH", &v)?;
        }
        if let Some(v) = get("HEIGHT") {
            d.height = parse_var("HEIGHT", &v)?;
        }
        if let Some(v) = get("STEPS") {
            d.steps = parse_var("STEPS", &v)?;
        }
        if let Some(v) = get("SEED") {
            d.seed = parse_var("SEED", &v)?;
        }
        if let Some(v) = get("MODEL") {
            d.model = v;
        }
        if let Some(v) = get("GUIDANCE_SCALE") {
            d.guidance_scale = parse_var("GUIDANCE_SCALE", &v)?;
        }
        if let Some(v) = get("SAMPLER") {
            d.sampler = v;
        }
        if let Some(v) = get("CLIP_SKIP") {
            d.clip_skip = parse_var("CLIP_SKIP", &v)?;
        }
        if let Some(v) = get("LORAS") {
            d.loras = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(settings)
    }

    /// URL of the model-listing endpoint.
    pub fn models_url(&self) -> String {
        match &self.models_url {
            Some(url) => normalize(url),
            None => sibling_url(&normalize(&self.api_url), "models"),
        }
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        GenerationError::InvalidConfig(format!("{}{}={:?}: {}", ENV_PREFIX, name, value, e))
    })
}

pub(crate) fn normalize(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Replace the last path segment of `url` with `segment`.
fn sibling_url(url: &str, segment: &str) -> String {
    let path_start = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[path_start..].rfind('/') {
        Some(i) => format!("{}/{}", &url[..path_start + i], segment),
        None => format!("{}/{}", url, segment),
    }
}

/// Builder for [`Settings`].
#[derive(Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Set the txt2img endpoint.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.settings.api_url = url.into();
        self
    }

    /// Set an explicit model-listing endpoint.
    pub fn with_models_url(mut self, url: impl Into<String>) -> Self {
        self.settings.models_url = Some(url.into());
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Set the default output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.output_dir = Some(dir.into());
        self
    }

    /// Replace the default generation parameters.
    pub fn with_defaults(mut self, defaults: GenerationDefaults) -> Self {
        self.settings.defaults = defaults;
        self
    }

    /// Build the final [`Settings`].
    pub fn build(self) -> Settings {
        self.settings
    }
}
