use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::Engine;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{normalize, Settings};
use crate::error::{GenerationError, Result};
use crate::payload::Txt2ImgPayload;
use crate::types::*;

/// Directory used when neither the caller nor the settings name one.
const FALLBACK_OUTPUT_DIR: &str = ".";

/// File name for the `index`-th (1-based) saved image.
///
/// `generated_image_000001.png`, or `generated_image_000001-<model>.png`
/// when a model name is given. Path separators in the model name become `_`.
pub fn image_file_name(index: usize, model_name: Option<&str>) -> String {
    match model_name.filter(|m| !m.is_empty()) {
        Some(model) => format!(
            "generated_image_{:06}-{}.png",
            index,
            model.replace(['/', '\\'], "_")
        ),
        None => format!("generated_image_{:06}.png", index),
    }
}

/// Client for a Draw Things (or SD-WebUI compatible) txt2img service.
///
/// Each call sends exactly one request and waits for the reply; nothing is
/// retried. Settings are fixed at construction.
///
/// # Example
/// ```no_run
/// use drawthings_rs::{DrawThingsClient, GenerationRequest, Settings};
///
/// # async fn example() -> drawthings_rs::Result<()> {
/// let client = DrawThingsClient::new(Settings::default());
///
/// let models = client.list_models().await?;
/// let request = GenerationRequest::new("a lighthouse at dusk").model(&models[0]);
/// let saved = client.generate_image(&request, None).await?;
/// println!("Saved {:?}", saved[0].path);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DrawThingsClient {
    http: Client,
    settings: Settings,
    api_url: String,
    models_url: String,
    cancellation: Option<Arc<AtomicBool>>,
}

impl DrawThingsClient {
    /// Create a client from immutable settings.
    pub fn new(settings: Settings) -> Self {
        Self {
            http: Client::new(),
            api_url: normalize(&settings.api_url),
            models_url: settings.models_url(),
            settings,
            cancellation: None,
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Set a flag that stops [`generate_for_each_model`](Self::generate_for_each_model)
    /// before its next model once it is set to `true`.
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancellation = Some(cancel);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the txt2img endpoint URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Returns the model-listing endpoint URL.
    pub fn models_url(&self) -> &str {
        &self.models_url
    }

    fn check_cancelled(&self) -> Result<()> {
        if let Some(ref cancel) = self.cancellation {
            if cancel.load(Ordering::Relaxed) {
                return Err(GenerationError::Cancelled);
            }
        }
        Ok(())
    }

    // ── Generation ──────────────────────────────────────────────────

    /// POST a txt2img request and return the base64 images from the reply.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let payload = Txt2ImgPayload::resolve(request, &self.settings.defaults)?;
        debug!(
            url = %self.api_url,
            model = %payload.model,
            width = payload.width,
            height = payload.height,
            steps = payload.steps,
            seed = payload.seed,
            "Sending txt2img request"
        );

        let resp = self
            .http
            .post(&self.api_url)
            .timeout(self.settings.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GenerationError::Network {
                context: format!(
                    "Cannot connect to Draw Things at {}, is the API server enabled?",
                    self.api_url
                ),
                source: e,
            })?;

        let json = read_json(resp, "txt2img").await?;
        let result = parse_images(&json)?;
        debug!(images = result.len(), "txt2img returned");
        Ok(result)
    }

    /// GET the list of model identifiers the service offers.
    ///
    /// The service must answer `{"models": ["a", "b", ...]}`. Any other
    /// shape, including a bare array of `{"title": ...}` objects, is an
    /// [`GenerationError::InvalidResponse`].
    pub async fn list_models(&self) -> Result<Vec<String>> {
        debug!(url = %self.models_url, "Fetching model list");
        let resp = self
            .http
            .get(&self.models_url)
            .timeout(self.settings.timeout)
            .send()
            .await
            .map_err(|e| GenerationError::Network {
                context: format!(
                    "Cannot connect to Draw Things at {}, is the API server enabled?",
                    self.models_url
                ),
                source: e,
            })?;

        let json = read_json(resp, "model list").await?;
        parse_models(&json)
    }

    // ── Saving ──────────────────────────────────────────────────────

    /// Decode base64 images and write them as PNG files.
    ///
    /// The directory is `output_dir`, else [`Settings::output_dir`], else the
    /// current directory; it is created if missing. Files are named by
    /// [`image_file_name`]. Returns one [`SavedImage`] per input, in order.
    ///
    /// An empty `images` slice is an error ([`GenerationError::NoImages`]).
    /// Files written before a failing image are left in place.
    pub fn save(
        &self,
        images: &[String],
        model_name: Option<&str>,
        output_dir: Option<&Path>,
    ) -> Result<Vec<SavedImage>> {
        if images.is_empty() {
            return Err(GenerationError::NoImages);
        }

        let dir = self.resolve_output_dir(output_dir);
        std::fs::create_dir_all(&dir).map_err(|e| GenerationError::Write {
            path: dir.clone(),
            source: e,
        })?;

        let mut saved = Vec::with_capacity(images.len());
        for (i, encoded) in images.iter().enumerate() {
            let index = i + 1;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| GenerationError::Decode { index, source: e })?;

            let path = dir.join(image_file_name(index, model_name));
            std::fs::write(&path, &bytes).map_err(|e| GenerationError::Write {
                path: path.clone(),
                source: e,
            })?;
            debug!(path = %path.display(), bytes = bytes.len(), "Saved image");

            saved.push(SavedImage { index, path });
        }

        Ok(saved)
    }

    fn resolve_output_dir(&self, output_dir: Option<&Path>) -> PathBuf {
        output_dir
            .map(Path::to_path_buf)
            .or_else(|| self.settings.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(FALLBACK_OUTPUT_DIR))
    }

    /// Generate and save in one call, naming files after the resolved model.
    pub async fn generate_image(
        &self,
        request: &GenerationRequest,
        output_dir: Option<&Path>,
    ) -> Result<Vec<SavedImage>> {
        let result = self.generate(request).await?;
        let model = request
            .model
            .as_deref()
            .unwrap_or(&self.settings.defaults.model);
        self.save(&result.images, Some(model), output_dir)
    }

    // ── Batch ───────────────────────────────────────────────────────

    /// Run [`generate_image`](Self::generate_image) once per model, in order.
    ///
    /// `models` defaults to [`list_models`](Self::list_models). A failing
    /// model is logged and recorded in the report; the remaining models still
    /// run. Only a failure to fetch the model list fails the whole call.
    pub async fn generate_for_each_model(
        &self,
        template: &GenerationRequest,
        models: Option<Vec<String>>,
        output_dir: Option<&Path>,
    ) -> Result<BatchReport> {
        let models = match models {
            Some(models) => models,
            None => self.list_models().await?,
        };
        info!(models = models.len(), "Generating one image set per model");

        let mut report = BatchReport::default();
        for model in models {
            if let Err(e) = self.check_cancelled() {
                warn!(remaining_from = %model, "{}", e);
                report.cancelled = true;
                break;
            }

            let request = template.clone().model(model.clone());
            let outcome = match self.generate_image(&request, output_dir).await {
                Ok(saved) => {
                    info!(model = %model, images = saved.len(), "Model finished");
                    ModelOutcome::Saved(saved)
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Error generating image for model");
                    ModelOutcome::Failed(e)
                }
            };
            report.items.push(ModelReport { model, outcome });
        }

        Ok(report)
    }
}

/// Check the status and parse the body of a service reply as JSON.
async fn read_json(resp: Response, what: &str) -> Result<Value> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let mut reason = status.canonical_reason().unwrap_or("Unknown").to_string();
        if !body.trim().is_empty() {
            reason = format!("{} ({})", reason, body.trim());
        }
        return Err(GenerationError::Http {
            status: status.as_u16(),
            reason,
        });
    }

    let text = resp.text().await.map_err(|e| GenerationError::Network {
        context: format!("Failed to read Draw Things {} response", what),
        source: e,
    })?;

    serde_json::from_str(&text).map_err(|e| {
        GenerationError::InvalidResponse(format!("{} response is not valid JSON: {}", what, e))
    })
}

fn parse_images(json: &Value) -> Result<GenerationResult> {
    let array = json
        .get("images")
        .and_then(|v| v.as_array())
        .ok_or_else(|| GenerationError::InvalidResponse("Response missing images".into()))?;

    let images = array
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_str().map(String::from).ok_or_else(|| {
                GenerationError::InvalidResponse(format!("Image {} is not a string", i + 1))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(GenerationResult { images })
}

fn parse_models(json: &Value) -> Result<Vec<String>> {
    if json.is_array() {
        return Err(GenerationError::InvalidResponse(
            "Model list is a bare JSON array; expected an object with a \"models\" array".into(),
        ));
    }

    let array = json
        .get("models")
        .and_then(|v| v.as_array())
        .ok_or_else(|| GenerationError::InvalidResponse("Response missing models".into()))?;

    array
        .iter()
        .map(|v| {
            v.as_str().map(String::from).ok_or_else(|| {
                GenerationError::InvalidResponse(format!("Model entry {} is not a string", v))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_name_with_model() {
        assert_eq!(
            image_file_name(1, Some("standard")),
            "generated_image_000001-standard.png"
        );
        assert_eq!(
            image_file_name(42, Some("icatcher_realistic_f16.ckpt")),
            "generated_image_000042-icatcher_realistic_f16.ckpt.png"
        );
    }

    #[test]
    fn test_file_name_without_model() {
        assert_eq!(image_file_name(1, None), "generated_image_000001.png");
        assert_eq!(image_file_name(3, Some("")), "generated_image_000003.png");
    }

    #[test]
    fn test_file_name_sanitizes_separators() {
        assert_eq!(
            image_file_name(2, Some("sdxl/base\\v1")),
            "generated_image_000002-sdxl_base_v1.png"
        );
    }

    #[test]
    fn test_client_urls() {
        let client = DrawThingsClient::new(
            Settings::builder()
                .with_api_url("http://127.0.0.1:7860/sdapi/v1/txt2img/")
                .build(),
        );
        assert_eq!(client.api_url(), "http://127.0.0.1:7860/sdapi/v1/txt2img");
        assert_eq!(client.models_url(), "http://127.0.0.1:7860/sdapi/v1/models");
    }

    #[test]
    fn test_parse_images_preserves_order() {
        let json = json!({"images": ["AAA", "BBB"], "parameters": {}, "info": ""});
        let result = parse_images(&json).unwrap();
        assert_eq!(result.images, vec!["AAA", "BBB"]);
    }

    #[test]
    fn test_parse_images_missing_field() {
        let err = parse_images(&json!({"info": "nothing"})).unwrap_err();
        assert!(matches!(err, GenerationError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_images_non_string_entry() {
        let err = parse_images(&json!({"images": ["AAA", 5]})).unwrap_err();
        assert!(err.to_string().contains("Image 2"));
    }

    #[test]
    fn test_parse_models() {
        let json = json!({"models": ["standard", "model1", "model2"]});
        assert_eq!(
            parse_models(&json).unwrap(),
            vec!["standard", "model1", "model2"]
        );
    }

    #[test]
    fn test_parse_models_keeps_duplicates() {
        let json = json!({"models": ["a", "a"]});
        assert_eq!(parse_models(&json).unwrap(), vec!["a", "a"]);
    }

    #[test]
    fn test_parse_models_rejects_title_array() {
        let json = json!([{"title": "v1-5-pruned.ckpt [abc]"}]);
        match parse_models(&json) {
            Err(GenerationError::InvalidResponse(msg)) => assert!(msg.contains("bare JSON array")),
            other => panic!("Expected InvalidResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_models_missing_field() {
        assert!(parse_models(&json!({"images": []})).is_err());
    }

    #[test]
    fn test_cancellation_flag() {
        let cancel = Arc::new(AtomicBool::new(false));
        let client = DrawThingsClient::new(Settings::default()).with_cancellation(cancel.clone());
        assert!(client.check_cancelled().is_ok());

        cancel.store(true, Ordering::Relaxed);
        assert!(matches!(
            client.check_cancelled(),
            Err(GenerationError::Cancelled)
        ));
    }

    #[test]
    fn test_output_dir_resolution() {
        let client = DrawThingsClient::new(Settings::default());
        assert_eq!(client.resolve_output_dir(None), PathBuf::from("."));
        assert_eq!(
            client.resolve_output_dir(Some(Path::new("explicit"))),
            PathBuf::from("explicit")
        );

        let client =
            DrawThingsClient::new(Settings::builder().with_output_dir("configured").build());
        assert_eq!(client.resolve_output_dir(None), PathBuf::from("configured"));
        assert_eq!(
            client.resolve_output_dir(Some(Path::new("explicit"))),
            PathBuf::from("explicit")
        );
    }
}
