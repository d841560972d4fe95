//! # drawthings-rs
//!
//! Async Rust client for the [Draw Things](https://drawthings.ai) HTTP API
//! (and other SD-WebUI compatible `txt2img` services).
//!
//! Builds txt2img requests from typed parameters merged over configured
//! defaults, decodes the base64 images the service returns, writes them to
//! disk with a stable naming scheme, and lists the models the service offers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use drawthings_rs::{DrawThingsClient, GenerationRequest, Settings};
//!
//! # async fn example() -> drawthings_rs::Result<()> {
//! let client = DrawThingsClient::new(Settings::from_env()?);
//!
//! // Discover models
//! let models = client.list_models().await?;
//!
//! // Generate and save
//! let request = GenerationRequest::new("a sunset over mountains")
//!     .size(512, 512)
//!     .steps(25)
//!     .model(&models[0]);
//! let result = client.generate(&request).await?;
//! let saved = client.save(&result.images, request.model.as_deref(), None)?;
//!
//! // Or try every model, carrying on past failures
//! let report = client
//!     .generate_for_each_model(&GenerationRequest::new("a red cube"), None, None)
//!     .await?;
//! for (model, err) in report.failures() {
//!     eprintln!("{}: {}", model, err);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod payload;
pub mod types;

pub use client::{image_file_name, DrawThingsClient};
pub use config::{GenerationDefaults, Settings, SettingsBuilder, DEFAULT_API_URL};
pub use error::{GenerationError, Result};
pub use payload::{LoraRef, Txt2ImgPayload, DENOISING_STRENGTH};
pub use types::{
    BatchReport, GenerationRequest, GenerationResult, ModelOutcome, ModelReport, SavedImage,
};
