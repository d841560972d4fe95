//! List models, then generate and save one image.
//!
//! Requires a running Draw Things instance with the HTTP API server enabled
//! (or any SD-WebUI compatible txt2img service). Point it elsewhere with
//! `DRAWTHINGS_API_URL`.
//!
//! ```sh
//! cargo run --example basic_usage
//! ```

use drawthings_rs::{DrawThingsClient, GenerationRequest, Settings};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let client = DrawThingsClient::new(Settings::from_env()?);

    let models = client.list_models().await?;
    println!("Available models: {:?}", models);
    let Some(model) = models.first() else {
        eprintln!("No models available");
        return Ok(());
    };

    let request = GenerationRequest::new("A beautiful sunset over mountains")
        .size(512, 512)
        .steps(20)
        .model(model);

    let saved = client.generate_image(&request, None).await?;
    for image in &saved {
        println!("Saved: {}", image.path.display());
    }

    Ok(())
}
