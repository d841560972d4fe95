use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::Level;

use drawthings_rs::{DrawThingsClient, GenerationRequest, Settings};

/// Generate images with a local Draw Things instance.
///
/// Defaults come from `DRAWTHINGS_*` environment variables (or a `.env`
/// file); flags override them.
#[derive(Parser, Debug)]
#[command(name = "drawthings", version, about, long_about = None)]
struct Cli {
    /// Print the models the service offers and exit
    #[arg(long, conflicts_with = "models_test")]
    models: bool,

    /// Generate one image with every available model
    #[arg(long)]
    models_test: bool,

    /// Text prompt
    #[arg(long)]
    prompt: Option<String>,

    /// Negative prompt
    #[arg(long)]
    negative_prompt: Option<String>,

    /// Image width
    #[arg(long)]
    width: Option<u32>,

    /// Image height
    #[arg(long)]
    height: Option<u32>,

    /// Number of diffusion steps
    #[arg(long)]
    steps: Option<u32>,

    /// Random seed (-1 for random)
    #[arg(long, allow_hyphen_values = true)]
    seed: Option<i64>,

    /// Model to use for a single generation
    #[arg(long)]
    model: Option<String>,

    /// LoRA to apply (repeatable)
    #[arg(long = "lora")]
    loras: Vec<String>,

    /// Output directory for images
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// txt2img endpoint URL
    #[arg(long)]
    url: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Log each request and written file
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::from_env()?;
        if let Some(url) = &self.url {
            settings.api_url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            settings.timeout = Duration::from_secs(secs);
        }
        Ok(settings)
    }

    fn request(&self, settings: &Settings) -> GenerationRequest {
        let prompt = self
            .prompt
            .clone()
            .unwrap_or_else(|| settings.defaults.prompt.clone());

        GenerationRequest {
            prompt,
            negative_prompt: self.negative_prompt.clone(),
            width: self.width,
            height: self.height,
            steps: self.steps,
            seed: self.seed,
            model: self.model.clone(),
            loras: (!self.loras.is_empty()).then(|| self.loras.clone()),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: could not install log subscriber");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = cli.settings()?;
    let request = cli.request(&settings);
    let client = DrawThingsClient::new(settings);

    if cli.models {
        let models = client.list_models().await?;
        if models.is_empty() {
            println!("No models available");
        } else {
            println!("Available models:");
            for model in &models {
                println!("  {}", model);
            }
        }
        return Ok(());
    }

    if cli.models_test {
        let output_dir = cli.output_dir.clone().unwrap_or_else(|| {
            PathBuf::from("models-tests")
                .join(chrono::Local::now().format("%Y-%m-%dT%H-%M-%S").to_string())
        });
        let report = client
            .generate_for_each_model(&request, None, Some(output_dir.as_path()))
            .await?;

        for path in report.saved_paths() {
            println!("{}", path.display());
        }
        for (model, err) in report.failures() {
            eprintln!("Error generating image for model {}: {}", model, err);
        }
        if report.cancelled {
            eprintln!("Batch cancelled");
        }
        println!(
            "Generated {} images ({} of {} models succeeded)",
            report.saved_paths().len(),
            report.items.iter().filter(|item| item.is_success()).count(),
            report.items.len()
        );
        return Ok(());
    }

    let saved = client
        .generate_image(&request, cli.output_dir.as_deref())
        .await?;
    println!("Generated images saved to:");
    for image in &saved {
        println!("  {}", image.path.display());
    }
    Ok(())
}
