use base64::{engine::general_purpose::STANDARD, Engine};
use clap::Parser;
use greenscore::{ActionError, ActionGateway, ActionInput, AppError, BackendFactory, Settings};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Score a parcel of land by the trees in a photo of it.
#[derive(Parser, Debug)]
#[command(name = "greenscore", version)]
struct Args {
    /// Photo of the land (PNG, JPEG, WEBP, ...)
    #[arg(long)]
    photo: PathBuf,

    /// Width of the land
    #[arg(long)]
    width: String,

    /// Height of the land
    #[arg(long)]
    height: String,

    /// Unit of the dimensions: sqft or sqm
    #[arg(long, default_value = "sqft")]
    unit: String,

    /// Print the backend's raw response instead of a score
    #[arg(long)]
    raw: bool,
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("greenscore=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn photo_data_uri(path: &Path) -> Result<String, AppError> {
    let bytes = tokio::fs::read(path).await?;
    let media_type = image::guess_format(&bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");
    Ok(format!("data:{};base64,{}", media_type, STANDARD.encode(bytes)))
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => tracing::error!("Failed to render output: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, AppError> {
    dotenvy::dotenv().ok();
    init_logging();
    let args = Args::parse();

    // Missing credentials stop the process here, before any request.
    let settings = Settings::load()?;
    let orchestrator = BackendFactory::create_orchestrator(&settings)?;
    let gateway = ActionGateway::new(Arc::new(orchestrator));

    let photo = photo_data_uri(&args.photo).await?;

    let outcome = if args.raw {
        gateway.passthrough(&json!({ "image": photo })).await
    } else {
        let input = ActionInput {
            photo: Some(Value::String(photo)),
            land_width: Some(Value::String(args.width)),
            land_height: Some(Value::String(args.height)),
            unit: Some(Value::String(args.unit)),
        };
        gateway
            .handle(input)
            .await
            .and_then(|report| {
                serde_json::to_value(report).map_err(|e| {
                    tracing::error!("Failed to serialize report: {}", e);
                    ActionError::failed(None)
                })
            })
    };

    match outcome {
        Ok(body) => {
            print_json(&body);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            print_json(&serde_json::to_value(&e).unwrap_or_else(|_| json!({ "error": e.to_string() })));
            Ok(ExitCode::FAILURE)
        }
    }
}
