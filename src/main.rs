use clap::Parser;
use tokio::time::Instant;
use tracing::info;

use qrport::config::{CliArgs, Command, Settings};
use qrport::orchestrator::{Action, ActionOutput};
use qrport::session::Session;
use qrport::telemetry::init_tracing;
use qrport::{GenerationDirector, GenerationRequest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let settings = Settings::try_from(args)?;

    init_tracing(&settings.log_level)?;

    let deadline = Instant::now() + settings.request_timeout;
    let publish = settings.publish.clone();

    match settings.command {
        Command::Generate {
            content,
            size,
            recovery_level,
            id,
        } => {
            let request = match id {
                Some(id) => GenerationRequest::new(id, content, size, &recovery_level)?,
                None => GenerationRequest::with_generated_id(content, size, &recovery_level)?,
            };
            info!(id = request.id(), bucket = %publish.bucket, "generating");
            let url = GenerationDirector::new(publish, request)
                .generate(Some(deadline))
                .await?;
            println!("{url}");
        }
        Command::Buckets => {
            let session = Session::open(&publish.backend, &publish.region).await?;
            let output = publish
                .orchestrator
                .execute(&session, Action::list(), Some(deadline))
                .await?;
            if let ActionOutput::Buckets(names) = output {
                for name in names {
                    println!("{name}");
                }
            }
        }
    }

    Ok(())
}
