use anyhow::Result;
use quiz_runner::{Command, cli, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = cli::load_settings()?;
    telemetry::init_tracing(&settings.logging)?;

    let command = Command::parse(std::env::args().skip(1))?;
    info!("Running {:?}", command);

    let summary = cli::execute(&settings, command).await?;
    println!("{summary}");

    Ok(())
}
