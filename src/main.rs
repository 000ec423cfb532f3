use clap::Parser;
use conductor::cli::Cli;
use conductor::config::Settings;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays pure JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::new_with_cli(&cli)?;
    info!(
        config = %cli.config.display(),
        agents = settings.agents.len(),
        mcp_servers = settings.mcp_servers.len(),
        "Configuration loaded"
    );

    let router = conductor::build_router(&settings).await?;

    if cli.list_agents {
        let agents = router.list_registered_agents().await;
        println!("{}", serde_json::to_string_pretty(&agents)?);
        return Ok(());
    }

    let Some(query) = cli.query_text() else {
        error!("No query given");
        anyhow::bail!("usage: conductor [--config PATH] [--list-agents] QUERY");
    };

    let result = router.run_query(&query).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
