use clap::Parser;
use std::path::PathBuf;

/// Conductor - route a query to the right agents, plan their work and run them
#[derive(Parser, Debug, Clone)]
#[command(name = "conductor", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "CONDUCTOR_CONFIG", default_value = "conductor.toml")]
    pub config: PathBuf,

    /// Run-level deadline in seconds
    #[arg(long, env = "CONDUCTOR_DEADLINE")]
    pub deadline: Option<u64>,

    /// Maximum agents executing at once
    #[arg(long, env = "CONDUCTOR_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Print the registered agents and exit
    #[arg(long)]
    pub list_agents: bool,

    /// Query to route
    pub query: Vec<String>,
}

impl Cli {
    /// The query words joined back together, if any were given
    pub fn query_text(&self) -> Option<String> {
        let text = self.query.join(" ");
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}
