use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "checkmeter-server")]
#[command(author, version, about = "Meter photo classification service", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    pub config: String,

    /// Vision API base URL
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Listen address
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Use the mock vision backend even if an API key is set
    #[arg(long)]
    pub mock: bool,

    /// Vision API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
