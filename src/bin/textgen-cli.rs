use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "textgen-cli")]
#[command(about = "Command-line client for the text-generation gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show per-backend availability, quota and failure counters
    Status,
    /// Check whether any backend can take traffic
    Health,
    /// Generate text for one component type
    Generate {
        /// Component type, e.g. avatar, analysis, sales_funnel
        #[arg(short, long)]
        component: String,

        #[arg(short, long)]
        prompt: String,

        #[arg(long, default_value_t = 4000)]
        max_tokens: u32,

        #[arg(long, default_value_t = 0.7)]
        temperature: f32,

        /// Template context as key=value, repeatable
        #[arg(long = "context", value_parser = parse_key_value)]
        context: Vec<(String, String)>,

        /// Only use backends that support tools
        #[arg(long)]
        require_tools: bool,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{base}/v1/status")).send().await?;
            print_response(res).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{base}/health")).send().await?;
            print_response(res).await?;
        }
        Commands::Generate {
            component,
            prompt,
            max_tokens,
            temperature,
            context,
            require_tools,
        } => {
            let context: serde_json::Map<String, Value> = context
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            let body = json!({
                "prompt": prompt,
                "component_type": component,
                "max_tokens": max_tokens,
                "temperature": temperature,
                "context": context,
                "require_tools": require_tools,
            });
            let res = client
                .post(format!("{base}/v1/generate"))
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
