use clap::{Parser, Subcommand};
use serde_json::Value;

use wg_share::lookup::{LookupRequest, PeerId};

#[derive(Parser)]
#[command(name = "wg-share-cli")]
#[command(about = "Query a wg-share lookup service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:9000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up peers by their base64 public keys
    Find {
        #[arg(required = true)]
        keys: Vec<PeerId>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Find { keys } => {
            let request: LookupRequest = keys;
            let res = client
                .post(format!("{}/find", cli.url.trim_end_matches('/')))
                .json(&request)
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
        eprintln!("Error: lookup service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
