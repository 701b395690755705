use std::path::PathBuf;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, RANGE};
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Client for the resource proxy", long_about = None)]
struct Cli {
    /// Base URL of the running proxy.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// API key sent as a bearer token.
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a remote resource through the proxy
    Fetch {
        /// Absolute URL of the resource.
        target: String,

        /// Range header to forward, e.g. "bytes=0-99".
        #[arg(short, long)]
        range: Option<String>,

        /// Write the body here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check that the proxy is up
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    // Tag the call so it can be found in the proxy's logs.
    let request_id = Uuid::new_v4().to_string();
    let mut headers = HeaderMap::new();
    headers.insert("x-request-id", HeaderValue::from_str(&request_id)?);
    if let Some(key) = &cli.key {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", key))?,
        );
    }

    match cli.command {
        Commands::Health => {
            let res = client
                .get(format!("{}/healthz", cli.url))
                .headers(headers)
                .send()
                .await?;
            let status = res.status();
            let json: Value = res.json().await?;
            println!("Status: {}", status);
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Commands::Fetch {
            target,
            range,
            output,
        } => {
            if let Some(range) = range {
                headers.insert(RANGE, HeaderValue::from_str(&range)?);
            }
            eprintln!("Request ID: {}", request_id);
            let res = client
                .get(format!("{}/gw/proxy_view", cli.url))
                .query(&[("url", target.as_str())])
                .headers(headers)
                .send()
                .await?;

            let sink: Box<dyn AsyncWrite + Unpin> = match output {
                Some(path) => Box::new(tokio::fs::File::create(path).await?),
                None => Box::new(tokio::io::stdout()),
            };
            fetch(res, sink).await?;
        }
    }

    Ok(())
}

async fn fetch(
    res: reqwest::Response,
    mut sink: Box<dyn AsyncWrite + Unpin>,
) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: proxy returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    eprintln!("Status: {}", status);
    for (name, value) in res.headers() {
        eprintln!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }

    let expected = res
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let mut received: u64 = 0;
    let mut body = res.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                eprintln!("Error: transfer interrupted after {} bytes: {}", received, e);
                break;
            }
        };
        received += chunk.len() as u64;
        sink.write_all(&chunk).await?;
    }
    sink.flush().await?;

    // The proxy ends an oversized body early without an error status.
    match expected {
        Some(expected) if received < expected => {
            eprintln!(
                "Warning: received {} of {} bytes, the body was truncated",
                received, expected
            );
        }
        _ => eprintln!("Received {} bytes", received),
    }
    Ok(())
}
