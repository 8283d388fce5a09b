use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Client for the REST/JSON gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Deadline sent as `Grpc-Timeout`.
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call SayHello
    Hello { name: String },
    /// Call SayGoodbye
    Goodbye { name: String },
    /// Send an arbitrary request
    Call {
        method: Method,
        path: String,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(ms) = cli.timeout_ms {
        headers.insert("grpc-timeout", HeaderValue::from_str(&format!("{ms}m"))?);
    }

    let (method, path, body) = match cli.command {
        Commands::Hello { name } => (Method::POST, "/v1/greet".to_string(), Some(json!({ "name": name }))),
        Commands::Goodbye { name } => {
            (Method::POST, "/v1/goodbye".to_string(), Some(json!({ "name": name })))
        }
        Commands::Call { method, path, data } => {
            let body = data.map(|d| serde_json::from_str::<Value>(&d)).transpose()?;
            (method, path, body)
        }
    };

    let mut request = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers);
    if let Some(body) = body {
        request = request
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&body)?);
    }

    let res = request.send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };
    if status.is_success() {
        println!("{}", rendered);
    } else {
        eprintln!("Error: gateway returned status {}", status);
        eprintln!("{}", rendered);
        std::process::exit(1);
    }
    Ok(())
}
