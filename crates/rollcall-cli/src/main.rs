use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rollcall", about = "Face attendance CLI for a rollcalld server")]
struct Cli {
    /// Base URL of the rollcalld server
    #[arg(long, env = "ROLLCALL_URL", default_value = "http://127.0.0.1:5000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the face in an image under a name
    Register {
        /// Name to mark attendance under
        #[arg(short, long)]
        name: String,
        /// Image file containing one face
        image: PathBuf,
    },
    /// Mark attendance for every face in an image
    Recognize {
        image: PathBuf,
    },
    /// List registered names
    List,
    /// Show server status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.server.trim_end_matches('/');

    match cli.command {
        Commands::Register { name, image } => {
            let form = Form::new().text("name", name).part("image", image_part(&image).await?);
            let body = post_form(&client, &format!("{base}/register"), form).await?;
            print_lines(&body);
        }
        Commands::Recognize { image } => {
            let form = Form::new().part("image", image_part(&image).await?);
            let body = post_form(&client, &format!("{base}/"), form).await?;
            print_lines(&body);
        }
        Commands::List => {
            let names: Vec<String> = get_json(&client, &format!("{base}/faces")).await?;
            if names.is_empty() {
                println!("No faces registered");
            }
            for name in names {
                println!("{name}");
            }
        }
        Commands::Status => {
            let status: serde_json::Value = get_json(&client, &format!("{base}/health")).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

async fn image_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "capture.png".to_string());
    tracing::debug!(file = %file_name, bytes = bytes.len(), "uploading image");
    Ok(Part::bytes(bytes).file_name(file_name))
}

async fn post_form(client: &reqwest::Client, url: &str, form: Form) -> Result<String> {
    let response = client
        .post(url)
        .multipart(form)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        bail!("server returned {status}: {}", display_lines(&body).join(" "));
    }
    Ok(body)
}

async fn get_json<T: serde::de::DeserializeOwned>(client: &reqwest::Client, url: &str) -> Result<T> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?;
    let status = response.status();
    if !status.is_success() {
        bail!("server returned {status}");
    }
    Ok(response.json().await?)
}

fn print_lines(body: &str) {
    for line in display_lines(body) {
        println!("{line}");
    }
}

/// Split an HTML response into terminal lines and undo entity escaping.
fn display_lines(body: &str) -> Vec<String> {
    body.split("<br>")
        .map(|line| {
            line.replace("&lt;", "<")
                .replace("&gt;", ">")
                .replace("&quot;", "\"")
                .replace("&#39;", "'")
                .replace("&amp;", "&")
        })
        .collect()
}
