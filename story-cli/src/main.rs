//! Children's story wizard.
//!
//! A step-by-step terminal wizard that collects details about a child,
//! generates a personalised story through the story backend and lets you
//! page through, edit, narrate and export it.
//!
//! ```bash
//! cargo run -p story-cli -- --api-url http://127.0.0.1:8000
//! ```

mod config;
mod wizard;

use anyhow::Context;
use story_api::StoryApi;
use story_core::{FileStore, MemoryStore, StorySession};
use tracing::info;
use tracing_subscriber::EnvFilter;

use wizard::Wizard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let config = config::parse_config_from_args(&args);

    if config.show_help {
        print_help();
        return Ok(());
    }

    let api = StoryApi::with_config(config.api_config()?)
        .context("Failed to create story backend client")?;
    info!(
        api_url = api.base_url(),
        data_dir = %config.data_dir.display(),
        "starting story wizard"
    );

    // The draft and recent stories outlive the process; the story on display
    // and its narration do not.
    let session = StorySession::load(
        Box::new(FileStore::new(&config.data_dir)),
        Box::new(MemoryStore::new()),
    )
    .await;

    let mut wizard = Wizard::new(session, api);
    wizard::run(&mut wizard).await
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_help() {
    println!("Story Wizard - personalised children's stories");
    println!();
    println!("USAGE:");
    println!("  story [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help            Show this help message");
    println!("  --api-url <URL>       Story backend URL (default: $STORY_API_URL or http://127.0.0.1:8000)");
    println!("  --timeout <SECS>      Request timeout in seconds (default: $STORY_API_TIMEOUT_SECS or 120)");
    println!("  --data-dir <DIR>      Where drafts and recent stories are kept (default: $STORY_DATA_DIR)");
    println!();
    println!("ENVIRONMENT:");
    println!("  RUST_LOG              Log filter for stderr output (default: warn)");
    println!();
    println!("Inside the wizard, type #help for commands.");
}
