//! wikipod command-line client
//!
//! Drives the sync adaptor against a Solid pod with a pre-issued bearer
//! token, for inspecting and editing a wiki's tiddlers from a terminal.
//!
//! Usage:
//!   wikipod --pod https://alice.pod.example --token $TOKEN \
//!     --web-id https://alice.pod.example/profile/card#me list

use std::{fs, path::PathBuf, sync::Arc};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;
use wikipod_cli::{ConsoleHost, build_tiddler, container_list, render_entry};
use wikipod_sync::{
    AdaptorConfig, AdaptorInfo, Session, SolidPodClient, SolidPodConfig, StaticSessionProvider,
    SyncAdaptor,
};

#[derive(Parser, Debug)]
#[command(name = "wikipod")]
#[command(about = "Sync wiki tiddlers with a Solid pod")]
struct Args {
    /// Pod origin, e.g. https://alice.pod.example
    #[arg(long, env = "WIKIPOD_POD")]
    pod: String,

    /// Bearer token issued by the pod's identity provider
    #[arg(long, env = "WIKIPOD_TOKEN", hide_env_values = true)]
    token: String,

    /// WebID the token belongs to
    #[arg(long, env = "WIKIPOD_WEB_ID")]
    web_id: String,

    /// Container roots in priority order, comma or newline separated
    #[arg(long, env = "WIKIPOD_CONTAINERS", default_value = "/public/tiddlers/main")]
    containers: String,

    /// Read-only external container URIs, comma or newline separated
    #[arg(long, env = "WIKIPOD_EXTERNAL", default_value = "")]
    external: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "60")]
    timeout: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the signed-in identity
    Status,
    /// List every tiddler
    List,
    /// Print one tiddler as JSON
    Get { title: String },
    /// Create or replace a tiddler
    Put {
        title: String,
        /// Body text
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        /// Read the body from a file
        #[arg(long)]
        file: Option<PathBuf>,
        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Content type of the body
        #[arg(long = "type")]
        content_type: Option<String>,
        /// Container to write into instead of the first configured one
        #[arg(long)]
        location: Option<String>,
    },
    /// Delete a tiddler
    Delete {
        title: String,
        /// Container holding the tiddler
        #[arg(long)]
        location: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let store = SolidPodClient::new(SolidPodConfig {
        pod_origin: args.pod.clone(),
        request_timeout_secs: args.timeout,
    });
    let session = StaticSessionProvider::new(Session::new(&args.web_id, &args.token));
    let config = AdaptorConfig {
        containers: container_list(&args.containers),
        external_containers: container_list(&args.external),
        ..Default::default()
    };
    debug!("Adaptor config: {:?}", config);

    let adaptor = SyncAdaptor::new(
        config,
        Arc::new(store),
        Arc::new(session),
        Arc::new(ConsoleHost),
    );
    let status = adaptor.login().await.context("login failed")?;

    match args.command {
        Command::Status => {
            println!(
                "signed in as {}",
                status.identity.as_deref().unwrap_or(&args.web_id)
            );
        }
        Command::List => {
            let entries = adaptor.list().await.context("listing failed")?;
            for entry in &entries {
                println!("{}", render_entry(entry));
            }
            debug!("{} tiddlers", entries.len());
        }
        Command::Get { title } => {
            let Some(tiddler) = adaptor
                .load(&title)
                .await
                .with_context(|| format!("loading {title:?} failed"))?
            else {
                bail!("{title:?} is not loaded from the pod");
            };
            println!("{}", serde_json::to_string_pretty(&tiddler)?);
            if let Some(location) = &tiddler.location {
                eprintln!("location: {location}");
            }
        }
        Command::Put {
            title,
            text,
            file,
            tags,
            content_type,
            location,
        } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                (None, None) => String::new(),
            };
            let tiddler = build_tiddler(&title, text, &tags, content_type, status.identity);
            let info = location.map(AdaptorInfo::at);

            let outcome = adaptor
                .save(&tiddler, info.as_ref())
                .await
                .with_context(|| format!("saving {title:?} failed"))?
                .context("not signed in")?;
            println!(
                "saved {:?} to {} (revision {})",
                title,
                outcome.info.location.as_deref().unwrap_or("?"),
                outcome.revision
            );
        }
        Command::Delete { title, location } => {
            let info = location.map(AdaptorInfo::at);
            adaptor
                .delete(&title, info.as_ref())
                .await
                .with_context(|| format!("deleting {title:?} failed"))?;
            println!("deleted {title:?}");
        }
    }

    Ok(())
}
