//! Pieces of the `wikipod` binary that don't need a terminal.

use tracing::{info, warn};
use wikipod_sync::{Status, WikiHost};
use wikipod_types::{Tiddler, WikiTimestamp};

/// Host that reports adaptor notifications through the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleHost;

impl WikiHost for ConsoleHost {
    fn connection_changed(&self, status: &Status) {
        match (&status.logged_in, &status.identity) {
            (true, Some(name)) => info!("Connected as {}", name),
            (true, None) => info!("Connected"),
            (false, _) => info!("Disconnected"),
        }
    }

    fn request_login(&self) {
        warn!("Not signed in; check --token and --web-id");
    }
}

/// Accepts containers separated by commas or newlines.
pub fn container_list(arg: &str) -> String {
    arg.split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A freshly edited tiddler, stamped now.
pub fn build_tiddler(
    title: &str,
    text: String,
    tags: &[String],
    content_type: Option<String>,
    modifier: Option<String>,
) -> Tiddler {
    let now = WikiTimestamp::now();
    let mut tiddler = Tiddler::new(title).with_text(text);
    tiddler.tags.extend(tags.iter().cloned());
    tiddler.content_type = content_type;
    tiddler.created = Some(now);
    tiddler.modified = Some(now);
    tiddler.creator = modifier.clone();
    tiddler.modifier = modifier;
    tiddler
}

/// One listing line: title, tags, container.
pub fn render_entry(tiddler: &Tiddler) -> String {
    let mut line = tiddler.title.clone();
    if !tiddler.tags.is_empty() {
        let tags: Vec<&str> = tiddler.tags.iter().map(String::as_str).collect();
        line.push_str(&format!("  [{}]", tags.join(", ")));
    }
    if let Some(location) = &tiddler.location {
        line.push_str(&format!("  ({location})"));
    }
    line
}
