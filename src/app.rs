use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::backend;
use crate::config::{self, Config};
use crate::data::{BackendSource, ExampleSource, RoutingSource, TreeSource};
use crate::embed;
use crate::logging;
use crate::ui;

/// Starts the terminal UI. With a route the analysis screen opens directly,
/// otherwise the home screen asks for a post URL.
pub fn run(route: Option<String>) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let display_path = friendly_path(config::default_path().as_ref());

    let log_note = match logging::init(&cfg.logging) {
        Ok(Some(path)) => format!("Logging to {}.", friendly_path(Some(&path))),
        Ok(None) => String::new(),
        Err(err) => format!("Logging disabled: {err:#}."),
    };
    info!(version = crate::VERSION, config = %display_path, "starting tweetlytics");

    let source = build_source(&cfg);
    let embeds = build_embeds(&cfg);

    let status_message = format!(
        "TweetLytics {}. Config: {}. {}",
        crate::VERSION,
        display_path,
        log_note
    )
    .trim()
    .to_string();

    let options = ui::Options {
        source,
        embeds,
        route,
        status_message,
    };

    let mut model = ui::Model::new(options);
    model.run()?;
    info!("exiting");

    Ok(())
}

/// Live posts go to the analysis backend, examples come from the bundled
/// fixtures. A backend that cannot be configured leaves only the examples.
pub fn build_source(cfg: &Config) -> Arc<dyn TreeSource> {
    let live = match backend::Client::new(backend::ClientConfig {
        base_url: cfg.backend.base_url.clone(),
        user_agent: cfg.backend.user_agent.clone(),
        timeout: cfg.backend.timeout,
        http_client: None,
    }) {
        Ok(client) => {
            let source: Arc<dyn TreeSource> = Arc::new(BackendSource::new(Arc::new(client)));
            Some(source)
        }
        Err(err) => {
            warn!(error = %err, base_url = %cfg.backend.base_url, "analysis backend unavailable");
            None
        }
    };
    Arc::new(RoutingSource::new(
        live,
        ExampleSource::new(cfg.examples.delay),
    ))
}

pub fn build_embeds(cfg: &Config) -> embed::Loader {
    if !cfg.embed.enabled {
        return embed::Loader::disabled();
    }
    match embed::Client::new(embed::ClientConfig {
        endpoint: cfg.embed.endpoint.clone(),
        user_agent: cfg.backend.user_agent.clone(),
        timeout: cfg.embed.timeout,
    }) {
        Ok(client) => embed::Loader::new(Some(Arc::new(client))),
        Err(err) => {
            warn!(error = %err, "post embeds disabled");
            embed::Loader::disabled()
        }
    }
}

pub fn friendly_path(path: Option<&PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/tweetlytics/config.yaml".to_string()
    }
}
