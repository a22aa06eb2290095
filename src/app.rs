use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::algolia;
use crate::config;
use crate::data::{AlgoliaItemService, AlgoliaSearchService, ItemService, SearchService};
use crate::logging;
use crate::model::TimeRange;
use crate::session::BrowseSession;
use crate::store::StoreOptions;
use crate::ui;

/// Startup choices made on the command line. They win over the config file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub query: Option<String>,
    pub time_range: Option<TimeRange>,
    pub item: Option<String>,
}

pub fn run(options: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let log_path = logging::init(&cfg.log);
    info!(config = %friendly_path(config::default_path().as_ref()), "starting");

    let client = algolia::Client::new(algolia::ClientConfig {
        user_agent: cfg.api.user_agent.clone(),
        base_url: Some(cfg.api.base_url.clone()),
        timeout: Some(cfg.api.timeout),
        http_client: None,
    })
    .context("create search client")?;
    let client = Arc::new(client);

    let search: Arc<dyn SearchService> = Arc::new(AlgoliaSearchService::new(client.clone()));
    let items: Arc<dyn ItemService> = Arc::new(AlgoliaItemService::new(client));

    let store_options = StoreOptions {
        debounce: cfg.browse.debounce,
        query: options.query.unwrap_or_default(),
        time_range: options.time_range.unwrap_or(cfg.browse.time_range),
    };
    let session = BrowseSession::new(search, items, store_options);

    let status_message = match log_path {
        Some(path) => format!("Logging to {}.", friendly_path(Some(&path))),
        None => String::new(),
    };

    let mut model = ui::Model::new(ui::Options {
        session,
        comment_sort: cfg.browse.comment_sort,
        open_item: options.item,
        status_message,
    });
    model.run()?;
    info!("exiting");

    Ok(())
}

fn friendly_path(path: Option<&PathBuf>) -> String {
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
        "~/.config/hn-browse/config.yaml".to_string()
    }
}
