// src/ingest/providers/mod.rs
pub mod searxng;
pub mod tavily;

use anyhow::{anyhow, bail, Result};
use std::sync::Arc;

use crate::config::{SearchConfig, SearchProviderKind};
use crate::ingest::types::Searcher;

pub use searxng::SearxngSearcher;
pub use tavily::TavilySearcher;

/// Factory: exactly one active search provider, chosen by config.
pub fn build_searcher(cfg: &SearchConfig) -> Result<Arc<dyn Searcher>> {
    let provider = cfg
        .provider
        .ok_or_else(|| anyhow!("search provider not configured"))?;

    match provider {
        SearchProviderKind::Tavily => {
            if cfg.tavily.api_key.trim().is_empty() {
                bail!("tavily api key is missing");
            }
            Ok(Arc::new(TavilySearcher::new(cfg.tavily.api_key.clone())?))
        }
        SearchProviderKind::Searxng => {
            if cfg.searxng.base_url.trim().is_empty() {
                bail!("searxng base url is missing");
            }
            Ok(Arc::new(SearxngSearcher::new(
                cfg.searxng.base_url.clone(),
                cfg.searxng.timeout_secs,
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SearxngConfig, TavilyConfig};

    #[test]
    fn factory_selects_configured_provider() {
        let cfg = SearchConfig {
            provider: Some(SearchProviderKind::Searxng),
            tavily: TavilyConfig::default(),
            searxng: SearxngConfig {
                base_url: "http://localhost:8888".into(),
                timeout_secs: 10,
            },
        };
        assert_eq!(build_searcher(&cfg).unwrap().name(), "searxng");

        let cfg = SearchConfig {
            provider: Some(SearchProviderKind::Tavily),
            tavily: TavilyConfig {
                api_key: "tvly-1".into(),
            },
            searxng: SearxngConfig::default(),
        };
        assert_eq!(build_searcher(&cfg).unwrap().name(), "tavily");
    }

    #[test]
    fn factory_rejects_incomplete_config() {
        assert!(build_searcher(&SearchConfig::default()).is_err());

        let cfg = SearchConfig {
            provider: Some(SearchProviderKind::Tavily),
            ..SearchConfig::default()
        };
        let err = build_searcher(&cfg).err().unwrap();
        assert!(err.to_string().contains("tavily api key"));
    }
}
