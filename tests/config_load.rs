// tests/config_load.rs
use std::io::Write;

use serial_test::serial;

use domain_radar::config::radar::{ENV_RADAR_CONFIG_PATH, ENV_TAVILY_API_KEY};
use domain_radar::config::{LogFormat, RadarConfig, SearchProviderKind};
use domain_radar::ingest::providers::build_searcher;

const TOML: &str = r#"
domains = ["ai", "finance"]

[llm]
api_key = "sk-test"

[search]
provider = "tavily"

[search.tavily]
api_key = "ENV"

[concurrency]
rpm = 30
burst = 2

[storage]
dir = "data/runs"

[log]
format = "json"

[metrics]
listen = "127.0.0.1:9100"

[[users]]
id = 1
persona = "Investor"
"#;

fn write_config(body: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(body.as_bytes()).unwrap();
    f
}

#[test]
#[serial]
fn loads_from_env_path_and_resolves_env_keys() {
    let f = write_config(TOML);
    std::env::set_var(ENV_RADAR_CONFIG_PATH, f.path());
    std::env::set_var(ENV_TAVILY_API_KEY, "tvly-env");

    let cfg = RadarConfig::load_default().unwrap();
    assert_eq!(cfg.domains, vec!["ai".to_string(), "finance".to_string()]);
    assert_eq!(cfg.search.provider, Some(SearchProviderKind::Tavily));
    assert_eq!(cfg.search.tavily.api_key, "tvly-env");
    assert_eq!(cfg.concurrency.rpm, 30);
    assert_eq!(cfg.concurrency.burst, 2);
    assert_eq!(cfg.log.format, LogFormat::Json);
    assert_eq!(cfg.storage.dir.as_deref(), Some(std::path::Path::new("data/runs")));
    assert_eq!(cfg.metrics.listen.map(|a| a.port()), Some(9100));
    assert_eq!(cfg.users.len(), 1);

    let searcher = build_searcher(&cfg.search).unwrap();
    assert_eq!(searcher.name(), "tavily");

    std::env::remove_var(ENV_RADAR_CONFIG_PATH);
    std::env::remove_var(ENV_TAVILY_API_KEY);
}

#[test]
#[serial]
fn missing_env_path_is_an_error() {
    std::env::set_var(ENV_RADAR_CONFIG_PATH, "/definitely/not/here.toml");
    let err = RadarConfig::load_default().unwrap_err();
    assert!(err.to_string().contains(ENV_RADAR_CONFIG_PATH));
    std::env::remove_var(ENV_RADAR_CONFIG_PATH);
}

#[test]
#[serial]
fn missing_env_key_is_reported() {
    std::env::remove_var(ENV_TAVILY_API_KEY);
    let f = write_config(TOML);
    let err = RadarConfig::load_from_file(f.path()).unwrap_err();
    assert!(format!("{err:#}").contains(ENV_TAVILY_API_KEY));
}
