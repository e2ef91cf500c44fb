pub mod radar;

pub use radar::{
    ConcurrencyConfig, LlmConfig, LogConfig, LogFormat, RadarConfig, SearchConfig,
    SearchProviderKind, SearxngConfig, TavilyConfig,
};
