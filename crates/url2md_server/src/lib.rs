mod app;
pub mod config;
pub mod context;
pub mod events;
pub mod flow;
pub mod history;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod sampler;

pub use app::run;
pub use config::{ConfigError, ServerConfig};
pub use context::{AppContext, ServerStatus, Transport};
pub use events::EventBus;
pub use flow::{run_conversion, ConversionRequest};
