pub mod config;
pub mod error;
pub mod ordering;
pub mod traits;
pub mod types;

pub use config::{
    ConfigManager, DiscoveryConfig, LoggingConfig, RefreshConfig, RegionConfig, Settings,
    ThrottleConfig,
};
pub use error::*;
pub use ordering::*;
pub use traits::*;
pub use types::*;
