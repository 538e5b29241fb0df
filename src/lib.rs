pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::ScanConfig;
pub use config::{cli::LocalStorage, toml_config::TreehouseConfig};

pub use app::pipelines::{PurchasePipeline, ScanReport, ScanSettings};
pub use core::{etl::EtlEngine, mailbox::LocalMailbox, review_queue::ReviewQueue};
pub use utils::error::{Result, TreehouseError};
