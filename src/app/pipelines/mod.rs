pub mod purchase_pipeline;

pub use purchase_pipeline::{PurchasePipeline, ScanReport, ScanSettings};
