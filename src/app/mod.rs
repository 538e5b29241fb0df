pub mod pipelines;
pub mod report;
