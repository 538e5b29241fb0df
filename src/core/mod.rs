pub mod csv_summary;
pub mod etl;
pub mod extraction;
pub mod html_text;
pub mod mailbox;
pub mod organizer;
pub mod queue_store;
pub mod review_queue;
pub mod vendors;

pub use crate::domain::ports::{MailSource, Pipeline, SearchQuery, Storage};
pub use crate::utils::error::Result;
