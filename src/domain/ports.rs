use crate::domain::mail::{MailMessage, MessageRef};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 郵件來源的搜尋條件
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// 空白代表全部廠商
    pub vendors: Vec<String>,
    pub days: i64,
    pub max_results: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            vendors: Vec::new(),
            days: 365,
            max_results: 500,
        }
    }
}

#[async_trait]
pub trait MailSource: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<MessageRef>>;
    async fn get(&self, id: &str) -> Result<Option<MailMessage>>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Input: Send;
    type Output: Send;
    type Report: Send;

    async fn extract(&self) -> Result<Vec<Self::Input>>;
    async fn transform(&self, data: Vec<Self::Input>) -> Result<Vec<Self::Output>>;
    async fn load(&self, records: Vec<Self::Output>) -> Result<Self::Report>;
}
