//! In-memory processed-event store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::checkout::ProviderKind;
use crate::domain::foundation::DomainError;
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository};

#[derive(Default)]
pub struct InMemoryWebhookEventRepository {
    records: RwLock<HashMap<(ProviderKind, String), WebhookEventRecord>>,
}

impl InMemoryWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<WebhookEventRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEventRepository {
    async fn find_by_event_id(
        &self,
        provider: ProviderKind,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        Ok(self
            .records
            .read()
            .await
            .get(&(provider, event_id.to_string()))
            .cloned())
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let mut records = self.records.write().await;
        let key = (record.provider, record.event_id.clone());
        if records.contains_key(&key) {
            return Ok(SaveResult::AlreadyExists);
        }
        records.insert(key, record);
        Ok(SaveResult::Inserted)
    }

    async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.processed_at >= timestamp);
        Ok((before - records.len()) as u64)
    }
}
