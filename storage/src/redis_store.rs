use std::collections::HashMap;

use fred::prelude::*;
use log::info;

use crate::{BackendError, GroupBackend, StoredDocument};

/// Name of the Redis hash holding one field per group.
pub const GROUPS_HASH: &str = "groups";

/// Keyed remote store: `HSET groups <group id> <document>`.
#[derive(Clone)]
pub struct RedisBackend {
    client: RedisClient,
    key: String,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> Result<Self, BackendError> {
        let config = RedisConfig::from_url(url)?;
        let client = Builder::from_config(config).build()?;
        client.init().await?;
        info!("Connected to redis backend");
        Ok(RedisBackend {
            client,
            key: GROUPS_HASH.to_string(),
        })
    }
}

impl GroupBackend for RedisBackend {
    async fn load_all(&self) -> Result<Vec<StoredDocument>, BackendError> {
        let fields: HashMap<String, RedisValue> = self.client.hgetall(self.key.as_str()).await?;
        Ok(fields
            .into_iter()
            .map(|(id, value)| {
                let document = value
                    .into_string()
                    .ok_or_else(|| BackendError::NotUtf8(format!("{}/{id}", self.key)));
                StoredDocument { id, document }
            })
            .collect())
    }

    async fn save(&self, id: &str, document: String) -> Result<(), BackendError> {
        self.client
            .hset::<(), _, _>(self.key.as_str(), (id, document))
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        self.client.hdel::<(), _, _>(self.key.as_str(), id).await?;
        Ok(())
    }
}
