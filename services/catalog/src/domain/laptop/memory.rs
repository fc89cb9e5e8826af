//! 内存目录存储

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use pcbook_common::CallContext;
use pcbook_errors::{AppError, AppResult};
use tracing::{debug, info};
use uuid::Uuid;

use super::{LaptopSink, LaptopStore, is_qualified};
use crate::api::proto::pcbook::{Filter, Laptop};

#[derive(Debug, Default)]
pub struct InMemoryLaptopStore {
    data: RwLock<HashMap<String, Laptop>>,
}

impl InMemoryLaptopStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().map(|data| data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn keys(&self) -> AppResult<Vec<String>> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.keys().cloned().collect())
    }

    fn get(&self, id: &str) -> AppResult<Option<Laptop>> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.get(id).cloned())
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::internal("laptop store lock poisoned")
}

#[async_trait]
impl LaptopStore for InMemoryLaptopStore {
    async fn save(&self, mut laptop: Laptop) -> AppResult<String> {
        if laptop.id.is_empty() {
            laptop.id = Uuid::new_v4().to_string();
        } else if let Err(e) = Uuid::parse_str(&laptop.id) {
            return Err(AppError::validation(format!(
                "laptop ID is not a valid UUID: {}",
                e
            )));
        }

        let id = laptop.id.clone();
        let mut data = self.data.write().map_err(poisoned)?;
        if data.contains_key(&id) {
            return Err(AppError::conflict(format!(
                "laptop with ID {} already exists",
                id
            )));
        }
        data.insert(id.clone(), laptop);

        info!(laptop_id = %id, "Laptop saved");
        Ok(id)
    }

    async fn find(&self, id: &str) -> AppResult<Option<Laptop>> {
        self.get(id)
    }

    async fn search(
        &self,
        ctx: &CallContext,
        filter: &Filter,
        sink: &mut dyn LaptopSink,
    ) -> AppResult<()> {
        // 先取键快照，再逐条加读锁取副本；锁不会跨越 emit 的挂起点
        for id in self.keys()? {
            ctx.check()?;

            // 扫描期间被删除的键直接跳过
            let Some(laptop) = self.get(&id)? else {
                continue;
            };

            if is_qualified(filter, &laptop) {
                debug!(laptop_id = %id, "Laptop matched filter");
                sink.emit(laptop).await?;
            }
        }

        Ok(())
    }
}
