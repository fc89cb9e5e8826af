//! 评分累加

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use pcbook_errors::{AppError, AppResult};

/// 单条记录的评分快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rating {
    pub count: u32,
    pub sum: f64,
}

impl Rating {
    pub fn average(&self) -> f64 {
        self.sum / f64::from(self.count)
    }
}

#[async_trait]
pub trait RatingStore: Send + Sync {
    /// 原子地累加一次评分，返回更新后的快照
    async fn add(&self, laptop_id: &str, score: f64) -> AppResult<Rating>;
}

#[derive(Debug, Default)]
pub struct InMemoryRatingStore {
    ratings: Mutex<HashMap<String, Rating>>,
}

impl InMemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RatingStore for InMemoryRatingStore {
    async fn add(&self, laptop_id: &str, score: f64) -> AppResult<Rating> {
        let mut ratings = self
            .ratings
            .lock()
            .map_err(|_| AppError::internal("rating store lock poisoned"))?;

        let rating = ratings
            .entry(laptop_id.to_string())
            .and_modify(|r| {
                r.count += 1;
                r.sum += score;
            })
            .or_insert(Rating {
                count: 1,
                sum: score,
            });

        Ok(*rating)
    }
}
