//! 笔记本目录

mod filter;
mod memory;

pub use filter::{is_qualified, to_bits};
pub use memory::InMemoryLaptopStore;

use async_trait::async_trait;
use pcbook_common::CallContext;
use pcbook_errors::AppResult;

use crate::api::proto::pcbook::{Filter, Laptop};

/// 目录存储接口
///
/// 存入与读出的都是独立副本，调用方之后的修改不会影响已存储的记录。
#[async_trait]
pub trait LaptopStore: Send + Sync {
    /// 保存记录，返回最终 ID
    ///
    /// ID 为空时生成新的 UUID；非空时必须是合法 UUID。已存在则返回 Conflict。
    async fn save(&self, laptop: Laptop) -> AppResult<String>;

    /// 按 ID 查找，不存在返回 `None`
    async fn find(&self, id: &str) -> AppResult<Option<Laptop>>;

    /// 扫描全部记录，把满足条件的逐条交给 `sink`
    ///
    /// 每条记录之前检查一次调用上下文，取消或超时时提前返回对应错误。
    async fn search(
        &self,
        ctx: &CallContext,
        filter: &Filter,
        sink: &mut dyn LaptopSink,
    ) -> AppResult<()>;
}

/// 搜索结果的接收方
#[async_trait]
pub trait LaptopSink: Send {
    async fn emit(&mut self, laptop: Laptop) -> AppResult<()>;
}

#[async_trait]
impl LaptopSink for Vec<Laptop> {
    async fn emit(&mut self, laptop: Laptop) -> AppResult<()> {
        self.push(laptop);
        Ok(())
    }
}
