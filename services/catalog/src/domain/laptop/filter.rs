//! 搜索条件求值

use crate::api::proto::pcbook::{Filter, Laptop, Memory, memory::Unit};

/// 判断笔记本是否满足过滤条件
///
/// - `max_price_usd` 为 0 表示不限价格
/// - 未设置 `min_ram` 表示不限内存
/// - 缺少 CPU / 内存信息的记录按 0 参与比较
pub fn is_qualified(filter: &Filter, laptop: &Laptop) -> bool {
    if filter.max_price_usd > 0.0 && laptop.price_usd > filter.max_price_usd {
        return false;
    }

    let (cores, min_ghz) = laptop
        .cpu
        .as_ref()
        .map(|cpu| (cpu.number_cores, cpu.min_ghz))
        .unwrap_or((0, 0.0));

    if cores < filter.min_cpu_cores {
        return false;
    }

    if min_ghz < filter.min_cpu_ghz {
        return false;
    }

    if let Some(min_ram) = filter.min_ram.as_ref() {
        let ram = laptop.ram.as_ref().map(to_bits).unwrap_or(0);
        if ram < to_bits(min_ram) {
            return false;
        }
    }

    true
}

/// 统一换算为比特（溢出时取上限）
pub fn to_bits(memory: &Memory) -> u64 {
    let shift = match memory.unit() {
        Unit::Bit => 0,
        Unit::Byte => 3,
        Unit::Kilobyte => 13,
        Unit::Megabyte => 23,
        Unit::Gigabyte => 33,
        Unit::Terabyte => 43,
        Unit::Unspecified => return 0,
    };

    memory.value.saturating_mul(1u64 << shift)
}
