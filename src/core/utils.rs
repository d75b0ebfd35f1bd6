//! 核心工具函数

/// 获取当前Unix时间戳（毫秒），用于诊断记录排序
///
/// ```rust
/// use property_bridge::core::utils::current_timestamp_ms;
///
/// assert!(current_timestamp_ms() > 0);
/// ```
pub fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Case-insensitive substring test used by name filters.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
