use super::build_key;

/// 归档缓存键前缀
pub const ARCHIVE_KIND: &str = "archive";

/// 生成按月归档缓存键
pub fn archive_month_key(year: i32, month: u32) -> String {
    build_key(ARCHIVE_KIND, &[&year.to_string(), &format!("{month:02}")])
}

/// 生成归档目录缓存键
pub fn archive_index_key() -> String {
    build_key(ARCHIVE_KIND, &["index"])
}
