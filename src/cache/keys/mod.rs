/// 缓存键模块
///
/// 键的格式固定为 `资源类型:区分值[:区分值...]`，失效时按 `资源类型:` 前缀整族清除，
/// 不同资源类型之间互不影响。

pub mod archive_keys;
pub mod post_keys;
pub mod product_keys;

pub use archive_keys::{ARCHIVE_KIND, archive_index_key, archive_month_key};
pub use post_keys::{POST_KIND, post_id_key, post_list_key};
pub use product_keys::{PRODUCT_KIND, product_category_key, product_id_key};

/// 键各部分之间的分隔符
pub const KEY_DELIMITER: char = ':';

/// 拼接缓存键
pub fn build_key(kind: &str, discriminators: &[&str]) -> String {
    let mut key = String::from(kind);
    for part in discriminators {
        key.push(KEY_DELIMITER);
        key.push_str(part);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_key_joins_parts_with_delimiter() {
        assert_eq!(build_key("post", &["list", "1", "20"]), "post:list:1:20");
        assert_eq!(build_key("product", &[]), "product");
    }

    #[test]
    fn families_use_distinct_prefixes() {
        let keys = [post_id_key("1"), product_id_key("1"), archive_month_key(2024, 3)];
        assert!(keys[0].starts_with("post:"));
        assert!(keys[1].starts_with("product:"));
        assert!(keys[2].starts_with("archive:"));
    }
}
