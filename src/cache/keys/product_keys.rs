use super::build_key;

/// 商品缓存键前缀
pub const PRODUCT_KIND: &str = "product";

/// 生成单个商品缓存键
pub fn product_id_key(product_id: &str) -> String {
    build_key(PRODUCT_KIND, &["id", product_id])
}

/// 生成商品列表缓存键
///
/// 未指定分类时用 `product:all`，不会和任何 `product:category:*` 重名。
pub fn product_category_key(category: Option<&str>) -> String {
    match category {
        Some(category) => build_key(PRODUCT_KIND, &["category", category]),
        None => build_key(PRODUCT_KIND, &["all"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_listing_does_not_share_a_key_with_any_category() {
        assert_eq!(product_category_key(None), "product:all");
        assert_eq!(product_category_key(Some("all")), "product:category:all");
        assert_ne!(product_category_key(None), product_category_key(Some("all")));
    }
}
