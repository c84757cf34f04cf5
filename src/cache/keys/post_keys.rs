use super::build_key;

/// 文章缓存键前缀
pub const POST_KIND: &str = "post";

/// 生成单篇文章缓存键
pub fn post_id_key(post_id: &str) -> String {
    build_key(POST_KIND, &["id", post_id])
}

/// 生成文章分页列表缓存键
pub fn post_list_key(page: u32, page_size: u32) -> String {
    build_key(POST_KIND, &["list", &page.to_string(), &page_size.to_string()])
}
