use regex::Regex;

use super::keys::KEY_DELIMITER;

/// 缓存键匹配模式
///
/// 模式按正则整体匹配（自动加 `^...$` 锚点），`"post:.*"` 不会命中 `"repost:1"`。
/// 无法编译的模式退化为字面量，只匹配完全相同的键。
#[derive(Debug, Clone)]
pub struct KeyPattern {
    source: String,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Regex(Regex),
    Literal,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Self {
        let matcher = match Regex::new(&format!("^(?:{pattern})$")) {
            Ok(re) => Matcher::Regex(re),
            Err(e) => {
                tracing::warn!(pattern, error = %e, "Invalid cache key pattern, matching literally");
                Matcher::Literal
            }
        };
        Self {
            source: pattern.to_string(),
            matcher,
        }
    }

    /// 某一类资源的全部键：`kind:` 开头
    pub fn family(kind: &str) -> Self {
        let source = format!("{}{}.*", regex::escape(kind), KEY_DELIMITER);
        Self::new(&source)
    }

    pub fn is_match(&self, key: &str) -> bool {
        match &self.matcher {
            Matcher::Regex(re) => re.is_match(key),
            Matcher::Literal => key == self.source,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}
