use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 凭证用途，不同用途的凭证互不通用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Purpose {
    PasswordReset,
    EmailVerify,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::PasswordReset => "password-reset",
            Purpose::EmailVerify => "email-verify",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "password-reset" => Some(Purpose::PasswordReset),
            "email-verify" => Some(Purpose::EmailVerify),
            _ => None,
        }
    }
}

/// 持久化的一次性凭证
///
/// `value`、`subject`、`purpose`、`expires_at` 写入后不再变化，
/// `used_at` 只会在成功消费时被设置一次。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub value: String,
    pub subject: String,
    pub purpose: Purpose,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    /// 验证码已尝试次数
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        value: String,
        subject: impl Into<String>,
        purpose: Purpose,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            value,
            subject: subject.into(),
            purpose,
            expires_at,
            used_at: None,
            attempts: 0,
            created_at,
        }
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// 到达 `expires_at` 即不可再用
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_used() && !self.is_expired_at(now)
    }

    /// 用于日志，只保留前几位
    pub fn redacted_value(&self) -> String {
        redact(&self.value)
    }
}

/// 长令牌只露出前 8 位，验证码这类短值整体遮住
pub(crate) fn redact(value: &str) -> String {
    const VISIBLE: usize = 8;
    const MIN_LEN_TO_SHOW: usize = 32;
    if value.chars().count() >= MIN_LEN_TO_SHOW {
        let prefix: String = value.chars().take(VISIBLE).collect();
        format!("{prefix}…")
    } else {
        "***".to_string()
    }
}

/// 签发结果，`value` 交给投递渠道发送给用户
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// 不存在、格式错误或用途不符，对外不做区分
    NotFound,
    Expired,
    AlreadyUsed,
    /// 验证码错误次数用尽
    TooManyAttempts,
}

/// 只读校验结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl Validation {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }
}

/// 校验并消费的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consumption {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl Consumption {
    pub fn consumed(subject: String) -> Self {
        Self {
            success: true,
            subject: Some(subject),
            reason: None,
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            success: false,
            subject: None,
            reason: Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn purpose_round_trips_through_its_string_form() {
        for purpose in [Purpose::PasswordReset, Purpose::EmailVerify] {
            assert_eq!(Purpose::parse(purpose.as_str()), Some(purpose));
        }
        assert_eq!(Purpose::parse("login"), None);
        assert_eq!(
            serde_json::to_string(&Purpose::PasswordReset).unwrap(),
            "\"password-reset\""
        );
    }

    #[test]
    fn credential_is_unusable_from_its_deadline_on() {
        let now = Utc::now();
        let credential = Credential::new(
            "ab".repeat(32),
            "user-1",
            Purpose::PasswordReset,
            now,
            now + TimeDelta::hours(1),
        );
        assert!(credential.is_usable_at(now));
        assert!(credential.is_usable_at(now + TimeDelta::minutes(59)));
        assert!(!credential.is_usable_at(now + TimeDelta::hours(1)));
        assert_eq!(credential.redacted_value(), "abababab…");
    }

    #[test]
    fn reasons_serialize_in_upper_snake_case() {
        let body = serde_json::to_value(Consumption::rejected(RejectReason::AlreadyUsed)).unwrap();
        assert_eq!(body, serde_json::json!({"success": false, "reason": "ALREADY_USED"}));
        let body = serde_json::to_value(Validation::valid()).unwrap();
        assert_eq!(body, serde_json::json!({"valid": true}));
    }

    #[test]
    fn short_secrets_are_fully_masked() {
        assert_eq!(redact("123456"), "***");
        assert_eq!(redact("12345678"), "***");
        assert_eq!(redact(""), "***");
        let token = "0123456789abcdef".repeat(4);
        let shown = redact(&token);
        assert_eq!(shown, "01234567…");
        assert!(!shown.contains(&token[8..]));
    }
}
