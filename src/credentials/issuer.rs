use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};

use super::models::{IssuedToken, Purpose};
use crate::clock::SharedClock;

/// 令牌随机字节数，十六进制后 64 个字符
pub const TOKEN_BYTES: usize = 32;
pub const TOKEN_HEX_LEN: usize = TOKEN_BYTES * 2;
/// 验证码位数
pub const CODE_DIGITS: usize = 6;

/// 重置密码令牌默认有效期
pub fn default_reset_ttl() -> TimeDelta {
    TimeDelta::hours(1)
}

/// 生成令牌和验证码，计算过期时间
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    clock: SharedClock,
}

impl TokenIssuer {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// 签发 64 位小写十六进制令牌
    pub fn issue(&self, ttl: TimeDelta) -> IssuedToken {
        IssuedToken {
            value: generate_token(),
            expires_at: self.expires_at(ttl),
        }
    }

    /// 签发 6 位数字验证码
    pub fn issue_code(&self, ttl: TimeDelta) -> IssuedToken {
        IssuedToken {
            value: generate_code(),
            expires_at: self.expires_at(ttl),
        }
    }

    pub fn expires_at(&self, ttl: TimeDelta) -> DateTime<Utc> {
        self.now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self, expires_at: DateTime<Utc>) -> bool {
        self.now() > expires_at
    }

    /// 剩余有效时间，不会小于零
    pub fn time_remaining(&self, expires_at: DateTime<Utc>) -> TimeDelta {
        (expires_at - self.now()).max(TimeDelta::zero())
    }
}

pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn generate_code() -> String {
    let code: u32 = OsRng.gen_range(0..1_000_000);
    format!("{code:06}")
}

/// 只检查结构，不查存储
pub fn is_valid_format(value: &str) -> bool {
    value.len() == TOKEN_HEX_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

pub fn is_valid_code_format(code: &str) -> bool {
    code.len() == CODE_DIGITS && code.bytes().all(|b| b.is_ascii_digit())
}

/// 验证码落库前的摘要，库里不保存明文验证码
pub fn code_digest(purpose: Purpose, subject: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(purpose.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(subject.as_bytes());
    hasher.update(b"|");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// 给用户看的有效期描述，例如 "1 hour"、"15 minutes"
pub fn describe_expiry(ttl: TimeDelta) -> String {
    fn plural(n: i64, unit: &str) -> String {
        if n == 1 {
            format!("1 {unit}")
        } else {
            format!("{n} {unit}s")
        }
    }

    let minutes = ttl.num_minutes();
    if minutes >= 60 && minutes % 60 == 0 {
        plural(minutes / 60, "hour")
    } else if minutes >= 1 {
        plural(minutes, "minute")
    } else {
        plural(ttl.num_seconds().max(0), "second")
    }
}
