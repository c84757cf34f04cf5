// 一次性凭证模块
// 重置密码令牌、邮箱验证码的签发、校验、消费和过期清理

pub mod backend;
pub mod issuer;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use backend::{CredentialBackend, StoreError};
pub use issuer::{TokenIssuer, describe_expiry, is_valid_format};
pub use memory::InMemoryBackend;
pub use models::{Consumption, Credential, IssuedToken, Purpose, RejectReason, Validation};
pub use postgres::PgCredentialBackend;
pub use store::CredentialStore;
