// 投递渠道
// 把令牌或验证码送到用户手里（邮件网关等），这里只定义接口和两个实现

mod http;
mod log;

pub use self::http::HttpRelayDelivery;
pub use self::log::LogDelivery;

use async_trait::async_trait;
use serde::Serialize;

use crate::credentials::Purpose;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("mail relay request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mail relay rejected message with status {0}")]
    Rejected(u16),
}

/// 待投递的消息
#[derive(Debug, Clone, Serialize)]
pub struct Delivery {
    pub to: String,
    pub purpose: Purpose,
    /// 令牌或验证码明文
    pub secret: String,
    /// 例如 "1 hour"
    pub expires_in: String,
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, message: &Delivery) -> Result<(), DeliveryError>;
}
