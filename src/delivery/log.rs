use async_trait::async_trait;

use super::{Delivery, DeliveryChannel, DeliveryError};
use crate::credentials::models::redact;

/// 只写日志的投递渠道，没有配置邮件网关时使用
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDelivery;

#[async_trait]
impl DeliveryChannel for LogDelivery {
    async fn deliver(&self, message: &Delivery) -> Result<(), DeliveryError> {
        tracing::info!(
            to = %message.to,
            purpose = message.purpose.as_str(),
            secret = %redact(&message.secret),
            expires_in = %message.expires_in,
            "No mail relay configured, delivery logged only"
        );
        Ok(())
    }
}
