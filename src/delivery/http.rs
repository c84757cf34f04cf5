use std::time::Duration;

use async_trait::async_trait;

use super::{Delivery, DeliveryChannel, DeliveryError};

/// 把消息以 JSON POST 给邮件网关
#[derive(Debug, Clone)]
pub struct HttpRelayDelivery {
    client: reqwest::Client,
    url: String,
}

impl HttpRelayDelivery {
    pub fn new(url: impl Into<String>) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl DeliveryChannel for HttpRelayDelivery {
    async fn deliver(&self, message: &Delivery) -> Result<(), DeliveryError> {
        let response = self.client.post(&self.url).json(message).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                "Mail relay rejected {} message: {}",
                message.purpose.as_str(),
                status
            );
            return Err(DeliveryError::Rejected(status.as_u16()));
        }
        tracing::debug!("Delivered {} message via relay", message.purpose.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

    use super::*;
    use crate::credentials::Purpose;

    type Inbox = Arc<Mutex<Vec<serde_json::Value>>>;

    async fn relay(State(inbox): State<Inbox>, Json(body): Json<serde_json::Value>) -> StatusCode {
        let rejected = body["to"] == "bounce@example.com";
        inbox.lock().unwrap().push(body);
        if rejected {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::ACCEPTED
        }
    }

    async fn spawn_relay() -> (String, Inbox) {
        let inbox = Inbox::default();
        let app = Router::new()
            .route("/send", post(relay))
            .with_state(inbox.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/send"), inbox)
    }

    fn message(to: &str) -> Delivery {
        Delivery {
            to: to.into(),
            purpose: Purpose::EmailVerify,
            secret: "123456".into(),
            expires_in: "15 minutes".into(),
        }
    }

    #[tokio::test]
    async fn posts_message_as_json() {
        let (url, inbox) = spawn_relay().await;
        let channel = HttpRelayDelivery::new(url).unwrap();

        channel.deliver(&message("a@example.com")).await.unwrap();

        let received = inbox.lock().unwrap().clone();
        assert_eq!(
            received,
            vec![serde_json::json!({
                "to": "a@example.com",
                "purpose": "email-verify",
                "secret": "123456",
                "expires_in": "15 minutes",
            })]
        );
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (url, _inbox) = spawn_relay().await;
        let channel = HttpRelayDelivery::new(url).unwrap();

        let err = channel.deliver(&message("bounce@example.com")).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected(422)));
    }
}
