//! Sender that POSTs each notice as JSON to a configured endpoint.

use std::time::Duration;

use readzone_core::service::notifier::NotificationSender;
use readzone_types::error::NotificationError;
use readzone_types::notification::ExpirationMessage;

#[derive(Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
    url: String,
}

impl WebhookSender {
    pub fn new(url: &str, timeout_ms: u64) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| NotificationError::Delivery(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl NotificationSender for WebhookSender {
    async fn send(&self, message: &ExpirationMessage) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Delivery(format!(
                "webhook responded with {status}"
            )));
        }

        tracing::debug!(draft_id = %message.draft_id, %status, "expiration notice delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readzone_types::draft::DraftId;
    use readzone_types::notification::NotificationClass;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one connection, capture the request, answer with `status_line`.
    async fn one_shot_server(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hooks/drafts", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut request = String::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.push_str(&String::from_utf8_lossy(&buf[..n]));
                if n == 0 || request.contains("\"body\"") {
                    break;
                }
            }
            let response = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            request
        });
        (url, handle)
    }

    fn message() -> ExpirationMessage {
        ExpirationMessage {
            draft_id: DraftId::new(),
            owner_id: "user-1".to_string(),
            class: NotificationClass::FinalWarning,
            subject: "Your draft review of \"Foo\" expires tomorrow".to_string(),
            body: "Open it to keep your progress.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_posts_json_message() {
        let (url, server) = one_shot_server("200 OK").await;
        let sender = WebhookSender::new(&url, 5000).unwrap();

        sender.send(&message()).await.unwrap();
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /hooks/drafts"));
        assert!(request.contains("\"owner_id\":\"user-1\""));
    }

    #[tokio::test]
    async fn test_error_status_is_delivery_failure() {
        let (url, _server) = one_shot_server("503 Service Unavailable").await;
        let sender = WebhookSender::new(&url, 5000).unwrap();

        let err = sender.send(&message()).await.unwrap_err();
        assert!(matches!(err, NotificationError::Delivery(ref m) if m.contains("503")));
    }
}
