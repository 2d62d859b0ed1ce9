use crate::types::push::NotificationPayload;

pub const GROUP_NOTIFICATION_TITLE: &str = "Nuova Notifica di Gruppo";
pub const DEFAULT_TARGET_URL: &str = "/";

/// Builds the notification shown on every device. The body is passed through
/// untouched; blank messages are rejected before this point.
pub fn build_payload(message: &str) -> NotificationPayload {
    NotificationPayload {
        title: GROUP_NOTIFICATION_TITLE.to_string(),
        body: message.to_string(),
        url: DEFAULT_TARGET_URL.to_string(),
    }
}

impl NotificationPayload {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// JSON document the service worker parses on a push event.
    pub fn to_json_bytes(&self) -> Vec<u8> {
        serde_json::json!({
            "title": self.title,
            "body": self.body,
            "url": self.url,
        })
        .to_string()
        .into_bytes()
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn build_payload__should_keep_message_verbatim() {
        // When
        let payload = build_payload("  Ciao famiglia \n");

        // Then
        assert_eq!(payload.title, "Nuova Notifica di Gruppo");
        assert_eq!(payload.body, "  Ciao famiglia \n");
        assert_eq!(payload.url, "/");
    }

    #[test]
    fn build_payload__should_accept_empty_and_plain_messages() {
        assert_eq!(build_payload("").body, "");
        assert_eq!(build_payload("Hello").body, "Hello");
    }

    #[test]
    fn to_json_bytes__should_match_service_worker_shape() {
        // Given
        let payload = build_payload("Hello").with_url("/notifiche");

        // When
        let value: serde_json::Value =
            serde_json::from_slice(&payload.to_json_bytes()).expect("payload json");

        // Then
        assert_eq!(
            value,
            serde_json::json!({
                "title": "Nuova Notifica di Gruppo",
                "body": "Hello",
                "url": "/notifiche",
            })
        );
    }
}
