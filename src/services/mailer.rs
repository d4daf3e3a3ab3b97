use async_trait::async_trait;
use std::sync::Mutex;

/// A password reset link ready to be delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct ResetNotice {
    pub email: String,
    pub token: String,
    pub link: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, notice: ResetNotice) -> anyhow::Result<()>;
}

/// Delivers by writing the link to the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, notice: ResetNotice) -> anyhow::Result<()> {
        tracing::info!(email = %notice.email, link = %notice.link, "password reset link");
        Ok(())
    }
}

/// Keeps every notice in memory so tests can read the token back.
#[derive(Default)]
pub struct OutboxMailer {
    sent: Mutex<Vec<ResetNotice>>,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_for(&self, email: &str) -> Option<ResetNotice> {
        let sent = self.sent.lock().ok()?;
        sent.iter().rev().find(|n| n.email == email).cloned()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send_password_reset(&self, notice: ResetNotice) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("outbox lock poisoned"))?
            .push(notice);
        Ok(())
    }
}

pub fn reset_link(app_url: &str, token: &str, email: &str) -> String {
    let mut link = match url::Url::parse(app_url) {
        Ok(base) => base,
        Err(_) => return format!("{}/password/reset/{}?email={}", app_url.trim_end_matches('/'), token, email),
    };
    link.set_path(&format!("{}/password/reset/{}", link.path().trim_end_matches('/'), token));
    link.query_pairs_mut().clear().append_pair("email", email);
    link.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_encodes_email() {
        assert_eq!(
            reset_link("http://localhost:3000", "abc", "a+b@example.com"),
            "http://localhost:3000/password/reset/abc?email=a%2Bb%40example.com"
        );
    }

    #[tokio::test]
    async fn outbox_returns_latest_notice() {
        let outbox = OutboxMailer::new();
        for token in ["one", "two"] {
            outbox
                .send_password_reset(ResetNotice {
                    email: "a@example.com".into(),
                    token: token.into(),
                    link: String::new(),
                })
                .await
                .unwrap();
        }
        assert_eq!(outbox.last_for("a@example.com").unwrap().token, "two");
        assert!(outbox.last_for("b@example.com").is_none());
    }
}
