use async_trait::async_trait;

use super::EmailProvider;

pub struct LogEmailProvider;

#[async_trait]
impl EmailProvider for LogEmailProvider {
    async fn send_email(&self, to: &str, subject: &str, _html: &str) -> anyhow::Result<()> {
        tracing::info!(to, subject, "email delivery skipped (SMTP not configured)");
        Ok(())
    }
}
