pub mod dev;
pub mod notifier;
pub mod smtp;

use async_trait::async_trait;

pub use notifier::{Email, Notifier};

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;
}
