use std::sync::Arc;

use tokio::sync::mpsc;

use super::EmailProvider;

#[derive(Debug, Clone)]
pub struct Email {
    pub kind: &'static str,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub booking_id: Option<String>,
    pub request_id: Option<String>,
    pub business_id: Option<String>,
}

impl Email {
    pub fn new(kind: &'static str, to: &str, subject: impl Into<String>, html: String) -> Self {
        Self {
            kind,
            to: to.to_string(),
            subject: subject.into(),
            html,
            booking_id: None,
            request_id: None,
            business_id: None,
        }
    }

    pub fn booking(mut self, id: &str) -> Self {
        self.booking_id = Some(id.to_string());
        self
    }

    pub fn request(mut self, id: &str) -> Self {
        self.request_id = Some(id.to_string());
        self
    }

    pub fn business(mut self, id: &str) -> Self {
        self.business_id = Some(id.to_string());
        self
    }
}

#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Email>,
}

impl Notifier {
    /// Must be called from within a tokio runtime.
    pub fn spawn(provider: Arc<dyn EmailProvider>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Email>();

        tokio::spawn(async move {
            while let Some(email) = rx.recv().await {
                let provider = Arc::clone(&provider);
                tokio::spawn(async move {
                    deliver(provider.as_ref(), &email).await;
                });
            }
            tracing::debug!("notification queue closed");
        });

        Self { tx }
    }

    pub fn enqueue(&self, email: Email) {
        if let Err(mpsc::error::SendError(email)) = self.tx.send(email) {
            tracing::error!(
                kind = email.kind,
                to = %email.to,
                booking_id = email.booking_id.as_deref(),
                request_id = email.request_id.as_deref(),
                business_id = email.business_id.as_deref(),
                "notification worker gone, email dropped"
            );
        }
    }
}

pub async fn deliver(provider: &dyn EmailProvider, email: &Email) -> bool {
    match provider.send_email(&email.to, &email.subject, &email.html).await {
        Ok(()) => {
            tracing::debug!(kind = email.kind, to = %email.to, "email sent");
            true
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                kind = email.kind,
                to = %email.to,
                booking_id = email.booking_id.as_deref(),
                request_id = email.request_id.as_deref(),
                business_id = email.business_id.as_deref(),
                "failed to send email"
            );
            false
        }
    }
}
