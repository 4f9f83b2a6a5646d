//! # Notifications
//!
//! Emails leave the request path through a queue. Handlers enqueue a batch and return, a
//! single worker task drains the queue and records the outcome of every message.
//! [`Notifier::drain`] waits until everything queued so far has been sent, the server calls it
//! after graceful shutdown.
//!
//! ## Relay
//!
//! With `MAIL_API_URL` set, each message is POSTed as JSON (`from`, `to`, `subject`, `html`)
//! with `MAIL_API_KEY` as bearer token. Without it, messages are only logged.
use std::{sync::Arc, time::Duration};

use assign::{Project, Task, User};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{
    mpsc::{UnboundedSender, error::SendError, unbounded_channel},
    oneshot,
};
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Mail relay request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail relay rejected message with status {0}")]
    Rejected(StatusCode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), NotifyError>;
}

pub struct HttpMailer {
    client: Client,
    url: String,
    key: Option<String>,
}

impl HttpMailer {
    pub fn new(url: String, key: Option<String>) -> Self {
        let client = match Client::builder().timeout(Duration::from_secs(10)).build() {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to configure mail client, using defaults: {e}");
                Client::new()
            }
        };

        Self { client, url, key }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        let mut request = self.client.post(&self.url).json(email);
        if let Some(key) = &self.key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status()));
        }

        Ok(())
    }
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        info!(to = %email.to, subject = %email.subject, "Mail relay not configured, logging email");
        Ok(())
    }
}

#[derive(Debug)]
pub struct Delivery {
    pub to: String,
    pub result: Result<(), NotifyError>,
}

/// Sends every email in order, one failure does not stop the rest.
pub async fn dispatch_batch(mailer: &dyn Mailer, batch: Vec<Email>) -> Vec<Delivery> {
    let mut deliveries = Vec::with_capacity(batch.len());

    for email in batch {
        let result = mailer.send(&email).await;
        deliveries.push(Delivery {
            to: email.to,
            result,
        });
    }

    deliveries
}

enum Job {
    Send(Vec<Email>),
    Drain(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct Notifier {
    sender: UnboundedSender<Job>,
    from: String,
}

impl Notifier {
    /// Starts the worker. Must be called inside a tokio runtime.
    pub fn spawn(mailer: Arc<dyn Mailer>, from: String) -> Self {
        let (sender, mut receiver) = unbounded_channel::<Job>();

        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let batch = match job {
                    Job::Send(batch) => batch,
                    Job::Drain(done) => {
                        let _ = done.send(());
                        continue;
                    }
                };

                let deliveries = dispatch_batch(mailer.as_ref(), batch).await;

                let mut failed = 0;
                for delivery in &deliveries {
                    if let Err(e) = &delivery.result {
                        failed += 1;
                        warn!(to = %delivery.to, "Failed to send email: {e}");
                    }
                }

                info!(sent = deliveries.len() - failed, failed, "Email batch processed");
            }
        });

        Self { sender, from }
    }

    pub fn enqueue(&self, batch: Vec<Email>) {
        if batch.is_empty() {
            return;
        }

        if let Err(SendError(Job::Send(batch))) = self.sender.send(Job::Send(batch)) {
            warn!(dropped = batch.len(), "Notification worker stopped, dropping email batch");
        }
    }

    /// Resolves once every batch enqueued before this call has been processed.
    pub async fn drain(&self) {
        let (done, wait) = oneshot::channel();

        if self.sender.send(Job::Drain(done)).is_err() || wait.await.is_err() {
            warn!("Notification worker stopped before the queue drained");
        }
    }

    fn email(&self, to: &User, subject: String, html: String) -> Email {
        Email {
            from: self.from.clone(),
            to: to.email.clone(),
            subject,
            html,
        }
    }

    pub fn welcome(&self, user: &User) {
        let email = self.email(
            user,
            format!("Welcome to ProjectFlow, {}", user.name),
            format!("<p>Hi {}, your {} account is ready.</p>", user.name, user.role),
        );

        self.enqueue(vec![email]);
    }

    pub fn project_created(&self, project: &Project, members: &[User]) {
        let batch = members
            .iter()
            .map(|member| {
                self.email(
                    member,
                    format!("New Project: {}", project.name),
                    format!("<p>A new project \"{}\" has been created.</p>", project.name),
                )
            })
            .collect();

        self.enqueue(batch);
    }

    pub fn task_assigned(&self, task: &Task, assignee: &User) {
        let email = self.email(
            assignee,
            format!("New Task Assigned: {}", task.title),
            format!("<p>You have been assigned a new task: \"{}\"</p>", task.title),
        );

        self.enqueue(vec![email]);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct FlakyMailer {
        refuse: &'static str,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&self, email: &Email) -> Result<(), NotifyError> {
            if email.to == self.refuse {
                return Err(NotifyError::Rejected(StatusCode::BAD_GATEWAY));
            }

            self.sent.lock().unwrap().push(email.to.clone());
            Ok(())
        }
    }

    fn email(to: &str) -> Email {
        Email {
            from: "noreply@example.com".to_string(),
            to: to.to_string(),
            subject: "subject".to_string(),
            html: "<p>body</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failure_is_captured_per_item() {
        let mailer = FlakyMailer {
            refuse: "b@example.com",
            sent: Mutex::new(Vec::new()),
        };

        let batch = vec![email("a@example.com"), email("b@example.com"), email("c@example.com")];
        let deliveries = dispatch_batch(&mailer, batch).await;

        assert_eq!(deliveries.len(), 3);
        assert!(deliveries[0].result.is_ok());
        assert!(matches!(
            deliveries[1].result,
            Err(NotifyError::Rejected(StatusCode::BAD_GATEWAY))
        ));
        assert!(deliveries[2].result.is_ok());
        assert_eq!(
            *mailer.sent.lock().unwrap(),
            vec!["a@example.com".to_string(), "c@example.com".to_string()]
        );
    }

    struct SlowMailer {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Mailer for SlowMailer {
        async fn send(&self, email: &Email) -> Result<(), NotifyError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.sent.lock().unwrap().push(email.to.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_drain_waits_for_queued_batches() {
        let mailer = Arc::new(SlowMailer {
            sent: Mutex::new(Vec::new()),
        });
        let notifier = Notifier::spawn(mailer.clone(), "noreply@example.com".to_string());

        notifier.enqueue(vec![email("a@example.com"), email("b@example.com")]);
        notifier.enqueue(vec![email("c@example.com")]);
        notifier.drain().await;

        assert_eq!(
            *mailer.sent.lock().unwrap(),
            vec![
                "a@example.com".to_string(),
                "b@example.com".to_string(),
                "c@example.com".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_everything() {
        let deliveries = dispatch_batch(&LogMailer, vec![email("a@example.com")]).await;

        assert!(deliveries[0].result.is_ok());
    }
}
