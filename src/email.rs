//! Outgoing e-mail.
//!
//! Mail is best-effort: it is handed to a background task and a failure is
//! only logged, never reported to the request that triggered it.

use std::{
    collections::BTreeMap,
    fs::{create_dir_all, File},
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::consts;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Email {
    pub pk: u64,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default, Serialize, Deserialize)]
struct OutboxDb {
    next_pk: u64,
    emails: BTreeMap<u64, Email>,
}

/// Simulated mail transport: every e-mail is appended to a YAML file.
pub struct Outbox {
    path: Option<PathBuf>,
    db: Mutex<OutboxDb>,
}

impl Outbox {
    /// Opens the outbox stored at `path`, starting empty if the file is
    /// missing or unreadable.
    pub fn open(path: PathBuf) -> Self {
        let db = File::open(&path)
            .ok()
            .and_then(|file| serde_yaml::from_reader(file).ok())
            .unwrap_or_default();
        Self {
            path: Some(path),
            db: Mutex::new(db),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            db: Mutex::new(OutboxDb::default()),
        }
    }

    pub fn sent(&self) -> Vec<Email> {
        self.db
            .lock()
            .map(|db| db.emails.values().cloned().collect())
            .unwrap_or_default()
    }

    fn save(&self, db: &OutboxDb) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent).or(Err(anyhow!("Failed to create outbox directory")))?;
            }
        }
        let file = File::create(path)?;
        serde_yaml::to_writer(file, db).or(Err(anyhow!("Failed to serialize outbox")))?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let mut db = self.db.lock().or(Err(anyhow!("Outbox poisoned")))?;

        db.next_pk += 1;
        let pk = db.next_pk;
        db.emails.insert(
            pk,
            Email {
                pk,
                from: consts::SENDER_ADDRESS.to_string(),
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            },
        );
        self.save(&db)
    }
}

/// Sends an e-mail on a background task. Errors are logged and dropped.
pub fn send_in_background(mailer: Arc<dyn Mailer>, to: String, subject: String, body: String) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        error!("No async runtime available, email to {} dropped", to);
        return;
    };

    runtime.spawn(async move {
        match mailer.send(&to, &subject, &body).await {
            Ok(()) => info!("Sent \"{}\" to {}", subject, to),
            Err(e) => error!("Failed to send email to {}: {}", to, e),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_outbox_persists_emails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox.yaml");

        let outbox = Outbox::open(path.clone());
        outbox.send("a@example.com", "Hello", "First").await.unwrap();
        outbox.send("b@example.com", "Hello", "Second").await.unwrap();

        let reopened = Outbox::open(path);
        let sent = reopened.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "a@example.com");
        assert_eq!(sent[1].body, "Second");
        assert_eq!(sent[1].from, consts::SENDER_ADDRESS);
    }

    #[tokio::test]
    async fn test_background_send_reaches_mailer() {
        let outbox = Arc::new(Outbox::in_memory());
        send_in_background(
            outbox.clone(),
            "c@example.com".to_string(),
            "Subject".to_string(),
            "Body".to_string(),
        );

        for _ in 0..10 {
            if !outbox.sent().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(outbox.sent().len(), 1);
    }
}
