//! Outbound notification for generated reports.
//!
//! Delivery is a side channel: it must never change the outcome of the report
//! run that triggered it. Notifications go onto a bounded queue drained by one
//! background worker; every failure along the way is logged and dropped.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Report, ReportKind};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notification {
    pub report_id: Uuid,
    pub kind: ReportKind,
    pub title: String,
    pub recipients: Vec<String>,
    pub summary: String,
}

impl Notification {
    pub fn for_report(report: &Report, recipients: &[String]) -> Self {
        let summary = match report.overall_mean {
            Some(mean) => format!("{} (overall {:.2})", report.title, mean),
            None => report.title.clone(),
        };

        Self {
            report_id: report.id,
            kind: report.kind,
            title: report.title.clone(),
            recipients: recipients.to_vec(),
            summary,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Writes notifications to the log instead of delivering them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        info!(
            report_id = %notification.report_id,
            kind = notification.kind.as_str(),
            recipients = notification.recipients.len(),
            "Report ready: {}",
            notification.summary
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<Notification>,
    recipients: Arc<Vec<String>>,
}

impl NotificationDispatcher {
    /// Starts the worker. It runs until every dispatcher clone is dropped and
    /// the queue is drained; await the handle to flush pending notifications.
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        recipients: Vec<String>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<Notification>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(notification) = receiver.recv().await {
                match notifier.send(&notification).await {
                    Ok(()) => debug!("Delivered notification for report {}", notification.report_id),
                    Err(e) => warn!(
                        "Failed to deliver notification for report {}: {}",
                        notification.report_id, e
                    ),
                }
            }
            debug!("Notification worker stopped");
        });

        (
            Self {
                sender,
                recipients: Arc::new(recipients),
            },
            worker,
        )
    }

    /// Queues a notification without waiting. Never fails the caller.
    pub fn report_generated(&self, report: &Report) {
        let notification = Notification::for_report(report, &self.recipients);

        match self.sender.try_send(notification) {
            Ok(()) => debug!("Queued notification for report {}", report.id),
            Err(TrySendError::Full(notification)) => warn!(
                "Notification queue full, dropping notification for report {}",
                notification.report_id
            ),
            Err(TrySendError::Closed(notification)) => warn!(
                "Notification worker stopped, dropping notification for report {}",
                notification.report_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, _notification: &Notification) -> anyhow::Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _notification: &Notification) -> anyhow::Result<()> {
            anyhow::bail!("mail server unreachable")
        }
    }

    fn sample_report() -> Report {
        let mut report = Report::new(
            ReportKind::General,
            Uuid::new_v4(),
            "General report - Period 1".to_string(),
            serde_json::json!({}),
        );
        report.overall_mean = Some(77.5);
        report
    }

    #[test]
    fn notification_summarizes_report() {
        let report = sample_report();
        let notification = Notification::for_report(&report, &["office@school.test".to_string()]);

        assert_eq!(notification.report_id, report.id);
        assert_eq!(notification.summary, "General report - Period 1 (overall 77.50)");
        assert_eq!(notification.recipients, vec!["office@school.test"]);
    }

    #[tokio::test]
    async fn worker_delivers_queued_notifications() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (dispatcher, worker) = NotificationDispatcher::spawn(notifier.clone(), Vec::new(), 8);

        dispatcher.report_generated(&sample_report());
        dispatcher.report_generated(&sample_report());
        drop(dispatcher);
        worker.await.unwrap();

        assert_eq!(notifier.sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn delivery_failures_are_swallowed() {
        let (dispatcher, worker) =
            NotificationDispatcher::spawn(Arc::new(FailingNotifier), Vec::new(), 8);

        dispatcher.report_generated(&sample_report());
        drop(dispatcher);

        assert!(worker.await.is_ok());
    }

    #[tokio::test]
    async fn dispatch_after_worker_stops_does_not_panic() {
        let (dispatcher, worker) =
            NotificationDispatcher::spawn(Arc::new(LogNotifier), Vec::new(), 1);
        worker.abort();
        let _ = worker.await;

        dispatcher.report_generated(&sample_report());
    }
}
