//! Email service façade.
//!
//! Ties validation, the pipeline, the dispatcher and the two stores together.
//! Callers get a [`SendOutcome`] rather than an error for anything that
//! happens after a request is accepted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{info, warn};

use crate::config::Config;
use crate::dispatch::{Dispatcher, SmtpTransport, TransportErrorKind};
use crate::history::{DeliveryRecord, HistoryRepository};
use crate::image::{HttpImageFetcher, ImageCache};
use crate::message::{ImageInfo, Mailbox, OutboundMessage, Recipient};
use crate::pipeline::{Pipeline, PreparedEmail};
use crate::schedule::{ScheduleRepository, ScheduledEmail};
use crate::validation::{describe, validate_send};
use crate::{Error, Result};

/// A request to send one HTML email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    /// Recipients.
    pub to: Vec<Recipient>,
    /// Subject line.
    pub subject: String,
    /// Body HTML, a fragment or a complete document.
    pub html: String,
}

/// Result of a send attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The transport accepted the message.
    Sent {
        /// Provider message id.
        message_id: String,
        /// Image statistics including fetched remote bytes.
        image_info: ImageInfo,
    },
    /// The request was rejected or delivery failed.
    Failed {
        /// Human-readable reason.
        message: String,
        /// Transport classification; `None` for rejected requests.
        kind: Option<TransportErrorKind>,
    },
}

impl SendOutcome {
    /// Returns true if the message was sent.
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

impl Serialize for SendOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Sent {
                message_id,
                image_info,
            } => {
                let mut s = serializer.serialize_struct("SendOutcome", 3)?;
                s.serialize_field("success", &true)?;
                s.serialize_field("messageId", message_id)?;
                s.serialize_field("imageInfo", image_info)?;
                s.end()
            }
            Self::Failed { message, .. } => {
                let mut s = serializer.serialize_struct("SendOutcome", 2)?;
                s.serialize_field("success", &false)?;
                s.serialize_field("message", message)?;
                s.end()
            }
        }
    }
}

/// Counts from one pass over due scheduled emails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    /// Delivered.
    pub sent: usize,
    /// Failed and marked as such.
    pub failed: usize,
    /// Claimed by someone else first.
    pub skipped: usize,
}

/// High-level entry point for sending, previewing and scheduling.
#[derive(Debug)]
pub struct EmailService {
    pipeline: Pipeline,
    dispatcher: Dispatcher,
    sender: Mailbox,
    history: HistoryRepository,
    schedule: ScheduleRepository,
}

impl EmailService {
    /// Assembles a service from its parts.
    #[must_use]
    pub const fn new(
        pipeline: Pipeline,
        dispatcher: Dispatcher,
        sender: Mailbox,
        history: HistoryRepository,
        schedule: ScheduleRepository,
    ) -> Self {
        Self {
            pipeline,
            dispatcher,
            sender,
            history,
            schedule,
        }
    }

    /// Builds a service with SMTP delivery, HTTP image fetching and the
    /// on-disk database named by `config`.
    ///
    /// SMTP settings are checked on the first send, not here.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline settings are invalid, the HTTP
    /// client cannot be built, or the database cannot be opened.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pipeline = Pipeline::from_settings(&config.pipeline)?;

        let database_path = config.database_path()?;
        if let Some(parent) = database_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let database = database_path.to_string_lossy();
        let history = HistoryRepository::new(&database).await?;
        let schedule = ScheduleRepository::new(&database).await?;

        let transport = SmtpTransport::new(config.smtp.clone(), config.timeouts.send());
        let fetcher =
            HttpImageFetcher::new(config.timeouts.fetch(), config.pipeline.max_image_bytes)
                .map_err(|e| Error::Config(format!("HTTP client: {e}")))?;
        let cache = ImageCache::new(config.pipeline.image_cache_entries);
        let dispatcher = Dispatcher::new(
            Arc::new(transport),
            Arc::new(fetcher),
            Arc::new(cache),
            pipeline.cid_domain(),
        );

        Ok(Self::new(
            pipeline,
            dispatcher,
            config.sender.mailbox(),
            history,
            schedule,
        ))
    }

    /// Sender used for every message.
    #[must_use]
    pub const fn sender(&self) -> &Mailbox {
        &self.sender
    }

    /// Delivery history store.
    #[must_use]
    pub const fn history(&self) -> &HistoryRepository {
        &self.history
    }

    /// Scheduled email store.
    #[must_use]
    pub const fn schedules(&self) -> &ScheduleRepository {
        &self.schedule
    }

    /// Runs the pipeline without sending.
    #[must_use]
    pub fn preview(&self, html: &str, subject: &str) -> PreparedEmail {
        self.pipeline.prepare(html, subject)
    }

    /// Validates, prepares and sends a message.
    ///
    /// Requests that fail validation are not recorded; every other attempt
    /// lands in the history as `sent` or `failed`.
    pub async fn send(&self, request: &SendRequest) -> SendOutcome {
        let to: Vec<Mailbox> = request.to.iter().map(Recipient::resolve).collect();
        if let Err(errors) = validate_send(&self.sender, &to, &request.subject, &request.html) {
            let message = describe(&errors);
            warn!(%message, "Rejected send request");
            return SendOutcome::Failed {
                message,
                kind: None,
            };
        }

        self.deliver(to, &request.subject, &request.html).await
    }

    async fn deliver(&self, to: Vec<Mailbox>, subject: &str, html: &str) -> SendOutcome {
        let prepared = self.pipeline.prepare(html, subject);
        let record = DeliveryRecord::new(
            &self.sender,
            to.clone(),
            subject,
            &prepared.html,
            prepared.image_info,
        );

        let message = OutboundMessage {
            from: self.sender.clone(),
            to,
            subject: subject.to_string(),
            html_body: prepared.html,
            plaintext_body: prepared.plaintext,
            attachments: prepared.attachments,
        };

        let (record, outcome) = match self.dispatcher.dispatch(message, prepared.image_info).await {
            Ok(delivery) => {
                let mut record = record.sent(&delivery.receipt.message_id);
                record.image_info = delivery.image_info;
                let outcome = SendOutcome::Sent {
                    message_id: delivery.receipt.message_id,
                    image_info: delivery.image_info,
                };
                (record, outcome)
            }
            Err(e) => {
                let kind = e.kind();
                warn!(error = %e, %kind, "Send failed");
                let message = e.to_string();
                (
                    record.failed(&message),
                    SendOutcome::Failed {
                        message,
                        kind: Some(kind),
                    },
                )
            }
        };

        if let Err(e) = self.history.record(&record).await {
            warn!(error = %e, "Failed to record delivery history");
        }
        outcome
    }

    /// Stores a request for delivery at `at`. Returns the schedule id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an invalid request, or a database error.
    pub async fn schedule(&self, request: &SendRequest, at: DateTime<Utc>) -> Result<i64> {
        let to: Vec<Mailbox> = request.to.iter().map(Recipient::resolve).collect();
        validate_send(&self.sender, &to, &request.subject, &request.html)
            .map_err(Error::Validation)?;

        let id = self
            .schedule
            .schedule(&request.to, &request.subject, &request.html, at)
            .await?;
        info!(id, scheduled_for = %at, "Email scheduled");
        Ok(id)
    }

    /// Cancels a pending scheduled email.
    ///
    /// Returns false if it was already claimed or finished.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScheduleNotFound`] for an unknown id, or a database error.
    pub async fn cancel(&self, id: i64) -> Result<bool> {
        if self.schedule.get(id).await?.is_none() {
            return Err(Error::ScheduleNotFound(id));
        }
        self.schedule.cancel(id).await
    }

    /// Sends every scheduled email due at `now`, once each.
    ///
    /// Failed sends are marked `failed` and not retried. A row whose status
    /// cannot be written stays `processing` and the pass moves on.
    ///
    /// # Errors
    ///
    /// Returns an error if the due rows cannot be read.
    pub async fn process_due(&self, now: DateTime<Utc>) -> Result<ProcessReport> {
        let mut report = ProcessReport::default();

        for email in self.schedule.due(now).await? {
            match self.schedule.claim(email.id).await {
                Ok(true) => {}
                Ok(false) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(id = email.id, error = %e, "Failed to claim scheduled email");
                    report.skipped += 1;
                    continue;
                }
            }

            let marked = match self.send_scheduled(&email).await {
                SendOutcome::Sent { message_id, .. } => {
                    info!(id = email.id, %message_id, "Scheduled email sent");
                    report.sent += 1;
                    self.schedule.mark_sent(email.id).await
                }
                SendOutcome::Failed { message, .. } => {
                    warn!(id = email.id, %message, "Scheduled email failed");
                    report.failed += 1;
                    self.schedule.mark_failed(email.id, &message).await
                }
            };
            if let Err(e) = marked {
                warn!(id = email.id, error = %e, "Failed to record scheduled email status");
            }
        }

        Ok(report)
    }

    async fn send_scheduled(&self, email: &ScheduledEmail) -> SendOutcome {
        self.send(&SendRequest {
            to: email.recipients.clone(),
            subject: email.subject.clone(),
            html: email.html_content.clone(),
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::PipelineSettings;
    use crate::dispatch::TransportError;
    use crate::dispatch::tests::{MapFetcher, MemoryTransport};
    use crate::history::DeliveryStatus;
    use crate::schedule::ScheduleStatus;
    use chrono::Duration;

    struct Harness {
        service: EmailService,
        transport: Arc<MemoryTransport>,
        fetcher: Arc<MapFetcher>,
    }

    async fn harness(fetcher: MapFetcher) -> Harness {
        let transport = Arc::new(MemoryTransport::default());
        let fetcher = Arc::new(fetcher);
        let pipeline = Pipeline::from_settings(&PipelineSettings {
            cid_domain: "example.com".into(),
            ..PipelineSettings::default()
        })
        .unwrap();
        let dispatcher = Dispatcher::new(
            transport.clone(),
            fetcher.clone(),
            Arc::new(ImageCache::new(16)),
            "example.com",
        );
        let service = EmailService::new(
            pipeline,
            dispatcher,
            Mailbox::new("news@example.com").with_name("News"),
            HistoryRepository::in_memory().await.unwrap(),
            ScheduleRepository::in_memory().await.unwrap(),
        );
        Harness {
            service,
            transport,
            fetcher,
        }
    }

    fn request(html: &str) -> SendRequest {
        SendRequest {
            to: vec![Recipient::from("a@example.com")],
            subject: "Welcome".into(),
            html: html.into(),
        }
    }

    #[tokio::test]
    async fn test_inline_png_is_sent_as_related_part() {
        let h = harness(MapFetcher::default()).await;
        let outcome = h
            .service
            .send(&request("<p>Hello</p><img src='data:image/png;base64,iVBORw0KGgo='>"))
            .await;

        let SendOutcome::Sent { image_info, .. } = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(image_info.base64_count, 1);
        assert_eq!(image_info.url_count, 0);

        let message = h.transport.last_message();
        let html = message.html_part().unwrap();
        let inline = message.inline_parts();
        assert_eq!(inline.len(), 1);
        let cid = inline[0].content_id().unwrap();
        assert!(html.contains(&format!("cid:{cid}")));
        assert!(!html.contains("data:image"));
        assert!(inline[0].content_type().unwrap().is("image", "png"));
        assert!(h.fetcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unusable_image_degrades_to_placeholder() {
        let fetcher =
            MapFetcher::default().with("https://cdn.example.com/a.jpg", Some("image/jpeg"), b"jpeg-a");
        let h = harness(fetcher).await;
        let outcome = h
            .service
            .send(&request(concat!(
                r#"<img src="data:image/png;base64,iVBORw0KGgo=">"#,
                r#"<img src="https://cdn.example.com/a.jpg">"#,
                r#"<img src="data:image/png;base64,">"#,
            )))
            .await;

        assert!(outcome.is_sent(), "{outcome:?}");
        let message = h.transport.last_message();
        assert_eq!(message.inline_parts().len(), 2);
        let html = message.html_part().unwrap();
        assert!(html.contains("placehold.co"));

        let entries = h.service.history().list_recent(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].record.status, DeliveryStatus::Sent);
        assert_eq!(entries[0].record.image_info.url_count, 1);
        assert_eq!(entries[0].record.image_info.base64_count, 1);
    }

    #[tokio::test]
    async fn test_http_images_are_fetched_over_https() {
        let fetcher = MapFetcher::default().with("https://cdn.example.com/a.png", None, b"png");
        let h = harness(fetcher).await;
        let outcome = h
            .service
            .send(&request(r#"<img src="http://cdn.example.com/a.png">"#))
            .await;

        assert!(outcome.is_sent(), "{outcome:?}");
        assert_eq!(
            *h.fetcher.calls.lock().unwrap(),
            ["https://cdn.example.com/a.png"]
        );
        assert_eq!(h.transport.last_message().inline_parts().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_is_not_sent_or_recorded() {
        let h = harness(MapFetcher::default()).await;
        let outcome = h
            .service
            .send(&SendRequest {
                to: vec![Recipient::from("not-an-address")],
                subject: " ".into(),
                html: "<p>x</p>".into(),
            })
            .await;

        assert_eq!(
            outcome,
            SendOutcome::Failed {
                message: "Invalid recipient email address; Subject is required".into(),
                kind: None,
            }
        );
        assert!(h.transport.sent.lock().unwrap().is_empty());
        assert!(h.service.history().list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_recorded() {
        let h = harness(MapFetcher::default()).await;
        *h.transport.fail_with.lock().unwrap() =
            Some(TransportError::InvalidAddress("a@example.com".into()));

        let outcome = h.service.send(&request("<p>Hi</p>")).await;
        let SendOutcome::Failed { message, kind } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(kind, Some(TransportErrorKind::Permanent));

        let entries = h.service.history().list_recent(10).await.unwrap();
        assert_eq!(entries[0].record.status, DeliveryStatus::Failed);
        assert_eq!(entries[0].record.error.as_deref(), Some(message.as_str()));
        assert!(entries[0].record.provider_message_id.is_none());
    }

    #[tokio::test]
    async fn test_outcome_serialization() {
        let sent = SendOutcome::Sent {
            message_id: "abc@example.com".into(),
            image_info: ImageInfo {
                base64_count: 1,
                url_count: 0,
                total_size_kb: 0.5,
            },
        };
        assert_eq!(
            serde_json::to_value(&sent).unwrap(),
            serde_json::json!({
                "success": true,
                "messageId": "abc@example.com",
                "imageInfo": {"base64Count": 1, "urlCount": 0, "totalSizeKb": 0.5}
            })
        );

        let failed = SendOutcome::Failed {
            message: "Subject is required".into(),
            kind: None,
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({"success": false, "message": "Subject is required"})
        );
    }

    #[tokio::test]
    async fn test_schedule_rejects_invalid_request() {
        let h = harness(MapFetcher::default()).await;
        let result = h
            .service
            .schedule(&request(""), Utc::now() + Duration::hours(1))
            .await;
        assert!(matches!(result, Err(Error::Validation(errors)) if errors.len() == 1));
        assert!(h.service.schedules().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_due_sends_once() {
        let h = harness(MapFetcher::default()).await;
        let now = Utc::now();
        let due = h
            .service
            .schedule(&request("<p>due</p>"), now - Duration::minutes(1))
            .await
            .unwrap();
        let later = h
            .service
            .schedule(&request("<p>later</p>"), now + Duration::hours(1))
            .await
            .unwrap();

        let report = h.service.process_due(now).await.unwrap();
        assert_eq!(
            report,
            ProcessReport {
                sent: 1,
                failed: 0,
                skipped: 0
            }
        );
        assert_eq!(h.transport.sent.lock().unwrap().len(), 1);

        let again = h.service.process_due(now).await.unwrap();
        assert_eq!(again, ProcessReport::default());

        let schedules = h.service.schedules();
        assert_eq!(schedules.get(due).await.unwrap().unwrap().status, ScheduleStatus::Sent);
        assert_eq!(
            schedules.get(later).await.unwrap().unwrap().status,
            ScheduleStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_process_due_marks_failures_without_retry() {
        let h = harness(MapFetcher::default()).await;
        let now = Utc::now();
        let id = h
            .service
            .schedule(&request("<p>x</p>"), now - Duration::minutes(1))
            .await
            .unwrap();
        *h.transport.fail_with.lock().unwrap() =
            Some(TransportError::Configuration("SMTP host is not configured".into()));

        let report = h.service.process_due(now).await.unwrap();
        assert_eq!(report.failed, 1);

        let email = h.service.schedules().get(id).await.unwrap().unwrap();
        assert_eq!(email.status, ScheduleStatus::Failed);
        assert!(email.last_error.unwrap().contains("SMTP host is not configured"));
        assert_eq!(h.service.process_due(now).await.unwrap(), ProcessReport::default());
    }

    #[tokio::test]
    async fn test_process_due_continues_after_status_write_failure() {
        let h = harness(MapFetcher::default()).await;
        let now = Utc::now();
        let broken = h
            .service
            .schedule(
                &SendRequest {
                    subject: "broken".into(),
                    ..request("<p>a</p>")
                },
                now - Duration::minutes(2),
            )
            .await
            .unwrap();
        let fine = h
            .service
            .schedule(&request("<p>b</p>"), now - Duration::minutes(1))
            .await
            .unwrap();
        sqlx::query(
            r"
            CREATE TRIGGER reject_broken BEFORE UPDATE ON scheduled_emails
            WHEN NEW.status = 'sent' AND OLD.subject = 'broken'
            BEGIN SELECT RAISE(ABORT, 'store unavailable'); END
            ",
        )
        .execute(h.service.schedules().pool())
        .await
        .unwrap();

        let report = h.service.process_due(now).await.unwrap();
        assert_eq!(report.sent, 2);
        assert_eq!(h.transport.sent.lock().unwrap().len(), 2);

        let schedules = h.service.schedules();
        assert_eq!(
            schedules.get(broken).await.unwrap().unwrap().status,
            ScheduleStatus::Processing
        );
        assert_eq!(schedules.get(fine).await.unwrap().unwrap().status, ScheduleStatus::Sent);

        // Not picked up again.
        assert_eq!(h.service.process_due(now).await.unwrap(), ProcessReport::default());
    }

    #[tokio::test]
    async fn test_cancel() {
        let h = harness(MapFetcher::default()).await;
        let id = h
            .service
            .schedule(&request("<p>x</p>"), Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        assert!(h.service.cancel(id).await.unwrap());
        assert!(!h.service.cancel(id).await.unwrap());
        assert!(matches!(h.service.cancel(id + 100).await, Err(Error::ScheduleNotFound(_))));
    }

    #[tokio::test]
    async fn test_from_config_opens_database() {
        let dir = std::env::temp_dir().join(format!("inkpost-test-{:08x}", rand::random::<u32>()));
        let config = Config {
            database_path: Some(dir.join("nested").join("inkpost.db")),
            ..Config::default()
        };

        let service = EmailService::from_config(&config).await.unwrap();
        let id = service
            .schedules()
            .schedule(&[Recipient::from("a@example.com")], "s", "<p/>", Utc::now())
            .await
            .unwrap();
        assert!(service.schedules().get(id).await.unwrap().is_some());
        assert!(dir.join("nested").join("inkpost.db").exists());
        assert!(service.preview("<p>x</p>", "s").html.contains("<p>x</p>"));

        drop(service);
        let _ = std::fs::remove_dir_all(dir);
    }
}
