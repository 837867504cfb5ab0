//! Outgoing email settings.

use serde::Serialize;

use crate::document::Document;
use crate::resolve::merge::{overlay, overlay_opt};

/// Transactional email settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailSettings {
    /// Mail delivery backend component path.
    pub backend: String,
    /// Spool directory for the file backend.
    pub file_path: Option<String>,
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub host_user: String,
    pub host_password: String,
    pub default_from_email: String,
    pub default_feedback_email: String,
    /// Sender for error reports to operators.
    pub server_email: String,
    pub tech_support_email: String,
    pub contact_email: String,
    pub bugs_email: String,
    pub payment_support_email: String,
    pub finance_email: Option<String>,
    pub university_email: String,
    pub press_email: String,
    pub contact_mailing_address: String,
    pub activation_email_from_address: Option<String>,
    /// Operators who receive error reports, as (name, address) pairs.
    pub admins: Vec<(String, String)>,
    /// Inbox for in-product feedback, when the feature is used.
    pub feedback_submission_email: Option<String>,
    pub bulk: BulkEmailSettings,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            backend: "lyceum.mail.backends.smtp".to_string(),
            file_path: None,
            host: "localhost".to_string(),
            port: 25,
            use_tls: false,
            host_user: String::new(),
            host_password: String::new(),
            default_from_email: "registration@lyceum.education".to_string(),
            default_feedback_email: "feedback@lyceum.education".to_string(),
            server_email: "platform@lyceum.education".to_string(),
            tech_support_email: "support@lyceum.education".to_string(),
            contact_email: "info@lyceum.education".to_string(),
            bugs_email: "bugs@lyceum.education".to_string(),
            payment_support_email: "billing@lyceum.education".to_string(),
            finance_email: None,
            university_email: "partners@lyceum.education".to_string(),
            press_email: "press@lyceum.education".to_string(),
            contact_mailing_address: String::new(),
            activation_email_from_address: None,
            admins: Vec::new(),
            feedback_submission_email: None,
            bulk: BulkEmailSettings::default(),
        }
    }
}

impl EmailSettings {
    pub(crate) fn apply(&mut self, doc: &Document) {
        overlay(&mut self.backend, &doc.email_backend);
        overlay_opt(&mut self.file_path, &doc.email_file_path);
        overlay(&mut self.host, &doc.email_host);
        overlay(&mut self.port, &doc.email_port);
        overlay(&mut self.use_tls, &doc.email_use_tls);
        overlay(&mut self.host_user, &doc.email_host_user);
        overlay(&mut self.host_password, &doc.email_host_password);
        overlay(&mut self.default_from_email, &doc.default_from_email);
        overlay(&mut self.default_feedback_email, &doc.default_feedback_email);
        overlay(&mut self.server_email, &doc.server_email);
        overlay(&mut self.tech_support_email, &doc.tech_support_email);
        overlay(&mut self.contact_email, &doc.contact_email);
        overlay(&mut self.bugs_email, &doc.bugs_email);
        overlay(&mut self.payment_support_email, &doc.payment_support_email);
        overlay_opt(&mut self.finance_email, &doc.finance_email);
        overlay(&mut self.university_email, &doc.university_email);
        overlay(&mut self.press_email, &doc.press_email);
        overlay(&mut self.contact_mailing_address, &doc.contact_mailing_address);
        overlay_opt(
            &mut self.activation_email_from_address,
            &doc.activation_email_from_address,
        );
        overlay(&mut self.admins, &doc.admins);
        overlay_opt(
            &mut self.feedback_submission_email,
            &doc.feedback_submission_email,
        );
        self.bulk.apply(doc);
    }
}

/// Bulk (course-wide) email settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkEmailSettings {
    /// Sender for bulk mail; falls back to the default from address.
    pub default_from_email: Option<String>,
    pub emails_per_task: u32,
    pub default_retry_delay_secs: u64,
    pub max_retries: u32,
    /// Ceiling on retries for infinitely retried tasks.
    pub infinite_retry_cap: u32,
    pub log_sent_emails: bool,
    pub retry_delay_between_sends_secs: f64,
    /// Routing key for full-course sends. Defaults to the high-mem queue.
    pub routing_key: String,
    /// Routing key for small sends. Defaults to the default-priority queue.
    pub routing_key_small_jobs: String,
}

impl Default for BulkEmailSettings {
    fn default() -> Self {
        Self {
            default_from_email: None,
            emails_per_task: 500,
            default_retry_delay_secs: 30,
            max_retries: 5,
            infinite_retry_cap: 1000,
            log_sent_emails: false,
            retry_delay_between_sends_secs: 0.02,
            routing_key: String::new(),
            routing_key_small_jobs: String::new(),
        }
    }
}

impl BulkEmailSettings {
    fn apply(&mut self, doc: &Document) {
        overlay_opt(&mut self.default_from_email, &doc.bulk_email_default_from_email);
        overlay(&mut self.emails_per_task, &doc.bulk_email_emails_per_task);
        overlay(
            &mut self.default_retry_delay_secs,
            &doc.bulk_email_default_retry_delay,
        );
        overlay(&mut self.max_retries, &doc.bulk_email_max_retries);
        overlay(&mut self.infinite_retry_cap, &doc.bulk_email_infinite_retry_cap);
        overlay(&mut self.log_sent_emails, &doc.bulk_email_log_sent_emails);
        overlay(
            &mut self.retry_delay_between_sends_secs,
            &doc.bulk_email_retry_delay_between_sends,
        );
        // Routing keys resolve in the derivation pass, where queue names exist.
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_overlays() {
        let doc = Document::from_yaml(
            r#"
            EMAIL_HOST: smtp.lyceum.example.edu
            EMAIL_PORT: 587
            EMAIL_USE_TLS: true
            ADMINS:
              - ["Platform Ops", "ops@lyceum.example.edu"]
            "#,
        )
        .unwrap();

        let mut email = EmailSettings::default();
        email.apply(&doc);

        assert_eq!(email.host, "smtp.lyceum.example.edu");
        assert_eq!(email.port, 587);
        assert!(email.use_tls);
        assert_eq!(
            email.admins,
            [("Platform Ops".to_string(), "ops@lyceum.example.edu".to_string())]
        );
        assert_eq!(email.backend, "lyceum.mail.backends.smtp");
    }

    #[test]
    fn test_bulk_email_overlays() {
        let doc = Document::from_yaml(
            r#"
            BULK_EMAIL_EMAILS_PER_TASK: 250
            BULK_EMAIL_LOG_SENT_EMAILS: true
            "#,
        )
        .unwrap();

        let mut email = EmailSettings::default();
        email.apply(&doc);

        assert_eq!(email.bulk.emails_per_task, 250);
        assert!(email.bulk.log_sent_emails);
        assert_eq!(email.bulk.max_retries, 5);
    }
}
