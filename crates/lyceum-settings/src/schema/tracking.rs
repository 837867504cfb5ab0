//! Learner event tracking and analytics settings.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::Value;

use crate::document::Document;
use crate::resolve::merge::{extend_list, merge_map, overlay, overlay_opt};

/// Event tracking settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingSettings {
    /// Tracking backends by name. Document entries merge in per key.
    pub backends: BTreeMap<String, Value>,
    /// Event names forwarded to the analytics vendor. Document entries
    /// extend the built-in list.
    pub segment_emit_allowlist: Vec<String>,
    /// Shared secret verifying vendor webhook callbacks.
    pub segment_webhook_secret: Option<String>,
    /// Vendor API write key. Absent disables vendor forwarding.
    pub segment_key: Option<String>,
    pub segment_allowed_types: Vec<String>,
    pub segment_disallowed_substring_names: Vec<String>,
    /// Vendor source names to platform names.
    pub segment_source_map: BTreeMap<String, String>,
    /// Request paths excluded from tracking.
    pub ignore_url_patterns: Vec<String>,
    pub google_analytics_account: Option<String>,
    pub google_analytics_tracking_id: Option<String>,
    pub google_site_verification_id: Option<String>,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            backends: BTreeMap::new(),
            segment_emit_allowlist: Vec::new(),
            segment_webhook_secret: None,
            segment_key: None,
            segment_allowed_types: vec!["track".to_string()],
            segment_disallowed_substring_names: Vec::new(),
            segment_source_map: default_source_map(),
            ignore_url_patterns: default_ignore_patterns(),
            google_analytics_account: None,
            google_analytics_tracking_id: None,
            google_site_verification_id: None,
        }
    }
}

fn default_source_map() -> BTreeMap<String, String> {
    [
        ("analytics-android", "mobile"),
        ("analytics-ios", "mobile"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_ignore_patterns() -> Vec<String> {
    ["^/event", "^/login", "^/heartbeat", "^/segmentio/event", "^/performance"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl TrackingSettings {
    pub(crate) fn apply(&mut self, doc: &Document) {
        merge_map(&mut self.backends, &doc.tracking_backends);
        extend_list(
            &mut self.segment_emit_allowlist,
            &doc.tracking_segmentio_emit_allowlist,
        );
        overlay_opt(
            &mut self.segment_webhook_secret,
            &doc.tracking_segmentio_webhook_secret,
        );
        overlay_opt(&mut self.segment_key, &doc.segment_key);
        overlay(
            &mut self.segment_allowed_types,
            &doc.tracking_segmentio_allowed_types,
        );
        overlay(
            &mut self.segment_disallowed_substring_names,
            &doc.tracking_segmentio_disallowed_substring_names,
        );
        overlay(
            &mut self.segment_source_map,
            &doc.tracking_segmentio_source_map,
        );
        overlay(&mut self.ignore_url_patterns, &doc.tracking_ignore_url_patterns);
        overlay_opt(
            &mut self.google_analytics_account,
            &doc.google_analytics_account,
        );
        overlay_opt(
            &mut self.google_analytics_tracking_id,
            &doc.google_analytics_tracking_id,
        );
        overlay_opt(
            &mut self.google_site_verification_id,
            &doc.google_site_verification_id,
        );
    }
}

// =============================================================================
// Tests
// =============================================================================
