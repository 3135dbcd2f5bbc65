//! Aggregates for report generation.

use std::collections::BTreeMap;

use proctor_events::AlertKind;
use serde::Serialize;

use crate::{ViolationKind, ViolationRecord};

/// Report weight of a violation kind (1 to 5).
pub fn severity(kind: AlertKind) -> u32 {
    match kind {
        AlertKind::FaceDisappeared => 1,
        AlertKind::MouthMoving | AlertKind::VoiceDetected | AlertKind::SpeechViolation => 3,
        AlertKind::MultipleFaces => 4,
        AlertKind::ObjectDetected => 5,
        _ => 1,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityPoint {
    pub time: String,
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub severity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViolationStats {
    pub total: usize,
    pub by_type: BTreeMap<ViolationKind, usize>,
    pub timeline: Vec<SeverityPoint>,
    pub severity_score: u32,
    pub average_severity: f64,
}

impl ViolationStats {
    pub fn from_records(records: &[ViolationRecord]) -> Self {
        let mut stats = ViolationStats {
            total: records.len(),
            ..Default::default()
        };

        for record in records {
            // Names this build does not know weigh as the lowest severity.
            let severity = record.kind.alert_kind().map_or(1, severity);
            *stats.by_type.entry(record.kind.clone()).or_default() += 1;
            stats.timeline.push(SeverityPoint {
                time: record.timestamp.clone(),
                kind: record.kind.clone(),
                severity,
            });
            stats.severity_score += severity;
        }

        if stats.total > 0 {
            stats.average_severity = stats.severity_score as f64 / stats.total as f64;
        }
        stats
    }
}
