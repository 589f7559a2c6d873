// src/repair/report.rs — Before/after quality report

use serde::{Deserialize, Serialize};

use super::parser::{IssueSnapshot, MeshMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDelta {
    pub before: u64,
    pub after: u64,
    pub reduced: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsDelta {
    pub triangle_count_before: Option<u64>,
    pub triangle_count_after: Option<u64>,
    pub triangle_count_delta: Option<i64>,
    pub part_count_before: Option<u64>,
    pub part_count_after: Option<u64>,
    pub part_count_delta: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    pub errors: ErrorDelta,
    pub metrics: MetricsDelta,
    pub confidence: Confidence,
}

impl QualityReport {
    pub fn build(
        before: &IssueSnapshot,
        after: &IssueSnapshot,
        before_metrics: &MeshMetrics,
        after_metrics: &MeshMetrics,
    ) -> Self {
        let before_total = before.total();
        let after_total = after.total();
        let reduced = before_total.saturating_sub(after_total);

        let confidence = if after_total == 0 {
            Confidence::High
        } else if reduced > 0 {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        Self {
            errors: ErrorDelta {
                before: before_total,
                after: after_total,
                reduced,
            },
            metrics: MetricsDelta {
                triangle_count_before: before_metrics.triangle_count,
                triangle_count_after: after_metrics.triangle_count,
                triangle_count_delta: delta(before_metrics.triangle_count, after_metrics.triangle_count),
                part_count_before: before_metrics.part_count,
                part_count_after: after_metrics.part_count,
                part_count_delta: delta(before_metrics.part_count, after_metrics.part_count),
            },
            confidence,
        }
    }
}

fn delta(before: Option<u64>, after: Option<u64>) -> Option<i64> {
    let (b, a) = (before?, after?);
    Some(i64::try_from(a).ok()? - i64::try_from(b).ok()?)
}

impl std::fmt::Display for QualityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn show<T: std::fmt::Display>(v: Option<T>) -> String {
            v.map(|v| v.to_string()).unwrap_or_else(|| "n/a".into())
        }
        let m = &self.metrics;
        writeln!(f, "Confidence: {}", self.confidence)?;
        writeln!(
            f,
            "Errors: {} -> {} (reduced: {})",
            self.errors.before, self.errors.after, self.errors.reduced
        )?;
        writeln!(
            f,
            "Triangles: {} -> {} (delta: {})",
            show(m.triangle_count_before),
            show(m.triangle_count_after),
            show(m.triangle_count_delta)
        )?;
        write!(
            f,
            "Parts: {} -> {} (delta: {})",
            show(m.part_count_before),
            show(m.part_count_after),
            show(m.part_count_delta)
        )
    }
}
