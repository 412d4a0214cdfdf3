// Annotation domain models
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationKind {
    Peak,
    Low,
    RapidIncrease,
    RapidDecrease,
    Event,
}

/// Navigable marker derived from a finished series. Recomputed, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub time: f64,
    pub kind: AnnotationKind,
    pub label: String,
    pub critical: bool,
}

impl Annotation {
    pub fn new(time: f64, kind: AnnotationKind, label: impl Into<String>, critical: bool) -> Self {
        Self {
            time,
            kind,
            label: label.into(),
            critical,
        }
    }
}
