// Case catalog domain models
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type CaseId = u32;

/// Row of the case list, trimmed to what the case selector needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSummary {
    pub case_id: CaseId,
    pub opname: String,
    pub department: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity_score: Option<f64>,
}

impl CaseSummary {
    pub const UNKNOWN_OPERATION: &'static str = "Unknown Operation";
    pub const UNKNOWN_DEPARTMENT: &'static str = "Unknown Department";

    pub fn new(case_id: CaseId, opname: Option<String>, department: Option<String>) -> Self {
        Self {
            case_id,
            opname: non_empty(opname).unwrap_or_else(|| Self::UNKNOWN_OPERATION.to_string()),
            department: non_empty(department)
                .unwrap_or_else(|| Self::UNKNOWN_DEPARTMENT.to_string()),
            operation_type: None,
            complexity_score: None,
        }
    }

    /// Label shown in the case selector, e.g. "Case 12: Lobectomy".
    pub fn label(&self) -> String {
        format!("Case {}: {}", self.case_id, self.opname)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// One recorded signal of a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub case_id: CaseId,
    pub tid: String,
    pub tname: String,
}

impl Track {
    /// Display name without the device prefix ("Solar8000/HR" -> "HR").
    pub fn short_name(&self) -> &str {
        self.tname.rsplit('/').next().unwrap_or(&self.tname)
    }
}

/// Lab result. `dt` is seconds relative to case start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabResult {
    pub case_id: CaseId,
    pub dt: f64,
    pub name: String,
    pub result: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
}

impl ComplexityLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Operation type -> complexity level -> case ids, as stored in `case_hierarchy.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseHierarchy(pub BTreeMap<String, BTreeMap<ComplexityLevel, Vec<String>>>);

impl CaseHierarchy {
    /// Hierarchy used when neither the processed nor the raw files provide one.
    pub fn fallback() -> Self {
        let mut root = BTreeMap::new();
        let groups: [(&str, [&[&str]; 3]); 3] = [
            ("general", [&["1", "2", "3"], &["4", "5", "6"], &["7", "8", "9"]]),
            ("thoracic", [&["10", "11"], &["12", "13"], &["14", "15"]]),
            ("mixed", [&["1", "10"], &["5", "12"], &["9", "15"]]),
        ];
        for (operation, [low, medium, high]) in groups {
            let mut levels = BTreeMap::new();
            levels.insert(ComplexityLevel::Low, to_owned(low));
            levels.insert(ComplexityLevel::Medium, to_owned(medium));
            levels.insert(ComplexityLevel::High, to_owned(high));
            root.insert(operation.to_string(), levels);
        }
        Self(root)
    }

    pub fn cases(&self, operation_type: &str, level: ComplexityLevel) -> &[String] {
        self.0
            .get(operation_type)
            .and_then(|levels| levels.get(&level))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn operation_types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

fn to_owned(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}
