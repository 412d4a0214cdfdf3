// Intervention decision tree shown in the crisis analysis view
use crate::domain::case::CaseId;
use crate::domain::signal::SignalType;
use serde::{Deserialize, Serialize};

/// Response-curve family of a simulated intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterventionFamily {
    /// Gradual, consistent improvement
    A,
    /// Fast response then plateau, possible relapse
    B,
}

/// Reproducible per-case variation in `[0, 1)`.
pub fn case_factor(case_id: CaseId) -> f64 {
    ((case_id as u64 * 17) % 100) as f64 / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InterventionNode {
    #[serde(rename = "root")]
    Root {
        name: String,
        children: Vec<InterventionNode>,
    },
    #[serde(rename = "event", rename_all = "camelCase")]
    Event {
        name: String,
        event_type: String,
        children: Vec<InterventionNode>,
    },
    #[serde(rename = "intervention", rename_all = "camelCase")]
    Intervention {
        name: String,
        family: InterventionFamily,
        strategy: String,
        probability: u8,
        description: String,
        event_type: String,
    },
}

impl InterventionNode {
    pub fn name(&self) -> &str {
        match self {
            Self::Root { name, .. } | Self::Event { name, .. } | Self::Intervention { name, .. } => {
                name
            }
        }
    }

    pub fn children(&self) -> &[InterventionNode] {
        match self {
            Self::Root { children, .. } | Self::Event { children, .. } => children,
            Self::Intervention { .. } => &[],
        }
    }

    /// Finds the intervention of `family` under the event named `event_type`.
    pub fn find_intervention(
        &self,
        event_type: &str,
        family: InterventionFamily,
    ) -> Option<&InterventionNode> {
        self.children()
            .iter()
            .filter(|event| matches!(event, Self::Event { event_type: e, .. } if e == event_type))
            .flat_map(|event| event.children())
            .find(|node| matches!(node, Self::Intervention { family: f, .. } if *f == family))
    }
}

struct EventTemplate {
    name: &'static str,
    event_type: &'static str,
    strategy_a: &'static str,
    strategy_b: &'static str,
}

const fn event(
    name: &'static str,
    event_type: &'static str,
    strategy_a: &'static str,
    strategy_b: &'static str,
) -> EventTemplate {
    EventTemplate {
        name,
        event_type,
        strategy_a,
        strategy_b,
    }
}

fn templates_for(signal_type: SignalType) -> [EventTemplate; 2] {
    match signal_type {
        SignalType::HeartRate => [
            event("Bradycardia", "bradycardia", "Atropine", "Pacing"),
            event("Tachycardia", "tachycardia", "Beta blocker", "Deepen anesthesia"),
        ],
        SignalType::Oxygen => [
            event("Desaturation", "desaturation", "Increase FiO2", "Recruitment maneuver"),
            event("Hypoventilation", "hypoventilation", "Increase tidal volume", "Increase rate"),
        ],
        SignalType::Temperature => [
            event("Hypothermia", "hypothermia", "Forced-air warming", "Warmed fluids"),
            event("Hyperthermia", "hyperthermia", "Active cooling", "Antipyretic"),
        ],
        SignalType::Eeg => [
            event("Burst suppression", "burst_suppression", "Reduce propofol", "Reduce volatile"),
            event("Light anesthesia", "light_anesthesia", "Propofol bolus", "Increase volatile"),
        ],
        SignalType::Respiration => [
            event("Hypercapnia", "hypercapnia", "Increase minute volume", "Check circuit"),
            event("Apnea", "apnea", "Manual ventilation", "Reverse opioids"),
        ],
        SignalType::BloodPressure | SignalType::Unknown => [
            event("Hypotension", "hypotension", "Increase fluids", "Vasopressors"),
            event("Bradycardia", "bradycardia", "Atropine", "Pacing"),
        ],
    }
}

/// Builds the crisis tree: root -> two event types -> interventions A and B.
pub fn build_intervention_tree(
    center_time: f64,
    case_id: CaseId,
    signal_type: SignalType,
) -> InterventionNode {
    let factor = case_factor(case_id);
    // A is steadier across cases, B is stronger but swings with the case.
    let probability_a = (65.0 + factor * 20.0).round() as u8;
    let probability_b = (90.0 - factor * 35.0).round() as u8;

    let events = templates_for(signal_type)
        .into_iter()
        .map(|t| InterventionNode::Event {
            name: t.name.to_string(),
            event_type: t.event_type.to_string(),
            children: vec![
                InterventionNode::Intervention {
                    name: "Intervention A".to_string(),
                    family: InterventionFamily::A,
                    strategy: t.strategy_a.to_string(),
                    probability: probability_a,
                    description: format!("{}: gradual, consistent response", t.strategy_a),
                    event_type: t.event_type.to_string(),
                },
                InterventionNode::Intervention {
                    name: "Intervention B".to_string(),
                    family: InterventionFamily::B,
                    strategy: t.strategy_b.to_string(),
                    probability: probability_b,
                    description: format!(
                        "{}: fast response then plateau, relapse possible",
                        t.strategy_b
                    ),
                    event_type: t.event_type.to_string(),
                },
            ],
        })
        .collect();

    InterventionNode::Root {
        name: format!("Crisis at {:.1}s", center_time),
        children: events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_factor() {
        assert_eq!(case_factor(1), 0.17);
        assert_eq!(case_factor(5), 0.85);
        assert_eq!(case_factor(100), 0.0);
    }

    #[test]
    fn test_tree_shape() {
        let tree = build_intervention_tree(300.0, 1, SignalType::BloodPressure);
        assert_eq!(tree.name(), "Crisis at 300.0s");
        assert_eq!(tree.children().len(), 2);
        for event in tree.children() {
            let interventions = event.children();
            assert_eq!(interventions.len(), 2);
            assert!(interventions.iter().all(|n| n.children().is_empty()));
        }

        let node = tree
            .find_intervention("hypotension", InterventionFamily::B)
            .unwrap();
        match node {
            InterventionNode::Intervention {
                strategy,
                probability,
                ..
            } => {
                assert_eq!(strategy, "Vasopressors");
                // 90 - 0.17 * 35 = 84.05
                assert_eq!(*probability, 84);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_tree_is_deterministic_per_case() {
        let a = build_intervention_tree(120.0, 42, SignalType::HeartRate);
        let b = build_intervention_tree(120.0, 42, SignalType::HeartRate);
        assert_eq!(a, b);
        assert!(a.find_intervention("bradycardia", InterventionFamily::A).is_some());
    }

    #[test]
    fn test_tree_serializes_with_type_tags() {
        let tree = build_intervention_tree(10.0, 3, SignalType::Oxygen);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["type"], "root");
        assert_eq!(json["children"][0]["type"], "event");
        assert_eq!(json["children"][0]["children"][1]["type"], "intervention");
        assert_eq!(json["children"][0]["children"][1]["eventType"], "desaturation");
    }
}
