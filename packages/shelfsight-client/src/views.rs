use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::models::{AnalysisResult, JourneyOutcome, TrackSnapshot};

pub const DEFAULT_TOP_ACTIONS: usize = 6;

// Archetype thresholds, tuned against the backend's journey counters.
const HIGH_CONVERSION_MIN: u64 = 20;
const HIGH_HESITATION_MIN: u64 = 50;
const HIGH_TRAFFIC_MIN: u64 = 10;
const PASSIVE_DWELL_SECS: f64 = 3.0;

/// One bar of the dwell-time ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DwellEntry {
    pub person_id: String,
    pub seconds: f64,
}

/// Person dwell map flattened and ranked, longest dwell first.
pub fn dwell_series(result: &AnalysisResult) -> Vec<DwellEntry> {
    let mut entries: Vec<DwellEntry> = result
        .dwell_time_analysis
        .person_dwell_times
        .iter()
        .map(|(person_id, &seconds)| DwellEntry {
            person_id: person_id.clone(),
            seconds,
        })
        .collect();
    entries.sort_by(|a, b| {
        b.seconds
            .partial_cmp(&a.seconds)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.person_id.cmp(&b.person_id))
    });
    entries
}

/// Journey outcomes ranked by interaction volume; empty when the backend
/// sent no journey analysis.
pub fn journey_series(result: &AnalysisResult) -> Vec<JourneyOutcome> {
    let mut outcomes = result
        .journey_analysis
        .as_ref()
        .map(|j| j.journey_data.clone())
        .unwrap_or_default();
    outcomes.sort_by(|a, b| {
        b.total_interactions
            .cmp(&a.total_interactions)
            .then_with(|| a.shelf_id.cmp(&b.shelf_id))
    });
    outcomes
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionBreakdown {
    pub action: String,
    pub count: u64,
    /// Fraction of all detected actions.
    pub share: f64,
    /// Shelf where this action occurs most, when the mapping has it.
    pub top_shelf: Option<String>,
}

/// Actions by frequency, truncated to `limit`, each with its share and
/// busiest shelf.
pub fn top_actions(result: &AnalysisResult, limit: usize) -> Vec<ActionBreakdown> {
    let total: u64 = result.action_summary.values().sum();

    let mut per_action_shelves: BTreeMap<&str, BTreeMap<&str, u64>> = BTreeMap::new();
    for event in &result.action_shelf_mapping {
        *per_action_shelves
            .entry(event.action())
            .or_default()
            .entry(event.shelf_id())
            .or_default() += 1;
    }

    let mut actions: Vec<ActionBreakdown> = result
        .action_summary
        .iter()
        .map(|(action, &count)| {
            let top_shelf = per_action_shelves.get(action.as_str()).and_then(|shelves| {
                shelves
                    .iter()
                    .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                    .map(|(shelf, _)| shelf.to_string())
            });
            ActionBreakdown {
                action: action.clone(),
                count,
                share: if total == 0 {
                    0.0
                } else {
                    count as f64 / total as f64
                },
                top_shelf,
            }
        })
        .collect();

    actions.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.action.cmp(&b.action)));
    actions.truncate(limit);
    actions
}

/// Engagement classification for one shelf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    HighConversion,
    HighInterestLowConversion,
    HighTrafficLowEngagement,
    PassiveAttention,
    LowEngagementZone,
}

impl Archetype {
    pub fn label(&self) -> &'static str {
        match self {
            Archetype::HighConversion => "High Conversion",
            Archetype::HighInterestLowConversion => "High Interest, Low Conversion",
            Archetype::HighTrafficLowEngagement => "High Traffic, Low Engagement",
            Archetype::PassiveAttention => "Passive Attention",
            Archetype::LowEngagementZone => "Low Engagement Zone",
        }
    }

    pub fn trend(&self) -> Trend {
        match self {
            Archetype::HighConversion => Trend::Up,
            Archetype::HighInterestLowConversion => Trend::Down,
            Archetype::HighTrafficLowEngagement => Trend::Stable,
            Archetype::PassiveAttention => Trend::Stable,
            Archetype::LowEngagementZone => Trend::Down,
        }
    }
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Stable => "stable",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShelfArchetype {
    pub shelf_id: String,
    pub display_name: String,
    pub unique_visitors: u64,
    pub dwell_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<JourneyOutcome>,
    pub archetype: Archetype,
    pub trend: Trend,
}

fn classify(
    unique_visitors: u64,
    dwell_seconds: Option<f64>,
    outcome: Option<&JourneyOutcome>,
) -> Archetype {
    match outcome {
        Some(outcome) => {
            if outcome.conversions > HIGH_CONVERSION_MIN {
                Archetype::HighConversion
            } else if outcome.hesitations > HIGH_HESITATION_MIN {
                Archetype::HighInterestLowConversion
            } else if unique_visitors > HIGH_TRAFFIC_MIN {
                Archetype::HighTrafficLowEngagement
            } else {
                Archetype::LowEngagementZone
            }
        }
        None => {
            if dwell_seconds.unwrap_or(0.0) > PASSIVE_DWELL_SECS {
                Archetype::PassiveAttention
            } else {
                Archetype::LowEngagementZone
            }
        }
    }
}

/// One row per shelf seen in the action mapping: distinct visitors, dwell,
/// the journey outcome when present, and the derived archetype. Rows are
/// ranked by visitor count.
pub fn shelf_archetypes(result: &AnalysisResult) -> Vec<ShelfArchetype> {
    let mut visitors: BTreeMap<&str, BTreeSet<u64>> = BTreeMap::new();
    for event in &result.action_shelf_mapping {
        visitors
            .entry(event.shelf_id())
            .or_default()
            .insert(event.person_id());
    }

    let outcomes: BTreeMap<&str, &JourneyOutcome> = result
        .journey_analysis
        .as_ref()
        .map(|j| {
            j.journey_data
                .iter()
                .map(|o| (o.shelf_id.as_str(), o))
                .collect()
        })
        .unwrap_or_default();

    let mut rows: Vec<ShelfArchetype> = visitors
        .into_iter()
        .map(|(shelf_id, persons)| {
            let unique_visitors = persons.len() as u64;
            let dwell_seconds = result
                .shelf_dwell_times
                .as_ref()
                .and_then(|m| m.get(shelf_id))
                .copied();
            let outcome = outcomes.get(shelf_id).copied();
            let archetype = classify(unique_visitors, dwell_seconds, outcome);
            ShelfArchetype {
                shelf_id: shelf_id.to_string(),
                display_name: format_shelf_name(shelf_id),
                unique_visitors,
                dwell_seconds,
                outcome: outcome.cloned(),
                archetype,
                trend: archetype.trend(),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.unique_visitors
            .cmp(&a.unique_visitors)
            .then_with(|| a.shelf_id.cmp(&b.shelf_id))
    });
    rows
}

/// Gallery entries ranked by time on camera. Exclusion marking is the
/// caller's concern.
pub fn gallery_by_duration(result: &AnalysisResult) -> Vec<TrackSnapshot> {
    let mut gallery = result.track_gallery.clone().unwrap_or_default();
    gallery.sort_by(|a, b| {
        b.duration_s
            .partial_cmp(&a.duration_s)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.pid.cmp(&b.pid))
    });
    gallery
}

/// `shelf_3` -> `Shelf 3`: underscores to spaces, first letter of each
/// word uppercased.
pub fn format_shelf_name(shelf_id: &str) -> String {
    shelf_id
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
