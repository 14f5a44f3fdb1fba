use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Governs how many exercises each workout of a configuration holds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProgramCategory {
    Minimalist,
    Essentialist,
    Maximalist,
}

impl ProgramCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramCategory::Minimalist => "minimalist",
            ProgramCategory::Essentialist => "essentialist",
            ProgramCategory::Maximalist => "maximalist",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "minimalist" => Some(ProgramCategory::Minimalist),
            "essentialist" => Some(ProgramCategory::Essentialist),
            "maximalist" => Some(ProgramCategory::Maximalist),
            _ => None,
        }
    }

    pub fn min_exercises(&self) -> usize {
        match self {
            ProgramCategory::Minimalist => 3,
            ProgramCategory::Essentialist => 4,
            ProgramCategory::Maximalist => 6,
        }
    }

    pub fn max_exercises(&self) -> usize {
        match self {
            ProgramCategory::Minimalist => 4,
            ProgramCategory::Essentialist => 6,
            ProgramCategory::Maximalist => 8,
        }
    }

    pub fn allows(&self, count: usize) -> bool {
        (self.min_exercises()..=self.max_exercises()).contains(&count)
    }
}

/// Selected exercise ids per workout template, in the order the user chose them
pub type Selections = BTreeMap<Uuid, Vec<Uuid>>;

#[derive(Debug, Clone, FromRow)]
pub struct ProgramConfiguration {
    pub id: Uuid,
    pub user_id: String,
    pub program_id: Uuid,
    pub category: String,
    pub selections: Json<Selections>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProgramConfiguration {
    pub fn category(&self) -> ProgramCategory {
        ProgramCategory::from_str(&self.category).unwrap_or(ProgramCategory::Essentialist)
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigurationResponse {
    pub id: Uuid,
    pub program_id: Uuid,
    pub category: ProgramCategory,
    pub selections: Selections,
    pub ready: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveConfigurationRequest {
    pub category: ProgramCategory,
    #[serde(default)]
    pub selections: Selections,
}

/// Direct and indirect sets credited to one muscle group
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MuscleVolume {
    pub muscle_group: String,
    pub direct_sets: u32,
    pub indirect_sets: u32,
}

impl MuscleVolume {
    pub fn total_sets(&self) -> u32 {
        self.direct_sets + self.indirect_sets
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkoutStatus {
    pub template_id: Uuid,
    pub name: String,
    pub selected: usize,
    pub min: usize,
    pub max: usize,
    pub within_bounds: bool,
    pub uncovered_muscle_groups: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationAnalysis {
    pub category: ProgramCategory,
    pub ready: bool,
    pub workouts: Vec<WorkoutStatus>,
    /// Omitted for tiers without volume analytics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Vec<MuscleVolume>>,
}

/// A configured workout resolved to exercise names for display
#[derive(Debug, Serialize)]
pub struct ConfiguredWorkout {
    pub template_id: Uuid,
    pub name: String,
    pub exercises: Vec<ConfiguredExercise>,
}

#[derive(Debug, Serialize)]
pub struct ConfiguredExercise {
    pub id: Uuid,
    pub name: String,
    pub primary_muscle_group: String,
}

#[derive(Debug, Serialize)]
pub struct ProgramWorkouts {
    pub program_id: Uuid,
    pub program_name: String,
    pub category: ProgramCategory,
    pub workouts: Vec<ConfiguredWorkout>,
    pub schedule: Vec<super::program::DayAssignment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_bounds() {
        assert_eq!(
            (ProgramCategory::Minimalist.min_exercises(), ProgramCategory::Minimalist.max_exercises()),
            (3, 4)
        );
        assert_eq!(
            (ProgramCategory::Essentialist.min_exercises(), ProgramCategory::Essentialist.max_exercises()),
            (4, 6)
        );
        assert_eq!(
            (ProgramCategory::Maximalist.min_exercises(), ProgramCategory::Maximalist.max_exercises()),
            (6, 8)
        );
    }

    #[test]
    fn test_allows() {
        assert!(!ProgramCategory::Minimalist.allows(2));
        assert!(ProgramCategory::Minimalist.allows(3));
        assert!(ProgramCategory::Minimalist.allows(4));
        assert!(!ProgramCategory::Minimalist.allows(5));
    }

    #[test]
    fn test_save_request_deserializes_uuid_keys() {
        let template = Uuid::new_v4();
        let exercise = Uuid::new_v4();
        let mut selections = serde_json::Map::new();
        selections.insert(template.to_string(), serde_json::json!([exercise.to_string()]));
        let body = serde_json::json!({
            "category": "maximalist",
            "selections": selections,
        });

        let request: SaveConfigurationRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.category, ProgramCategory::Maximalist);
        assert_eq!(request.selections[&template], vec![exercise]);
    }
}
