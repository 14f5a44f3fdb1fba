use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::validation::validate_muscle_groups;

/// A named training split such as "Upper/Lower"
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainingSplit {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A weekly layout of a split, e.g. "Upper/Lower 4 days"
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainingStructure {
    pub id: Uuid,
    pub split_id: Uuid,
    pub name: String,
    pub days_per_week: i32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What happens on one day of a structure's week; no workout means rest.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DayAssignment {
    pub id: Uuid,
    pub structure_id: Uuid,
    pub day_number: i32,
    pub workout_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StructureDetail {
    #[serde(flatten)]
    pub structure: TrainingStructure,
    pub days: Vec<DayAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainingProgram {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub structure_id: Option<Uuid>,
    pub is_premium: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkoutTemplate {
    pub id: Uuid,
    pub program_id: Uuid,
    pub name: String,
    pub position: i32,
    pub required_muscle_groups: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProgramDetail {
    #[serde(flatten)]
    pub program: TrainingProgram,
    pub templates: Vec<WorkoutTemplate>,
    pub structure: Option<StructureDetail>,
}

/// Program list entry for end users
#[derive(Debug, Serialize)]
pub struct ProgramSummary {
    #[serde(flatten)]
    pub program: TrainingProgram,
    pub workout_count: usize,
    pub locked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WorkoutTemplateInput {
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    #[validate(custom(function = "validate_muscle_groups"))]
    #[serde(default)]
    pub required_muscle_groups: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProgramRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    pub structure_id: Option<Uuid>,
    #[serde(default)]
    pub is_premium: bool,
    #[validate(length(min = 1, max = 14), nested)]
    pub templates: Vec<WorkoutTemplateInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProgramRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    pub structure_id: Option<Uuid>,
    pub is_premium: Option<bool>,
    pub is_active: Option<bool>,
    /// When present, replaces all templates of the program.
    #[validate(length(min = 1, max = 14), nested)]
    pub templates: Option<Vec<WorkoutTemplateInput>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateWorkoutTemplateRequest {
    #[validate(length(min = 1, max = 80))]
    pub name: Option<String>,
    #[validate(range(min = 0, max = 100))]
    pub position: Option<i32>,
    #[validate(custom(function = "validate_muscle_groups"))]
    pub required_muscle_groups: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSplitRequest {
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DayAssignmentInput {
    #[validate(range(min = 1, max = 7))]
    pub day_number: i32,
    #[validate(length(min = 1, max = 80))]
    pub workout_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_structure_request"))]
pub struct StructureRequest {
    pub split_id: Uuid,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(range(min = 1, max = 7))]
    pub days_per_week: i32,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(max = 7), nested)]
    #[serde(default)]
    pub days: Vec<DayAssignmentInput>,
}

/// Day numbers are unique and the number of training days matches
/// `days_per_week` when days are given.
fn validate_structure_request(request: &StructureRequest) -> Result<(), ValidationError> {
    let mut seen = [false; 8];
    for day in &request.days {
        let index = day.day_number.clamp(0, 7) as usize;
        if seen[index] {
            return Err(ValidationError::new("duplicate_day_number"));
        }
        seen[index] = true;
    }

    if !request.days.is_empty() {
        let training_days = request
            .days
            .iter()
            .filter(|day| day.workout_name.is_some())
            .count() as i32;
        if training_days != request.days_per_week {
            return Err(ValidationError::new("training_days_mismatch"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(number: i32, workout: Option<&str>) -> DayAssignmentInput {
        DayAssignmentInput {
            day_number: number,
            workout_name: workout.map(String::from),
        }
    }

    fn structure(days_per_week: i32, days: Vec<DayAssignmentInput>) -> StructureRequest {
        StructureRequest {
            split_id: Uuid::new_v4(),
            name: "Upper/Lower 4 days".to_string(),
            days_per_week,
            description: None,
            days,
        }
    }

    #[test]
    fn test_structure_days_must_match_days_per_week() {
        let days = vec![
            day(1, Some("Upper A")),
            day(2, Some("Lower A")),
            day(3, None),
            day(4, Some("Upper B")),
            day(5, Some("Lower B")),
        ];
        assert!(structure(4, days.clone()).validate().is_ok());
        assert!(structure(3, days).validate().is_err());
    }

    #[test]
    fn test_structure_rejects_duplicate_days() {
        let days = vec![day(1, Some("Full Body")), day(1, Some("Full Body"))];
        assert!(structure(2, days).validate().is_err());
    }

    #[test]
    fn test_structure_rejects_out_of_range_day() {
        assert!(structure(1, vec![day(8, Some("Full Body"))]).validate().is_err());
    }

    #[test]
    fn test_program_requires_templates() {
        let request = CreateProgramRequest {
            name: "Empty".to_string(),
            description: None,
            structure_id: None,
            is_premium: false,
            templates: vec![],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_template_muscle_groups_are_validated() {
        let request = CreateProgramRequest {
            name: "Full Body".to_string(),
            description: None,
            structure_id: None,
            is_premium: false,
            templates: vec![WorkoutTemplateInput {
                name: "Day A".to_string(),
                required_muscle_groups: vec!["chest".to_string(), "wings".to_string()],
            }],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_template_and_day_counts_are_bounded() {
        let template = WorkoutTemplateInput {
            name: "Day A".to_string(),
            required_muscle_groups: vec!["chest".to_string()],
        };
        let request = UpdateProgramRequest {
            name: None,
            description: None,
            structure_id: None,
            is_premium: None,
            is_active: None,
            templates: Some(vec![template; 15]),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("templates"));

        let days = (1..=8).map(|n| day(n.min(7), None)).collect();
        let errors = structure(0, days).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("days"));
    }
}
