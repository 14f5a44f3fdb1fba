use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::validation::{validate_muscle_group, validate_muscle_groups, validate_slug};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainingExercise {
    pub id: Uuid,
    pub name: String,
    pub primary_muscle_group: String,
    pub secondary_muscle_groups: Vec<String>,
    pub equipment: Option<String>,
    pub instructions: Option<String>,
    pub video_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExerciseRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(custom(function = "validate_muscle_group"))]
    pub primary_muscle_group: String,
    #[validate(custom(function = "validate_muscle_groups"))]
    #[serde(default)]
    pub secondary_muscle_groups: Vec<String>,
    #[validate(custom(function = "validate_slug"))]
    pub equipment: Option<String>,
    #[validate(length(max = 4000))]
    pub instructions: Option<String>,
    #[validate(url)]
    pub video_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateExerciseRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(custom(function = "validate_muscle_group"))]
    pub primary_muscle_group: Option<String>,
    #[validate(custom(function = "validate_muscle_groups"))]
    pub secondary_muscle_groups: Option<Vec<String>>,
    #[validate(custom(function = "validate_slug"))]
    pub equipment: Option<String>,
    #[validate(length(max = 4000))]
    pub instructions: Option<String>,
    #[validate(url)]
    pub video_url: Option<String>,
    pub is_active: Option<bool>,
}

impl CreateExerciseRequest {
    /// The primary group may not be repeated as a secondary one.
    pub fn secondary_overlaps_primary(&self) -> bool {
        self.secondary_muscle_groups.contains(&self.primary_muscle_group)
    }
}

#[derive(Debug, Deserialize)]
pub struct ExerciseQuery {
    pub muscle_group: Option<String>,
    pub equipment: Option<String>,
}
