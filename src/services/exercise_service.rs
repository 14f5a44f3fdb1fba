use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateExerciseRequest, ExerciseQuery, TrainingExercise, UpdateExerciseRequest};

const EXERCISE_COLUMNS: &str = "id, name, primary_muscle_group, secondary_muscle_groups, \
    equipment, instructions, video_url, is_active, created_at, updated_at";

/// The exercise catalog
#[derive(Clone)]
pub struct ExerciseService {
    db: PgPool,
}

impl ExerciseService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Exercises filtered by primary muscle group and equipment
    pub async fn list_exercises(
        &self,
        query: &ExerciseQuery,
        include_inactive: bool,
    ) -> Result<Vec<TrainingExercise>> {
        let muscle_group = query
            .muscle_group
            .as_deref()
            .map(|g| g.trim().to_lowercase())
            .filter(|g| !g.is_empty());
        let equipment = query
            .equipment
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());

        let exercises = sqlx::query_as::<_, TrainingExercise>(&format!(
            r#"
            SELECT {}
            FROM training_exercises
            WHERE ($1 OR is_active)
              AND ($2::TEXT IS NULL OR primary_muscle_group = $2)
              AND ($3::TEXT IS NULL OR equipment = $3)
            ORDER BY primary_muscle_group, name
            "#,
            EXERCISE_COLUMNS
        ))
        .bind(include_inactive)
        .bind(muscle_group)
        .bind(equipment)
        .fetch_all(&self.db)
        .await?;

        Ok(exercises)
    }

    /// Every active exercise; the catalog the program builder picks from
    pub async fn active_catalog(&self) -> Result<Vec<TrainingExercise>> {
        self.list_exercises(
            &ExerciseQuery {
                muscle_group: None,
                equipment: None,
            },
            false,
        )
        .await
    }

    pub async fn get_exercise(&self, exercise_id: Uuid) -> Result<Option<TrainingExercise>> {
        let exercise = sqlx::query_as::<_, TrainingExercise>(&format!(
            "SELECT {} FROM training_exercises WHERE id = $1",
            EXERCISE_COLUMNS
        ))
        .bind(exercise_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(exercise)
    }

    pub async fn create_exercise(&self, request: &CreateExerciseRequest) -> Result<TrainingExercise> {
        let exercise = sqlx::query_as::<_, TrainingExercise>(&format!(
            r#"
            INSERT INTO training_exercises
                (id, name, primary_muscle_group, secondary_muscle_groups, equipment, instructions, video_url, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, NOW(), NOW())
            RETURNING {}
            "#,
            EXERCISE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(request.name.trim())
        .bind(&request.primary_muscle_group)
        .bind(&request.secondary_muscle_groups)
        .bind(&request.equipment)
        .bind(&request.instructions)
        .bind(&request.video_url)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(exercise_id = %exercise.id, name = %exercise.name, "Created exercise");
        Ok(exercise)
    }

    pub async fn update_exercise(
        &self,
        exercise_id: Uuid,
        request: &UpdateExerciseRequest,
    ) -> Result<Option<TrainingExercise>> {
        let exercise = sqlx::query_as::<_, TrainingExercise>(&format!(
            r#"
            UPDATE training_exercises
            SET name = COALESCE($2, name),
                primary_muscle_group = COALESCE($3, primary_muscle_group),
                secondary_muscle_groups = COALESCE($4, secondary_muscle_groups),
                equipment = COALESCE($5, equipment),
                instructions = COALESCE($6, instructions),
                video_url = COALESCE($7, video_url),
                is_active = COALESCE($8, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            EXERCISE_COLUMNS
        ))
        .bind(exercise_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.primary_muscle_group)
        .bind(&request.secondary_muscle_groups)
        .bind(&request.equipment)
        .bind(&request.instructions)
        .bind(&request.video_url)
        .bind(request.is_active)
        .fetch_optional(&self.db)
        .await?;

        Ok(exercise)
    }

    pub async fn delete_exercise(&self, exercise_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM training_exercises WHERE id = $1")
            .bind(exercise_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
