use anyhow::Result;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{
    CreateSplitRequest, DayAssignment, DayAssignmentInput, StructureDetail, StructureRequest,
    TrainingSplit, TrainingStructure,
};

const STRUCTURE_COLUMNS: &str =
    "id, split_id, name, days_per_week, description, created_at, updated_at";

/// Training splits and weekly structures
#[derive(Clone)]
pub struct StructureService {
    db: PgPool,
}

impl StructureService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_splits(&self) -> Result<Vec<TrainingSplit>> {
        let splits = sqlx::query_as::<_, TrainingSplit>(
            "SELECT id, name, description, created_at FROM training_splits ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(splits)
    }

    pub async fn create_split(&self, request: &CreateSplitRequest) -> Result<TrainingSplit> {
        let split = sqlx::query_as::<_, TrainingSplit>(
            r#"
            INSERT INTO training_splits (id, name, description, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.name.trim())
        .bind(&request.description)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(split_id = %split.id, name = %split.name, "Created training split");
        Ok(split)
    }

    pub async fn list_structures(&self) -> Result<Vec<StructureDetail>> {
        let structures = sqlx::query_as::<_, TrainingStructure>(&format!(
            "SELECT {} FROM training_structures ORDER BY days_per_week, name",
            STRUCTURE_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        let mut days = sqlx::query_as::<_, DayAssignment>(
            r#"
            SELECT id, structure_id, day_number, workout_name
            FROM structure_day_assignments
            ORDER BY structure_id, day_number
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(structures
            .into_iter()
            .map(|structure| {
                let (own, rest): (Vec<_>, Vec<_>) =
                    days.drain(..).partition(|day| day.structure_id == structure.id);
                days = rest;
                StructureDetail {
                    structure,
                    days: own,
                }
            })
            .collect())
    }

    pub async fn get_structure_detail(&self, structure_id: Uuid) -> Result<Option<StructureDetail>> {
        let structure = sqlx::query_as::<_, TrainingStructure>(&format!(
            "SELECT {} FROM training_structures WHERE id = $1",
            STRUCTURE_COLUMNS
        ))
        .bind(structure_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(structure) = structure else {
            return Ok(None);
        };

        let days = self.get_days(structure_id).await?;
        Ok(Some(StructureDetail { structure, days }))
    }

    pub async fn get_days(&self, structure_id: Uuid) -> Result<Vec<DayAssignment>> {
        let days = sqlx::query_as::<_, DayAssignment>(
            r#"
            SELECT id, structure_id, day_number, workout_name
            FROM structure_day_assignments
            WHERE structure_id = $1
            ORDER BY day_number
            "#,
        )
        .bind(structure_id)
        .fetch_all(&self.db)
        .await?;

        Ok(days)
    }

    /// Insert the structure and its day assignments in one transaction
    pub async fn create_structure(&self, request: &StructureRequest) -> Result<StructureDetail> {
        let mut tx = self.db.begin().await?;

        let structure = sqlx::query_as::<_, TrainingStructure>(&format!(
            r#"
            INSERT INTO training_structures (id, split_id, name, days_per_week, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING {}
            "#,
            STRUCTURE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(request.split_id)
        .bind(request.name.trim())
        .bind(request.days_per_week)
        .bind(&request.description)
        .fetch_one(&mut *tx)
        .await?;

        let days = insert_days(&mut tx, structure.id, &request.days).await?;
        tx.commit().await?;

        tracing::info!(structure_id = %structure.id, name = %structure.name, "Created training structure");
        Ok(StructureDetail { structure, days })
    }

    /// Replace the structure's fields and day assignments
    pub async fn update_structure(
        &self,
        structure_id: Uuid,
        request: &StructureRequest,
    ) -> Result<Option<StructureDetail>> {
        let mut tx = self.db.begin().await?;

        let structure = sqlx::query_as::<_, TrainingStructure>(&format!(
            r#"
            UPDATE training_structures
            SET split_id = $2, name = $3, days_per_week = $4, description = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            STRUCTURE_COLUMNS
        ))
        .bind(structure_id)
        .bind(request.split_id)
        .bind(request.name.trim())
        .bind(request.days_per_week)
        .bind(&request.description)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(structure) = structure else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM structure_day_assignments WHERE structure_id = $1")
            .bind(structure_id)
            .execute(&mut *tx)
            .await?;
        let days = insert_days(&mut tx, structure_id, &request.days).await?;

        tx.commit().await?;
        Ok(Some(StructureDetail { structure, days }))
    }

    pub async fn delete_structure(&self, structure_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM training_structures WHERE id = $1")
            .bind(structure_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

async fn insert_days(
    tx: &mut Transaction<'_, Postgres>,
    structure_id: Uuid,
    inputs: &[DayAssignmentInput],
) -> Result<Vec<DayAssignment>> {
    let mut ordered: Vec<&DayAssignmentInput> = inputs.iter().collect();
    ordered.sort_by_key(|day| day.day_number);

    let mut days = Vec::with_capacity(ordered.len());
    for input in ordered {
        let day = sqlx::query_as::<_, DayAssignment>(
            r#"
            INSERT INTO structure_day_assignments (id, structure_id, day_number, workout_name)
            VALUES ($1, $2, $3, $4)
            RETURNING id, structure_id, day_number, workout_name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(structure_id)
        .bind(input.day_number)
        .bind(input.workout_name.as_deref().map(str::trim))
        .fetch_one(&mut **tx)
        .await?;

        days.push(day);
    }

    Ok(days)
}
