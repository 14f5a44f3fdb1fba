use anyhow::Result;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{
    CreateProgramRequest, ProgramDetail, TrainingProgram, UpdateProgramRequest,
    UpdateWorkoutTemplateRequest, WorkoutTemplate, WorkoutTemplateInput,
};
use crate::services::StructureService;

const PROGRAM_COLUMNS: &str =
    "id, name, description, structure_id, is_premium, is_active, created_at, updated_at";
const TEMPLATE_COLUMNS: &str =
    "id, program_id, name, position, required_muscle_groups, created_at, updated_at";

/// Training programs and their workout templates
#[derive(Clone)]
pub struct ProgramService {
    db: PgPool,
    structures: StructureService,
}

impl ProgramService {
    pub fn new(db: PgPool) -> Self {
        Self {
            structures: StructureService::new(db.clone()),
            db,
        }
    }

    pub async fn list_programs(&self, include_inactive: bool) -> Result<Vec<TrainingProgram>> {
        let programs = sqlx::query_as::<_, TrainingProgram>(&format!(
            "SELECT {} FROM training_programs WHERE $1 OR is_active ORDER BY name",
            PROGRAM_COLUMNS
        ))
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await?;

        Ok(programs)
    }

    /// Number of workout templates per program
    pub async fn template_counts(&self) -> Result<HashMap<Uuid, i64>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT program_id, COUNT(*) FROM workout_templates GROUP BY program_id",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().collect())
    }

    pub async fn get_program(&self, program_id: Uuid) -> Result<Option<TrainingProgram>> {
        let program = sqlx::query_as::<_, TrainingProgram>(&format!(
            "SELECT {} FROM training_programs WHERE id = $1",
            PROGRAM_COLUMNS
        ))
        .bind(program_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(program)
    }

    pub async fn get_templates(&self, program_id: Uuid) -> Result<Vec<WorkoutTemplate>> {
        let templates = sqlx::query_as::<_, WorkoutTemplate>(&format!(
            "SELECT {} FROM workout_templates WHERE program_id = $1 ORDER BY position, created_at",
            TEMPLATE_COLUMNS
        ))
        .bind(program_id)
        .fetch_all(&self.db)
        .await?;

        Ok(templates)
    }

    pub async fn get_program_detail(&self, program_id: Uuid) -> Result<Option<ProgramDetail>> {
        let Some(program) = self.get_program(program_id).await? else {
            return Ok(None);
        };

        let templates = self.get_templates(program_id).await?;
        self.with_structure(program, templates).await.map(Some)
    }

    /// Insert the program and its templates in one transaction
    pub async fn create_program(&self, request: &CreateProgramRequest) -> Result<ProgramDetail> {
        let mut tx = self.db.begin().await?;

        let program = sqlx::query_as::<_, TrainingProgram>(&format!(
            r#"
            INSERT INTO training_programs (id, name, description, structure_id, is_premium, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, TRUE, NOW(), NOW())
            RETURNING {}
            "#,
            PROGRAM_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(request.name.trim())
        .bind(&request.description)
        .bind(request.structure_id)
        .bind(request.is_premium)
        .fetch_one(&mut *tx)
        .await?;

        let templates = insert_templates(&mut tx, program.id, &request.templates).await?;
        tx.commit().await?;

        tracing::info!(program_id = %program.id, name = %program.name, "Created program");
        self.with_structure(program, templates).await
    }

    /// Update program fields; when templates are given they replace the
    /// existing ones in the same transaction. Replacement is positional: the
    /// template at each position keeps its id, so saved configurations still
    /// resolve against it.
    pub async fn update_program(
        &self,
        program_id: Uuid,
        request: &UpdateProgramRequest,
    ) -> Result<Option<ProgramDetail>> {
        let mut tx = self.db.begin().await?;

        let program = sqlx::query_as::<_, TrainingProgram>(&format!(
            r#"
            UPDATE training_programs
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                structure_id = COALESCE($4, structure_id),
                is_premium = COALESCE($5, is_premium),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PROGRAM_COLUMNS
        ))
        .bind(program_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.description)
        .bind(request.structure_id)
        .bind(request.is_premium)
        .bind(request.is_active)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(program) = program else {
            return Ok(None);
        };

        let templates = match &request.templates {
            Some(inputs) => replace_templates(&mut tx, program_id, inputs).await?,
            None => {
                sqlx::query_as::<_, WorkoutTemplate>(&format!(
                    "SELECT {} FROM workout_templates WHERE program_id = $1 ORDER BY position, created_at",
                    TEMPLATE_COLUMNS
                ))
                .bind(program_id)
                .fetch_all(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        tracing::info!(
            program_id = %program_id,
            templates_replaced = request.templates.is_some(),
            "Updated program"
        );
        self.with_structure(program, templates).await.map(Some)
    }

    pub async fn delete_program(&self, program_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM training_programs WHERE id = $1")
            .bind(program_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Append a template after the current last position
    pub async fn add_template(
        &self,
        program_id: Uuid,
        input: &WorkoutTemplateInput,
    ) -> Result<Option<WorkoutTemplate>> {
        if self.get_program(program_id).await?.is_none() {
            return Ok(None);
        }

        let template = sqlx::query_as::<_, WorkoutTemplate>(&format!(
            r#"
            INSERT INTO workout_templates (id, program_id, name, position, required_muscle_groups, created_at, updated_at)
            SELECT $1, $2, $3, COALESCE(MAX(position) + 1, 0), $4, NOW(), NOW()
            FROM workout_templates WHERE program_id = $2
            RETURNING {}
            "#,
            TEMPLATE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(program_id)
        .bind(input.name.trim())
        .bind(&input.required_muscle_groups)
        .fetch_one(&self.db)
        .await?;

        Ok(Some(template))
    }

    pub async fn update_template(
        &self,
        program_id: Uuid,
        template_id: Uuid,
        request: &UpdateWorkoutTemplateRequest,
    ) -> Result<Option<WorkoutTemplate>> {
        let template = sqlx::query_as::<_, WorkoutTemplate>(&format!(
            r#"
            UPDATE workout_templates
            SET name = COALESCE($3, name),
                position = COALESCE($4, position),
                required_muscle_groups = COALESCE($5, required_muscle_groups),
                updated_at = NOW()
            WHERE id = $1 AND program_id = $2
            RETURNING {}
            "#,
            TEMPLATE_COLUMNS
        ))
        .bind(template_id)
        .bind(program_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(request.position)
        .bind(&request.required_muscle_groups)
        .fetch_optional(&self.db)
        .await?;

        Ok(template)
    }

    pub async fn delete_template(&self, program_id: Uuid, template_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workout_templates WHERE id = $1 AND program_id = $2")
            .bind(template_id)
            .bind(program_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn with_structure(
        &self,
        program: TrainingProgram,
        templates: Vec<WorkoutTemplate>,
    ) -> Result<ProgramDetail> {
        let structure = match program.structure_id {
            Some(structure_id) => self.structures.get_structure_detail(structure_id).await?,
            None => None,
        };

        Ok(ProgramDetail {
            program,
            templates,
            structure,
        })
    }
}

async fn insert_templates(
    tx: &mut Transaction<'_, Postgres>,
    program_id: Uuid,
    inputs: &[WorkoutTemplateInput],
) -> Result<Vec<WorkoutTemplate>> {
    let mut templates = Vec::with_capacity(inputs.len());
    for (position, input) in inputs.iter().enumerate() {
        templates.push(insert_template(tx, program_id, position, input).await?);
    }
    Ok(templates)
}

async fn insert_template(
    tx: &mut Transaction<'_, Postgres>,
    program_id: Uuid,
    position: usize,
    input: &WorkoutTemplateInput,
) -> Result<WorkoutTemplate> {
    let template = sqlx::query_as::<_, WorkoutTemplate>(&format!(
        r#"
        INSERT INTO workout_templates (id, program_id, name, position, required_muscle_groups, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
        RETURNING {}
        "#,
        TEMPLATE_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(program_id)
    .bind(input.name.trim())
    .bind(position as i32)
    .bind(&input.required_muscle_groups)
    .fetch_one(&mut **tx)
    .await?;

    Ok(template)
}

/// How the current templates of a program line up with a replacement list
#[derive(Debug, PartialEq, Eq)]
struct TemplateReplacement {
    /// Existing template ids rewritten in place, by position
    kept: Vec<Uuid>,
    /// Positions that need a new template
    added: std::ops::Range<usize>,
    /// Existing templates beyond the new length
    removed: Vec<Uuid>,
}

fn plan_replacement(existing: &[Uuid], input_count: usize) -> TemplateReplacement {
    let kept_count = existing.len().min(input_count);
    TemplateReplacement {
        kept: existing[..kept_count].to_vec(),
        added: kept_count..input_count,
        removed: existing[kept_count..].to_vec(),
    }
}

async fn replace_templates(
    tx: &mut Transaction<'_, Postgres>,
    program_id: Uuid,
    inputs: &[WorkoutTemplateInput],
) -> Result<Vec<WorkoutTemplate>> {
    let existing: Vec<Uuid> = sqlx::query_scalar(
        "SELECT id FROM workout_templates WHERE program_id = $1 ORDER BY position, created_at",
    )
    .bind(program_id)
    .fetch_all(&mut **tx)
    .await?;

    let plan = plan_replacement(&existing, inputs.len());
    let mut templates = Vec::with_capacity(inputs.len());

    for (position, (template_id, input)) in plan.kept.iter().zip(inputs).enumerate() {
        let template = sqlx::query_as::<_, WorkoutTemplate>(&format!(
            r#"
            UPDATE workout_templates
            SET name = $2, position = $3, required_muscle_groups = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TEMPLATE_COLUMNS
        ))
        .bind(template_id)
        .bind(input.name.trim())
        .bind(position as i32)
        .bind(&input.required_muscle_groups)
        .fetch_one(&mut **tx)
        .await?;
        templates.push(template);
    }

    for position in plan.added.clone() {
        templates.push(insert_template(tx, program_id, position, &inputs[position]).await?);
    }

    if !plan.removed.is_empty() {
        sqlx::query("DELETE FROM workout_templates WHERE id = ANY($1)")
            .bind(&plan.removed)
            .execute(&mut **tx)
            .await?;

        let (configurations,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM program_configurations WHERE program_id = $1")
                .bind(program_id)
                .fetch_one(&mut **tx)
                .await?;
        tracing::warn!(
            program_id = %program_id,
            removed_templates = plan.removed.len(),
            configurations,
            "Removed workout templates; saved selections for them will be dropped"
        );
    }

    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_replacement_keeps_ids_by_position() {
        let existing: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        let same = plan_replacement(&existing, 3);
        assert_eq!(same.kept, existing);
        assert!(same.added.is_empty());
        assert!(same.removed.is_empty());

        let grown = plan_replacement(&existing, 5);
        assert_eq!(grown.kept, existing);
        assert_eq!(grown.added, 3..5);

        let shrunk = plan_replacement(&existing, 1);
        assert_eq!(shrunk.kept, vec![existing[0]]);
        assert_eq!(shrunk.removed, existing[1..].to_vec());
        assert!(shrunk.added.is_empty());
    }

    #[test]
    fn test_replacement_of_empty_program_adds_everything() {
        let plan = plan_replacement(&[], 4);
        assert!(plan.kept.is_empty());
        assert_eq!(plan.added, 0..4);
        assert!(plan.removed.is_empty());
    }
}
