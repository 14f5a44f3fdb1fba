use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    ConfigurationAnalysis, ConfigurationResponse, ConfiguredExercise, ConfiguredWorkout,
    ProgramConfiguration, ProgramWorkouts, SaveConfigurationRequest, TierFeatures,
    TrainingExercise, TrainingProgram, WorkoutTemplate,
};
use crate::services::program_builder::{ExerciseInfo, ProgramBuilder, TemplateSlot};
use crate::services::errors::{ServiceError, ServiceResult};
use crate::services::{ExerciseService, ProgramService, StructureService};

const CONFIGURATION_COLUMNS: &str =
    "id, user_id, program_id, category, selections, created_at, updated_at";

/// What a configuration is built against
struct ProgramContext {
    program: TrainingProgram,
    templates: Vec<WorkoutTemplate>,
    catalog: Vec<TrainingExercise>,
}

impl ProgramContext {
    fn slots(&self) -> impl Iterator<Item = TemplateSlot> + '_ {
        self.templates.iter().map(TemplateSlot::from)
    }

    fn exercises(&self) -> impl Iterator<Item = ExerciseInfo> + '_ {
        self.catalog.iter().map(ExerciseInfo::from)
    }

    fn restore(&self, saved: &ProgramConfiguration) -> ProgramBuilder {
        ProgramBuilder::from_saved(saved.category(), self.slots(), self.exercises(), &saved.selections)
    }
}

/// Users' saved program configurations, validated through [`ProgramBuilder`]
#[derive(Clone)]
pub struct ConfigurationService {
    db: PgPool,
    programs: ProgramService,
    exercises: ExerciseService,
    structures: StructureService,
}

impl ConfigurationService {
    pub fn new(db: PgPool) -> Self {
        Self {
            programs: ProgramService::new(db.clone()),
            exercises: ExerciseService::new(db.clone()),
            structures: StructureService::new(db.clone()),
            db,
        }
    }

    pub async fn get_configuration(
        &self,
        user_id: &str,
        program_id: Uuid,
    ) -> ServiceResult<Option<ConfigurationResponse>> {
        let context = self.load_context(program_id).await?;
        let Some(saved) = self.find(user_id, program_id).await? else {
            return Ok(None);
        };

        let builder = context.restore(&saved);
        Ok(Some(ConfigurationResponse {
            id: saved.id,
            program_id,
            category: builder.category(),
            selections: builder.selections(),
            ready: builder.is_ready(),
            updated_at: saved.updated_at,
        }))
    }

    /// Validate and store the user's configuration for a program
    pub async fn save_configuration(
        &self,
        user_id: &str,
        program_id: Uuid,
        features: &TierFeatures,
        request: &SaveConfigurationRequest,
    ) -> ServiceResult<ConfigurationResponse> {
        let context = self.load_context(program_id).await?;
        ensure_access(&context.program, features)?;

        let builder = ProgramBuilder::with_selections(
            request.category,
            context.slots(),
            context.exercises(),
            &request.selections,
        )?;

        let mut tx = self.db.begin().await?;

        // Serialises concurrent saves of the same user so the limit check holds
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        let (existing, total): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE program_id = $2),
                COUNT(*)
            FROM program_configurations
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(program_id)
        .fetch_one(&mut *tx)
        .await?;

        if existing == 0 && !features.allows_another_configuration(total) {
            return Err(ServiceError::PlanRestricted(format!(
                "Your plan allows {} saved program configuration(s); upgrade to save more",
                features.max_program_configurations.unwrap_or_default()
            )));
        }

        let saved = sqlx::query_as::<_, ProgramConfiguration>(&format!(
            r#"
            INSERT INTO program_configurations (id, user_id, program_id, category, selections, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            ON CONFLICT (user_id, program_id) DO UPDATE
            SET category = EXCLUDED.category,
                selections = EXCLUDED.selections,
                updated_at = NOW()
            RETURNING {}
            "#,
            CONFIGURATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(program_id)
        .bind(builder.category().as_str())
        .bind(Json(builder.selections()))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            program_id = %program_id,
            category = builder.category().as_str(),
            ready = builder.is_ready(),
            "Saved program configuration"
        );

        Ok(ConfigurationResponse {
            id: saved.id,
            program_id,
            category: builder.category(),
            selections: builder.selections(),
            ready: builder.is_ready(),
            updated_at: saved.updated_at,
        })
    }

    pub async fn delete_configuration(&self, user_id: &str, program_id: Uuid) -> ServiceResult<bool> {
        let result =
            sqlx::query("DELETE FROM program_configurations WHERE user_id = $1 AND program_id = $2")
                .bind(user_id)
                .bind(program_id)
                .execute(&self.db)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Analysis of the saved configuration
    pub async fn analysis(
        &self,
        user_id: &str,
        program_id: Uuid,
        features: &TierFeatures,
    ) -> ServiceResult<ConfigurationAnalysis> {
        let context = self.load_context(program_id).await?;
        let saved = self
            .find(user_id, program_id)
            .await?
            .ok_or(ServiceError::NotFound("Configuration"))?;

        Ok(context.restore(&saved).analysis(features.volume_analytics))
    }

    /// Analysis of a submitted configuration without saving it
    pub async fn preview(
        &self,
        program_id: Uuid,
        features: &TierFeatures,
        request: &SaveConfigurationRequest,
    ) -> ServiceResult<ConfigurationAnalysis> {
        let context = self.load_context(program_id).await?;
        ensure_access(&context.program, features)?;

        let builder = ProgramBuilder::with_selections(
            request.category,
            context.slots(),
            context.exercises(),
            &request.selections,
        )?;

        Ok(builder.analysis(features.volume_analytics))
    }

    /// Every configured program of the user, resolved to exercise names and
    /// paired with the structure's weekly schedule
    pub async fn workouts(&self, user_id: &str) -> ServiceResult<Vec<ProgramWorkouts>> {
        let configurations = sqlx::query_as::<_, ProgramConfiguration>(&format!(
            "SELECT {} FROM program_configurations WHERE user_id = $1 ORDER BY updated_at DESC",
            CONFIGURATION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        if configurations.is_empty() {
            return Ok(Vec::new());
        }

        let catalog = self.exercises.active_catalog().await?;
        let mut result = Vec::with_capacity(configurations.len());

        for saved in configurations {
            let Some(program) = self
                .programs
                .get_program(saved.program_id)
                .await?
                .filter(|program| program.is_active)
            else {
                continue;
            };

            let templates = self.programs.get_templates(program.id).await?;
            let schedule = match program.structure_id {
                Some(structure_id) => self.structures.get_days(structure_id).await?,
                None => Vec::new(),
            };

            let builder = ProgramBuilder::from_saved(
                saved.category(),
                templates.iter().map(TemplateSlot::from),
                catalog.iter().map(ExerciseInfo::from),
                &saved.selections,
            );

            let workouts = builder
                .templates()
                .iter()
                .map(|slot| ConfiguredWorkout {
                    template_id: slot.id,
                    name: slot.name.clone(),
                    exercises: builder
                        .selected(slot.id)
                        .unwrap_or_default()
                        .iter()
                        .filter_map(|id| builder.exercise(*id))
                        .map(|info| ConfiguredExercise {
                            id: info.id,
                            name: info.name.clone(),
                            primary_muscle_group: info.primary_muscle_group.clone(),
                        })
                        .collect(),
                })
                .collect();

            result.push(ProgramWorkouts {
                program_id: program.id,
                program_name: program.name,
                category: builder.category(),
                workouts,
                schedule,
            });
        }

        Ok(result)
    }

    async fn find(
        &self,
        user_id: &str,
        program_id: Uuid,
    ) -> ServiceResult<Option<ProgramConfiguration>> {
        let saved = sqlx::query_as::<_, ProgramConfiguration>(&format!(
            "SELECT {} FROM program_configurations WHERE user_id = $1 AND program_id = $2",
            CONFIGURATION_COLUMNS
        ))
        .bind(user_id)
        .bind(program_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(saved)
    }

    /// Active program with its templates and the active catalog
    async fn load_context(&self, program_id: Uuid) -> ServiceResult<ProgramContext> {
        let program = self
            .programs
            .get_program(program_id)
            .await?
            .filter(|program| program.is_active)
            .ok_or(ServiceError::NotFound("Program"))?;

        let templates = self.programs.get_templates(program_id).await?;
        let catalog = self.exercises.active_catalog().await?;

        Ok(ProgramContext {
            program,
            templates,
            catalog,
        })
    }
}

fn ensure_access(program: &TrainingProgram, features: &TierFeatures) -> ServiceResult<()> {
    if program.is_premium && !features.premium_programs {
        return Err(ServiceError::PlanRestricted(
            "This program requires a Pro subscription".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionTier;
    use chrono::Utc;

    fn program(is_premium: bool) -> TrainingProgram {
        TrainingProgram {
            id: Uuid::new_v4(),
            name: "Upper/Lower".to_string(),
            description: None,
            structure_id: None,
            is_premium,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_premium_programs_require_feature() {
        let mut features = TierFeatures::restrictive(SubscriptionTier::Free);

        assert!(ensure_access(&program(false), &features).is_ok());
        assert!(matches!(
            ensure_access(&program(true), &features),
            Err(ServiceError::PlanRestricted(_))
        ));

        features.premium_programs = true;
        assert!(ensure_access(&program(true), &features).is_ok());
    }
}
