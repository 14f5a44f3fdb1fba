use anyhow::Result;
use sqlx::PgPool;

use crate::models::*;
use crate::services::*;

/// Reference data for a fresh database. Every step skips rows that already
/// exist, so seeding can run on each startup.
pub struct DatabaseSeeder {
    pool: PgPool,
}

struct SeedStructure {
    split: &'static str,
    name: &'static str,
    description: &'static str,
    days: [Option<&'static str>; 7],
}

struct SeedExercise {
    name: &'static str,
    primary: &'static str,
    secondary: &'static [&'static str],
    equipment: &'static str,
}

const SPLITS: &[(&str, &str)] = &[
    ("Full Body", "Every session trains the whole body"),
    ("Upper/Lower", "Alternating upper body and lower body sessions"),
    ("Push/Pull/Legs", "Pressing, pulling and leg sessions in rotation"),
];

const STRUCTURES: &[SeedStructure] = &[
    SeedStructure {
        split: "Full Body",
        name: "Full Body 3 days",
        description: "Three full body sessions with a rest day between each",
        days: [Some("Full Body A"), None, Some("Full Body B"), None, Some("Full Body C"), None, None],
    },
    SeedStructure {
        split: "Upper/Lower",
        name: "Upper/Lower 4 days",
        description: "Two upper and two lower sessions per week",
        days: [Some("Upper A"), Some("Lower A"), None, Some("Upper B"), Some("Lower B"), None, None],
    },
    SeedStructure {
        split: "Push/Pull/Legs",
        name: "Push/Pull/Legs 6 days",
        description: "Each session twice per week with one rest day",
        days: [Some("Push"), Some("Pull"), Some("Legs"), Some("Push"), Some("Pull"), Some("Legs"), None],
    },
];

const EXERCISES: &[SeedExercise] = &[
    SeedExercise { name: "Barbell Bench Press", primary: "chest", secondary: &["triceps", "shoulders"], equipment: "barbell" },
    SeedExercise { name: "Incline Dumbbell Press", primary: "chest", secondary: &["shoulders", "triceps"], equipment: "dumbbell" },
    SeedExercise { name: "Cable Fly", primary: "chest", secondary: &[], equipment: "cable" },
    SeedExercise { name: "Push-Up", primary: "chest", secondary: &["triceps", "abs"], equipment: "bodyweight" },
    SeedExercise { name: "Pull-Up", primary: "back", secondary: &["biceps", "forearms"], equipment: "bodyweight" },
    SeedExercise { name: "Barbell Row", primary: "back", secondary: &["biceps", "lower_back"], equipment: "barbell" },
    SeedExercise { name: "Lat Pulldown", primary: "back", secondary: &["biceps"], equipment: "cable" },
    SeedExercise { name: "Seated Cable Row", primary: "back", secondary: &["biceps", "traps"], equipment: "cable" },
    SeedExercise { name: "Overhead Press", primary: "shoulders", secondary: &["triceps", "traps"], equipment: "barbell" },
    SeedExercise { name: "Lateral Raise", primary: "shoulders", secondary: &[], equipment: "dumbbell" },
    SeedExercise { name: "Face Pull", primary: "shoulders", secondary: &["traps"], equipment: "cable" },
    SeedExercise { name: "Barbell Curl", primary: "biceps", secondary: &["forearms"], equipment: "barbell" },
    SeedExercise { name: "Hammer Curl", primary: "biceps", secondary: &["forearms"], equipment: "dumbbell" },
    SeedExercise { name: "Triceps Pushdown", primary: "triceps", secondary: &[], equipment: "cable" },
    SeedExercise { name: "Overhead Triceps Extension", primary: "triceps", secondary: &[], equipment: "dumbbell" },
    SeedExercise { name: "Back Squat", primary: "quads", secondary: &["glutes", "lower_back"], equipment: "barbell" },
    SeedExercise { name: "Leg Press", primary: "quads", secondary: &["glutes"], equipment: "machine" },
    SeedExercise { name: "Bulgarian Split Squat", primary: "quads", secondary: &["glutes"], equipment: "dumbbell" },
    SeedExercise { name: "Romanian Deadlift", primary: "hamstrings", secondary: &["glutes", "lower_back"], equipment: "barbell" },
    SeedExercise { name: "Lying Leg Curl", primary: "hamstrings", secondary: &[], equipment: "machine" },
    SeedExercise { name: "Hip Thrust", primary: "glutes", secondary: &["hamstrings"], equipment: "barbell" },
    SeedExercise { name: "Standing Calf Raise", primary: "calves", secondary: &[], equipment: "machine" },
    SeedExercise { name: "Hanging Leg Raise", primary: "abs", secondary: &["obliques"], equipment: "bodyweight" },
    SeedExercise { name: "Cable Crunch", primary: "abs", secondary: &[], equipment: "cable" },
    SeedExercise { name: "Barbell Shrug", primary: "traps", secondary: &["forearms"], equipment: "barbell" },
];

const STARTER_PROGRAM: &str = "Foundations Upper/Lower";
const STARTER_TEMPLATES: &[(&str, &[&str])] = &[
    ("Upper A", &["chest", "back", "shoulders"]),
    ("Lower A", &["quads", "hamstrings", "calves"]),
    ("Upper B", &["back", "chest", "biceps", "triceps"]),
    ("Lower B", &["hamstrings", "glutes", "abs"]),
];

impl DatabaseSeeder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn seed_all(&self) -> Result<()> {
        tracing::info!("Starting database seeding...");

        self.seed_tier_features().await?;
        self.seed_structures().await?;
        self.seed_exercises().await?;
        self.seed_ai_configuration().await?;
        self.seed_starter_program().await?;

        tracing::info!("Database seeding completed!");
        Ok(())
    }

    async fn seed_tier_features(&self) -> Result<()> {
        // NULL limits are unlimited
        let tiers: [(SubscriptionTier, Option<i32>, Option<i32>, bool); 3] = [
            (SubscriptionTier::Free, Some(1), Some(5), false),
            (SubscriptionTier::ProMonthly, None, None, true),
            (SubscriptionTier::ProYearly, None, None, true),
        ];

        for (tier, max_configs, daily_chat, paid) in tiers {
            sqlx::query(
                r#"
                INSERT INTO subscription_tier_features
                    (tier, max_program_configurations, daily_chat_messages, premium_programs, volume_analytics, updated_at)
                VALUES ($1, $2, $3, $4, $4, NOW())
                ON CONFLICT (tier) DO NOTHING
                "#,
            )
            .bind(tier.as_str())
            .bind(max_configs)
            .bind(daily_chat)
            .bind(paid)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn seed_structures(&self) -> Result<()> {
        let structure_service = StructureService::new(self.pool.clone());

        let mut splits = structure_service.list_splits().await?;
        for (name, description) in SPLITS {
            if splits.iter().any(|split| split.name == *name) {
                continue;
            }
            let split = structure_service
                .create_split(&CreateSplitRequest {
                    name: name.to_string(),
                    description: Some(description.to_string()),
                })
                .await?;
            splits.push(split);
        }

        let existing = structure_service.list_structures().await?;
        for seed in STRUCTURES {
            if existing.iter().any(|detail| detail.structure.name == seed.name) {
                continue;
            }
            let Some(split) = splits.iter().find(|split| split.name == seed.split) else {
                continue;
            };

            let days: Vec<DayAssignmentInput> = seed
                .days
                .iter()
                .enumerate()
                .map(|(index, workout)| DayAssignmentInput {
                    day_number: index as i32 + 1,
                    workout_name: workout.map(str::to_string),
                })
                .collect();

            structure_service
                .create_structure(&StructureRequest {
                    split_id: split.id,
                    name: seed.name.to_string(),
                    days_per_week: seed.days.iter().flatten().count() as i32,
                    description: Some(seed.description.to_string()),
                    days,
                })
                .await?;
            tracing::info!(name = seed.name, "Seeded training structure");
        }

        Ok(())
    }

    async fn seed_exercises(&self) -> Result<()> {
        let exercise_service = ExerciseService::new(self.pool.clone());
        let query = ExerciseQuery {
            muscle_group: None,
            equipment: None,
        };
        let existing = exercise_service.list_exercises(&query, true).await?;

        let mut created = 0;
        for seed in EXERCISES {
            if existing.iter().any(|exercise| exercise.name == seed.name) {
                continue;
            }
            exercise_service
                .create_exercise(&CreateExerciseRequest {
                    name: seed.name.to_string(),
                    primary_muscle_group: seed.primary.to_string(),
                    secondary_muscle_groups: seed.secondary.iter().map(|s| s.to_string()).collect(),
                    equipment: Some(seed.equipment.to_string()),
                    instructions: None,
                    video_url: None,
                })
                .await?;
            created += 1;
        }

        tracing::info!(created, "Seeded exercise catalog");
        Ok(())
    }

    async fn seed_ai_configuration(&self) -> Result<()> {
        let defaults = AiConfiguration::default();

        sqlx::query(
            r#"
            INSERT INTO ai_configuration (id, model, system_prompt, temperature, max_tokens, history_limit, updated_at)
            VALUES (1, $1, $2, $3, $4, $5, NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&defaults.model)
        .bind(&defaults.system_prompt)
        .bind(defaults.temperature)
        .bind(defaults.max_tokens)
        .bind(defaults.history_limit)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn seed_starter_program(&self) -> Result<()> {
        let program_service = ProgramService::new(self.pool.clone());
        let structure_service = StructureService::new(self.pool.clone());

        let programs = program_service.list_programs(true).await?;
        if programs.iter().any(|program| program.name == STARTER_PROGRAM) {
            return Ok(());
        }

        let structure_id = structure_service
            .list_structures()
            .await?
            .into_iter()
            .find(|detail| detail.structure.name == "Upper/Lower 4 days")
            .map(|detail| detail.structure.id);

        let templates = STARTER_TEMPLATES
            .iter()
            .map(|(name, groups)| WorkoutTemplateInput {
                name: name.to_string(),
                required_muscle_groups: groups.iter().map(|g| g.to_string()).collect(),
            })
            .collect();

        program_service
            .create_program(&CreateProgramRequest {
                name: STARTER_PROGRAM.to_string(),
                description: Some(
                    "A four day upper/lower program built around the main compound lifts"
                        .to_string(),
                ),
                structure_id,
                is_premium: false,
                templates,
            })
            .await?;
        tracing::info!(name = STARTER_PROGRAM, "Seeded starter program");

        Ok(())
    }
}
