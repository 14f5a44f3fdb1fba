//! Program configuration state.
//!
//! Tracks, per workout template, the ordered exercises a user picked and
//! derives everything the builder screens show from that: whether each
//! workout is within its category's bounds, which required muscle groups a
//! workout still misses, and how many direct and indirect sets each muscle
//! group receives.
//!
//! The builder is pure and synchronous. Services load the program and the
//! exercise catalog, hand them over, and persist [`ProgramBuilder::selections`].

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ConfigurationAnalysis, MuscleVolume, ProgramCategory, Selections, TrainingExercise,
    WorkoutStatus, WorkoutTemplate,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuilderError {
    #[error("Workout template {0} is not part of this program")]
    UnknownTemplate(Uuid),
    #[error("Exercise {0} does not exist or is inactive")]
    UnknownExercise(Uuid),
    #[error("Exercise {exercise} is selected more than once in workout {template}")]
    DuplicateExercise { template: Uuid, exercise: Uuid },
    #[error("Workout {template} has {count} exercises; at most {max} are allowed")]
    TooManyExercises {
        template: Uuid,
        count: usize,
        max: usize,
    },
    #[error("Position {index} is out of range for a workout with {len} exercises")]
    PositionOutOfRange { index: usize, len: usize },
}

/// What a toggle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
    /// The workout was already at the category's maximum
    Unchanged,
}

/// The parts of an exercise the builder needs
#[derive(Debug, Clone)]
pub struct ExerciseInfo {
    pub id: Uuid,
    pub name: String,
    pub primary_muscle_group: String,
    pub secondary_muscle_groups: Vec<String>,
}

impl From<&TrainingExercise> for ExerciseInfo {
    fn from(exercise: &TrainingExercise) -> Self {
        Self {
            id: exercise.id,
            name: exercise.name.clone(),
            primary_muscle_group: exercise.primary_muscle_group.clone(),
            secondary_muscle_groups: exercise.secondary_muscle_groups.clone(),
        }
    }
}

/// A workout slot of the program being configured
#[derive(Debug, Clone)]
pub struct TemplateSlot {
    pub id: Uuid,
    pub name: String,
    pub required_muscle_groups: Vec<String>,
}

impl From<&WorkoutTemplate> for TemplateSlot {
    fn from(template: &WorkoutTemplate) -> Self {
        Self {
            id: template.id,
            name: template.name.clone(),
            required_muscle_groups: template.required_muscle_groups.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgramBuilder {
    category: ProgramCategory,
    templates: Vec<TemplateSlot>,
    catalog: HashMap<Uuid, ExerciseInfo>,
    selections: HashMap<Uuid, Vec<Uuid>>,
}

impl ProgramBuilder {
    /// An empty configuration. `catalog` should only hold exercises a user
    /// may pick.
    pub fn new(
        category: ProgramCategory,
        templates: impl IntoIterator<Item = TemplateSlot>,
        catalog: impl IntoIterator<Item = ExerciseInfo>,
    ) -> Self {
        let templates: Vec<TemplateSlot> = templates.into_iter().collect();
        let selections = templates
            .iter()
            .map(|template| (template.id, Vec::new()))
            .collect();

        Self {
            category,
            templates,
            catalog: catalog.into_iter().map(|info| (info.id, info)).collect(),
            selections,
        }
    }

    /// Build from a submitted configuration, rejecting anything invalid.
    /// Workouts below the minimum are accepted; see [`Self::is_ready`].
    pub fn with_selections(
        category: ProgramCategory,
        templates: impl IntoIterator<Item = TemplateSlot>,
        catalog: impl IntoIterator<Item = ExerciseInfo>,
        selections: &Selections,
    ) -> Result<Self, BuilderError> {
        let mut builder = Self::new(category, templates, catalog);
        builder.apply_selections(selections)?;
        Ok(builder)
    }

    /// Build from persisted state. The program or catalog may have changed
    /// since it was saved, so stale ids are dropped and overfull workouts
    /// are trimmed instead of failing.
    pub fn from_saved(
        category: ProgramCategory,
        templates: impl IntoIterator<Item = TemplateSlot>,
        catalog: impl IntoIterator<Item = ExerciseInfo>,
        saved: &Selections,
    ) -> Self {
        let mut builder = Self::new(category, templates, catalog);
        let max = category.max_exercises();

        for (template_id, exercise_ids) in saved {
            let Some(current) = builder.selections.get_mut(template_id) else {
                tracing::warn!(%template_id, "Dropping selections for a removed workout template");
                continue;
            };

            for exercise_id in exercise_ids {
                if !builder.catalog.contains_key(exercise_id) {
                    tracing::warn!(%exercise_id, "Dropping unavailable exercise from saved configuration");
                    continue;
                }
                if current.contains(exercise_id) {
                    continue;
                }
                if current.len() == max {
                    tracing::warn!(%template_id, max, "Trimming overfull saved workout");
                    break;
                }
                current.push(*exercise_id);
            }
        }

        builder
    }

    /// Replace all selections after validating them as a whole
    pub fn apply_selections(&mut self, selections: &Selections) -> Result<(), BuilderError> {
        let max = self.category.max_exercises();

        for (template_id, exercise_ids) in selections {
            if !self.selections.contains_key(template_id) {
                return Err(BuilderError::UnknownTemplate(*template_id));
            }
            if exercise_ids.len() > max {
                return Err(BuilderError::TooManyExercises {
                    template: *template_id,
                    count: exercise_ids.len(),
                    max,
                });
            }
            for (index, exercise_id) in exercise_ids.iter().enumerate() {
                if !self.catalog.contains_key(exercise_id) {
                    return Err(BuilderError::UnknownExercise(*exercise_id));
                }
                if exercise_ids[..index].contains(exercise_id) {
                    return Err(BuilderError::DuplicateExercise {
                        template: *template_id,
                        exercise: *exercise_id,
                    });
                }
            }
        }

        for exercises in self.selections.values_mut() {
            exercises.clear();
        }
        for (template_id, exercise_ids) in selections {
            if let Some(current) = self.selections.get_mut(template_id) {
                current.extend_from_slice(exercise_ids);
            }
        }

        Ok(())
    }

    pub fn category(&self) -> ProgramCategory {
        self.category
    }

    /// Switch category. A different category clears every workout.
    /// Returns whether anything changed.
    pub fn set_category(&mut self, category: ProgramCategory) -> bool {
        if category == self.category {
            return false;
        }

        self.category = category;
        for exercises in self.selections.values_mut() {
            exercises.clear();
        }
        true
    }

    pub fn templates(&self) -> &[TemplateSlot] {
        &self.templates
    }

    /// Remove the exercise if selected, otherwise append it unless the
    /// workout is full.
    pub fn toggle_exercise(
        &mut self,
        template_id: Uuid,
        exercise_id: Uuid,
    ) -> Result<Toggle, BuilderError> {
        if !self.catalog.contains_key(&exercise_id) {
            return Err(BuilderError::UnknownExercise(exercise_id));
        }
        let max = self.category.max_exercises();
        let exercises = self.workout_mut(template_id)?;

        if let Some(position) = exercises.iter().position(|id| *id == exercise_id) {
            exercises.remove(position);
            return Ok(Toggle::Removed);
        }

        if exercises.len() >= max {
            return Ok(Toggle::Unchanged);
        }

        exercises.push(exercise_id);
        Ok(Toggle::Added)
    }

    /// Move the exercise at `from` to `to` within one workout
    pub fn move_exercise(
        &mut self,
        template_id: Uuid,
        from: usize,
        to: usize,
    ) -> Result<(), BuilderError> {
        let exercises = self.workout_mut(template_id)?;
        let len = exercises.len();
        for index in [from, to] {
            if index >= len {
                return Err(BuilderError::PositionOutOfRange { index, len });
            }
        }

        let exercise = exercises.remove(from);
        exercises.insert(to, exercise);
        Ok(())
    }

    pub fn clear_workout(&mut self, template_id: Uuid) -> Result<(), BuilderError> {
        self.workout_mut(template_id)?.clear();
        Ok(())
    }

    pub fn selected(&self, template_id: Uuid) -> Result<&[Uuid], BuilderError> {
        self.selections
            .get(&template_id)
            .map(Vec::as_slice)
            .ok_or(BuilderError::UnknownTemplate(template_id))
    }

    pub fn is_selected(&self, template_id: Uuid, exercise_id: Uuid) -> bool {
        self.selections
            .get(&template_id)
            .is_some_and(|exercises| exercises.contains(&exercise_id))
    }

    /// Whether another exercise fits into the workout
    pub fn can_add(&self, template_id: Uuid) -> Result<bool, BuilderError> {
        Ok(self.selected(template_id)?.len() < self.category.max_exercises())
    }

    /// Required muscle groups of the workout that no selected exercise
    /// trains as its primary group, in the template's order.
    pub fn uncovered_muscle_groups(&self, template_id: Uuid) -> Result<Vec<String>, BuilderError> {
        let template = self.template(template_id)?;
        let selected = self.selected(template_id)?;

        Ok(template
            .required_muscle_groups
            .iter()
            .filter(|group| {
                !selected.iter().any(|exercise_id| {
                    self.catalog
                        .get(exercise_id)
                        .is_some_and(|exercise| exercise.primary_muscle_group == **group)
                })
            })
            .cloned()
            .collect())
    }

    pub fn workout_status(&self, template_id: Uuid) -> Result<WorkoutStatus, BuilderError> {
        let template = self.template(template_id)?;
        let selected = self.selected(template_id)?.len();

        Ok(WorkoutStatus {
            template_id,
            name: template.name.clone(),
            selected,
            min: self.category.min_exercises(),
            max: self.category.max_exercises(),
            within_bounds: self.category.allows(selected),
            uncovered_muscle_groups: self.uncovered_muscle_groups(template_id)?,
        })
    }

    /// Every workout holds between the category's minimum and maximum
    pub fn is_ready(&self) -> bool {
        self.selections
            .values()
            .all(|exercises| self.category.allows(exercises.len()))
    }

    /// Sets per muscle group across all workouts, sorted by muscle group
    pub fn volume(&self) -> Vec<MuscleVolume> {
        self.tally(self.selections.values().flatten())
    }

    /// Sets per muscle group for one workout, sorted by muscle group
    pub fn workout_volume(&self, template_id: Uuid) -> Result<Vec<MuscleVolume>, BuilderError> {
        Ok(self.tally(self.selected(template_id)?.iter()))
    }

    pub fn analysis(&self, include_volume: bool) -> ConfigurationAnalysis {
        let workouts = self
            .templates
            .iter()
            .filter_map(|template| self.workout_status(template.id).ok())
            .collect();

        ConfigurationAnalysis {
            category: self.category,
            ready: self.is_ready(),
            workouts,
            volume: include_volume.then(|| self.volume()),
        }
    }

    /// Selections for persistence. Empty workouts are omitted.
    pub fn selections(&self) -> Selections {
        self.selections
            .iter()
            .filter(|(_, exercises)| !exercises.is_empty())
            .map(|(template_id, exercises)| (*template_id, exercises.clone()))
            .collect()
    }

    pub fn exercise(&self, exercise_id: Uuid) -> Option<&ExerciseInfo> {
        self.catalog.get(&exercise_id)
    }

    fn template(&self, template_id: Uuid) -> Result<&TemplateSlot, BuilderError> {
        self.templates
            .iter()
            .find(|template| template.id == template_id)
            .ok_or(BuilderError::UnknownTemplate(template_id))
    }

    fn workout_mut(&mut self, template_id: Uuid) -> Result<&mut Vec<Uuid>, BuilderError> {
        self.selections
            .get_mut(&template_id)
            .ok_or(BuilderError::UnknownTemplate(template_id))
    }

    // One direct set for the primary group, one indirect set per secondary group.
    fn tally<'a>(&self, exercise_ids: impl Iterator<Item = &'a Uuid>) -> Vec<MuscleVolume> {
        let mut totals: BTreeMap<&str, (u32, u32)> = BTreeMap::new();

        for exercise in exercise_ids.filter_map(|id| self.catalog.get(id)) {
            totals.entry(&exercise.primary_muscle_group).or_default().0 += 1;
            for group in &exercise.secondary_muscle_groups {
                totals.entry(group).or_default().1 += 1;
            }
        }

        totals
            .into_iter()
            .map(|(group, (direct_sets, indirect_sets))| MuscleVolume {
                muscle_group: group.to_string(),
                direct_sets,
                indirect_sets,
            })
            .collect()
    }
}
