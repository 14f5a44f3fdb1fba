use anyhow::{anyhow, Result};
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;
use validator::ValidationError;

/// Muscle groups an exercise can train or a workout can require.
pub const MUSCLE_GROUPS: &[&str] = &[
    "chest",
    "back",
    "shoulders",
    "biceps",
    "triceps",
    "forearms",
    "quads",
    "hamstrings",
    "glutes",
    "calves",
    "abs",
    "obliques",
    "lower_back",
    "traps",
];

fn slug_regex() -> &'static Regex {
    static SLUG: OnceLock<Regex> = OnceLock::new();
    SLUG.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]{0,47}$").expect("slug pattern is valid"))
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

/// Email validation
pub fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() {
        return Err(anyhow!("Email cannot be empty"));
    }

    if email.len() > 255 {
        return Err(anyhow!("Email cannot be longer than 255 characters"));
    }

    if !email_regex().is_match(email) {
        return Err(anyhow!("Invalid email format"));
    }

    Ok(())
}

/// Lowercase and trim an email before storing or comparing it
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_muscle_group(name: &str) -> bool {
    MUSCLE_GROUPS.contains(&name)
}

/// Validate a single muscle group identifier
pub fn validate_muscle_group(name: &str) -> Result<(), ValidationError> {
    if is_muscle_group(name) {
        Ok(())
    } else {
        let mut error = ValidationError::new("unknown_muscle_group");
        error.message = Some(Cow::Owned(format!(
            "Unknown muscle group '{}'. Must be one of: {}",
            name,
            MUSCLE_GROUPS.join(", ")
        )));
        error.add_param(Cow::Borrowed("value"), &name);
        Err(error)
    }
}

/// Validate a list of muscle groups: known names, no repeats
pub fn validate_muscle_groups(groups: &[String]) -> Result<(), ValidationError> {
    for (index, group) in groups.iter().enumerate() {
        validate_muscle_group(group)?;
        if groups[..index].contains(group) {
            let mut error = ValidationError::new("duplicate_muscle_group");
            error.message = Some(Cow::Owned(format!("Muscle group '{}' is listed twice", group)));
            return Err(error);
        }
    }
    Ok(())
}

/// Equipment tags are short lowercase slugs ("barbell", "cable_machine")
pub fn validate_equipment_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > 20 {
        return Err(ValidationError::new("too_many_equipment_tags"));
    }
    for tag in tags {
        validate_slug(tag)?;
    }
    Ok(())
}

pub fn validate_slug(value: &str) -> Result<(), ValidationError> {
    if slug_regex().is_match(value) {
        Ok(())
    } else {
        let mut error = ValidationError::new("invalid_slug");
        error.message = Some(Cow::Owned(format!(
            "'{}' must be lowercase letters, digits or underscores",
            value
        )));
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(validate_email("lifter@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("lifter@").is_err());
        assert!(validate_email("lifter@example").is_err());
    }

    #[test]
    fn test_email_normalization() {
        assert_eq!(normalize_email("  Lifter@Example.COM "), "lifter@example.com");
    }

    #[test]
    fn test_muscle_group_validation() {
        assert!(validate_muscle_group("chest").is_ok());
        assert!(validate_muscle_group("lower_back").is_ok());
        assert!(validate_muscle_group("Chest").is_err());
        assert!(validate_muscle_group("wings").is_err());
    }

    #[test]
    fn test_muscle_group_list_rejects_duplicates() {
        let ok = vec!["chest".to_string(), "triceps".to_string()];
        assert!(validate_muscle_groups(&ok).is_ok());

        let repeated = vec!["chest".to_string(), "chest".to_string()];
        let error = validate_muscle_groups(&repeated).unwrap_err();
        assert_eq!(error.code, "duplicate_muscle_group");
    }

    #[test]
    fn test_equipment_tags() {
        let ok = vec!["barbell".to_string(), "cable_machine".to_string()];
        assert!(validate_equipment_tags(&ok).is_ok());

        let bad = vec!["Smith Machine".to_string()];
        assert!(validate_equipment_tags(&bad).is_err());
    }
}
