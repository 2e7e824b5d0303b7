use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::datetime::parse_calendar_date;
use crate::task::Category;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("please enter a task title")]
    EmptyTitle,
    #[error("please enter a valid date: {0}")]
    InvalidDueDate(String),
    #[error("please enter a valid email address")]
    InvalidEmail,
    #[error("password is required")]
    MissingPassword,
    #[error("password must be at least 6 characters long")]
    ShortPassword,
    #[error("please enter your name")]
    EmptyName,
    #[error("category name cannot be empty")]
    EmptyCategoryName,
    #[error("a category named {0:?} already exists")]
    DuplicateCategory(String),
}

/// Form fields known to [`validate_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    Title,
    DueDate,
    Email,
    Password,
    Name,
}

/// Returns the trimmed title, or an error when nothing is left.
pub fn validate_title(title: &str) -> Result<&str, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyTitle)
    } else {
        Ok(trimmed)
    }
}

/// A due date is optional; when given it must be a real calendar date.
pub fn validate_due_date(raw: Option<&str>) -> Result<(), ValidationError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(()),
        Some(value) => parse_calendar_date(value)
            .map(|_| ())
            .ok_or_else(|| ValidationError::InvalidDueDate(value.to_string())),
    }
}

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| match Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$") {
            Ok(re) => Some(re),
            Err(err) => {
                tracing::error!(error = %err, "failed compiling email pattern");
                None
            }
        })
        .as_ref()
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let ok = email_regex()
        .map(|re| re.is_match(email))
        .unwrap_or(false);
    if ok {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingPassword);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::ShortPassword);
    }
    Ok(())
}

/// Checks a new or renamed category against the existing set. `renaming`
/// excludes the category being edited from the uniqueness check.
pub fn validate_category_name<'a>(
    name: &'a str,
    existing: &[Category],
    renaming: Option<&Category>,
) -> Result<&'a str, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyCategoryName);
    }

    let clash = existing.iter().any(|category| {
        renaming.map(|r| r.id != category.id).unwrap_or(true)
            && category.name.trim().to_lowercase() == trimmed.to_lowercase()
    });
    if clash {
        return Err(ValidationError::DuplicateCategory(trimmed.to_string()));
    }
    Ok(trimmed)
}

pub fn validate_field(field: Field, value: Option<&str>) -> Result<(), ValidationError> {
    let text = value.unwrap_or_default();
    match field {
        Field::Title => validate_title(text).map(|_| ()),
        Field::DueDate => validate_due_date(value),
        Field::Email => validate_email(text),
        Field::Password => validate_password(text),
        Field::Name => {
            if text.trim().is_empty() {
                Err(ValidationError::EmptyName)
            } else {
                Ok(())
            }
        }
    }
}

/// Validates every field and collects the failures; an empty map means the
/// form is valid.
pub fn validate_form<'a, I>(fields: I) -> BTreeMap<Field, ValidationError>
where
    I: IntoIterator<Item = (Field, Option<&'a str>)>,
{
    fields
        .into_iter()
        .filter_map(|(field, value)| validate_field(field, value).err().map(|e| (field, e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::RecordId;

    #[test]
    fn titles_are_trimmed_and_required() {
        assert_eq!(validate_title("  Buy milk "), Ok("Buy milk"));
        assert_eq!(validate_title(" \t"), Err(ValidationError::EmptyTitle));
    }

    #[test]
    fn due_dates_are_optional_but_checked() {
        assert!(validate_due_date(None).is_ok());
        assert!(validate_due_date(Some("")).is_ok());
        assert!(validate_due_date(Some("2025-04-15")).is_ok());
        assert!(validate_due_date(Some("2025-02-30")).is_err());
    }

    #[test]
    fn emails_and_passwords() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("ada@example").is_err());
        assert!(validate_email("a da@example.com").is_err());
        assert_eq!(validate_password(""), Err(ValidationError::MissingPassword));
        assert_eq!(validate_password("12345"), Err(ValidationError::ShortPassword));
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn category_names_must_be_unique() {
        let mut work = Category::new("Work");
        work.id = RecordId::Int(1);
        let existing = vec![work.clone(), Category::new("Home")];

        assert_eq!(
            validate_category_name(" work ", &existing, None),
            Err(ValidationError::DuplicateCategory("work".to_string()))
        );
        assert_eq!(validate_category_name("WORK", &existing, Some(&work)), Ok("WORK"));
        assert_eq!(validate_category_name("Errands", &existing, None), Ok("Errands"));
        assert_eq!(
            validate_category_name("  ", &existing, None),
            Err(ValidationError::EmptyCategoryName)
        );
    }

    #[test]
    fn form_collects_all_errors() {
        let errors = validate_form([
            (Field::Title, Some("")),
            (Field::Email, Some("nope")),
            (Field::DueDate, None),
            (Field::Name, Some("Ada")),
        ]);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[&Field::Title], ValidationError::EmptyTitle);
        assert_eq!(errors[&Field::Email], ValidationError::InvalidEmail);
    }
}
