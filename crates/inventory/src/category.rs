use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainError, DomainResult, FieldErrors};

pub const DEFAULT_CATEGORY_COLOR: &str = "#6c757d";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn create(new: NewCategory, now: DateTime<Utc>) -> DomainResult<Category> {
        new.validate()?;
        Ok(Category {
            id: CategoryId::new(),
            name: new.name.trim().to_string(),
            description: new.description,
            color: new.color.unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
            icon: new.icon,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn edit(&self, patch: CategoryPatch, now: DateTime<Utc>) -> DomainResult<Category> {
        patch.validate()?;
        let mut next = self.clone();
        if let Some(name) = patch.name {
            next.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            next.description = description;
        }
        if let Some(color) = patch.color {
            next.color = color;
        }
        if let Some(icon) = patch.icon {
            next.icon = icon;
        }
        next.updated_at = now;
        Ok(next)
    }

    /// A category can only go while no live product points at it.
    pub fn ensure_deletable(&self, active_products: u64) -> DomainResult<()> {
        if active_products > 0 {
            return Err(DomainError::conflict(format!(
                "category '{}' still has {active_products} product(s) assigned",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            color: None,
            icon: None,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = FieldErrors::new();
        check_name(&mut errors, &self.name);
        if let Some(color) = self.color.as_deref() {
            check_color(&mut errors, color);
        }
        check_icon(&mut errors, self.icon.as_deref());
        errors.into_result()
    }
}

/// Partial category edit; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub color: Option<String>,
    pub icon: Option<Option<String>>,
}

impl CategoryPatch {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = FieldErrors::new();
        if let Some(name) = self.name.as_deref() {
            check_name(&mut errors, name);
        }
        if let Some(color) = self.color.as_deref() {
            check_color(&mut errors, color);
        }
        check_icon(&mut errors, self.icon.clone().flatten().as_deref());
        errors.into_result()
    }
}

fn check_name(errors: &mut FieldErrors, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        errors.add("name", "name is required");
    } else if name.chars().count() > 255 {
        errors.add("name", "name may not exceed 255 characters");
    }
}

fn check_color(errors: &mut FieldErrors, color: &str) {
    if !is_hex_color(color) {
        errors.add("color", "color must be a hex value like #RRGGBB");
    }
}

fn check_icon(errors: &mut FieldErrors, icon: Option<&str>) {
    if icon.is_some_and(|i| i.chars().count() > 50) {
        errors.add("icon", "icon may not exceed 50 characters");
    }
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7
        && s.starts_with('#')
        && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_applies_default_color() {
        let c = Category::create(NewCategory::new("  Herramientas "), Utc::now()).unwrap();
        assert_eq!(c.name, "Herramientas");
        assert_eq!(c.color, DEFAULT_CATEGORY_COLOR);
    }

    #[test]
    fn color_must_be_six_hex_digits() {
        assert!(is_hex_color("#A1b2C3"));
        for bad in ["#fff", "123456", "#12345g", "#1234567", ""] {
            assert!(!is_hex_color(bad), "{bad} accepted");
        }

        let mut new = NewCategory::new("Pinturas");
        new.color = Some("red".into());
        let Err(DomainError::Validation(fields)) = new.validate() else {
            panic!("expected validation error");
        };
        assert!(fields.contains("color"));
    }

    #[test]
    fn blank_name_and_long_icon_are_rejected() {
        let mut new = NewCategory::new("   ");
        new.icon = Some("i".repeat(51));
        let Err(DomainError::Validation(fields)) = new.validate() else {
            panic!("expected validation error");
        };
        assert!(fields.contains("name"));
        assert!(fields.contains("icon"));
    }

    #[test]
    fn edit_can_clear_description() {
        let mut new = NewCategory::new("Electricidad");
        new.description = Some("cables".into());
        let c = Category::create(new, Utc::now()).unwrap();

        let patch = CategoryPatch { description: Some(None), ..CategoryPatch::default() };
        let edited = c.edit(patch, Utc::now()).unwrap();
        assert_eq!(edited.description, None);
        assert_eq!(edited.name, "Electricidad");
    }

    #[test]
    fn delete_guard_blocks_referenced_category() {
        let c = Category::create(NewCategory::new("Ferreteria"), Utc::now()).unwrap();
        assert!(matches!(c.ensure_deletable(1), Err(DomainError::ReferentialConflict(_))));
        assert!(c.ensure_deletable(0).is_ok());
    }
}
