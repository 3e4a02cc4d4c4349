//! Form input types and validation.
//!
//! Forms are validated with `validator` derive rules and converted into
//! [`FormErrors`], which templates render next to each field. Typed fields
//! (quantity, value) arrive as text so that bad input becomes a field error
//! instead of a rejected request.

use std::collections::BTreeMap;

use serde::Deserialize;
use validator::{Validate, ValidationErrors};

use garage_core::{Money, Quantity};

use crate::db::boxes::BoxFields;
use crate::db::items::ItemFields;

/// Field name to messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error against `field`.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `field` has any error.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// First error for `field`, for inline display.
    #[must_use]
    pub fn first(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    /// All errors for `field`.
    #[must_use]
    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut form_errors = Self::new();
        for (field, field_errors) in errors.field_errors() {
            let field = field.to_string();
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map_or_else(|| format!("{field} is invalid"), ToString::to_string);
                form_errors.add(&field, message);
            }
        }
        form_errors
    }
}

/// Run derive validation and collect errors.
fn check(form: &impl Validate) -> FormErrors {
    form.validate().map_or_else(FormErrors::from, |()| FormErrors::new())
}

/// Trimmed text, or `None` if blank.
fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

// =============================================================================
// Auth Forms
// =============================================================================

/// Login form data.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "Username is required"))]
    #[serde(default)]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    #[serde(default)]
    pub password: String,
    /// Where to go after logging in.
    #[serde(default)]
    pub next: Option<String>,
}

impl LoginForm {
    /// Validate the submitted values.
    ///
    /// # Errors
    ///
    /// Returns `FormErrors` for missing fields.
    pub fn validated(&mut self) -> Result<(), FormErrors> {
        self.username = self.username.trim().to_owned();
        check(&*self).into_result()
    }
}

/// Registration form data.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegisterForm {
    #[validate(length(min = 3, max = 80, message = "Username must be between 3 and 80 characters"))]
    #[serde(default)]
    pub username: String,
    #[validate(email(message = "Enter a valid email address"))]
    #[serde(default)]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[serde(default)]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords must match"))]
    #[serde(default)]
    pub password_confirm: String,
}

impl RegisterForm {
    /// Validate the submitted values.
    ///
    /// # Errors
    ///
    /// Returns `FormErrors` describing every invalid field.
    pub fn validated(&mut self) -> Result<(), FormErrors> {
        self.username = self.username.trim().to_owned();
        self.email = self.email.trim().to_owned();
        check(&*self).into_result()
    }
}

// =============================================================================
// Box Form
// =============================================================================

/// Box form data.
///
/// Submitted as multipart because of the optional photo, so it is assembled
/// field by field by the handler rather than deserialized.
#[derive(Debug, Clone, Default, Validate)]
pub struct BoxForm {
    #[validate(length(min = 1, max = 100, message = "Name is required (max 100 characters)"))]
    pub name: String,
    #[validate(length(max = 200, message = "Location must be at most 200 characters"))]
    pub location: String,
    pub description: String,
    /// Remove the current photo.
    pub delete_image: bool,
}

impl BoxForm {
    /// Pre-fill from an existing box.
    #[must_use]
    pub fn from_box(storage_box: &crate::models::StorageBox) -> Self {
        Self {
            name: storage_box.name.clone(),
            location: storage_box.location.clone().unwrap_or_default(),
            description: storage_box.description.clone().unwrap_or_default(),
            delete_image: false,
        }
    }

    /// Validate and convert into repository fields.
    ///
    /// # Errors
    ///
    /// Returns `FormErrors` describing every invalid field.
    pub fn validated(&mut self) -> Result<BoxFields, FormErrors> {
        self.name = self.name.trim().to_owned();
        self.location = self.location.trim().to_owned();
        self.description = self.description.trim().to_owned();
        check(&*self).into_result()?;

        Ok(BoxFields {
            name: self.name.clone(),
            location: optional(&self.location),
            description: optional(&self.description),
        })
    }
}

// =============================================================================
// Item Form
// =============================================================================

/// Item form data.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ItemForm {
    #[validate(length(min = 1, max = 100, message = "Name is required (max 100 characters)"))]
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: String,
    #[validate(length(max = 50, message = "Category must be at most 50 characters"))]
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub notes: String,
}

impl Default for ItemForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            quantity: Quantity::DEFAULT.to_string(),
            category: String::new(),
            value: String::new(),
            notes: String::new(),
        }
    }
}

impl ItemForm {
    /// Pre-fill from an existing item.
    #[must_use]
    pub fn from_item(item: &crate::models::Item) -> Self {
        Self {
            name: item.name.clone(),
            quantity: item.quantity.to_string(),
            category: item.category.clone().unwrap_or_default(),
            value: item.value.map(|v| v.to_string()).unwrap_or_default(),
            notes: item.notes.clone().unwrap_or_default(),
        }
    }

    /// Validate and convert into repository fields.
    ///
    /// A blank quantity means 1 and a blank value means "no value".
    ///
    /// # Errors
    ///
    /// Returns `FormErrors` describing every invalid field, including a
    /// negative or non-numeric quantity.
    pub fn validated(&mut self) -> Result<ItemFields, FormErrors> {
        self.name = self.name.trim().to_owned();
        self.quantity = self.quantity.trim().to_owned();
        self.category = self.category.trim().to_owned();
        self.value = self.value.trim().to_owned();
        self.notes = self.notes.trim().to_owned();

        let mut errors = check(&*self);

        let quantity = if self.quantity.is_empty() {
            Some(Quantity::DEFAULT)
        } else {
            match self.quantity.parse::<i64>() {
                Ok(n) => Quantity::new(n)
                    .map_err(|e| errors.add("quantity", capitalize(&e.to_string())))
                    .ok(),
                Err(_) => {
                    errors.add("quantity", "Quantity must be a whole number");
                    None
                }
            }
        };

        let value = if self.value.is_empty() {
            None
        } else {
            match Money::parse(&self.value) {
                Ok(v) => Some(v),
                Err(e) => {
                    errors.add("value", capitalize(&e.to_string()));
                    None
                }
            }
        };

        errors.into_result()?;
        Ok(ItemFields {
            name: self.name.clone(),
            quantity: quantity.unwrap_or_default(),
            category: optional(&self.category),
            value,
            notes: optional(&self.notes),
        })
    }
}

/// Destination chosen on the move form.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveItemForm {
    pub new_box_id: String,
}

pub(crate) fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Post-login redirect target.
///
/// Only same-site paths are honoured; anything else falls back to the
/// dashboard.
#[must_use]
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\") =>
        {
            path
        }
        _ => "/dashboard",
    }
}
