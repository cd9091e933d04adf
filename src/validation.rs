//! Declarative request validation.
//!
//! DTOs describe their constraints with a [`Rules`] builder; the builder
//! collects every failing rule per field instead of stopping at the first.

use std::collections::BTreeMap;
use std::fmt::Display;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Largest value a `NUMERIC(12, 2)` column holds
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

#[derive(Debug, Default, Clone, PartialEq, thiserror::Error)]
#[error("validation failed for {} field(s)", .0.len())]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn into_map(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

/// Implemented by every request body that carries constraints
pub trait Validate {
    fn rules(&self, rules: &mut Rules);

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut rules = Rules::default();
        self.rules(&mut rules);
        rules.finish()
    }
}

#[derive(Debug, Default)]
pub struct Rules {
    errors: ValidationErrors,
}

impl Rules {
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    /// Record a failure when `ok` is false
    pub fn check(&mut self, field: &str, ok: bool, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.errors.add(field, message);
        }
        self
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(field, !value.trim().is_empty(), "This field is required")
    }

    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.chars().count();
        self.check(
            field,
            (min..=max).contains(&len),
            format!("Must be between {} and {} characters", min, max),
        )
    }

    pub fn max_length(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        match value {
            Some(v) => self.check(field, v.chars().count() <= max, format!("Must be at most {} characters", max)),
            None => self,
        }
    }

    pub fn email(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) if !v.is_empty() => self.check(field, is_email(v), "Invalid email format"),
            _ => self,
        }
    }

    pub fn range<T: PartialOrd + Display>(&mut self, field: &str, value: T, min: T, max: T) -> &mut Self {
        let message = format!("Must be between {} and {}", min, max);
        self.check(field, value >= min && value <= max, message)
    }

    pub fn min<T: PartialOrd + Display>(&mut self, field: &str, value: T, min: T) -> &mut Self {
        let message = format!("Must be at least {}", min);
        self.check(field, value >= min, message)
    }

    /// Non-negative amount that fits a `NUMERIC(12, 2)` column
    pub fn money(&mut self, field: &str, value: Decimal) -> &mut Self {
        let message = format!("Must be between 0 and {}", MAX_AMOUNT);
        self.check(field, value >= Decimal::ZERO && value <= MAX_AMOUNT, message)
    }

    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) -> &mut Self {
        self.check(
            field,
            allowed.contains(&value),
            format!("Must be one of: {}", allowed.join(", ")),
        )
    }

    /// Identifier-style values: letters, digits, `-`, `_` and `.`
    pub fn identifier(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(
            field,
            value.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')),
            "May only contain letters, numbers, '-', '_' and '.'",
        )
    }

    pub fn not_empty<T>(&mut self, field: &str, items: &[T]) -> &mut Self {
        self.check(field, !items.is_empty(), "At least one entry is required")
    }

    /// Validate nested values, prefixing their field names (`items[0].quantity`)
    pub fn nested<V: Validate>(&mut self, prefix: &str, items: &[V]) -> &mut Self {
        for (i, item) in items.iter().enumerate() {
            if let Err(errors) = item.validate() {
                for (field, messages) in errors.into_map() {
                    for message in messages {
                        self.errors.add(&format!("{}[{}].{}", prefix, i, field), message);
                    }
                }
            }
        }
        self
    }
}

fn is_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !email.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}

/// JSON body extractor that maps rejections to problem details and runs
/// [`Validate`] before the handler sees the value.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::invalid_json(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Signup {
        username: String,
        email: Option<String>,
        age: i32,
    }

    impl Validate for Signup {
        fn rules(&self, rules: &mut Rules) {
            rules
                .required("username", &self.username)
                .length("username", &self.username, 3, 20)
                .email("email", self.email.as_deref())
                .range("age", self.age, 18, 130);
        }
    }

    #[test]
    fn money_fits_numeric_12_2() {
        assert_eq!(MAX_AMOUNT.to_string(), "9999999999.99");

        let mut rules = Rules::default();
        rules
            .money("zero", Decimal::ZERO)
            .money("max", MAX_AMOUNT)
            .money("negative", Decimal::new(-1, 2))
            .money("huge", Decimal::new(99_999_999_999_999, 0));
        let errors = rules.finish().unwrap_err();
        assert!(errors.get("zero").is_none());
        assert!(errors.get("max").is_none());
        assert!(errors.get("negative").is_some());
        assert!(errors.get("huge").is_some());
    }

    #[test]
    fn collects_every_failure_per_field() {
        let errors = Signup { username: "".into(), email: Some("nope".into()), age: 5 }
            .validate()
            .unwrap_err();
        assert_eq!(errors.get("username").unwrap().len(), 2);
        assert_eq!(errors.get("email").unwrap(), ["Invalid email format"]);
        assert_eq!(errors.get("age").unwrap(), ["Must be between 18 and 130"]);
    }

    #[test]
    fn accepts_valid_input_and_absent_optionals() {
        let ok = Signup { username: "alice".into(), email: None, age: 30 };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn email_shapes() {
        assert!(is_email("ops@example.com"));
        assert!(!is_email("ops@example"));
        assert!(!is_email("a@b@c.com"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("ops @example.com"));
    }

    #[test]
    fn nested_fields_are_prefixed() {
        struct Line {
            quantity: i32,
        }
        impl Validate for Line {
            fn rules(&self, rules: &mut Rules) {
                rules.min("quantity", self.quantity, 1);
            }
        }

        let mut rules = Rules::default();
        rules.nested("items", &[Line { quantity: 2 }, Line { quantity: 0 }]);
        let errors = rules.finish().unwrap_err();
        assert_eq!(errors.get("items[1].quantity").unwrap(), ["Must be at least 1"]);
        assert!(errors.get("items[0].quantity").is_none());
    }
}
