// FHIR logical ids: 1-64 characters from [A-Za-z0-9-.]
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-\.]{1,64}$").expect("valid id pattern"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("Invalid ID: {0}")]
    Invalid(String),
}

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn validate_id(id: &str) -> Result<(), IdError> {
    if ID_PATTERN.is_match(id) {
        Ok(())
    } else {
        Err(IdError::Invalid(id.to_string()))
    }
}
