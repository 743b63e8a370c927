use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::error::CoreError;

/// Resource types the sync client stores locally
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Patient,
    Practitioner,
    Encounter,
    Observation,
    QuestionnaireResponse,
    DocumentReference,
    Binary,
    Bundle,
    OperationOutcome,
    #[serde(untagged)]
    Custom(String),
}

impl ResourceType {
    /// Returns the canonical FHIR name of this type.
    pub fn as_str(&self) -> &str {
        match self {
            ResourceType::Patient => "Patient",
            ResourceType::Practitioner => "Practitioner",
            ResourceType::Encounter => "Encounter",
            ResourceType::Observation => "Observation",
            ResourceType::QuestionnaireResponse => "QuestionnaireResponse",
            ResourceType::DocumentReference => "DocumentReference",
            ResourceType::Binary => "Binary",
            ResourceType::Bundle => "Bundle",
            ResourceType::OperationOutcome => "OperationOutcome",
            ResourceType::Custom(name) => name,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Patient" => Ok(ResourceType::Patient),
            "Practitioner" => Ok(ResourceType::Practitioner),
            "Encounter" => Ok(ResourceType::Encounter),
            "Observation" => Ok(ResourceType::Observation),
            "QuestionnaireResponse" => Ok(ResourceType::QuestionnaireResponse),
            "DocumentReference" => Ok(ResourceType::DocumentReference),
            "Binary" => Ok(ResourceType::Binary),
            "Bundle" => Ok(ResourceType::Bundle),
            "OperationOutcome" => Ok(ResourceType::OperationOutcome),
            name => {
                if is_valid_resource_type_name(name) {
                    Ok(ResourceType::Custom(name.to_string()))
                } else {
                    Err(CoreError::invalid_resource_type(name.to_string()))
                }
            }
        }
    }
}

/// Validate if a string is a valid FHIR resource type name
pub fn is_valid_resource_type_name(name: &str) -> bool {
    // FHIR resource type names must start with uppercase letter and contain only letters
    !name.is_empty()
        && name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && name.chars().all(|c| c.is_ascii_alphabetic())
}
