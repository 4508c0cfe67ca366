//! Versioning configuration loaded from the environment.

use strata_core::error::CoreError;
use strata_core::metadata::FieldExclusions;
use strata_core::relationship::CORRECTION_RELATIONSHIP_TYPE;

/// Fields never copied into a new version by default.
pub const DEFAULT_IGNORED_METADATA: &str = "dc.date.accessioned,dc.description.provenance";

/// Handle prefix used when none is configured.
pub const DEFAULT_HANDLE_PREFIX: &str = "123456789";

#[derive(Debug, Clone)]
pub struct VersioningConfig {
    /// Item-level fields excluded when cloning a snapshot.
    pub ignored_metadata: FieldExclusions,
    /// Left-to-right label of the correction relationship type.
    pub correction_relationship_type: String,
    /// Prefix of locally minted handles.
    pub handle_prefix: String,
}

impl VersioningConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                        | Required | Default |
    /// |--------------------------------|----------|---------|
    /// | `VERSIONING_IGNORED_METADATA`  | no       | `dc.date.accessioned,dc.description.provenance` |
    /// | `CORRECTION_RELATIONSHIP_TYPE` | no       | `isCorrectionOfItem` |
    /// | `HANDLE_PREFIX`                | no       | `123456789` |
    ///
    /// Fails with [`CoreError::Validation`] when an exclusion entry is
    /// malformed or a value is blank.
    pub fn from_env() -> Result<Self, CoreError> {
        let ignored = std::env::var("VERSIONING_IGNORED_METADATA")
            .unwrap_or_else(|_| DEFAULT_IGNORED_METADATA.to_string());
        let correction = std::env::var("CORRECTION_RELATIONSHIP_TYPE")
            .unwrap_or_else(|_| CORRECTION_RELATIONSHIP_TYPE.to_string());
        let prefix =
            std::env::var("HANDLE_PREFIX").unwrap_or_else(|_| DEFAULT_HANDLE_PREFIX.to_string());
        Self::from_values(&ignored, &correction, &prefix)
    }

    /// Build and validate a configuration from raw values.
    pub fn from_values(
        ignored_metadata: &str,
        correction_relationship_type: &str,
        handle_prefix: &str,
    ) -> Result<Self, CoreError> {
        let correction_relationship_type = correction_relationship_type.trim();
        if correction_relationship_type.is_empty() {
            return Err(CoreError::Validation(
                "CORRECTION_RELATIONSHIP_TYPE must not be empty".into(),
            ));
        }
        let handle_prefix = handle_prefix.trim().trim_end_matches('/');
        if handle_prefix.is_empty() {
            return Err(CoreError::Validation("HANDLE_PREFIX must not be empty".into()));
        }
        Ok(Self {
            ignored_metadata: FieldExclusions::parse(ignored_metadata)?,
            correction_relationship_type: correction_relationship_type.to_string(),
            handle_prefix: handle_prefix.to_string(),
        })
    }
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            ignored_metadata: FieldExclusions::from_entries(DEFAULT_IGNORED_METADATA.split(','))
                .unwrap_or_default(),
            correction_relationship_type: CORRECTION_RELATIONSHIP_TYPE.to_string(),
            handle_prefix: DEFAULT_HANDLE_PREFIX.to_string(),
        }
    }
}
