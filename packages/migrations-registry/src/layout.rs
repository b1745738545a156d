//! Where newly generated migrations go and how they are named.

use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::RegistryError;

/// Directory layout expected below each migration directory. No value means flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOrganization {
    ByYear,
    ByYearAndMonth,
}

impl MigrationOrganization {
    /// Accepts the configuration spellings; `none` maps to a flat layout.
    pub fn parse(value: &str) -> Result<Option<Self>, RegistryError> {
        match value.to_ascii_uppercase().as_str() {
            "NONE" | "FALSE" | "" => Ok(None),
            "BY_YEAR" => Ok(Some(MigrationOrganization::ByYear)),
            "BY_YEAR_AND_MONTH" => Ok(Some(MigrationOrganization::ByYearAndMonth)),
            _ => Err(RegistryError::config(format!(
                "organize_migrations must be false, BY_YEAR or BY_YEAR_AND_MONTH, got '{value}'"
            ))),
        }
    }

    pub fn directory_for(organization: Option<Self>, base: &Path, at: OffsetDateTime) -> PathBuf {
        match organization {
            None => base.to_path_buf(),
            Some(MigrationOrganization::ByYear) => base.join(format!("{:04}", at.year())),
            Some(MigrationOrganization::ByYearAndMonth) => base
                .join(format!("{:04}", at.year()))
                .join(format!("{:02}", u8::from(at.month()))),
        }
    }
}

/// Template used when generating a new migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationTemplate {
    Builtin,
    Custom(PathBuf),
}

/// Timestamped version name, e.g. `Version20261018093015`.
pub fn migration_version(at: OffsetDateTime) -> Result<String, RegistryError> {
    let stamp = at
        .format(format_description!(
            "[year][month][day][hour][minute][second]"
        ))
        .map_err(|e| RegistryError::config(format!("failed to format migration version: {e}")))?;
    Ok(format!("Version{stamp}"))
}

/// Everything needed to place a freshly generated migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTarget {
    pub namespace: String,
    pub directory: PathBuf,
    pub version: String,
    pub template: MigrationTemplate,
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use time::macros::datetime;

    use super::{migration_version, MigrationOrganization};

    #[test]
    fn parse_accepts_known_spellings() {
        assert_eq!(MigrationOrganization::parse("none").unwrap(), None);
        assert_eq!(
            MigrationOrganization::parse("by_year").unwrap(),
            Some(MigrationOrganization::ByYear)
        );
        assert_eq!(
            MigrationOrganization::parse("BY_YEAR_AND_MONTH").unwrap(),
            Some(MigrationOrganization::ByYearAndMonth)
        );
        assert!(MigrationOrganization::parse("by_week").is_err());
    }

    #[test]
    fn directories_follow_organization() {
        let at = datetime!(2026-03-07 09:30:15 UTC);
        let base = Path::new("/db/migrations");

        assert_eq!(
            MigrationOrganization::directory_for(None, base, at),
            PathBuf::from("/db/migrations")
        );
        assert_eq!(
            MigrationOrganization::directory_for(Some(MigrationOrganization::ByYear), base, at),
            PathBuf::from("/db/migrations/2026")
        );
        assert_eq!(
            MigrationOrganization::directory_for(
                Some(MigrationOrganization::ByYearAndMonth),
                base,
                at
            ),
            PathBuf::from("/db/migrations/2026/03")
        );
    }

    #[test]
    fn version_is_timestamped() {
        let at = datetime!(2026-10-18 09:30:15 UTC);
        assert_eq!(migration_version(at).unwrap(), "Version20261018093015");
    }
}
