//! Scenario validation utilities.

use std::fs;
use std::path::Path;

use battle_core::config::Scenario;
use serde::Serialize;

use crate::error::{Result, ToolError};

/// Outcome of validating one scenario file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    /// File the scenario came from.
    pub path: String,
    /// Number of placed units, 0 when the file did not parse.
    pub entities: usize,
    /// Problems found, empty for a valid scenario.
    pub issues: Vec<String>,
}

impl FileReport {
    /// Whether the scenario has no problems.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Outcome of validating a file or a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    /// One report per scenario file, in path order.
    pub files: Vec<FileReport>,
}

impl ValidationSummary {
    /// Total number of problems.
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.files.iter().map(|f| f.issues.len()).sum()
    }

    /// Whether every file is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.files.iter().all(FileReport::is_valid)
    }
}

/// Validate scenario text. Parse failures become issues.
#[must_use]
pub fn validate_scenario_str(label: &str, text: &str) -> FileReport {
    match Scenario::from_ron_str(text) {
        Ok(scenario) => FileReport {
            path: label.to_string(),
            entities: scenario.entities.len(),
            issues: scenario.placement_issues().iter().map(ToString::to_string).collect(),
        },
        Err(e) => FileReport {
            path: label.to_string(),
            entities: 0,
            issues: vec![e.to_string()],
        },
    }
}

/// Validate one scenario file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn validate_scenario_file(path: &Path) -> Result<FileReport> {
    let text = fs::read_to_string(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let report = validate_scenario_str(&path.display().to_string(), &text);
    tracing::debug!(path = %path.display(), issues = report.issues.len(), "Validated scenario");
    Ok(report)
}

/// Validate a scenario file, or every `.ron` file in a directory.
///
/// # Errors
///
/// Returns an error if the path or one of its files cannot be read.
pub fn validate_data_directory(path: &Path) -> Result<ValidationSummary> {
    if path.is_file() {
        return Ok(ValidationSummary {
            files: vec![validate_scenario_file(path)?],
        });
    }

    let read_dir = fs::read_dir(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut scenario_paths = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|source| ToolError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let entry_path = entry.path();
        if entry_path.extension().is_some_and(|ext| ext == "ron") {
            scenario_paths.push(entry_path);
        }
    }
    scenario_paths.sort();

    if scenario_paths.is_empty() {
        tracing::warn!(path = %path.display(), "No scenario files found");
    }

    let files = scenario_paths
        .iter()
        .map(|p| validate_scenario_file(p))
        .collect::<Result<Vec<_>>>()?;
    Ok(ValidationSummary { files })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_scenario_has_no_issues() {
        let report = validate_scenario_str(
            "inline",
            "(config: (grid_width: 11, grid_height: 11), entities: [(team: Blue, q: 0, r: 3)])",
        );
        assert!(report.is_valid());
        assert_eq!(report.entities, 1);
    }

    #[test]
    fn test_overlaps_and_parse_errors_are_reported() {
        let overlap = validate_scenario_str(
            "overlap",
            "(config: (grid_width: 11, grid_height: 11), entities: [(team: Blue, q: 0, r: 3), (team: Red, q: 1, r: 3)])",
        );
        assert_eq!(overlap.issues.len(), 1);

        let broken = validate_scenario_str("broken", "(config: ");
        assert_eq!(broken.entities, 0);
        assert!(broken.issues[0].contains("Failed to parse"));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let result = validate_data_directory(Path::new("/nonexistent/scenarios"));
        assert!(matches!(result, Err(ToolError::Io { .. })));
    }

    #[test]
    fn test_summary_counts() {
        let summary = ValidationSummary {
            files: vec![
                validate_scenario_str("a", "(entities: [])"),
                validate_scenario_str("b", "(config: (grid_width: 4))"),
            ],
        };
        assert_eq!(summary.issue_count(), 1);
        assert!(!summary.is_valid());
    }
}
