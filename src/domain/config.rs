use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration for the audit solver.
///
/// This struct holds the resource bounds applied to the combinatorial search.
/// The bounds exist so that a pathological requirement/pool pair surfaces as
/// an inconclusive audit instead of an unbounded computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct SolverConfig {
    /// Maximum number of node evaluations before the search gives up.
    ///
    /// When the budget is exhausted the audit reports `Inconclusive` rather
    /// than `Unsatisfiable`, so callers never mistake a resource bound for a
    /// proof.
    max_steps: u64,

    /// Maximum number of ranked candidate assignments retained per node
    /// during the search.
    max_candidates: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_candidates: default_max_candidates(),
        }
    }
}

impl SolverConfig {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Returns the search step budget.
    #[must_use]
    pub const fn max_steps(&self) -> u64 {
        self.max_steps
    }

    /// Returns the per-node candidate cap.
    #[must_use]
    pub const fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    /// Overrides the step budget.
    pub const fn set_max_steps(&mut self, max_steps: u64) {
        self.max_steps = max_steps;
    }
}

const fn default_max_steps() -> u64 {
    1_000_000
}

const fn default_max_candidates() -> usize {
    32
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the
/// domain type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_max_steps")]
        max_steps: u64,

        #[serde(default = "default_max_candidates")]
        max_candidates: usize,
    },
}

impl From<Versions> for SolverConfig {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                max_steps,
                max_candidates,
            } => Self {
                max_steps,
                max_candidates,
            },
        }
    }
}

impl From<SolverConfig> for Versions {
    fn from(config: SolverConfig) -> Self {
        Self::V1 {
            max_steps: config.max_steps,
            max_candidates: config.max_candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nmax_steps = 5000\nmax_candidates = 8\n")
            .unwrap();

        let config = SolverConfig::load(file.path()).unwrap();

        assert_eq!(config.max_steps(), 5000);
        assert_eq!(config.max_candidates(), 8);
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = SolverConfig::load(&missing).unwrap_err();
        assert!(error.starts_with("Failed to read config file:"));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nmax_steps = \"lots\"\n")
            .unwrap();

        let error = SolverConfig::load(file.path()).unwrap_err();
        assert!(error.starts_with("Failed to parse config file:"));
    }

    #[test]
    fn empty_file_returns_default() {
        // Tests that deserialising a version-only file returns the default
        // configuration.
        let expected = SolverConfig::default();
        let actual: SolverConfig = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn save_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("satis.toml");

        let mut config = SolverConfig::default();
        config.set_max_steps(1234);
        config.save(&path).unwrap();

        let loaded = SolverConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
