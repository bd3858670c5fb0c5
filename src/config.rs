use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Run settings. Every field has a default, so a config file only needs the
/// keys it wants to change.
///
/// ```toml
/// root_dir = "../Fitting_Framework/test_data"
/// workers = 6
/// time_frames = [0]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub root_dir: PathBuf,
    pub workers: usize,
    pub contour_file: String,
    pub metadata_file: String,
    pub output_contour_file: String,
    pub output_metadata_file: String,
    pub failure_log: PathBuf,
    /// Frames handed to the enrichment steps; `None` means every frame in the case.
    pub time_frames: Option<BTreeSet<u32>>,
    /// Max RV-to-LV-epicardium distance for an RV point to count as septum.
    pub septum_distance_mm: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            root_dir: PathBuf::from("test_data"),
            workers: num_cpus::get(),
            contour_file: "GP_ED.txt".to_string(),
            metadata_file: "SliceInfo.txt".to_string(),
            output_contour_file: "GP_ED_proc.txt".to_string(),
            output_metadata_file: "SliceInfo_proc.txt".to_string(),
            failure_log: PathBuf::from("results").join("FailedCases.txt"),
            time_frames: None,
            septum_distance_mm: 5.0,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if !(self.septum_distance_mm > 0.0) {
            bail!(
                "septum_distance_mm must be positive, got {}",
                self.septum_distance_mm
            );
        }
        if self.contour_file == self.output_contour_file
            || self.metadata_file == self.output_metadata_file
        {
            bail!("output file names must differ from the input file names");
        }
        Ok(())
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("workers = 3\ntime_frames = [0, 2]\n").unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(
            config.time_frames,
            Some([0, 2].into_iter().collect::<BTreeSet<u32>>())
        );
        assert_eq!(config.contour_file, "GP_ED.txt");
        assert_eq!(config.failure_log, PathBuf::from("results/FailedCases.txt"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(toml::from_str::<Config>("worker = 3\n").is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = Config {
            workers: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overwriting_inputs() {
        let config = Config {
            output_contour_file: "GP_ED.txt".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
