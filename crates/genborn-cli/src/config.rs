use crate::cli::ComputeArgs;
use crate::error::{CliError, Result};
use genborn::engine::config::{GbAlgorithm, GbConfig, GbConfigBuilder, LogMethod, ObcParams};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

const DEFAULT_CUTOFF_NM: f64 = 1.0;
const DEFAULT_RANKS: usize = 1;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialModelConfig {
    algorithm: Option<GbAlgorithm>,
    obc: Option<ObcParams>,
    dielectric_offset: Option<f64>,
    epsilon_solute: Option<f64>,
    epsilon_solvent: Option<f64>,
    log_method: Option<LogMethod>,
    include_nonbonded_pairs: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialTableConfig {
    scale: Option<f64>,
    extent: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialRunSection {
    cutoff: Option<f64>,
    ranks: Option<usize>,
}

/// The run configuration as read from file, before CLI overrides are applied.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialRunConfig {
    model: Option<PartialModelConfig>,
    table: Option<PartialTableConfig>,
    run: Option<PartialRunSection>,
}

/// Everything the `compute` command needs after merging file and CLI values.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub gb: GbConfig,
    pub cutoff: f64,
    pub ranks: usize,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// CLI flags win over file values; anything unset falls back to the library defaults.
    pub fn merge_with_cli(self, args: &ComputeArgs) -> Result<RunConfig> {
        let model = self.model.unwrap_or_default();
        let table = self.table.unwrap_or_default();
        let run = self.run.unwrap_or_default();

        let algorithm = args.model.or(model.algorithm).unwrap_or(GbAlgorithm::Obc);
        let log_method = if args.log_table {
            Some(LogMethod::Table)
        } else {
            model.log_method
        };

        let mut builder = GbConfigBuilder::new().algorithm(algorithm);
        if let Some(obc) = model.obc {
            builder = builder.obc(obc);
        }
        if let Some(offset) = model.dielectric_offset {
            builder = builder.dielectric_offset(offset);
        }
        if let Some(epsilon) = model.epsilon_solute {
            builder = builder.epsilon_solute(epsilon);
        }
        if let Some(epsilon) = model.epsilon_solvent {
            builder = builder.epsilon_solvent(epsilon);
        }
        if let Some(method) = log_method {
            builder = builder.log_method(method);
        }
        if let Some(include) = model.include_nonbonded_pairs {
            builder = builder.include_nonbonded_pairs(include);
        }
        if let Some(scale) = table.scale {
            builder = builder.table_scale(scale);
        }
        if let Some(extent) = table.extent {
            builder = builder.table_extent(extent);
        }
        let gb = builder.build().map_err(|e| CliError::Config(e.to_string()))?;

        let cutoff = args.cutoff.or(run.cutoff).unwrap_or(DEFAULT_CUTOFF_NM);
        if !(cutoff.is_finite() && cutoff > 0.0) {
            return Err(CliError::Argument(format!(
                "Cutoff must be positive, got {}",
                cutoff
            )));
        }
        let ranks = args.ranks.or(run.ranks).unwrap_or(DEFAULT_RANKS);
        if ranks == 0 {
            return Err(CliError::Argument(
                "At least one rank is required".to_string(),
            ));
        }

        Ok(RunConfig { gb, cutoff, ranks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    fn compute_args(extra: &[&str]) -> ComputeArgs {
        let mut argv = vec!["genborn", "compute", "-s", "system.toml", "-t", "types.csv"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Compute(args) => args,
        }
    }

    fn parse(content: &str) -> PartialRunConfig {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(&path, content).unwrap();
        PartialRunConfig::from_file(&path).unwrap()
    }

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let config = PartialRunConfig::default()
            .merge_with_cli(&compute_args(&[]))
            .unwrap();
        assert_eq!(config.gb.algorithm, GbAlgorithm::Obc);
        assert_eq!(config.gb.obc, ObcParams::OBC2);
        assert_eq!(config.gb.log_method, LogMethod::Exact);
        assert_eq!(config.cutoff, DEFAULT_CUTOFF_NM);
        assert_eq!(config.ranks, 1);
    }

    #[test]
    fn file_values_are_loaded() {
        let partial = parse(
            r#"
            [model]
            algorithm = "hct"
            dielectric-offset = 0.01
            epsilon-solvent = 80.0
            log-method = "table"
            include-nonbonded-pairs = false

            [table]
            scale = 1000.0

            [run]
            cutoff = 1.2
            ranks = 3
            "#,
        );
        let config = partial.merge_with_cli(&compute_args(&[])).unwrap();
        assert_eq!(config.gb.algorithm, GbAlgorithm::Hct);
        assert_eq!(config.gb.dielectric_offset, 0.01);
        assert_eq!(config.gb.epsilon_solvent, 80.0);
        assert_eq!(config.gb.log_method, LogMethod::Table);
        assert!(!config.gb.include_nonbonded_pairs);
        assert_eq!(config.gb.table_scale, 1000.0);
        assert_eq!(config.cutoff, 1.2);
        assert_eq!(config.ranks, 3);
    }

    #[test]
    fn cli_flags_override_file_values() {
        let partial = parse(
            r#"
            [model]
            algorithm = "hct"

            [run]
            cutoff = 1.2
            ranks = 3
            "#,
        );
        let args = compute_args(&["-m", "still", "--cutoff", "0.8", "-n", "2", "--log-table"]);
        let config = partial.merge_with_cli(&args).unwrap();
        assert_eq!(config.gb.algorithm, GbAlgorithm::Still);
        assert_eq!(config.gb.log_method, LogMethod::Table);
        assert_eq!(config.cutoff, 0.8);
        assert_eq!(config.ranks, 2);
    }

    #[test]
    fn obc_coefficients_can_be_set_in_file() {
        let partial = parse(
            r#"
            [model.obc]
            alpha = 0.8
            beta = 0.0
            gamma = 2.909125
            "#,
        );
        let config = partial.merge_with_cli(&compute_args(&[])).unwrap();
        assert_eq!(config.gb.obc, ObcParams::OBC1);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(&path, "[model]\nalgorithm = \"obc\"\nsalt = 0.1\n").unwrap();
        let result = PartialRunConfig::from_file(&path);
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn invalid_values_are_reported() {
        let zero_ranks = PartialRunConfig::default().merge_with_cli(&compute_args(&["-n", "0"]));
        assert!(matches!(zero_ranks, Err(CliError::Argument(_))));

        let partial = parse("[model]\nalgorithm = \"obc\"\ndielectric-offset = 0.0\n");
        let result = partial.merge_with_cli(&compute_args(&[]));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn unknown_model_flag_is_rejected_by_the_parser() {
        let result = Cli::try_parse_from([
            "genborn", "compute", "-s", "a.toml", "-t", "b.csv", "-m", "gbsa",
        ]);
        assert!(result.is_err());
    }
}
