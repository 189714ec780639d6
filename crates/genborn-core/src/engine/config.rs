use crate::core::forcefield::potentials::ONE_4PI_EPS0;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Unknown GB algorithm: '{0}' (expected still, hct or obc)")]
    UnknownAlgorithm(String),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// The Born radius model, selected once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GbAlgorithm {
    Still,
    Hct,
    Obc,
}

impl fmt::Display for GbAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Still => "still",
            Self::Hct => "hct",
            Self::Obc => "obc",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for GbAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "still" => Ok(Self::Still),
            "hct" => Ok(Self::Hct),
            "obc" => Ok(Self::Obc),
            _ => Err(ConfigError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Maps the numeric selector used by run input files (0 = Still, 1 = HCT, 2 = OBC).
impl TryFrom<i32> for GbAlgorithm {
    type Error = ConfigError;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(Self::Still),
            1 => Ok(Self::Hct),
            2 => Ok(Self::Obc),
            _ => Err(ConfigError::UnknownAlgorithm(id.to_string())),
        }
    }
}

/// Coefficients of the OBC rescaling `tanh(α·ψ − β·ψ² + γ·ψ³)`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ObcParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl ObcParams {
    /// The OBC-I parameter set.
    pub const OBC1: Self = Self {
        alpha: 0.8,
        beta: 0.0,
        gamma: 2.909125,
    };
    /// The OBC-II parameter set.
    pub const OBC2: Self = Self {
        alpha: 1.0,
        beta: 0.8,
        gamma: 4.85,
    };
}

impl Default for ObcParams {
    fn default() -> Self {
        Self::OBC2
    }
}

/// How the HCT/OBC kernels evaluate `ln(u/l)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMethod {
    #[default]
    Exact,
    Table,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GbConfig {
    pub algorithm: GbAlgorithm,
    pub obc: ObcParams,
    /// Dielectric offset in nm.
    pub dielectric_offset: f64,
    pub epsilon_solute: f64,
    pub epsilon_solvent: f64,
    /// Table points per unit of the scaled distance.
    pub table_scale: f64,
    /// Largest tabulated scaled distance.
    pub table_extent: f64,
    pub log_method: LogMethod,
    /// Whether the general short-range pairs contribute tabulated GB energy.
    pub include_nonbonded_pairs: bool,
}

impl GbConfig {
    /// The electrostatic prefactor `k·(1/ε_solute − 1/ε_solvent)`.
    pub fn epsfac(&self) -> f64 {
        ONE_4PI_EPS0 * (1.0 / self.epsilon_solute - 1.0 / self.epsilon_solvent)
    }
}

#[derive(Default)]
pub struct GbConfigBuilder {
    algorithm: Option<GbAlgorithm>,
    obc: Option<ObcParams>,
    dielectric_offset: Option<f64>,
    epsilon_solute: Option<f64>,
    epsilon_solvent: Option<f64>,
    table_scale: Option<f64>,
    table_extent: Option<f64>,
    log_method: Option<LogMethod>,
    include_nonbonded_pairs: Option<bool>,
}

impl GbConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn algorithm(mut self, algorithm: GbAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }
    pub fn obc(mut self, params: ObcParams) -> Self {
        self.obc = Some(params);
        self
    }
    pub fn dielectric_offset(mut self, offset: f64) -> Self {
        self.dielectric_offset = Some(offset);
        self
    }
    pub fn epsilon_solute(mut self, epsilon: f64) -> Self {
        self.epsilon_solute = Some(epsilon);
        self
    }
    pub fn epsilon_solvent(mut self, epsilon: f64) -> Self {
        self.epsilon_solvent = Some(epsilon);
        self
    }
    pub fn table_scale(mut self, scale: f64) -> Self {
        self.table_scale = Some(scale);
        self
    }
    pub fn table_extent(mut self, extent: f64) -> Self {
        self.table_extent = Some(extent);
        self
    }
    pub fn log_method(mut self, method: LogMethod) -> Self {
        self.log_method = Some(method);
        self
    }
    pub fn include_nonbonded_pairs(mut self, include: bool) -> Self {
        self.include_nonbonded_pairs = Some(include);
        self
    }

    pub fn build(self) -> Result<GbConfig, ConfigError> {
        let config = GbConfig {
            algorithm: self
                .algorithm
                .ok_or(ConfigError::MissingParameter("algorithm"))?,
            obc: self.obc.unwrap_or_default(),
            dielectric_offset: self.dielectric_offset.unwrap_or(0.009),
            epsilon_solute: self.epsilon_solute.unwrap_or(1.0),
            epsilon_solvent: self.epsilon_solvent.unwrap_or(78.3),
            table_scale: self.table_scale.unwrap_or(500.0),
            table_extent: self.table_extent.unwrap_or(40.0),
            log_method: self.log_method.unwrap_or_default(),
            include_nonbonded_pairs: self.include_nonbonded_pairs.unwrap_or(true),
        };
        validate(&config)?;
        Ok(config)
    }
}

fn validate(config: &GbConfig) -> Result<(), ConfigError> {
    let positive = |name: &'static str, value: f64| {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(ConfigError::InvalidValue {
                name,
                reason: format!("must be positive and finite, got {}", value),
            })
        }
    };

    positive("epsilon_solute", config.epsilon_solute)?;
    positive("epsilon_solvent", config.epsilon_solvent)?;
    positive("table_scale", config.table_scale)?;
    positive("table_extent", config.table_extent)?;

    if !(config.dielectric_offset.is_finite() && config.dielectric_offset >= 0.0) {
        return Err(ConfigError::InvalidValue {
            name: "dielectric_offset",
            reason: format!("must be non-negative, got {}", config.dielectric_offset),
        });
    }
    if config.algorithm == GbAlgorithm::Obc && config.dielectric_offset <= 0.0 {
        return Err(ConfigError::InvalidValue {
            name: "dielectric_offset",
            reason: "the OBC model requires a positive dielectric offset".to_string(),
        });
    }
    let obc = config.obc;
    if ![obc.alpha, obc.beta, obc.gamma].iter().all(|c| c.is_finite()) {
        return Err(ConfigError::InvalidValue {
            name: "obc",
            reason: format!("coefficients must be finite, got {:?}", obc),
        });
    }
    Ok(())
}
