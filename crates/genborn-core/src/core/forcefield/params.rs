use super::potentials::CAL2JOULE;
use crate::core::models::atom::AtomRecord;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_PROBE_RADIUS: f64 = 0.14;
const DEFAULT_STILL_TENSION: f64 = 0.0049;
const DEFAULT_HCT_OBC_TENSION: f64 = 0.0054;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct GlobalParams {
    /// Solvent probe radius in nm.
    #[serde(default = "default_probe_radius")]
    pub probe_radius: f64,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            probe_radius: DEFAULT_PROBE_RADIUS,
        }
    }
}

fn default_probe_radius() -> f64 {
    DEFAULT_PROBE_RADIUS
}

/// Surface tensions of the nonpolar correction in kcal/(mol·Å²).
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct SurfaceTension {
    #[serde(default = "default_still_tension")]
    pub still: f64,
    #[serde(default = "default_hct_obc_tension")]
    pub hct_obc: f64,
}

impl Default for SurfaceTension {
    fn default() -> Self {
        Self {
            still: DEFAULT_STILL_TENSION,
            hct_obc: DEFAULT_HCT_OBC_TENSION,
        }
    }
}

fn default_still_tension() -> f64 {
    DEFAULT_STILL_TENSION
}

fn default_hct_obc_tension() -> f64 {
    DEFAULT_HCT_OBC_TENSION
}

impl SurfaceTension {
    /// The Still tension converted to kJ/(mol·nm²).
    pub fn still_factor(&self) -> f64 {
        self.still * 100.0 * CAL2JOULE
    }

    /// The HCT/OBC tension converted to kJ/(mol·nm²).
    pub fn hct_obc_factor(&self) -> f64 {
        self.hct_obc * 100.0 * CAL2JOULE
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct GbGlobals {
    #[serde(default)]
    pub globals: GlobalParams,
    #[serde(default)]
    pub surface_tension: SurfaceTension,
}

/// Per-type GB parameters: the intrinsic radius in nm and the HCT/OBC overlap scale factor.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AtomTypeParams {
    pub type_name: String,
    pub radius: f64,
    pub scale: f64,
}

#[derive(Debug, Clone)]
pub struct GbParameters {
    pub globals: GbGlobals,
    pub types: Vec<AtomTypeParams>,
    index: HashMap<String, usize>,
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Atom type '{0}' is defined more than once")]
    DuplicateType(String),
    #[error("Atom type '{type_name}' has invalid parameters: {reason}")]
    InvalidType { type_name: String, reason: String },
    #[error("Unknown atom type '{0}'")]
    UnknownType(String),
    #[error("Atom {atom} references type index {index}, but only {ntypes} types are defined")]
    TypeIndexOutOfRange {
        atom: usize,
        index: usize,
        ntypes: usize,
    },
}

impl GbParameters {
    pub fn load(globals_path: &Path, types_path: &Path) -> Result<Self, ParamLoadError> {
        let globals = Self::load_globals(globals_path)?;
        let types = Self::load_types_csv(types_path)?;
        let params = Self::from_parts(globals, types)?;

        info!(
            "Loaded GB parameters for {} atom types from '{}'",
            params.types.len(),
            types_path.display()
        );
        Ok(params)
    }

    /// Assembles a parameter set from already-parsed parts, validating every type.
    pub fn from_parts(
        globals: GbGlobals,
        types: Vec<AtomTypeParams>,
    ) -> Result<Self, ParamLoadError> {
        let mut index = HashMap::with_capacity(types.len());
        for (i, ty) in types.iter().enumerate() {
            if !(ty.radius.is_finite() && ty.radius > 0.0) {
                return Err(ParamLoadError::InvalidType {
                    type_name: ty.type_name.clone(),
                    reason: format!("radius must be positive, got {}", ty.radius),
                });
            }
            if !(ty.scale.is_finite() && ty.scale >= 0.0) {
                return Err(ParamLoadError::InvalidType {
                    type_name: ty.type_name.clone(),
                    reason: format!("scale must be non-negative, got {}", ty.scale),
                });
            }
            if index.insert(ty.type_name.clone(), i).is_some() {
                return Err(ParamLoadError::DuplicateType(ty.type_name.clone()));
            }
        }
        Ok(Self {
            globals,
            types,
            index,
        })
    }

    pub fn type_index(&self, type_name: &str) -> Result<usize, ParamLoadError> {
        self.index
            .get(type_name)
            .copied()
            .ok_or_else(|| ParamLoadError::UnknownType(type_name.to_string()))
    }

    /// Expands the per-type table into per-atom parameters.
    pub fn resolve(
        &self,
        atoms: &[AtomRecord],
        dielectric_offset: f64,
    ) -> Result<ModelParameters, ParamLoadError> {
        let mut radius = Vec::with_capacity(atoms.len());
        let mut scale = Vec::with_capacity(atoms.len());

        for (i, atom) in atoms.iter().enumerate() {
            let ty = self
                .types
                .get(atom.type_index)
                .ok_or(ParamLoadError::TypeIndexOutOfRange {
                    atom: i,
                    index: atom.type_index,
                    ntypes: self.types.len(),
                })?;
            if ty.radius <= dielectric_offset {
                return Err(ParamLoadError::InvalidType {
                    type_name: ty.type_name.clone(),
                    reason: format!(
                        "radius {} does not exceed the dielectric offset {}",
                        ty.radius, dielectric_offset
                    ),
                });
            }
            if !atom.participates && atom.charge != 0.0 {
                warn!(
                    "Atom {} carries charge {} but does not participate in solvation",
                    i, atom.charge
                );
            }
            radius.push(ty.radius);
            scale.push(ty.scale);
        }

        Ok(ModelParameters {
            radius,
            scale,
            dielectric_offset,
            probe_radius: self.globals.globals.probe_radius,
            surface_tension: self.globals.surface_tension,
        })
    }

    /// Reads the global settings TOML; absent keys take their defaults.
    pub fn load_globals(path: &Path) -> Result<GbGlobals, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn load_types_csv(path: &Path) -> Result<Vec<AtomTypeParams>, ParamLoadError> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| ParamLoadError::Csv {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;

        reader
            .deserialize::<AtomTypeParams>()
            .map(|result| {
                result.map_err(|e| ParamLoadError::Csv {
                    path: path.to_string_lossy().to_string(),
                    source: e,
                })
            })
            .collect()
    }
}

/// Per-atom GB parameters for one system, borrowed by the solver for its whole lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParameters {
    /// Intrinsic radius ρ per atom, in nm.
    pub radius: Vec<f64>,
    /// Overlap scale factor per atom.
    pub scale: Vec<f64>,
    /// Dielectric offset subtracted from ρ by the descreening models, in nm.
    pub dielectric_offset: f64,
    pub probe_radius: f64,
    pub surface_tension: SurfaceTension,
}

impl ModelParameters {
    pub fn new(radius: Vec<f64>, scale: Vec<f64>, dielectric_offset: f64) -> Self {
        Self {
            radius,
            scale,
            dielectric_offset,
            probe_radius: DEFAULT_PROBE_RADIUS,
            surface_tension: SurfaceTension::default(),
        }
    }

    pub fn with_probe_radius(mut self, probe_radius: f64) -> Self {
        self.probe_radius = probe_radius;
        self
    }

    pub fn with_surface_tension(mut self, surface_tension: SurfaceTension) -> Self {
        self.surface_tension = surface_tension;
        self
    }

    pub fn len(&self) -> usize {
        self.radius.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radius.is_empty()
    }

    /// The radius with the dielectric offset removed.
    #[inline]
    pub fn offset_radius(&self, atom: usize) -> f64 {
        self.radius[atom] - self.dielectric_offset
    }
}
