//! Reversible pipeline steps.
//!
//! This module defines the [`StepConfig`] sum type (what the user
//! declares), the [`StepState`] sum type (what calibration derives from a
//! reference shape), and [`Step`], which pairs the two and implements the
//! [`Reversible`] trait.
//!
//! # Closed variant set
//!
//! The four variants are known at compile time, so dispatch is a `match`
//! rather than a trait object. Adding a variant means adding a config
//! arm, a state arm, and the kernel; the compiler points at every place
//! that needs updating.

use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::mix::{is_unit_triangular, mix_rows, unit_triangular, unmix_rows};
use crate::permute::permute_row_groups;
use crate::rng;
use crate::shift::shift_wrap;
use crate::transpose::transpose;
use crate::types::{ScrambleError, Shape};

/// Step names accepted in pipeline descriptions, including the legacy
/// aliases.
pub const KNOWN_STEP_NAMES: &[&str] = &[
    "AxisShift",
    "ImageShift",
    "RowGroupPermute",
    "RowShuffle",
    "Transpose",
    "ImageTranspose",
    "RowMix",
];

/// Largest `row_group_size` a [`StepConfig::RowMix`] accepts; mixing
/// matrices hold `row_group_size²` coefficients.
pub const MAX_MIX_GROUP: usize = 256;

/// Declared configuration of one step, tagged by `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum StepConfig {
    /// Circular translation by `sx` columns and `sy` rows.
    #[serde(alias = "ImageShift")]
    AxisShift {
        /// Column shift; negative moves left.
        sx: i64,
        /// Row shift; negative moves up.
        sy: i64,
    },

    /// Seeded permutation of contiguous row groups.
    #[serde(alias = "RowShuffle")]
    RowGroupPermute {
        /// Rows per group. Must divide the logical frame height.
        row_group_size: usize,
        /// Seed for the permutation table.
        random_seed: u64,
    },

    /// Swap height and width.
    #[serde(alias = "ImageTranspose")]
    Transpose,

    /// Row-group permutation followed by invertible mixing inside each
    /// group.
    RowMix {
        /// Rows per group. Must divide the logical frame height.
        row_group_size: usize,
        /// Seed for the permutation and mixing tables.
        random_seed: u64,
    },
}

impl StepConfig {
    /// Canonical variant name, as written by [`Serialize`].
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AxisShift { .. } => "AxisShift",
            Self::RowGroupPermute { .. } => "RowGroupPermute",
            Self::Transpose => "Transpose",
            Self::RowMix { .. } => "RowMix",
        }
    }

    /// Parse one step descriptor.
    ///
    /// The `name` field is resolved first so that an unknown step is
    /// reported by name rather than as a generic variant mismatch.
    /// Unknown extra fields are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Configuration`] if `name` is missing or
    /// unknown, or a variant field is missing or has the wrong type.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ScrambleError> {
        let name = value
            .get("name")
            .ok_or_else(|| ScrambleError::Configuration("step is missing field `name`".to_owned()))?
            .as_str()
            .ok_or_else(|| {
                ScrambleError::Configuration("step field `name` must be a string".to_owned())
            })?;
        if !KNOWN_STEP_NAMES.contains(&name) {
            return Err(ScrambleError::Configuration(format!(
                "unknown step \"{name}\""
            )));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| ScrambleError::Configuration(format!("step \"{name}\": {e}")))
    }

    /// Reject values no reference shape could make valid.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Configuration`] for a zero `row_group_size`,
    /// a `RowMix` group above [`MAX_MIX_GROUP`], or a shift that cannot be
    /// negated.
    pub fn validate(&self) -> Result<(), ScrambleError> {
        match *self {
            Self::AxisShift { sx, sy } if sx == i64::MIN || sy == i64::MIN => Err(
                ScrambleError::Configuration("AxisShift: shift out of range".to_owned()),
            ),
            Self::RowGroupPermute { row_group_size, .. } | Self::RowMix { row_group_size, .. }
                if row_group_size == 0 =>
            {
                Err(ScrambleError::Configuration(format!(
                    "{}: row_group_size must be at least 1",
                    self.name()
                )))
            }
            Self::RowMix { row_group_size, .. } if row_group_size > MAX_MIX_GROUP => {
                Err(ScrambleError::Configuration(format!(
                    "RowMix: row_group_size {row_group_size} exceeds {MAX_MIX_GROUP}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Shape this step produces from `input`.
    #[must_use]
    pub const fn output_shape(&self, input: Shape) -> Shape {
        match self {
            Self::Transpose => input.transposed(),
            _ => input,
        }
    }
}

/// Fitted tables of one step.
///
/// Group permutation tables map group index to destination slot;
/// `inverse` is precomputed at calibration time. Mixing matrices are
/// `row_group_size²` bytes, row-major, with 1s on the diagonal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum StepState {
    /// Stateless.
    AxisShift,
    /// Group permutation and its inverse.
    RowGroupPermute {
        /// Destination slot of each group.
        forward: Vec<usize>,
        /// Source group of each slot.
        inverse: Vec<usize>,
    },
    /// Stateless.
    Transpose,
    /// Group permutation plus unit triangular mixing matrices.
    RowMix {
        /// Destination slot of each group.
        forward: Vec<usize>,
        /// Source group of each slot.
        inverse: Vec<usize>,
        /// Unit lower-triangular factor, applied first.
        lower: Vec<u8>,
        /// Unit upper-triangular factor, applied second.
        upper: Vec<u8>,
    },
}

/// Forward and inverse application over frames.
pub trait Reversible {
    /// Apply the transform.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::ShapeMismatch`] if `frame` does not have
    /// the shape the step was calibrated for.
    fn forward(&self, frame: &Frame) -> Result<Frame, ScrambleError>;

    /// Undo [`forward`](Self::forward).
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::ShapeMismatch`] if `frame` does not have
    /// the shape `forward` produces.
    fn inverse(&self, frame: &Frame) -> Result<Frame, ScrambleError>;
}

/// A calibrated step: configuration, fitted state, and the logical
/// shape it was calibrated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    config: StepConfig,
    state: StepState,
    input_shape: Shape,
}

fn groups_for(config: &StepConfig, g: usize, input: Shape) -> Result<usize, ScrambleError> {
    if input.height % g != 0 {
        return Err(ScrambleError::Configuration(format!(
            "{}: height {} not divisible by row_group_size {g}",
            config.name(),
            input.height
        )));
    }
    Ok(input.height / g)
}

fn check_permutation(
    step: &str,
    groups: usize,
    forward: &[usize],
    inverse: &[usize],
) -> Result<(), ScrambleError> {
    if forward.len() != groups || !rng::is_permutation(forward) {
        return Err(ScrambleError::Configuration(format!(
            "{step}: state is not a permutation of {groups} groups"
        )));
    }
    if inverse != rng::invert(forward).as_slice() {
        return Err(ScrambleError::Configuration(format!(
            "{step}: inverse table does not match forward table"
        )));
    }
    Ok(())
}

impl Step {
    /// Derive fitted state for `config` against a frame of shape `input`.
    ///
    /// Tables are a pure function of the seed and the group count.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Configuration`] if the row group size is
    /// zero or does not divide `input.height`.
    pub fn calibrate(config: StepConfig, input: Shape) -> Result<Self, ScrambleError> {
        config.validate()?;
        let state = match config {
            StepConfig::AxisShift { .. } => StepState::AxisShift,
            StepConfig::Transpose => StepState::Transpose,
            StepConfig::RowGroupPermute {
                row_group_size,
                random_seed,
            } => {
                let groups = groups_for(&config, row_group_size, input)?;
                let forward = rng::permutation(
                    groups,
                    &mut rng::seeded(random_seed, groups, rng::DOMAIN_GROUP_PERMUTATION),
                );
                let inverse = rng::invert(&forward);
                StepState::RowGroupPermute { forward, inverse }
            }
            StepConfig::RowMix {
                row_group_size: g,
                random_seed,
            } => {
                let groups = groups_for(&config, g, input)?;
                let forward = rng::permutation(
                    groups,
                    &mut rng::seeded(random_seed, groups, rng::DOMAIN_GROUP_PERMUTATION),
                );
                let inverse = rng::invert(&forward);
                let mut lo = rng::seeded(random_seed, groups, rng::DOMAIN_MIX_LOWER);
                let mut up = rng::seeded(random_seed, groups, rng::DOMAIN_MIX_UPPER);
                StepState::RowMix {
                    forward,
                    inverse,
                    lower: unit_triangular(g, rng::bytes(g * g, &mut lo), true),
                    upper: unit_triangular(g, rng::bytes(g * g, &mut up), false),
                }
            }
        };
        Ok(Self {
            config,
            state,
            input_shape: input,
        })
    }

    /// Rebuild a step from serialized parts without recalibrating.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Configuration`] if `state` belongs to a
    /// different variant, has tables of the wrong size, or is not
    /// invertible.
    pub fn from_parts(
        config: StepConfig,
        state: StepState,
        input: Shape,
    ) -> Result<Self, ScrambleError> {
        config.validate()?;
        let name = config.name();
        match (&config, &state) {
            (StepConfig::AxisShift { .. }, StepState::AxisShift)
            | (StepConfig::Transpose, StepState::Transpose) => {}
            (
                StepConfig::RowGroupPermute { row_group_size, .. },
                StepState::RowGroupPermute { forward, inverse },
            ) => {
                let groups = groups_for(&config, *row_group_size, input)?;
                check_permutation(name, groups, forward, inverse)?;
            }
            (
                StepConfig::RowMix { row_group_size, .. },
                StepState::RowMix {
                    forward,
                    inverse,
                    lower,
                    upper,
                },
            ) => {
                let g = *row_group_size;
                let groups = groups_for(&config, g, input)?;
                check_permutation(name, groups, forward, inverse)?;
                if !is_unit_triangular(g, lower, true) || !is_unit_triangular(g, upper, false) {
                    return Err(ScrambleError::Configuration(format!(
                        "{name}: mixing matrices must be {g}x{g} unit triangular"
                    )));
                }
            }
            _ => {
                return Err(ScrambleError::Configuration(format!(
                    "{name}: fitted state does not match step configuration"
                )));
            }
        }
        Ok(Self {
            config,
            state,
            input_shape: input,
        })
    }

    /// The declared configuration.
    #[must_use]
    pub const fn config(&self) -> &StepConfig {
        &self.config
    }

    /// The fitted state.
    #[must_use]
    pub const fn state(&self) -> &StepState {
        &self.state
    }

    /// Shape this step was calibrated for.
    #[must_use]
    pub const fn input_shape(&self) -> Shape {
        self.input_shape
    }

    /// Shape this step produces.
    #[must_use]
    pub const fn output_shape(&self) -> Shape {
        self.config.output_shape(self.input_shape)
    }
}

impl Step {
    fn mismatch(&self) -> ScrambleError {
        ScrambleError::Configuration(format!(
            "{}: fitted state does not match step configuration",
            self.config.name()
        ))
    }
}

fn expect_shape(expected: Shape, frame: &Frame) -> Result<(), ScrambleError> {
    if frame.shape() == expected {
        Ok(())
    } else {
        Err(ScrambleError::ShapeMismatch {
            expected,
            actual: frame.shape(),
        })
    }
}

impl Reversible for Step {
    fn forward(&self, frame: &Frame) -> Result<Frame, ScrambleError> {
        expect_shape(self.input_shape, frame)?;
        Ok(match (&self.config, &self.state) {
            (StepConfig::AxisShift { sx, sy }, _) => shift_wrap(frame, *sx, *sy),
            (StepConfig::Transpose, _) => transpose(frame),
            (
                StepConfig::RowGroupPermute { row_group_size, .. },
                StepState::RowGroupPermute { forward, .. },
            ) => permute_row_groups(frame, *row_group_size, forward),
            (
                StepConfig::RowMix { row_group_size, .. },
                StepState::RowMix {
                    forward,
                    lower,
                    upper,
                    ..
                },
            ) => {
                let permuted = permute_row_groups(frame, *row_group_size, forward);
                mix_rows(&permuted, *row_group_size, lower, upper)
            }
            _ => return Err(self.mismatch()),
        })
    }

    fn inverse(&self, frame: &Frame) -> Result<Frame, ScrambleError> {
        expect_shape(self.output_shape(), frame)?;
        Ok(match (&self.config, &self.state) {
            (StepConfig::AxisShift { sx, sy }, _) => shift_wrap(frame, -sx, -sy),
            (StepConfig::Transpose, _) => transpose(frame),
            (
                StepConfig::RowGroupPermute { row_group_size, .. },
                StepState::RowGroupPermute { inverse, .. },
            ) => permute_row_groups(frame, *row_group_size, inverse),
            (
                StepConfig::RowMix { row_group_size, .. },
                StepState::RowMix {
                    inverse,
                    lower,
                    upper,
                    ..
                },
            ) => {
                let unmixed = unmix_rows(frame, *row_group_size, lower, upper);
                permute_row_groups(&unmixed, *row_group_size, inverse)
            }
            _ => return Err(self.mismatch()),
        })
    }
}
