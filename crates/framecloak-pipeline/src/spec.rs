//! Declarative pipeline descriptions.
//!
//! A description is parsed from untyped JSON into a [`PipelineSpec`] up
//! front, so malformed input is rejected before any frame is touched:
//!
//! ```json
//! {
//!   "data_embed_block_size": 8,
//!   "data_embed_num_rows": 4,
//!   "data_embed_interval": 60,
//!   "steps": [
//!     { "name": "Transpose" },
//!     { "name": "RowGroupPermute", "row_group_size": 8, "random_seed": 0 }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::step::StepConfig;
use crate::types::ScrambleError;

/// Largest block size and row count the band header can record.
pub const MAX_EMBED_PARAM: usize = u8::MAX as usize;

const fn default_interval() -> u64 {
    1
}

/// Recovery band geometry and cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedConfig {
    /// Edge length in pixels of one data block.
    #[serde(rename = "data_embed_block_size")]
    pub block_size: usize,
    /// Number of block rows in the band (header row included).
    #[serde(rename = "data_embed_num_rows")]
    pub num_rows: usize,
    /// Embed the payload on every `interval`-th transformed frame.
    #[serde(rename = "data_embed_interval", default = "default_interval")]
    pub interval: u64,
}

impl EmbedConfig {
    /// Height in pixels of the band stacked above every carrier frame.
    #[must_use]
    pub const fn band_height(&self) -> usize {
        self.block_size * self.num_rows
    }

    /// Check the ranges the codec relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Configuration`] naming the offending field.
    pub fn validate(&self) -> Result<(), ScrambleError> {
        if !(2..=MAX_EMBED_PARAM).contains(&self.block_size) {
            return Err(ScrambleError::Configuration(format!(
                "data_embed_block_size must be in 2..={MAX_EMBED_PARAM}, got {}",
                self.block_size
            )));
        }
        if !(2..=MAX_EMBED_PARAM).contains(&self.num_rows) {
            return Err(ScrambleError::Configuration(format!(
                "data_embed_num_rows must be in 2..={MAX_EMBED_PARAM}, got {}",
                self.num_rows
            )));
        }
        if self.interval == 0 {
            return Err(ScrambleError::Configuration(
                "data_embed_interval must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Embed configuration plus the ordered step list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Band geometry and cadence.
    #[serde(flatten)]
    pub embed: EmbedConfig,
    /// Steps in forward order.
    pub steps: Vec<StepConfig>,
}

fn required<'a>(doc: &'a Value, field: &str) -> Result<&'a Value, ScrambleError> {
    doc.get(field)
        .ok_or_else(|| ScrambleError::Configuration(format!("missing field `{field}`")))
}

fn positive_integer(doc: &Value, field: &str) -> Result<u64, ScrambleError> {
    required(doc, field)?
        .as_u64()
        .filter(|&n| n > 0)
        .ok_or_else(|| {
            ScrambleError::Configuration(format!("field `{field}` must be a positive integer"))
        })
}

fn positive_usize(doc: &Value, field: &str) -> Result<usize, ScrambleError> {
    usize::try_from(positive_integer(doc, field)?)
        .map_err(|_| ScrambleError::Configuration(format!("field `{field}` is too large")))
}

impl PipelineSpec {
    /// Start building a spec in code.
    #[must_use]
    pub fn builder() -> PipelineSpecBuilder {
        PipelineSpecBuilder::default()
    }

    /// The reference configuration: 8-pixel blocks, a 4-row band,
    /// a payload every 60 frames, and
    /// `Transpose → RowGroupPermute(8, 0) → AxisShift(37, 11) → RowGroupPermute(8, 1)`.
    #[must_use]
    pub fn reference() -> Self {
        Self {
            embed: EmbedConfig {
                block_size: 8,
                num_rows: 4,
                interval: 60,
            },
            steps: vec![
                StepConfig::Transpose,
                StepConfig::RowGroupPermute {
                    row_group_size: 8,
                    random_seed: 0,
                },
                StepConfig::AxisShift { sx: 37, sy: 11 },
                StepConfig::RowGroupPermute {
                    row_group_size: 8,
                    random_seed: 1,
                },
            ],
        }
    }

    /// Parse a JSON pipeline description.
    ///
    /// `data_embed_interval` defaults to 1. Unknown top-level fields are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Serialization`] for text that is not JSON,
    /// and [`ScrambleError::Configuration`] for a missing or invalid field
    /// or an unknown step name.
    pub fn from_json(text: &str) -> Result<Self, ScrambleError> {
        let doc: Value = serde_json::from_str(text)?;
        Self::from_value(&doc)
    }

    /// Parse an already-decoded JSON description.
    ///
    /// # Errors
    ///
    /// See [`from_json`](Self::from_json).
    pub fn from_value(doc: &Value) -> Result<Self, ScrambleError> {
        if !doc.is_object() {
            return Err(ScrambleError::Configuration(
                "pipeline description must be a JSON object".to_owned(),
            ));
        }
        let steps = required(doc, "steps")?
            .as_array()
            .ok_or_else(|| ScrambleError::Configuration("field `steps` must be a list".to_owned()))?
            .iter()
            .map(StepConfig::from_value)
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = Self::builder()
            .block_size(positive_usize(doc, "data_embed_block_size")?)
            .num_rows(positive_usize(doc, "data_embed_num_rows")?)
            .steps(steps);
        if doc.get("data_embed_interval").is_some() {
            builder = builder.interval(positive_integer(doc, "data_embed_interval")?);
        }
        builder.build()
    }

    /// Serialize to the JSON description format.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, ScrambleError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every field and step.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Configuration`] for the first invalid value.
    pub fn validate(&self) -> Result<(), ScrambleError> {
        self.embed.validate()?;
        self.steps.iter().try_for_each(StepConfig::validate)
    }
}

/// Incremental construction of a [`PipelineSpec`].
#[derive(Debug, Clone, Default)]
pub struct PipelineSpecBuilder {
    block_size: Option<usize>,
    num_rows: Option<usize>,
    interval: Option<u64>,
    steps: Vec<StepConfig>,
}

impl PipelineSpecBuilder {
    /// Set the block edge length.
    #[must_use]
    pub const fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Set the number of band rows.
    #[must_use]
    pub const fn num_rows(mut self, num_rows: usize) -> Self {
        self.num_rows = Some(num_rows);
        self
    }

    /// Set the embed interval (default 1).
    #[must_use]
    pub const fn interval(mut self, interval: u64) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Append one step.
    #[must_use]
    pub fn step(mut self, step: StepConfig) -> Self {
        self.steps.push(step);
        self
    }

    /// Replace the step list.
    #[must_use]
    pub fn steps(mut self, steps: Vec<StepConfig>) -> Self {
        self.steps = steps;
        self
    }

    /// Validate and produce the [`PipelineSpec`].
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Configuration`] if the block size or row
    /// count was never set, or any value is out of range.
    pub fn build(self) -> Result<PipelineSpec, ScrambleError> {
        let spec = PipelineSpec {
            embed: EmbedConfig {
                block_size: self.block_size.ok_or_else(|| {
                    ScrambleError::Configuration("missing field `data_embed_block_size`".to_owned())
                })?,
                num_rows: self.num_rows.ok_or_else(|| {
                    ScrambleError::Configuration("missing field `data_embed_num_rows`".to_owned())
                })?,
                interval: self.interval.unwrap_or_else(default_interval),
            },
            steps: self.steps,
        };
        spec.validate()?;
        Ok(spec)
    }
}
