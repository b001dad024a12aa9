//! Pipeline descriptor documents.
//!
//! A descriptor is the pipeline description plus everything fitting
//! produced, so a fitted pipeline can be rebuilt without a reference
//! frame:
//!
//! ```json
//! {
//!   "data_embed_block_size": 8,
//!   "data_embed_num_rows": 4,
//!   "data_embed_interval": 60,
//!   "steps": [ ... ],
//!   "state": {
//!     "input_shape":   { "height": 1080, "width": 1920, "channels": 3 },
//!     "output_shape":  { "height": 1920, "width": 1080, "channels": 3 },
//!     "carrier_shape": { "height": 1952, "width": 1080, "channels": 3 },
//!     "frame_counter": 0
//!   },
//!   "steps_state": [ ... ]
//! }
//! ```
//!
//! `steps_state` is optional. The payload embedded in carrier frames is
//! smaller still: only the description and `input_shape`. Fitted tables
//! are a pure function of seed and shape and the other shapes follow from
//! the steps, so the receiver recalibrates and gets identical state.

use serde::{Deserialize, Serialize};

use crate::codec::{self, BandLayout};
use crate::frame::Frame;
use crate::spec::PipelineSpec;
use crate::step::StepState;
use crate::types::{ScrambleError, Shape};

/// Shapes and counter recorded at fit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorState {
    /// Shape of frames passed to `transform`.
    pub input_shape: Shape,
    /// Shape after all steps, before the band is added.
    pub output_shape: Shape,
    /// Shape of frames `transform` returns.
    pub carrier_shape: Shape,
    /// Frames transformed so far.
    pub frame_counter: u64,
}

/// What carrier frames embed: the description and the input shape.
#[derive(Debug, Serialize, Deserialize)]
struct RecoveryPayload {
    #[serde(flatten)]
    spec: PipelineSpec,
    input_shape: Shape,
}

/// A serialized fitted pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDescriptor {
    /// The pipeline description.
    #[serde(flatten)]
    pub spec: PipelineSpec,
    /// Fit-time shapes and the frame counter.
    pub state: DescriptorState,
    /// Fitted tables, one entry per step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps_state: Option<Vec<StepState>>,
}

impl PipelineDescriptor {
    /// Pretty-printed JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, ScrambleError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Minified JSON of the description and input shape, as embedded in
    /// carriers.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Serialization`] if encoding fails.
    pub fn to_payload(&self) -> Result<Vec<u8>, ScrambleError> {
        let payload = RecoveryPayload {
            spec: self.spec.clone(),
            input_shape: self.state.input_shape,
        };
        Ok(serde_json::to_vec(&payload)?)
    }

    /// Rebuild a descriptor without tables from an embedded payload.
    ///
    /// Output and carrier shapes are derived from the steps; the frame
    /// counter starts at zero.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Serialization`] if the payload is not a
    /// well-formed payload document and [`ScrambleError::Configuration`]
    /// if its description is invalid.
    pub fn from_payload(bytes: &[u8]) -> Result<Self, ScrambleError> {
        let RecoveryPayload { spec, input_shape } = serde_json::from_slice(bytes)?;
        spec.validate()?;
        let output_shape = spec
            .steps
            .iter()
            .fold(input_shape, |shape, step| step.output_shape(shape));
        let carrier_shape = Shape::new(
            output_shape.height.saturating_add(spec.embed.band_height()),
            output_shape.width,
            output_shape.channels,
        );
        Ok(Self {
            spec,
            state: DescriptorState {
                input_shape,
                output_shape,
                carrier_shape,
                frame_counter: 0,
            },
            steps_state: None,
        })
    }

    /// Parse a descriptor document.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Serialization`] if the document is not a
    /// well-formed descriptor, and [`ScrambleError::Configuration`] if its
    /// values are out of range or `steps_state` has the wrong length.
    pub fn from_json(text: &str) -> Result<Self, ScrambleError> {
        Self::from_slice(text.as_bytes())
    }

    /// Parse a descriptor from raw bytes, such as an extracted payload.
    ///
    /// # Errors
    ///
    /// See [`from_json`](Self::from_json).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ScrambleError> {
        let descriptor: Self = serde_json::from_slice(bytes)?;
        descriptor.spec.validate()?;
        if let Some(states) = &descriptor.steps_state
            && states.len() != descriptor.spec.steps.len()
        {
            return Err(ScrambleError::Configuration(format!(
                "descriptor has {} steps but {} step states",
                descriptor.spec.steps.len(),
                states.len()
            )));
        }
        Ok(descriptor)
    }

    /// Render a carrier-shaped debug image: the band carrying this
    /// descriptor's payload above a black image area.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Configuration`] if the recorded carrier
    /// shape cannot hold the band or the payload does not fit it.
    pub fn render(&self) -> Result<Frame, ScrambleError> {
        let carrier = self.state.carrier_shape;
        let layout = BandLayout::new(&self.spec.embed, carrier)?;
        if carrier.height <= layout.height() {
            return Err(ScrambleError::Configuration(format!(
                "carrier {carrier} has no room below a {}-row band",
                layout.height()
            )));
        }
        let band = codec::render_band(&layout, carrier.height, &self.to_payload()?)?;
        let body = Frame::filled(
            Shape::new(
                carrier.height - layout.height(),
                carrier.width,
                carrier.channels,
            ),
            0,
        );
        Frame::stack_vertical(&band, &body)
    }
}
