//! Fitted scrambling pipeline.
//!
//! A [`Pipeline`] is created from a [`PipelineSpec`], calibrated once
//! with [`fit`](Pipeline::fit), and then driven frame by frame:
//!
//! ```rust
//! # use framecloak_pipeline::{Frame, Pipeline, PipelineSpec, ScrambleError, Shape};
//! # fn run() -> Result<(), ScrambleError> {
//! let mut pipeline = Pipeline::new(PipelineSpec::reference());
//! let reference = Frame::filled(Shape::new(1080, 1920, 3), 0);
//! pipeline.fit(&reference)?;
//!
//! let carrier = pipeline.transform(&reference)?;
//! let restored = pipeline.inverse_transform(&carrier)?;
//! assert_eq!(restored, reference);
//! # Ok(())
//! # }
//! ```
//!
//! # Carrier frames
//!
//! `transform` returns a *carrier*: the scrambled image with a recovery
//! band of `num_rows * block_size` rows stacked on top. The band carries
//! the pipeline descriptor on every `interval`-th frame and is white on
//! all others. Embedding happens after the geometric steps, and
//! `inverse_transform` strips the band before undoing them, so the band
//! never takes part in scrambling and round trips are exact.
//!
//! # Frame counter
//!
//! The counter is 1-based: the first `transform` call makes it 1, and a
//! frame carries the payload when `counter % interval == 0`. With an
//! interval of 60 the payload lands on frames 60, 120, 180, and so on.
//! `transform` is the only writer; frames processed concurrently must
//! have their `transform` calls serialized by the caller.

use tracing::debug;

use crate::codec::{self, BandLayout};
use crate::descriptor::{DescriptorState, PipelineDescriptor};
use crate::frame::Frame;
use crate::resample::{ResampleFilter, resample};
use crate::spec::PipelineSpec;
use crate::step::{Reversible, Step};
use crate::types::{ScrambleError, Shape};

/// Most samples a fitted frame or carrier may hold.
pub const MAX_FRAME_SAMPLES: usize = 1 << 28;

/// Reject shapes no carrier can record before anything is sized from them.
fn check_frame_shape(what: &str, shape: Shape) -> Result<(), ScrambleError> {
    let fits_u16 = |n: usize| (1..=usize::from(u16::MAX)).contains(&n);
    if !fits_u16(shape.height) || !fits_u16(shape.width) {
        return Err(ScrambleError::Configuration(format!(
            "{what} {shape} must have between 1 and {} rows and columns",
            u16::MAX
        )));
    }
    if !(1..=4).contains(&shape.channels) {
        return Err(ScrambleError::Configuration(format!(
            "{what} {shape} must have 1 to 4 channels"
        )));
    }
    if shape.sample_count() > MAX_FRAME_SAMPLES {
        return Err(ScrambleError::Configuration(format!(
            "{what} {shape} exceeds {MAX_FRAME_SAMPLES} samples"
        )));
    }
    Ok(())
}

/// Everything derived at fit time.
#[derive(Debug, Clone)]
struct Fitted {
    steps: Vec<Step>,
    layout: BandLayout,
    /// Descriptor as of fit time; the embedded payload is built from it.
    descriptor: PipelineDescriptor,
    band: Frame,
    blank: Frame,
}

impl Fitted {
    const fn state(&self) -> &DescriptorState {
        &self.descriptor.state
    }

    /// Derive layout, payload and bands for calibrated `steps`.
    fn assemble(
        spec: &PipelineSpec,
        steps: Vec<Step>,
        input_shape: Shape,
    ) -> Result<Self, ScrambleError> {
        let output_shape = steps.last().map_or(input_shape, Step::output_shape);
        let carrier_shape = Shape::new(
            output_shape.height + spec.embed.band_height(),
            output_shape.width,
            output_shape.channels,
        );
        check_frame_shape("carrier", carrier_shape)?;
        let layout = BandLayout::new(&spec.embed, carrier_shape)?;

        let descriptor = PipelineDescriptor {
            spec: spec.clone(),
            state: DescriptorState {
                input_shape,
                output_shape,
                carrier_shape,
                frame_counter: 0,
            },
            steps_state: Some(steps.iter().map(|s| s.state().clone()).collect()),
        };
        let payload = descriptor.to_payload()?;
        let band = codec::render_band(&layout, carrier_shape.height, &payload)?;
        debug!(
            input = %input_shape,
            carrier = %carrier_shape,
            steps = steps.len(),
            payload_bytes = payload.len(),
            "pipeline fitted"
        );
        Ok(Self {
            steps,
            blank: codec::blank_band(&layout),
            layout,
            descriptor,
            band,
        })
    }
}

/// An ordered chain of reversible steps plus the recovery channel.
#[derive(Debug, Clone)]
pub struct Pipeline {
    spec: PipelineSpec,
    fitted: Option<Fitted>,
    frame_counter: u64,
}

impl Pipeline {
    /// An unfitted pipeline for `spec`.
    #[must_use]
    pub const fn new(spec: PipelineSpec) -> Self {
        Self {
            spec,
            fitted: None,
            frame_counter: 0,
        }
    }

    /// Parse a JSON pipeline description into an unfitted pipeline.
    ///
    /// # Errors
    ///
    /// See [`PipelineSpec::from_json`].
    pub fn from_json_spec(text: &str) -> Result<Self, ScrambleError> {
        Ok(Self::new(PipelineSpec::from_json(text)?))
    }

    /// Calibrate every step against the shape of `reference`.
    ///
    /// The logical shape is threaded through the chain, so steps after a
    /// transpose see swapped dimensions. Refitting re-derives everything
    /// and resets the frame counter. On error the pipeline is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Configuration`] if the reference frame has
    /// a zero or over-large dimension or more than four channels, a row
    /// group size does not divide the logical height at its position in
    /// the chain, or the carrier cannot hold the recovery band and payload.
    pub fn fit(&mut self, reference: &Frame) -> Result<(), ScrambleError> {
        self.spec.validate()?;
        let input_shape = reference.shape();
        check_frame_shape("reference frame", input_shape)?;
        let mut shape = input_shape;
        let mut steps = Vec::with_capacity(self.spec.steps.len());
        for config in &self.spec.steps {
            let step = Step::calibrate(config.clone(), shape)?;
            shape = step.output_shape();
            steps.push(step);
        }
        self.fitted = Some(Fitted::assemble(&self.spec, steps, input_shape)?);
        self.frame_counter = 0;
        Ok(())
    }

    fn fitted(&self) -> Result<&Fitted, ScrambleError> {
        self.fitted.as_ref().ok_or(ScrambleError::FitRequired)
    }

    /// Scramble one frame and return its carrier.
    ///
    /// Advances the frame counter; the returned carrier holds the
    /// recovery payload when the new counter value is a multiple of the
    /// embed interval.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::FitRequired`] before [`fit`](Self::fit)
    /// and [`ScrambleError::ShapeMismatch`] if `frame` does not have the
    /// fitted input shape. The counter does not advance on error.
    pub fn transform(&mut self, frame: &Frame) -> Result<Frame, ScrambleError> {
        let fitted = self.fitted()?;
        let expected = fitted.state().input_shape;
        if frame.shape() != expected {
            return Err(ScrambleError::ShapeMismatch {
                expected,
                actual: frame.shape(),
            });
        }

        let mut current = frame.clone();
        for step in &fitted.steps {
            current = step.forward(&current)?;
        }

        let counter = self.frame_counter + 1;
        let embed = counter % self.spec.embed.interval == 0;
        let band = if embed { &fitted.band } else { &fitted.blank };
        let carrier = Frame::stack_vertical(band, &current)?;
        if embed {
            debug!(frame = counter, "embedded recovery payload");
        }
        self.frame_counter = counter;
        Ok(carrier)
    }

    /// Restore the original frame from a carrier.
    ///
    /// Uses the retained fitted state only; the band content and the
    /// frame counter are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::FitRequired`] before [`fit`](Self::fit)
    /// and [`ScrambleError::ShapeMismatch`] if `carrier` does not have the
    /// fitted carrier shape.
    pub fn inverse_transform(&self, carrier: &Frame) -> Result<Frame, ScrambleError> {
        let fitted = self.fitted()?;
        let expected = fitted.state().carrier_shape;
        if carrier.shape() != expected {
            return Err(ScrambleError::ShapeMismatch {
                expected,
                actual: carrier.shape(),
            });
        }

        let (_, mut current) = carrier.split_rows(fitted.layout.height())?;
        for step in fitted.steps.iter().rev() {
            current = step.inverse(&current)?;
        }
        Ok(current)
    }

    /// Rebuild a fitted pipeline from a descriptor.
    ///
    /// Steps with recorded tables are restored from them after
    /// validation; without `steps_state` every step is recalibrated from
    /// the recorded input shape.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Configuration`] if the recorded input shape
    /// is out of range, the tables are invalid, or the recorded shapes
    /// disagree with the steps.
    pub fn from_descriptor(descriptor: PipelineDescriptor) -> Result<Self, ScrambleError> {
        let PipelineDescriptor {
            spec,
            state,
            steps_state,
        } = descriptor;
        spec.validate()?;
        check_frame_shape("input", state.input_shape)?;
        let mut shape = state.input_shape;
        let mut steps = Vec::with_capacity(spec.steps.len());
        for (i, config) in spec.steps.iter().enumerate() {
            let step = match steps_state.as_ref().and_then(|states| states.get(i)) {
                Some(recorded) => Step::from_parts(config.clone(), recorded.clone(), shape)?,
                None => Step::calibrate(config.clone(), shape)?,
            };
            shape = step.output_shape();
            steps.push(step);
        }

        let fitted = Fitted::assemble(&spec, steps, state.input_shape)?;
        if fitted.state().output_shape != state.output_shape
            || fitted.state().carrier_shape != state.carrier_shape
        {
            return Err(ScrambleError::Configuration(format!(
                "descriptor records output {} and carrier {}, steps produce {} and {}",
                state.output_shape,
                state.carrier_shape,
                fitted.state().output_shape,
                fitted.state().carrier_shape
            )));
        }
        Ok(Self {
            spec,
            fitted: Some(fitted),
            frame_counter: state.frame_counter,
        })
    }

    /// Parse a descriptor document into a fitted pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Serialization`] for a malformed document
    /// and [`ScrambleError::Configuration`] for inconsistent content.
    pub fn from_json(text: &str) -> Result<Self, ScrambleError> {
        Self::from_descriptor(PipelineDescriptor::from_json(text)?)
    }

    /// Rebuild the pipeline that produced `carrier` from its embedded
    /// payload.
    ///
    /// The carrier may have been rescaled or recompressed; pass it
    /// through [`normalize_carrier`](Self::normalize_carrier) on the
    /// recovered pipeline before inverting.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::PayloadNotFound`] or
    /// [`ScrambleError::PayloadCorrupted`] from extraction, and
    /// descriptor errors as for [`from_json`](Self::from_json).
    pub fn recover(carrier: &Frame) -> Result<Self, ScrambleError> {
        let payload = codec::extract(carrier)?;
        Self::from_descriptor(PipelineDescriptor::from_payload(&payload)?)
    }

    /// The descriptor for the current state, including fitted tables.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::FitRequired`] before [`fit`](Self::fit).
    pub fn descriptor(&self) -> Result<PipelineDescriptor, ScrambleError> {
        let mut descriptor = self.fitted()?.descriptor.clone();
        descriptor.state.frame_counter = self.frame_counter;
        Ok(descriptor)
    }

    /// Serialize spec, shapes, frame counter and fitted tables.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::FitRequired`] before [`fit`](Self::fit).
    pub fn to_json(&self) -> Result<String, ScrambleError> {
        self.descriptor()?.to_json()
    }

    /// A carrier-shaped debug image of the embedded descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::FitRequired`] before [`fit`](Self::fit).
    pub fn to_json_image(&self) -> Result<Frame, ScrambleError> {
        self.fitted()?.descriptor.render()
    }

    /// Resize a rescaled carrier back to the fitted carrier shape.
    ///
    /// The result can be inverted, but only approximates the original
    /// frame.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::FitRequired`] before [`fit`](Self::fit)
    /// and resampling errors from [`resample`].
    pub fn normalize_carrier(&self, frame: &Frame) -> Result<Frame, ScrambleError> {
        let target = self.fitted()?.state().carrier_shape;
        let (normalized, applied) = resample(frame, target, ResampleFilter::Triangle)?;
        if applied {
            debug!(from = %frame.shape(), to = %target, "normalized carrier");
        }
        Ok(normalized)
    }

    /// Number of frames transformed since the last fit or reset.
    #[must_use]
    pub const fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Restart the embed cadence.
    pub const fn reset_frame_counter(&mut self) {
        self.frame_counter = 0;
    }

    /// Frames between embedded payloads.
    #[must_use]
    pub const fn embed_interval(&self) -> u64 {
        self.spec.embed.interval
    }

    /// Change the embed cadence. A fitted pipeline re-renders its band so
    /// the embedded descriptor records the new interval.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Configuration`] if `interval` is zero.
    pub fn set_embed_interval(&mut self, interval: u64) -> Result<(), ScrambleError> {
        if interval == 0 {
            return Err(ScrambleError::Configuration(
                "data_embed_interval must be at least 1".to_owned(),
            ));
        }
        let mut spec = self.spec.clone();
        spec.embed.interval = interval;
        if let Some(fitted) = &self.fitted {
            let input_shape = fitted.state().input_shape;
            self.fitted = Some(Fitted::assemble(&spec, fitted.steps.clone(), input_shape)?);
        }
        self.spec = spec;
        Ok(())
    }

    /// Whether [`fit`](Self::fit) has completed.
    #[must_use]
    pub const fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// The pipeline description.
    #[must_use]
    pub const fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    /// Calibrated steps, empty before fitting.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        self.fitted
            .as_ref()
            .map(|f| f.steps.as_slice())
            .unwrap_or_default()
    }

    /// Shape `transform` accepts.
    #[must_use]
    pub fn input_shape(&self) -> Option<Shape> {
        self.fitted.as_ref().map(|f| f.state().input_shape)
    }

    /// Shape `transform` returns.
    #[must_use]
    pub fn carrier_shape(&self) -> Option<Shape> {
        self.fitted.as_ref().map(|f| f.state().carrier_shape)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::EmbedStatus;
    use crate::step::StepConfig;

    fn spec(interval: u64) -> PipelineSpec {
        PipelineSpec::builder()
            .block_size(8)
            .num_rows(8)
            .interval(interval)
            .step(StepConfig::Transpose)
            .step(StepConfig::RowGroupPermute {
                row_group_size: 8,
                random_seed: 0,
            })
            .step(StepConfig::AxisShift { sx: 37, sy: 11 })
            .build()
            .unwrap()
    }

    fn frame(seed: usize) -> Frame {
        Frame::from_fn(Shape::new(512, 384, 3), |y, x, c| {
            u8::try_from((y * 7 + x * 13 + c * 71 + seed * 5) % 256).unwrap()
        })
    }

    fn fitted(interval: u64) -> Pipeline {
        let mut p = Pipeline::new(spec(interval));
        p.fit(&frame(0)).unwrap();
        p
    }

    #[test]
    fn transform_requires_fit() {
        let mut p = Pipeline::new(spec(1));
        assert!(!p.is_fitted());
        assert!(matches!(p.transform(&frame(0)), Err(ScrambleError::FitRequired)));
        assert!(matches!(p.inverse_transform(&frame(0)), Err(ScrambleError::FitRequired)));
        assert!(matches!(p.to_json(), Err(ScrambleError::FitRequired)));
        assert_eq!(p.frame_counter(), 0);
    }

    #[test]
    fn shapes_are_threaded_through_transpose() {
        let p = fitted(1);
        assert_eq!(p.input_shape(), Some(Shape::new(512, 384, 3)));
        // transposed to 384 x 512, plus a 64-row band
        assert_eq!(p.carrier_shape(), Some(Shape::new(448, 512, 3)));
        assert_eq!(p.steps().len(), 3);
        assert_eq!(p.steps()[1].input_shape(), Shape::new(384, 512, 3));
    }

    #[test]
    fn round_trip_is_exact() {
        let mut p = fitted(2);
        for seed in 0..4 {
            let f = frame(seed);
            let carrier = p.transform(&f).unwrap();
            assert_ne!(carrier.row(100), f.row(100));
            assert_eq!(p.inverse_transform(&carrier).unwrap(), f);
        }
    }

    #[test]
    fn shape_mismatch_leaves_counter_alone() {
        let mut p = fitted(1);
        let wrong = Frame::filled(Shape::new(384, 512, 3), 0);
        assert!(matches!(p.transform(&wrong), Err(ScrambleError::ShapeMismatch { .. })));
        assert_eq!(p.frame_counter(), 0);
        assert!(matches!(
            p.inverse_transform(&frame(0)),
            Err(ScrambleError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn counter_drives_embedding() {
        use EmbedStatus::{Absent, Found};

        let mut p = fitted(3);
        let statuses: Vec<EmbedStatus> = (0..6)
            .map(|_| codec::classify(&p.transform(&frame(1)).unwrap()))
            .collect();
        assert_eq!(statuses, vec![Absent, Absent, Found, Absent, Absent, Found]);
        assert_eq!(p.frame_counter(), 6);

        p.reset_frame_counter();
        assert_eq!(p.frame_counter(), 0);
    }

    #[test]
    fn refit_resets_counter() {
        let mut p = fitted(1);
        p.transform(&frame(0)).unwrap();
        p.fit(&frame(0)).unwrap();
        assert_eq!(p.frame_counter(), 0);
    }

    #[test]
    fn failed_refit_keeps_previous_state() {
        let mut p = fitted(1);
        let carrier_shape = p.carrier_shape();
        // Transposed height 380 is not a multiple of the group size 8.
        let indivisible = Frame::filled(Shape::new(512, 380, 3), 0);
        assert!(matches!(p.fit(&indivisible), Err(ScrambleError::Configuration(_))));
        assert_eq!(p.carrier_shape(), carrier_shape);
        // Transposed width 100 cannot hold the band header.
        let narrow = Frame::filled(Shape::new(100, 384, 3), 0);
        assert!(matches!(p.fit(&narrow), Err(ScrambleError::Configuration(_))));
        assert_eq!(p.carrier_shape(), carrier_shape);
    }

    #[test]
    fn set_embed_interval_updates_payload() {
        let mut p = fitted(1);
        assert!(p.set_embed_interval(0).is_err());
        p.set_embed_interval(4).unwrap();
        assert_eq!(p.embed_interval(), 4);
        let json = p.to_json().unwrap();
        assert!(json.contains("\"data_embed_interval\": 4"));
        let recovered = Pipeline::recover(&p.to_json_image().unwrap()).unwrap();
        assert_eq!(recovered.embed_interval(), 4);
    }

    #[test]
    fn json_round_trip_preserves_behavior_and_counter() {
        let mut p = fitted(2);
        p.transform(&frame(0)).unwrap();
        let mut q = Pipeline::from_json(&p.to_json().unwrap()).unwrap();
        assert_eq!(q.frame_counter(), 1);
        let f = frame(3);
        let a = p.transform(&f).unwrap();
        let b = q.transform(&f).unwrap();
        assert_eq!(a, b);
        assert_eq!(q.inverse_transform(&a).unwrap(), f);
    }

    #[test]
    fn tampered_tables_are_rejected() {
        let p = fitted(1);
        let json = p.to_json().unwrap();
        let mut doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        doc["steps_state"][1]["forward"][0] = serde_json::json!(9999);
        assert!(matches!(
            Pipeline::from_json(&doc.to_string()),
            Err(ScrambleError::Configuration(_))
        ));
    }

    #[test]
    fn recover_from_carrier() {
        let mut p = fitted(1);
        let f = frame(2);
        let carrier = p.transform(&f).unwrap();
        let q = Pipeline::recover(&carrier).unwrap();
        assert!(q.is_fitted());
        assert_eq!(q.steps(), p.steps());
        assert_eq!(q.inverse_transform(&carrier).unwrap(), f);
    }

    #[test]
    fn recover_without_payload_is_not_found() {
        let mut p = fitted(2);
        let carrier = p.transform(&frame(0)).unwrap();
        assert!(matches!(Pipeline::recover(&carrier), Err(ScrambleError::PayloadNotFound)));
    }

    #[test]
    fn to_json_image_has_carrier_shape() {
        let p = fitted(1);
        let image = p.to_json_image().unwrap();
        assert_eq!(Some(image.shape()), p.carrier_shape());
        assert_eq!(codec::classify(&image), EmbedStatus::Found);
    }

    #[test]
    fn normalize_carrier_restores_shape() {
        let p = fitted(1);
        let stretched = Frame::filled(Shape::new(448, 614, 3), 10);
        let normalized = p.normalize_carrier(&stretched).unwrap();
        assert_eq!(Some(normalized.shape()), p.carrier_shape());
        assert!(p.inverse_transform(&normalized).is_ok());
    }

    #[test]
    fn pipeline_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pipeline>();
    }

    #[test]
    fn untrusted_input_shape_is_bounded() {
        let mut doc: serde_json::Value = serde_json::from_str(&fitted(1).to_json().unwrap()).unwrap();
        doc.as_object_mut().unwrap().remove("steps_state");
        for (field, value) in [("height", 1u64 << 62), ("width", 0), ("channels", 9)] {
            let mut tampered = doc.clone();
            tampered["state"]["input_shape"][field] = value.into();
            let text = tampered.to_string();
            assert!(
                matches!(Pipeline::from_json(&text), Err(ScrambleError::Configuration(_))),
                "{field} = {value}"
            );
        }
    }

    #[test]
    fn degenerate_reference_frames_are_rejected() {
        for shape in [Shape::new(0, 384, 3), Shape::new(512, 384, 0), Shape::new(70_000, 8, 1)] {
            let mut p = Pipeline::new(spec(1));
            assert!(matches!(
                p.fit(&Frame::filled(shape, 0)),
                Err(ScrambleError::Configuration(_))
            ));
            assert!(!p.is_fitted());
        }
    }
}
