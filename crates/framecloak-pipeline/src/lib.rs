//! framecloak-pipeline: Reversible frame scrambling (sans-IO).
//!
//! Obfuscates images or video frames through a chain of invertible
//! pixel-domain steps:
//! axis shift, row-group permutation, transpose, row mixing.
//!
//! A fitted [`Pipeline`] turns each frame into a *carrier*: the scrambled
//! image with a recovery band on top. Every `interval`-th carrier holds
//! the pipeline's own descriptor in that band, so a stream can be
//! descrambled without a side channel via [`Pipeline::recover`].
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! [`Frame`] buffers. File handling lives in the `framecloak` binary.
//!
//! The obfuscation is not encryption: anyone holding the descriptor, or
//! a carrier with an embedded payload, can undo it.

pub mod codec;
pub mod descriptor;
pub mod frame;
pub mod mix;
pub mod permute;
pub mod pipeline;
pub mod resample;
pub mod rng;
pub mod shift;
pub mod spec;
pub mod step;
pub mod transpose;
pub mod types;

pub use codec::{EmbedStatus, classify, extract};
pub use descriptor::{DescriptorState, PipelineDescriptor};
pub use frame::Frame;
pub use pipeline::Pipeline;
pub use resample::ResampleFilter;
pub use spec::{EmbedConfig, PipelineSpec, PipelineSpecBuilder};
pub use step::{Reversible, Step, StepConfig, StepState};
pub use types::{RgbImage, ScrambleError, Shape};
