//! Integration test: recover the pipeline from carriers, including
//! carriers that went through a scaler or a JPEG encoder.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use framecloak_pipeline::{
    EmbedStatus, Frame, Pipeline, PipelineDescriptor, PipelineSpec, Shape, StepConfig, classify,
    extract,
};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};

const INPUT: Shape = Shape::new(512, 384, 3);

fn spec(interval: u64) -> PipelineSpec {
    PipelineSpec::builder()
        .block_size(8)
        .num_rows(16)
        .interval(interval)
        .step(StepConfig::Transpose)
        .step(StepConfig::RowGroupPermute {
            row_group_size: 8,
            random_seed: 0,
        })
        .step(StepConfig::AxisShift { sx: 37, sy: 11 })
        .step(StepConfig::RowGroupPermute {
            row_group_size: 8,
            random_seed: 1,
        })
        .build()
        .unwrap()
}

fn frame(seed: usize) -> Frame {
    Frame::from_fn(INPUT, |y, x, c| {
        let v = (x * 3 + y * 5 + c * 50 + seed * 17) ^ (x * y / 64);
        u8::try_from(v % 256).unwrap()
    })
}

/// A fitted pipeline and the first carrier that holds a payload.
fn embedded_carrier() -> (Pipeline, Frame, Frame) {
    let mut pipeline = Pipeline::new(spec(1));
    let original = frame(0);
    pipeline.fit(&original).unwrap();
    let carrier = pipeline.transform(&original).unwrap();
    (pipeline, original, carrier)
}

#[test]
fn cadence_over_a_stream() {
    let mut pipeline = Pipeline::new(spec(60));
    pipeline.fit(&frame(0)).unwrap();

    let mut found = Vec::new();
    for n in 1..=180u64 {
        let carrier = pipeline.transform(&frame(usize::try_from(n % 7).unwrap())).unwrap();
        match classify(&carrier) {
            EmbedStatus::Found => found.push(n),
            EmbedStatus::Absent => {}
            EmbedStatus::Corrupted => panic!("frame {n} has a damaged payload"),
        }
    }
    assert_eq!(found, vec![60, 120, 180]);
    assert_eq!(pipeline.frame_counter(), 180);
}

#[test]
fn carrier_rebuilds_the_pipeline_without_a_side_channel() {
    let (pipeline, original, carrier) = embedded_carrier();

    let recovered = Pipeline::recover(&carrier).unwrap();
    assert_eq!(recovered.spec(), pipeline.spec());
    assert_eq!(recovered.carrier_shape(), pipeline.carrier_shape());
    assert_eq!(recovered.inverse_transform(&carrier).unwrap(), original);
}

#[test]
fn payload_survives_widening_by_a_fifth() {
    let (pipeline, _, carrier) = embedded_carrier();
    let expected = extract(&carrier).unwrap();

    let image = carrier.to_rgb_image().unwrap();
    let wider = imageops::resize(
        &image,
        image.width() * 6 / 5,
        image.height(),
        FilterType::Triangle,
    );
    let rescaled = Frame::from(wider);
    assert_ne!(rescaled.shape(), carrier.shape());

    assert_eq!(extract(&rescaled).unwrap(), expected);

    let recovered = Pipeline::recover(&rescaled).unwrap();
    let mut fitted = pipeline.descriptor().unwrap();
    fitted.state.frame_counter = 0;
    assert_eq!(recovered.descriptor().unwrap(), fitted);

    // Pixel-exact recovery is not expected, only a carrier of the right
    // shape to invert.
    let normalized = recovered.normalize_carrier(&rescaled).unwrap();
    assert_eq!(Some(normalized.shape()), recovered.carrier_shape());
    assert_eq!(recovered.inverse_transform(&normalized).unwrap().shape(), INPUT);
}

#[test]
fn payload_survives_scaling_both_axes() {
    let (_, _, carrier) = embedded_carrier();
    let expected = extract(&carrier).unwrap();

    let image = carrier.to_rgb_image().unwrap();
    let scaled = imageops::resize(
        &image,
        image.width() * 5 / 4,
        image.height() * 9 / 8,
        FilterType::CatmullRom,
    );
    assert_eq!(extract(&Frame::from(scaled)).unwrap(), expected);
}

#[test]
fn payload_survives_jpeg_recompression() {
    let (_, _, carrier) = embedded_carrier();
    let expected = extract(&carrier).unwrap();

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, 90)
        .encode_image(&carrier.to_rgb_image().unwrap())
        .unwrap();
    let decoded = Frame::from_dynamic(&image::load_from_memory(&encoded).unwrap());
    assert_eq!(decoded.shape(), carrier.shape());
    assert_ne!(decoded, carrier, "JPEG should not be lossless");

    assert_eq!(extract(&decoded).unwrap(), expected);
    let descriptor = PipelineDescriptor::from_payload(&expected).unwrap();
    assert_eq!(descriptor.state.input_shape, INPUT);
}

#[test]
fn plain_images_carry_nothing() {
    assert_eq!(classify(&frame(3)), EmbedStatus::Absent);
    assert_eq!(
        classify(&Frame::filled(Shape::new(300, 400, 3), 255)),
        EmbedStatus::Absent
    );
}

#[test]
fn debug_image_matches_embedded_payload() {
    let (pipeline, _, carrier) = embedded_carrier();
    let image = pipeline.to_json_image().unwrap();
    assert_eq!(Some(image.shape()), pipeline.carrier_shape());
    assert_eq!(extract(&image).unwrap(), extract(&carrier).unwrap());
}

#[test]
fn reference_pipeline_round_trips_a_720p_still() {
    let input = Shape::new(720, 1280, 3);
    let original = Frame::from_fn(input, |y, x, c| {
        u8::try_from((x * 7 + y * 3 + c * 80) % 256).unwrap()
    });

    let mut pipeline = Pipeline::new(PipelineSpec::reference());
    pipeline.fit(&original).unwrap();
    pipeline.set_embed_interval(1).unwrap();
    let carrier = pipeline.transform(&original).unwrap();
    assert_eq!(classify(&carrier), EmbedStatus::Found);

    let recovered = Pipeline::recover(&carrier).unwrap();
    assert_eq!(recovered.spec(), pipeline.spec());
    assert_eq!(recovered.carrier_shape(), Some(carrier.shape()));
    assert_eq!(recovered.inverse_transform(&carrier).unwrap(), original);
}
