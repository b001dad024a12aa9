//! Recovery band codec: hide a byte payload in the top rows of a carrier
//! frame and read it back after mild rescaling or recompression.
//!
//! # Band layout
//!
//! The band is `num_rows * block_size` pixel rows tall and spans the full
//! carrier width. It is divided into block rows of `block_size` pixels:
//!
//! ```text
//! block row 0        header: HEADER_CELLS equal cells across the width,
//!                    2 bits per cell, identical on every channel
//! block rows 1..     data: floor(W / block_size) square blocks per row,
//!                    2 bits per block per channel
//! ```
//!
//! Symbols are Gray-coded onto four sample levels spaced 64 apart, so a
//! one-level error flips a single bit.
//!
//! # Header (16 bytes)
//!
//! ```text
//! [0]      magic 0xC5
//! [1]      version
//! [2]      block_size
//! [3]      num_rows
//! [4]      channels
//! [5]      repetition factor r
//! [6..8]   carrier width  (BE u16)
//! [8..10]  carrier height (BE u16)
//! [10..12] body length    (BE u16)
//! [12..16] CRC-32 of bytes 0..12 (BE)
//! ```
//!
//! # Body
//!
//! `[CRC-32 of compressed (BE u32)][brotli(payload)]`, repeated `r` times
//! back to back across the data symbols and majority-voted on extraction.
//!
//! # Locating the band
//!
//! Extraction never assumes pixel-exact coordinates. Header cells are
//! sampled at positions proportional to the received width, the header is
//! searched for row by row from the top, and data blocks are sampled at
//! positions scaled by `received / recorded` carrier size. Only the inner
//! half of every cell and block is averaged, so edge blur from resampling
//! or block-transform compression does not reach the decision.

use std::io::{Read, Write};

use tracing::{debug, trace, warn};

use crate::frame::Frame;
use crate::spec::EmbedConfig;
use crate::types::{ScrambleError, Shape};

/// Number of header cells across the band width.
pub const HEADER_CELLS: usize = 64;

/// Header size in bytes (`HEADER_CELLS * 2 / 8`).
pub const HEADER_LEN: usize = HEADER_CELLS / 4;

const MAGIC: u8 = 0xC5;
const VERSION: u8 = 1;

/// Sample levels for the four Gray-coded symbol values.
pub const LEVELS: [u8; 4] = [32, 96, 160, 224];

/// Sample value of the band on frames without a payload.
pub const BLANK: u8 = 255;

/// Rows from the top searched for a header.
const SEARCH_ROWS: usize = 64;

const BROTLI_QUALITY: u32 = 11;
const BROTLI_LG_WINDOW_SIZE: u32 = 22;
const MAX_DECOMPRESSED: u64 = 1 << 20;

/// Result of inspecting a frame for an embedded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedStatus {
    /// A payload was found and validated.
    Found,
    /// No header was located.
    Absent,
    /// A header was located but the body failed validation.
    Corrupted,
}

/// Band geometry for one carrier shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandLayout {
    block_size: usize,
    num_rows: usize,
    width: usize,
    channels: usize,
}

impl BandLayout {
    /// Geometry for a carrier of shape `carrier` under `embed`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrambleError::Configuration`] if the carrier is too
    /// narrow for the header, a dimension does not fit in the header's
    /// 16-bit fields, or the embed parameters are out of range.
    pub fn new(embed: &EmbedConfig, carrier: Shape) -> Result<Self, ScrambleError> {
        embed.validate()?;
        if carrier.width < 2 * HEADER_CELLS {
            return Err(ScrambleError::Configuration(format!(
                "carrier width {} is below the minimum of {} for the embed header",
                carrier.width,
                2 * HEADER_CELLS
            )));
        }
        if carrier.width < embed.block_size {
            return Err(ScrambleError::Configuration(format!(
                "carrier width {} cannot hold a {}-pixel data block",
                carrier.width, embed.block_size
            )));
        }
        if u16::try_from(carrier.width).is_err() || u16::try_from(carrier.height).is_err() {
            return Err(ScrambleError::Configuration(format!(
                "carrier {carrier} exceeds the embed header's 65535-pixel limit"
            )));
        }
        if carrier.channels == 0 || u8::try_from(carrier.channels).is_err() {
            return Err(ScrambleError::Configuration(format!(
                "carrier channel count {} is not supported",
                carrier.channels
            )));
        }
        Ok(Self {
            block_size: embed.block_size,
            num_rows: embed.num_rows,
            width: carrier.width,
            channels: carrier.channels,
        })
    }

    /// Band height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.block_size * self.num_rows
    }

    /// Shape of the band region.
    #[must_use]
    pub const fn shape(&self) -> Shape {
        Shape::new(self.height(), self.width, self.channels)
    }

    /// Data blocks in one block row.
    #[must_use]
    pub const fn blocks_per_row(&self) -> usize {
        self.width / self.block_size
    }

    /// Payload bits one copy of the band can carry.
    #[must_use]
    pub const fn capacity_bits(&self) -> usize {
        (self.num_rows - 1) * self.blocks_per_row() * self.channels * 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    block_size: u8,
    num_rows: u8,
    channels: u8,
    repetition: u8,
    width: u16,
    height: u16,
    body_len: u16,
}

impl Header {
    fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = MAGIC;
        out[1] = VERSION;
        out[2] = self.block_size;
        out[3] = self.num_rows;
        out[4] = self.channels;
        out[5] = self.repetition;
        out[6..8].copy_from_slice(&self.width.to_be_bytes());
        out[8..10].copy_from_slice(&self.height.to_be_bytes());
        out[10..12].copy_from_slice(&self.body_len.to_be_bytes());
        let crc = crc32fast::hash(&out[..12]);
        out[12..].copy_from_slice(&crc.to_be_bytes());
        out
    }

    fn parse(bytes: &[u8; HEADER_LEN]) -> Option<Self> {
        if bytes[0] != MAGIC || bytes[1] != VERSION {
            return None;
        }
        let stored = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        if crc32fast::hash(&bytes[..12]) != stored {
            trace!("header candidate failed checksum");
            return None;
        }
        let header = Self {
            block_size: bytes[2],
            num_rows: bytes[3],
            channels: bytes[4],
            repetition: bytes[5],
            width: u16::from_be_bytes([bytes[6], bytes[7]]),
            height: u16::from_be_bytes([bytes[8], bytes[9]]),
            body_len: u16::from_be_bytes([bytes[10], bytes[11]]),
        };
        let sane = header.block_size >= 2
            && header.num_rows >= 2
            && header.channels >= 1
            && header.repetition >= 1
            && usize::from(header.width) >= 2 * HEADER_CELLS
            && header.height >= u16::from(header.block_size) * u16::from(header.num_rows);
        sane.then_some(header)
    }

    fn layout(self) -> BandLayout {
        BandLayout {
            block_size: usize::from(self.block_size),
            num_rows: usize::from(self.num_rows),
            width: usize::from(self.width),
            channels: usize::from(self.channels),
        }
    }
}

const fn gray_encode(symbol: u8) -> u8 {
    symbol ^ (symbol >> 1)
}

const fn gray_decode(code: u8) -> u8 {
    code ^ (code >> 1)
}

const fn level_of(symbol: u8) -> u8 {
    LEVELS[gray_encode(symbol & 0b11) as usize]
}

/// Nearest level index for a sample mean.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn nearest_level(value: f64) -> u8 {
    (value / 64.0).floor().clamp(0.0, 3.0) as u8
}

/// Soft bit decisions for one symbol: positive favors 0.
///
/// The high bit splits the levels at 128; the low bit is 1 for the two
/// inner levels.
fn soft_bits(value: f64) -> [f64; 2] {
    [128.0 - value, (value - 128.0).abs() - 64.0]
}

fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|&b| (0..8).rev().map(move |i| (b >> i) & 1 == 1))
        .collect()
}

fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | u8::from(bit)))
        .collect()
}

/// Repetition factor for `bit_count` payload bits in `capacity` slots.
///
/// Odd where possible so majority votes never tie; capped at 255.
#[must_use]
pub fn compute_repetition(bit_count: usize, capacity: usize) -> usize {
    if bit_count == 0 {
        return 1;
    }
    let r = (capacity / bit_count).min(255);
    if r >= 3 {
        let odd = r | 1;
        if odd <= 255 && odd * bit_count <= capacity {
            odd
        } else {
            r - 1
        }
    } else {
        1
    }
}

fn compress(payload: &[u8]) -> Result<Vec<u8>, ScrambleError> {
    let mut output = Vec::new();
    {
        let mut compressor =
            brotli::CompressorWriter::new(&mut output, 4096, BROTLI_QUALITY, BROTLI_LG_WINDOW_SIZE);
        compressor
            .write_all(payload)
            .map_err(|e| ScrambleError::Configuration(format!("payload compression failed: {e}")))?;
    }
    Ok(output)
}

fn decompress(data: &[u8]) -> Result<Vec<u8>, ScrambleError> {
    let mut output = Vec::new();
    brotli::Decompressor::new(data, 4096)
        .take(MAX_DECOMPRESSED)
        .read_to_end(&mut output)
        .map_err(|e| ScrambleError::PayloadCorrupted(format!("decompression failed: {e}")))?;
    Ok(output)
}

/// Fill pixels `x0..x1` of rows `y0..y1` with `value`, on one channel or all.
fn fill_rect(
    band: &mut Frame,
    (x0, x1): (usize, usize),
    (y0, y1): (usize, usize),
    channel: Option<usize>,
    value: u8,
) {
    let c = band.channels();
    let row_len = band.shape().row_len();
    let data = band.data_mut();
    for y in y0..y1 {
        for x in x0..x1 {
            let px = y * row_len + x * c;
            match channel {
                Some(ch) => data[px + ch] = value,
                None => data[px..px + c].fill(value),
            }
        }
    }
}

/// A white band: what non-embed frames carry.
#[must_use]
pub fn blank_band(layout: &BandLayout) -> Frame {
    Frame::filled(layout.shape(), BLANK)
}

/// Render the band carrying `payload` for a carrier of height
/// `carrier_height`.
///
/// # Errors
///
/// Returns [`ScrambleError::Configuration`] if the compressed payload
/// does not fit one copy into the band.
pub fn render_band(
    layout: &BandLayout,
    carrier_height: usize,
    payload: &[u8],
) -> Result<Frame, ScrambleError> {
    let compressed = compress(payload)?;
    let mut body = Vec::with_capacity(4 + compressed.len());
    body.extend_from_slice(&crc32fast::hash(&compressed).to_be_bytes());
    body.extend_from_slice(&compressed);

    let body_bits = bytes_to_bits(&body);
    let capacity = layout.capacity_bits();
    if body_bits.len() > capacity {
        return Err(ScrambleError::Configuration(format!(
            "payload needs {} bits but the band holds {capacity}; increase data_embed_num_rows",
            body_bits.len()
        )));
    }
    let repetition = compute_repetition(body_bits.len(), capacity);

    let too_big =
        |what: &str| ScrambleError::Configuration(format!("{what} does not fit the embed header"));
    let header = Header {
        block_size: u8::try_from(layout.block_size).map_err(|_| too_big("block size"))?,
        num_rows: u8::try_from(layout.num_rows).map_err(|_| too_big("row count"))?,
        channels: u8::try_from(layout.channels).map_err(|_| too_big("channel count"))?,
        repetition: u8::try_from(repetition).map_err(|_| too_big("repetition factor"))?,
        width: u16::try_from(layout.width).map_err(|_| too_big("carrier width"))?,
        height: u16::try_from(carrier_height).map_err(|_| too_big("carrier height"))?,
        body_len: u16::try_from(body.len()).map_err(|_| too_big("payload"))?,
    };
    debug!(
        payload = payload.len(),
        compressed = compressed.len(),
        capacity_bits = capacity,
        repetition,
        "rendering embed band"
    );

    let mut band = blank_band(layout);
    let bs = layout.block_size;
    let w = layout.width;

    let header_bits = bytes_to_bits(&header.to_bytes());
    for (cell, pair) in header_bits.chunks(2).enumerate() {
        let symbol = (u8::from(pair[0]) << 1) | u8::from(pair[1]);
        let span = (cell * w / HEADER_CELLS, (cell + 1) * w / HEADER_CELLS);
        fill_rect(&mut band, span, (0, bs), None, level_of(symbol));
    }

    let mut stream = Vec::with_capacity(capacity);
    for _ in 0..repetition {
        stream.extend_from_slice(&body_bits);
    }
    stream.resize(capacity, false);

    let per_row = layout.blocks_per_row();
    let c = layout.channels;
    for (i, pair) in stream.chunks(2).enumerate() {
        let symbol = (u8::from(pair[0]) << 1) | u8::from(pair[1]);
        let block = i / c;
        let (row, col) = (1 + block / per_row, block % per_row);
        fill_rect(
            &mut band,
            (col * bs, (col + 1) * bs),
            (row * bs, (row + 1) * bs),
            Some(i % c),
            level_of(symbol),
        );
    }
    Ok(band)
}

/// Overwrite the band region of `carrier` with `payload`.
///
/// # Errors
///
/// Returns [`ScrambleError::Configuration`] if the carrier geometry cannot
/// hold the header or the payload does not fit.
pub fn encode(
    carrier: &Frame,
    payload: &[u8],
    embed: &EmbedConfig,
) -> Result<Frame, ScrambleError> {
    let layout = BandLayout::new(embed, carrier.shape())?;
    if carrier.height() <= layout.height() {
        return Err(ScrambleError::Configuration(format!(
            "carrier height {} leaves no room below a {}-row band",
            carrier.height(),
            layout.height()
        )));
    }
    let band = render_band(&layout, carrier.height(), payload)?;
    let mut out = carrier.clone();
    out.paste_rows(0, &band);
    Ok(out)
}

/// Pixel range covering the inner half of `start..start + len`, clamped to `limit`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn inner_span(start: f64, len: f64, limit: usize) -> (usize, usize) {
    let a = ((start + len * 0.25).floor().max(0.0) as usize).min(limit.saturating_sub(1));
    let b = ((start + len * 0.75).ceil() as usize).clamp(a + 1, limit);
    (a, b)
}

#[allow(clippy::cast_precision_loss)]
fn region_mean(
    frame: &Frame,
    xs: (usize, usize),
    ys: (usize, usize),
    channel: Option<usize>,
) -> f64 {
    let mut sum = 0u64;
    let mut count = 0u64;
    for y in ys.0..ys.1 {
        for x in xs.0..xs.1 {
            let px = frame.pixel(y, x);
            match channel {
                Some(ch) => {
                    sum += u64::from(px[ch]);
                    count += 1;
                }
                None => {
                    sum += px.iter().map(|&v| u64::from(v)).sum::<u64>();
                    count += px.len() as u64;
                }
            }
        }
    }
    if count == 0 {
        return f64::from(BLANK);
    }
    sum as f64 / count as f64
}

#[allow(clippy::cast_precision_loss)]
fn read_header_at(frame: &Frame, y: usize) -> Option<Header> {
    let cell = frame.width() as f64 / HEADER_CELLS as f64;
    let mut bits = Vec::with_capacity(HEADER_CELLS * 2);
    for i in 0..HEADER_CELLS {
        let xs = inner_span(i as f64 * cell, cell, frame.width());
        let code = nearest_level(region_mean(frame, xs, (y, y + 1), None));
        let symbol = gray_decode(code);
        bits.push(symbol & 0b10 != 0);
        bits.push(symbol & 0b01 != 0);
    }
    let bytes: [u8; HEADER_LEN] = bits_to_bytes(&bits).try_into().ok()?;
    Header::parse(&bytes)
}

fn find_header(frame: &Frame) -> Option<(usize, Header)> {
    // Each header cell needs at least one pixel column.
    if frame.width() < HEADER_CELLS || frame.height() == 0 {
        return None;
    }
    (0..frame.height().min(SEARCH_ROWS)).find_map(|y| read_header_at(frame, y).map(|h| (y, h)))
}

#[allow(clippy::cast_precision_loss)]
fn read_body(frame: &Frame, header: Header) -> Result<Vec<u8>, ScrambleError> {
    let layout = header.layout();
    if frame.channels() != layout.channels {
        return Err(ScrambleError::PayloadCorrupted(format!(
            "band was written with {} channels, frame has {}",
            layout.channels,
            frame.channels()
        )));
    }
    let body_bits = usize::from(header.body_len) * 8;
    let repetition = usize::from(header.repetition);
    let capacity = layout.capacity_bits();
    if header.body_len <= 4 || body_bits * repetition > capacity {
        return Err(ScrambleError::PayloadCorrupted(format!(
            "header declares {body_bits} bits x{repetition}, band holds {capacity}"
        )));
    }

    let sx = frame.width() as f64 / f64::from(header.width);
    let sy = frame.height() as f64 / f64::from(header.height);
    let bs = layout.block_size as f64;
    let per_row = layout.blocks_per_row();
    let c = layout.channels;

    let used_symbols = (body_bits * repetition).div_ceil(2);
    let mut soft = Vec::with_capacity(used_symbols * 2);
    for i in 0..used_symbols {
        let block = i / c;
        let (row, col) = (1 + block / per_row, block % per_row);
        let xs = inner_span(col as f64 * bs * sx, bs * sx, frame.width());
        let ys = inner_span(row as f64 * bs * sy, bs * sy, frame.height());
        soft.extend_from_slice(&soft_bits(region_mean(frame, xs, ys, Some(i % c))));
    }

    let voted: Vec<bool> = (0..body_bits)
        .map(|i| (0..repetition).map(|copy| soft[copy * body_bits + i]).sum::<f64>() < 0.0)
        .collect();
    let body = bits_to_bytes(&voted);

    let (crc, compressed) = body.split_at(4);
    let stored = u32::from_be_bytes([crc[0], crc[1], crc[2], crc[3]]);
    if crc32fast::hash(compressed) != stored {
        warn!(repetition, "embedded payload failed checksum");
        return Err(ScrambleError::PayloadCorrupted("body checksum mismatch".to_owned()));
    }
    decompress(compressed)
}

/// Read the payload embedded in `frame`.
///
/// `frame` may be a rescaled or recompressed carrier; the band must still
/// be at the top.
///
/// # Errors
///
/// Returns [`ScrambleError::PayloadNotFound`] if no valid header is found,
/// and [`ScrambleError::PayloadCorrupted`] if a header is found but the
/// body fails validation.
pub fn extract(frame: &Frame) -> Result<Vec<u8>, ScrambleError> {
    let (y, header) = find_header(frame).ok_or(ScrambleError::PayloadNotFound)?;
    debug!(
        row = y,
        carrier_width = header.width,
        carrier_height = header.height,
        body_len = header.body_len,
        "found embed header"
    );
    read_body(frame, header)
}

/// Classify `frame` without returning the payload.
#[must_use]
pub fn classify(frame: &Frame) -> EmbedStatus {
    match extract(frame) {
        Ok(_) => EmbedStatus::Found,
        Err(ScrambleError::PayloadNotFound) => EmbedStatus::Absent,
        Err(_) => EmbedStatus::Corrupted,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn embed(block_size: usize, num_rows: usize) -> EmbedConfig {
        EmbedConfig {
            block_size,
            num_rows,
            interval: 1,
        }
    }

    fn noise_frame(shape: Shape) -> Frame {
        let mut state = 0x2545_f491u32;
        Frame::from_fn(shape, |_, _, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state.to_be_bytes()[0]
        })
    }

    const PAYLOAD: &[u8] = br#"{"steps":[{"name":"Transpose"}],"data_embed_block_size":8}"#;

    #[test]
    fn gray_code_round_trips() {
        for s in 0..4 {
            assert_eq!(gray_decode(gray_encode(s)), s);
        }
        // neighbouring levels differ in one bit
        for g in 0..3u8 {
            assert_eq!((gray_decode(g) ^ gray_decode(g + 1)).count_ones(), 1);
        }
    }

    #[test]
    fn soft_bits_agree_with_hard_decisions() {
        for s in 0..4u8 {
            let [hi, lo] = soft_bits(f64::from(level_of(s)));
            assert_eq!(hi < 0.0, s & 0b10 != 0, "symbol {s}");
            assert_eq!(lo < 0.0, s & 0b01 != 0, "symbol {s}");
            assert_eq!(gray_decode(nearest_level(f64::from(level_of(s)))), s);
        }
    }

    #[test]
    fn compute_repetition_is_odd_and_fits() {
        assert_eq!(compute_repetition(100, 1000), 9);
        assert_eq!(compute_repetition(100, 1100), 11);
        assert_eq!(compute_repetition(100, 250), 1);
        assert_eq!(compute_repetition(0, 10), 1);
        assert_eq!(compute_repetition(1, 10_000), 255);
        for bits in [8, 50, 333] {
            for cap in [400, 1000, 7777] {
                let r = compute_repetition(bits, cap);
                assert!(r == 1 || r % 2 == 1);
                assert!(bits > cap || r * bits <= cap);
            }
        }
    }

    #[test]
    fn header_round_trips_and_rejects_damage() {
        let h = Header {
            block_size: 8,
            num_rows: 4,
            channels: 3,
            repetition: 5,
            width: 640,
            height: 512,
            body_len: 99,
        };
        let mut bytes = h.to_bytes();
        assert_eq!(Header::parse(&bytes), Some(h));
        bytes[7] ^= 1;
        assert_eq!(Header::parse(&bytes), None);
    }

    #[test]
    fn layout_rejects_narrow_carriers() {
        assert!(BandLayout::new(&embed(8, 4), Shape::new(64, 127, 3)).is_err());
        let layout = BandLayout::new(&embed(8, 4), Shape::new(64, 256, 3)).unwrap();
        assert_eq!(layout.height(), 32);
        assert_eq!(layout.blocks_per_row(), 32);
        assert_eq!(layout.capacity_bits(), 3 * 32 * 3 * 2);
    }

    #[test]
    fn encode_then_extract() {
        let carrier = noise_frame(Shape::new(160, 256, 3));
        let out = encode(&carrier, PAYLOAD, &embed(8, 8)).unwrap();
        assert_eq!(out.shape(), carrier.shape());
        assert_eq!(out.row(100), carrier.row(100), "rows below the band are untouched");
        assert_eq!(extract(&out).unwrap(), PAYLOAD);
        assert_eq!(classify(&out), EmbedStatus::Found);
    }

    #[test]
    fn single_channel_carrier() {
        let carrier = noise_frame(Shape::new(200, 320, 1));
        let out = encode(&carrier, PAYLOAD, &embed(4, 16)).unwrap();
        assert_eq!(extract(&out).unwrap(), PAYLOAD);
    }

    #[test]
    fn payload_too_large_is_a_configuration_error() {
        let carrier = noise_frame(Shape::new(64, 128, 3));
        let big: Vec<u8> = noise_frame(Shape::new(64, 64, 1)).into_raw();
        assert!(matches!(
            encode(&carrier, &big, &embed(4, 2)),
            Err(ScrambleError::Configuration(_))
        ));
    }

    #[test]
    fn blank_band_is_absent() {
        let layout = BandLayout::new(&embed(8, 4), Shape::new(96, 256, 3)).unwrap();
        let mut frame = noise_frame(Shape::new(96, 256, 3));
        frame.paste_rows(0, &blank_band(&layout));
        assert_eq!(classify(&frame), EmbedStatus::Absent);
        assert!(matches!(extract(&frame), Err(ScrambleError::PayloadNotFound)));
    }

    #[test]
    fn damaged_body_is_corrupted() {
        let carrier = noise_frame(Shape::new(96, 256, 3));
        let mut out = encode(&carrier, PAYLOAD, &embed(8, 6)).unwrap();
        // Wipe every data row but keep the header row intact.
        let wipe = Frame::filled(Shape::new(40, 256, 3), 0);
        out.paste_rows(8, &wipe);
        assert_eq!(classify(&out), EmbedStatus::Corrupted);
    }

    #[test]
    fn header_is_found_below_a_shifted_top() {
        let carrier = noise_frame(Shape::new(160, 256, 3));
        let out = encode(&carrier, PAYLOAD, &embed(8, 8)).unwrap();
        // Dropping the first rows shifts the header; the search still
        // finds it, and data sampling uses the recorded geometry.
        let (_, lower) = out.split_rows(2).unwrap();
        assert_eq!(find_header(&lower).map(|(_, h)| h.width), Some(256));
    }

    #[test]
    fn degenerate_frames_hold_nothing() {
        for shape in [
            Shape::new(10, 0, 3),
            Shape::new(0, 640, 3),
            Shape::new(48, HEADER_CELLS - 1, 3),
        ] {
            let frame = Frame::filled(shape, 0);
            assert_eq!(classify(&frame), EmbedStatus::Absent);
            assert!(matches!(extract(&frame), Err(ScrambleError::PayloadNotFound)));
        }
    }
}
