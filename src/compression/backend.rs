
//! Interchangeable implementations of the numeric tile stages:
//! quantization, wavelet transform and color conversion.
//! A backend is chosen once per context.

use std::fmt::Debug;
use super::color::{self, PixelFormat};
use super::dwt::{self, Lifting};
use super::quantize::{self, Layout, QuantTable, LEGACY_LAYOUT, FRACTIONAL_BITS};


/// The numeric stages of the tile codec.
/// All backends must produce identical coefficients and pixels for any input.
pub trait TransformBackend: Debug + Send + Sync {

    /// A short name for logging.
    fn name(&self) -> &'static str;

    /// Multiply the coefficients by `2^shift`, truncating to 16 bits.
    fn dequantize_block(&self, coefficients: &mut [i16], shift: u32);

    /// Divide the coefficients by `2^shift`, rounding to nearest.
    fn quantize_block(&self, coefficients: &mut [i16], shift: u32);

    /// Inverse wavelet transform of the power of two layout.
    fn dwt_decode(&self, coefficients: &mut [i16], temp: &mut [i16]);

    /// Forward wavelet transform of the power of two layout.
    fn dwt_encode(&self, coefficients: &mut [i16], temp: &mut [i16]);

    /// Inverse wavelet transform of the extrapolated layout.
    fn dwt_decode_extrapolated(&self, coefficients: &mut [i16], temp: &mut [i16]) {
        dwt::decode_extrapolated(coefficients, temp)
    }

    /// Convert the planes of a tile to packed pixels.
    fn ycbcr_to_rgb(&self, y: &[i16], cb: &[i16], cr: &[i16], pixels: &mut [u8], format: PixelFormat) {
        color::ycbcr_to_rgb(y, cb, cr, pixels, format)
    }

    /// Convert red, green and blue planes to luma and chroma planes, in place.
    fn rgb_to_ycbcr(&self, red_to_y: &mut [i16], green_to_cb: &mut [i16], blue_to_cr: &mut [i16]) {
        color::rgb_to_ycbcr(red_to_y, green_to_cb, blue_to_cr)
    }

    /// Dequantize all subbands of one component.
    fn dequantize(&self, coefficients: &mut [i16], table: &QuantTable, layout: &Layout) {
        for subband in layout {
            let shift = quantize::decode_shift(table.0[subband.factor]);
            self.dequantize_block(&mut coefficients[subband.range()], shift);
        }
    }

    /// Quantize all subbands of one component, including the fractional bits of the color conversion.
    fn quantize(&self, coefficients: &mut [i16], table: &QuantTable) {
        for subband in &LEGACY_LAYOUT {
            let shift = quantize::encode_shift(table.0[subband.factor]);
            self.quantize_block(&mut coefficients[subband.range()], shift);
        }

        self.quantize_block(coefficients, FRACTIONAL_BITS);
    }
}


/// Which backend a context should use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendChoice {

    /// The chunked backend, which processes eight coefficients per step.
    Chunked,

    /// The scalar backend, which processes one coefficient per step.
    Scalar,
}

impl Default for BackendChoice {
    fn default() -> Self { BackendChoice::Chunked }
}

impl BackendChoice {

    /// Create the backend.
    pub fn select(self) -> Box<dyn TransformBackend> {
        match self {
            BackendChoice::Chunked => Box::new(ChunkedBackend),
            BackendChoice::Scalar => Box::new(ScalarBackend),
        }
    }
}


/// Processes one coefficient after another.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScalarBackend;

impl TransformBackend for ScalarBackend {
    fn name(&self) -> &'static str { "scalar" }

    fn dequantize_block(&self, coefficients: &mut [i16], shift: u32) {
        quantize::decode_block(coefficients, shift)
    }

    fn quantize_block(&self, coefficients: &mut [i16], shift: u32) {
        quantize::encode_block(coefficients, shift)
    }

    fn dwt_decode(&self, coefficients: &mut [i16], temp: &mut [i16]) {
        dwt::decode(coefficients, temp)
    }

    fn dwt_encode(&self, coefficients: &mut [i16], temp: &mut [i16]) {
        dwt::encode(coefficients, temp)
    }
}


/// Portable code that processes the coefficients in chunks of eight,
/// with the lifting steps written per chunk instead of per coefficient.
/// Produces exactly the same results as the scalar backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChunkedBackend;

const CHUNK_SIZE: usize = 8;

type Chunk = [i32; CHUNK_SIZE];

#[inline]
fn load(values: &[i16]) -> Chunk {
    let mut chunk = [0; CHUNK_SIZE];
    for (element, &value) in chunk.iter_mut().zip(&values[.. CHUNK_SIZE]) { *element = i32::from(value); }
    chunk
}

#[inline]
fn store(chunk: Chunk, values: &mut [i16]) {
    for (value, &element) in values[.. CHUNK_SIZE].iter_mut().zip(chunk.iter()) { *value = element as i16; }
}

#[inline]
fn gather(value: impl Fn(usize) -> i16) -> Chunk {
    let mut chunk = [0; CHUNK_SIZE];
    for (index, element) in chunk.iter_mut().enumerate() { *element = i32::from(value(index)); }
    chunk
}

#[inline]
fn map(a: Chunk, b: Chunk, operation: impl Fn(i32, i32) -> i32) -> Chunk {
    let mut chunk = [0; CHUNK_SIZE];
    for index in 0 .. CHUNK_SIZE { chunk[index] = operation(a[index], b[index]); }
    chunk
}

/// `low - ((previous + high + 1) >> 1)`
#[inline]
fn lift_even(low: Chunk, previous: Chunk, high: Chunk) -> Chunk {
    map(low, map(previous, high, |previous, high| (previous + high + 1) >> 1), |low, delta| low - delta)
}

/// `(high << 1) + ((even + next) >> 1)`
#[inline]
fn lift_odd(high: Chunk, even: Chunk, next: Chunk) -> Chunk {
    map(high, map(even, next, |even, next| (even + next) >> 1), |high, mean| (high << 1) + mean)
}

/// `(x1 - ((x0 + x2) >> 1)) >> 1`
#[inline]
fn predict_high(x0: Chunk, x1: Chunk, x2: Chunk) -> Chunk {
    map(x1, map(x0, x2, |x0, x2| (x0 + x2) >> 1), |x1, mean| (x1 - mean) >> 1)
}

/// `x0 + ((previous + high) >> 1)`
#[inline]
fn update_low(x0: Chunk, previous: Chunk, high: Chunk) -> Chunk {
    map(x0, map(previous, high, |previous, high| (previous + high) >> 1), |x0, mean| x0 + mean)
}

impl TransformBackend for ChunkedBackend {
    fn name(&self) -> &'static str { "chunked" }

    fn dequantize_block(&self, coefficients: &mut [i16], shift: u32) {
        if shift == 0 { return; }

        let mut chunks = coefficients.chunks_exact_mut(CHUNK_SIZE);
        for chunk in &mut chunks {
            let shifted = map(load(chunk), [0; CHUNK_SIZE], |value, _| value << shift);
            store(shifted, chunk);
        }

        quantize::decode_block(chunks.into_remainder(), shift);
    }

    fn quantize_block(&self, coefficients: &mut [i16], shift: u32) {
        if shift == 0 { return; }

        let half = [1 << (shift - 1); CHUNK_SIZE];
        let mut chunks = coefficients.chunks_exact_mut(CHUNK_SIZE);
        for chunk in &mut chunks {
            let rounded = map(load(chunk), half, |value, half| (value + half) >> shift);
            store(rounded, chunk);
        }

        quantize::encode_block(chunks.into_remainder(), shift);
    }

    fn dwt_decode(&self, coefficients: &mut [i16], temp: &mut [i16]) {
        dwt::decode_with::<ChunkedBackend>(coefficients, temp)
    }

    fn dwt_encode(&self, coefficients: &mut [i16], temp: &mut [i16]) {
        dwt::encode_with::<ChunkedBackend>(coefficients, temp)
    }
}

// all legacy subband widths are multiples of the chunk size
impl Lifting for ChunkedBackend {
    fn inverse_rows(low: &[i16], high: &[i16], out: &mut [i16], width: usize) {
        let rows = low.chunks_exact(width).zip(high.chunks_exact(width));

        for ((low, high), out) in rows.zip(out.chunks_exact_mut(2 * width)) {
            for start in (0 .. width).step_by(CHUNK_SIZE) {
                let previous = gather(|index| high[(start + index).saturating_sub(1)]);
                let even = lift_even(load(&low[start ..]), previous, load(&high[start ..]));
                for (index, &value) in even.iter().enumerate() { out[2 * (start + index)] = value as i16; }
            }

            for start in (0 .. width).step_by(CHUNK_SIZE) {
                let even = gather(|index| out[2 * (start + index)]);
                let next = gather(|index| {
                    let n = start + index;
                    if n + 1 < width { out[2 * n + 2] } else { out[2 * n] }
                });

                let odd = lift_odd(load(&high[start ..]), even, next);
                for (index, &value) in odd.iter().enumerate() { out[2 * (start + index) + 1] = value as i16; }
            }
        }
    }

    fn inverse_columns(low: &[i16], high: &[i16], out: &mut [i16], width: usize) {
        let total = 2 * width;

        for x in (0 .. total).step_by(CHUNK_SIZE) {
            for n in 0 .. width {
                let previous = load(&high[n.saturating_sub(1) * total + x ..]);
                let even = lift_even(load(&low[n * total + x ..]), previous, load(&high[n * total + x ..]));
                store(even, &mut out[2 * n * total + x ..]);
            }

            for n in 0 .. width {
                let even = load(&out[2 * n * total + x ..]);
                let next = if n + 1 < width { load(&out[(2 * n + 2) * total + x ..]) } else { even };
                let odd = lift_odd(load(&high[n * total + x ..]), even, next);
                store(odd, &mut out[(2 * n + 1) * total + x ..]);
            }
        }
    }

    fn forward_rows(input: &[i16], low: &mut [i16], high: &mut [i16], width: usize) {
        let rows = low.chunks_exact_mut(width).zip(high.chunks_exact_mut(width));

        for ((low, high), input) in rows.zip(input.chunks_exact(2 * width)) {
            for start in (0 .. width).step_by(CHUNK_SIZE) {
                let x0 = gather(|index| input[2 * (start + index)]);
                let x1 = gather(|index| input[2 * (start + index) + 1]);
                let x2 = gather(|index| {
                    let n = start + index;
                    if n + 1 < width { input[2 * n + 2] } else { input[2 * n] }
                });

                store(predict_high(x0, x1, x2), &mut high[start ..]);

                let previous = gather(|index| high[(start + index).saturating_sub(1)]);
                store(update_low(x0, previous, load(&high[start ..])), &mut low[start ..]);
            }
        }
    }

    fn forward_columns(input: &[i16], low: &mut [i16], high: &mut [i16], width: usize) {
        let total = 2 * width;

        for x in (0 .. total).step_by(CHUNK_SIZE) {
            for n in 0 .. width {
                let x0 = load(&input[2 * n * total + x ..]);
                let x1 = load(&input[(2 * n + 1) * total + x ..]);
                let x2 = if n + 1 < width { load(&input[(2 * n + 2) * total + x ..]) } else { x0 };

                store(predict_high(x0, x1, x2), &mut high[n * total + x ..]);

                let previous = load(&high[n.saturating_sub(1) * total + x ..]);
                let current = load(&high[n * total + x ..]);
                store(update_low(x0, previous, current), &mut low[n * total + x ..]);
            }
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::compression::dwt::{COEFFICIENT_COUNT, TEMP_SIZE};
    use crate::compression::quantize::EXTRAPOLATED_LAYOUT;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    fn random_coefficients(random: &mut StdRng, magnitude: i16) -> Vec<i16> {
        (0 .. COEFFICIENT_COUNT).map(|_| random.random_range(-magnitude ..= magnitude)).collect()
    }

    fn random_table(random: &mut StdRng) -> QuantTable {
        let mut table = [0_u8; 10];
        for factor in &mut table { *factor = random.random_range(0 ..= 15); }
        QuantTable(table)
    }

    #[test]
    fn backends_agree_on_dwt(){
        let mut random = StdRng::seed_from_u64(7);
        let mut temp = vec![0_i16; TEMP_SIZE];

        for &magnitude in &[4_i16, 300, 4096, i16::MAX] {
            let original = random_coefficients(&mut random, magnitude);

            let mut scalar = original.clone();
            let mut chunked = original.clone();
            ScalarBackend.dwt_decode(&mut scalar, &mut temp);
            ChunkedBackend.dwt_decode(&mut chunked, &mut temp);
            assert_eq!(scalar, chunked, "inverse transform of magnitude {}", magnitude);

            let mut scalar = original.clone();
            let mut chunked = original;
            ScalarBackend.dwt_encode(&mut scalar, &mut temp);
            ChunkedBackend.dwt_encode(&mut chunked, &mut temp);
            assert_eq!(scalar, chunked, "forward transform of magnitude {}", magnitude);
        }
    }

    #[test]
    fn backends_agree_on_quantization(){
        let mut random = StdRng::seed_from_u64(8);

        for _ in 0 .. 16 {
            let table = random_table(&mut random);
            let original = random_coefficients(&mut random, i16::MAX);

            for layout in [&LEGACY_LAYOUT, &EXTRAPOLATED_LAYOUT] {
                let mut scalar = original.clone();
                let mut chunked = original.clone();
                ScalarBackend.dequantize(&mut scalar, &table, layout);
                ChunkedBackend.dequantize(&mut chunked, &table, layout);
                assert_eq!(scalar, chunked);
            }

            let mut scalar = original.clone();
            let mut chunked = original;
            ScalarBackend.quantize(&mut scalar, &table);
            ChunkedBackend.quantize(&mut chunked, &table);
            assert_eq!(scalar, chunked);
        }
    }

    #[test]
    fn scalar_backend_matches_free_functions(){
        let mut random = StdRng::seed_from_u64(9);
        let original = random_coefficients(&mut random, 2000);

        let mut expected = original.clone();
        quantize::decode(&mut expected, &QuantTable::DEFAULT, &LEGACY_LAYOUT);

        let mut actual = original;
        ScalarBackend.dequantize(&mut actual, &QuantTable::DEFAULT, &LEGACY_LAYOUT);
        assert_eq!(expected, actual);
    }

    #[test]
    fn selection(){
        assert_eq!(BackendChoice::Scalar.select().name(), "scalar");

        assert_eq!(BackendChoice::Chunked.select().name(), "chunked");
        assert_eq!(BackendChoice::default(), BackendChoice::Chunked);
    }
}
