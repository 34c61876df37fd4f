
//! Three level two dimensional Le Gall 5/3 wavelet lifting
//! over the 4096 coefficients of one tile component.
//! Intermediate values are computed with 32 bits,
//! each stored coefficient is truncated to 16 bits.

/// Coefficients of one 64x64 tile component.
pub const COEFFICIENT_COUNT: usize = 64 * 64;

/// Size of the temporary buffer required by every transform in this module.
pub const TEMP_SIZE: usize = COEFFICIENT_COUNT;

/// Subband width and block offset of the power of two levels, finest level first.
pub const LEGACY_LEVELS: [(usize, usize); 3] = [(32, 0), (16, 3072), (8, 3840)];

/// Block offset and level of the extrapolated transform, coarsest level first.
pub const EXTRAPOLATED_LEVELS: [(usize, usize); 3] = [(3807, 3), (3007, 2), (0, 1)];

/// Rows and columns of the low subbands of a level.
pub fn extrapolated_low_count(level: usize) -> usize {
    (64 >> level) + 1
}

/// Rows and columns of the high subbands of a level.
pub fn extrapolated_high_count(level: usize) -> usize {
    if level == 1 { 31 } else { (64 + (1 << (level - 1))) >> level }
}


/// The one dimensional lifting steps of a legacy level, applied to all rows or all columns.
/// Implementations must produce identical coefficients.
pub trait Lifting {

    /// `low` and `high` hold `width` rows of `width` coefficients,
    /// `out` receives `width` rows of `2 width` samples.
    fn inverse_rows(low: &[i16], high: &[i16], out: &mut [i16], width: usize);

    /// `low` and `high` hold `width` rows of `2 width` coefficients,
    /// `out` receives `2 width` rows of `2 width` samples.
    fn inverse_columns(low: &[i16], high: &[i16], out: &mut [i16], width: usize);

    /// `input` holds `width` rows of `2 width` samples,
    /// `low` and `high` receive `width` rows of `width` coefficients.
    fn forward_rows(input: &[i16], low: &mut [i16], high: &mut [i16], width: usize);

    /// `input` holds `2 width` rows of `2 width` samples,
    /// `low` and `high` receive `width` rows of `2 width` coefficients.
    fn forward_columns(input: &[i16], low: &mut [i16], high: &mut [i16], width: usize);
}

/// Lifts one line after another.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScalarLifting;


/// Reconstruct the component from its subbands, in place.
pub fn decode(coefficients: &mut [i16], temp: &mut [i16]) {
    decode_with::<ScalarLifting>(coefficients, temp)
}

/// Split the component into its subbands, in place.
pub fn encode(coefficients: &mut [i16], temp: &mut [i16]) {
    encode_with::<ScalarLifting>(coefficients, temp)
}

/// Reconstruct the component from its subbands using the specified lifting implementation.
pub fn decode_with<L: Lifting>(coefficients: &mut [i16], temp: &mut [i16]) {
    debug_assert_eq!(coefficients.len(), COEFFICIENT_COUNT);

    for &(width, offset) in LEGACY_LEVELS.iter().rev() {
        let size = 4 * width * width;
        decode_level::<L>(&mut coefficients[offset .. offset + size], temp, width);
    }
}

/// Split the component into its subbands using the specified lifting implementation.
pub fn encode_with<L: Lifting>(coefficients: &mut [i16], temp: &mut [i16]) {
    debug_assert_eq!(coefficients.len(), COEFFICIENT_COUNT);

    for &(width, offset) in LEGACY_LEVELS.iter() {
        let size = 4 * width * width;
        encode_level::<L>(&mut coefficients[offset .. offset + size], temp, width);
    }
}

/// Reconstruct a component that was transformed with the extrapolated subband layout, in place.
pub fn decode_extrapolated(coefficients: &mut [i16], temp: &mut [i16]) {
    debug_assert_eq!(coefficients.len(), COEFFICIENT_COUNT);

    for &(offset, level) in EXTRAPOLATED_LEVELS.iter() {
        decode_extrapolated_level(&mut coefficients[offset ..], temp, level);
    }
}


/// Block layout: HL, LH, HH and LL, each `width x width`.
/// The result, `2 width x 2 width`, replaces the block.
fn decode_level<L: Lifting>(block: &mut [i16], temp: &mut [i16], width: usize) {
    let band = width * width;
    let (l_temp, h_temp) = temp[.. 4 * band].split_at_mut(2 * band);

    {
        let (hl, rest) = block.split_at(band);
        let (lh, rest) = rest.split_at(band);
        let (hh, ll) = rest.split_at(band);

        L::inverse_rows(ll, hl, l_temp, width);
        L::inverse_rows(lh, hh, h_temp, width);
    }

    L::inverse_columns(l_temp, h_temp, block, width);
}

/// Input: `2 width x 2 width` samples. Output: HL, LH, HH and LL, each `width x width`.
fn encode_level<L: Lifting>(block: &mut [i16], temp: &mut [i16], width: usize) {
    let band = width * width;
    let (l_temp, h_temp) = temp[.. 4 * band].split_at_mut(2 * band);

    L::forward_columns(block, l_temp, h_temp, width);

    let (hl, rest) = block.split_at_mut(band);
    let (lh, rest) = rest.split_at_mut(band);
    let (hh, ll) = rest.split_at_mut(band);

    L::forward_rows(l_temp, ll, hl, width);
    L::forward_rows(h_temp, lh, hh, width);
}

impl Lifting for ScalarLifting {
    fn inverse_rows(low: &[i16], high: &[i16], out: &mut [i16], width: usize) {
        let rows = low.chunks_exact(width).zip(high.chunks_exact(width));

        for ((low, high), out) in rows.zip(out.chunks_exact_mut(2 * width)) {
            inverse_lift(low, high, out);
        }
    }

    fn inverse_columns(low_rows: &[i16], high_rows: &[i16], out: &mut [i16], width: usize) {
        let total = 2 * width;
        let mut low = [0_i16; 32];
        let mut high = [0_i16; 32];
        let mut column = [0_i16; 64];

        for x in 0 .. total {
            for n in 0 .. width {
                low[n] = low_rows[n * total + x];
                high[n] = high_rows[n * total + x];
            }

            inverse_lift(&low[.. width], &high[.. width], &mut column[.. total]);

            for (y, &value) in column[.. total].iter().enumerate() {
                out[y * total + x] = value;
            }
        }
    }

    fn forward_rows(input: &[i16], low: &mut [i16], high: &mut [i16], width: usize) {
        let rows = low.chunks_exact_mut(width).zip(high.chunks_exact_mut(width));

        for ((low, high), input) in rows.zip(input.chunks_exact(2 * width)) {
            forward_lift(input, low, high);
        }
    }

    fn forward_columns(input: &[i16], low_rows: &mut [i16], high_rows: &mut [i16], width: usize) {
        let total = 2 * width;
        let mut column = [0_i16; 64];
        let mut low = [0_i16; 32];
        let mut high = [0_i16; 32];

        for x in 0 .. total {
            for (y, value) in column[.. total].iter_mut().enumerate() {
                *value = input[y * total + x];
            }

            forward_lift(&column[.. total], &mut low[.. width], &mut high[.. width]);

            for n in 0 .. width {
                low_rows[n * total + x] = low[n];
                high_rows[n * total + x] = high[n];
            }
        }
    }
}

/// Block layout: HL (`L` rows of `H`), LH (`H` rows of `L`), HH (`H x H`), LL (`L x L`).
/// The result, `L + H` squared, replaces the block.
fn decode_extrapolated_level(block: &mut [i16], temp: &mut [i16], level: usize) {
    let low_count = extrapolated_low_count(level);
    let high_count = extrapolated_high_count(level);
    let total = low_count + high_count;

    let (l_temp, h_temp) = temp[.. total * total].split_at_mut(low_count * total);

    {
        let (hl, rest) = block.split_at(low_count * high_count);
        let (lh, rest) = rest.split_at(high_count * low_count);
        let (hh, ll) = rest.split_at(high_count * high_count);

        for y in 0 .. low_count {
            inverse_lift_extrapolated(
                &ll[y * low_count ..][.. low_count],
                &hl[y * high_count ..][.. high_count],
                &mut l_temp[y * total ..][.. total]
            );
        }

        for y in 0 .. high_count {
            inverse_lift_extrapolated(
                &lh[y * low_count ..][.. low_count],
                &hh[y * high_count ..][.. high_count],
                &mut h_temp[y * total ..][.. total]
            );
        }
    }

    let mut low = [0_i16; 33];
    let mut high = [0_i16; 31];
    let mut column = [0_i16; 64];

    for x in 0 .. total {
        for n in 0 .. low_count { low[n] = l_temp[n * total + x]; }
        for n in 0 .. high_count { high[n] = h_temp[n * total + x]; }

        inverse_lift_extrapolated(&low[.. low_count], &high[.. high_count], &mut column[.. total]);

        for (y, &value) in column[.. total].iter().enumerate() {
            block[y * total + x] = value;
        }
    }
}


/// Interleave one line of low and high coefficients into `2 n` samples.
pub fn inverse_lift(low: &[i16], high: &[i16], out: &mut [i16]) {
    let width = low.len();
    debug_assert!(high.len() == width && out.len() == 2 * width);

    for n in 0 .. width {
        let previous = i32::from(high[n.saturating_sub(1)]);
        out[2 * n] = (i32::from(low[n]) - ((previous + i32::from(high[n]) + 1) >> 1)) as i16;
    }

    for n in 0 .. width {
        let even = i32::from(out[2 * n]);
        let next = if n + 1 < width { i32::from(out[2 * n + 2]) } else { even };
        out[2 * n + 1] = ((i32::from(high[n]) << 1) + ((even + next) >> 1)) as i16;
    }
}

/// Split one line of `2 n` samples into low and high coefficients.
pub fn forward_lift(input: &[i16], low: &mut [i16], high: &mut [i16]) {
    let width = low.len();
    debug_assert!(high.len() == width && input.len() == 2 * width);

    for n in 0 .. width {
        let x0 = i32::from(input[2 * n]);
        let x1 = i32::from(input[2 * n + 1]);
        let x2 = if n + 1 < width { i32::from(input[2 * n + 2]) } else { x0 };

        high[n] = ((x1 - ((x0 + x2) >> 1)) >> 1) as i16;

        let previous = i32::from(high[n.saturating_sub(1)]);
        low[n] = (x0 + ((previous + i32::from(high[n])) >> 1)) as i16;
    }
}

/// Interleave `L` low and `H` high coefficients into `L + H` samples.
/// High samples past the end count as zero.
/// The low sample that has no high partner is either lifted
/// by the last high sample (`L = H + 1`) or passed through (`L = H + 2`).
pub fn inverse_lift_extrapolated(low: &[i16], high: &[i16], out: &mut [i16]) {
    let half = out.len() / 2;
    debug_assert!(low.len() == half + 1 && high.len() + low.len() == out.len());

    let high_at = |index: usize| high.get(index).map_or(0, |&value| i32::from(value));
    let mut even = [0_i32; 33];

    for n in 0 .. half {
        let previous = high_at(n.saturating_sub(1));
        even[n] = i32::from((i32::from(low[n]) - ((previous + high_at(n) + 1) >> 1)) as i16);
    }

    even[half] = match high.last() {
        Some(&last) if low.len() == high.len() + 1 => i32::from((i32::from(low[half]) - i32::from(last)) as i16),
        _ => i32::from(low[half]),
    };

    for n in 0 .. half {
        out[2 * n] = even[n] as i16;
        out[2 * n + 1] = ((high_at(n) << 1) + ((even[n] + even[n + 1]) >> 1)) as i16;
    }

    if out.len() % 2 == 1 {
        out[2 * half] = even[half] as i16;
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    #[test]
    fn extrapolated_band_sizes(){
        let sizes: Vec<(usize, usize)> = (1 ..= 3)
            .map(|level| (extrapolated_low_count(level), extrapolated_high_count(level)))
            .collect();

        assert_eq!(sizes, [(33, 31), (17, 16), (9, 8)]);
    }

    #[test]
    fn constant_survives_legacy_transform(){
        let mut coefficients = vec![0_i16; COEFFICIENT_COUNT];
        let mut temp = vec![0_i16; TEMP_SIZE];

        coefficients[4032 ..].fill(-812);
        decode(&mut coefficients, &mut temp);
        assert!(coefficients.iter().all(|&value| value == -812));

        encode(&mut coefficients, &mut temp);
        assert!(coefficients[.. 4032].iter().all(|&value| value == 0));
        assert!(coefficients[4032 ..].iter().all(|&value| value == -812));
    }

    #[test]
    fn constant_survives_extrapolated_transform(){
        let mut coefficients = vec![0_i16; COEFFICIENT_COUNT];
        let mut temp = vec![0_i16; TEMP_SIZE];

        coefficients[4015 ..].fill(1500);
        decode_extrapolated(&mut coefficients, &mut temp);
        assert!(coefficients.iter().all(|&value| value == 1500));
    }

    #[test]
    fn extrapolated_line_boundaries(){
        // L = H + 1: the last low sample is lifted by the last high sample
        let mut out = [0_i16; 17];
        inverse_lift_extrapolated(&[10; 9], &[2; 8], &mut out);
        assert_eq!(out[0], 10 - 2);
        assert_eq!(out[16], 10 - 2);
        assert_eq!(out[15], 4 + 8);

        // L = H + 2: the last low sample only feeds the last odd sample
        let mut out = [0_i16; 64];
        let mut low = [0_i16; 33];
        low[32] = 100;
        inverse_lift_extrapolated(&low, &[0; 31], &mut out);
        assert_eq!(out[63], 50);
        assert!(out[.. 63].iter().all(|&value| value == 0));
    }

    #[test]
    fn smooth_content_is_nearly_lossless(){
        let mut random = StdRng::seed_from_u64(0x5eed);
        let mut temp = vec![0_i16; TEMP_SIZE];

        for _ in 0 .. 8 {
            let base: i32 = random.random_range(-3000 .. 3000);
            let original: Vec<i16> = (0 .. COEFFICIENT_COUNT)
                .map(|index| (base + (index % 64) as i32 * 3 + (index / 64) as i32 * 2 + random.random_range(-4 .. 5)) as i16)
                .collect();

            let mut coefficients = original.clone();
            encode(&mut coefficients, &mut temp);
            decode(&mut coefficients, &mut temp);

            for (&decoded, &expected) in coefficients.iter().zip(original.iter()) {
                assert!((i32::from(decoded) - i32::from(expected)).abs() <= 16, "{} vs {}", decoded, expected);
            }
        }
    }

    #[test]
    fn extreme_values_do_not_panic(){
        let mut temp = vec![0_i16; TEMP_SIZE];

        for &value in &[i16::MAX, i16::MIN] {
            let mut coefficients = vec![value; COEFFICIENT_COUNT];
            decode(&mut coefficients, &mut temp);

            let mut coefficients = vec![value; COEFFICIENT_COUNT];
            decode_extrapolated(&mut coefficients, &mut temp);

            let mut coefficients = vec![value; COEFFICIENT_COUNT];
            encode(&mut coefficients, &mut temp);
        }
    }
}
