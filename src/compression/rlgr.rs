
//! Adaptive run-length Golomb-Rice entropy coding of one tile component.
// see [MS-RDPRFX] 3.1.8.1.7.3 RLGR1/RLGR3 Pseudocode

use super::EntropyAlgorithm;
use crate::error::{Error, Result, UnitResult};

const KP_MAX: u32 = 80;
const LS_GR: u32 = 3;
const UP_GR: u32 = 4;
const DN_GR: u32 = 6;
const UQ_GR: u32 = 3;
const DQ_GR: u32 = 3;

/// The adaptive parameters, shared by the decoder and the encoder.
/// Both sides must apply exactly the same updates, as the stream
/// contains no other synchronisation.
#[derive(Debug, Clone, Copy)]
struct Parameters {

    /// Scaled run-length parameter, `k = kp >> LS_GR`.
    kp: u32,

    /// Scaled Golomb-Rice parameter, `kr = krp >> LS_GR`.
    krp: u32,
}

impl Parameters {
    fn new() -> Self {
        Parameters { kp: 1 << LS_GR, krp: 1 << LS_GR }
    }

    fn k(self) -> u32 { self.kp >> LS_GR }
    fn kr(self) -> u32 { self.krp >> LS_GR }

    fn increase_kp(&mut self, amount: u32) { self.kp = (self.kp + amount).min(KP_MAX); }
    fn decrease_kp(&mut self, amount: u32) { self.kp = self.kp.saturating_sub(amount); }

    /// Adapt `kr` to the length of the unary prefix that was just coded.
    fn update_kr(&mut self, unary_length: u32) {
        if unary_length == 0 { self.krp = self.krp.saturating_sub(2); }
        else if unary_length != 1 { self.krp = self.krp.saturating_add(unary_length).min(KP_MAX); }
    }
}


/// Decode one component into `output`.
/// Never reads beyond `data`. Stops when either the bits or the output are exhausted,
/// and fills the rest of `output` with zeroes.
pub fn decode(mode: EntropyAlgorithm, data: &[u8], output: &mut [i16]) -> UnitResult {
    if data.is_empty() {
        return Err(Error::corrupt("empty component data"));
    }

    let mut bits = BitReader::new(data);
    let mut parameters = Parameters::new();
    let mut written = 0;

    while bits.remaining() > 0 && written < output.len() {
        let k = parameters.k();

        if k != 0 {
            // run-length mode: each leading zero stands for a full run of 2^k zeroes
            let full_runs = bits.skip_run(false);
            if !bits.skip(1) { break; }

            let mut run = 0_usize;
            for _ in 0 .. full_runs {
                run += 1 << parameters.k();
                parameters.increase_kp(UP_GR);
            }

            let k = parameters.k();
            let run_remainder = match bits.read(k) { Some(bits) => bits, None => break };
            run += run_remainder as usize;

            let negative = match bits.read(1) { Some(bit) => bit != 0, None => break };
            let code = match read_golomb_rice(&mut bits, &mut parameters) { Some(code) => code, None => break };
            parameters.decrease_kp(DN_GR);

            let magnitude = (u32::from(code) + 1) as u16 as i16;
            let value = if negative { magnitude.wrapping_neg() } else { magnitude };

            let zeroes = run.min(output.len() - written);
            output[written .. written + zeroes].fill(0);
            written += zeroes;

            if written < output.len() {
                output[written] = value;
                written += 1;
            }
        }
        else {
            let code = match read_golomb_rice(&mut bits, &mut parameters) { Some(code) => code, None => break };

            match mode {
                EntropyAlgorithm::Rlgr1 => {
                    if code == 0 { parameters.increase_kp(UQ_GR); }
                    else { parameters.decrease_kp(DQ_GR); }

                    output[written] = unsigned_to_signed(u32::from(code));
                    written += 1;
                },

                EntropyAlgorithm::Rlgr3 => {
                    let code = u32::from(code);
                    let first = match bits.read(bit_length(code)) { Some(bits) => bits, None => break };
                    let second = code.wrapping_sub(first);

                    if first != 0 && second != 0 { parameters.decrease_kp(2 * DQ_GR); }
                    else if first == 0 && second == 0 { parameters.increase_kp(2 * UQ_GR); }

                    for value in [first, second] {
                        if written < output.len() {
                            output[written] = unsigned_to_signed(value);
                            written += 1;
                        }
                    }
                },
            }
        }
    }

    output[written ..].fill(0);
    Ok(())
}

/// Encode one component into `output`, returning the number of bytes used.
/// Returns `Error::Resource` instead of writing beyond `output`.
pub fn encode(mode: EntropyAlgorithm, input: &[i16], output: &mut [u8]) -> Result<usize> {
    let mut bits = BitWriter::new(output);
    let mut parameters = Parameters::new();
    let mut values = Values { values: input, position: 0 };

    while values.remaining() > 0 {
        let k = parameters.k();

        if k != 0 {
            let mut value = values.next();
            let mut zero_count = 0_usize;

            while value == 0 && values.remaining() > 0 {
                zero_count += 1;
                value = values.next();
            }

            // a run reaching the end of the input is coded in full,
            // its terminating value then lies beyond the component and is discarded
            if value == 0 {
                zero_count += 1;
            }

            let mut run_max = 1_usize << parameters.k();
            while zero_count >= run_max {
                bits.write_bit(false)?;
                zero_count -= run_max;
                parameters.increase_kp(UP_GR);
                run_max = 1 << parameters.k();
            }

            bits.write_bit(true)?;
            bits.write(zero_count as u32, parameters.k())?;

            let magnitude = u32::from(value.unsigned_abs());
            bits.write_bit(value < 0)?;
            write_golomb_rice(&mut bits, &mut parameters, magnitude.saturating_sub(1))?;
            parameters.decrease_kp(DN_GR);
        }
        else {
            match mode {
                EntropyAlgorithm::Rlgr1 => {
                    let code = signed_to_unsigned(values.next());
                    write_golomb_rice(&mut bits, &mut parameters, code)?;

                    if code == 0 { parameters.increase_kp(UQ_GR); }
                    else { parameters.decrease_kp(DQ_GR); }
                },

                EntropyAlgorithm::Rlgr3 => {
                    let first = signed_to_unsigned(values.next());
                    let second = signed_to_unsigned(values.next());
                    let sum = first + second;

                    write_golomb_rice(&mut bits, &mut parameters, sum)?;
                    bits.write(first, bit_length(sum))?;

                    if first != 0 && second != 0 { parameters.decrease_kp(2 * DQ_GR); }
                    else if first == 0 && second == 0 { parameters.increase_kp(2 * UQ_GR); }
                },
            }
        }
    }

    bits.finish()
}


/// The coefficients to be encoded. Reads zero after the end.
#[derive(Debug)]
struct Values<'v> {
    values: &'v [i16],
    position: usize,
}

impl Values<'_> {
    fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.position)
    }

    fn next(&mut self) -> i16 {
        let value = self.values.get(self.position).copied().unwrap_or(0);
        self.position += 1;
        value
    }
}

/// Reads a unary prefix of ones, its terminating zero, and `kr` remainder bits.
/// The code is truncated to 16 bits like the reference decoder.
fn read_golomb_rice(bits: &mut BitReader<'_>, parameters: &mut Parameters) -> Option<u16> {
    let unary = bits.skip_run(true);
    if !bits.skip(1) { return None; }

    let kr = parameters.kr();
    let remainder = bits.read(kr)?;

    let code = ((unary as u32) << kr | remainder) as u16;
    parameters.update_kr(unary as u32);
    Some(code)
}

fn write_golomb_rice(bits: &mut BitWriter<'_>, parameters: &mut Parameters, value: u32) -> UnitResult {
    let kr = parameters.kr();
    let unary = value >> kr;

    bits.write_repeated(true, unary as usize)?;
    bits.write_bit(false)?;
    bits.write(value & ((1 << kr) - 1), kr)?;

    parameters.update_kr(unary);
    Ok(())
}

/// Interleave signed values into unsigned codes: `0, -1, 1, -2, 2` become `0, 1, 2, 3, 4`.
fn signed_to_unsigned(value: i16) -> u32 {
    let value = i32::from(value);
    if value >= 0 { (2 * value) as u32 } else { (-2 * value - 1) as u32 }
}

/// Reverts `signed_to_unsigned`, wrapping like the reference decoder for out of range codes.
fn unsigned_to_signed(code: u32) -> i16 {
    if code & 1 != 0 { ((code.wrapping_add(1) >> 1) as u16 as i16).wrapping_neg() }
    else { (code >> 1) as u16 as i16 }
}

/// The number of bits required to represent the value.
fn bit_length(value: u32) -> u32 {
    32 - value.leading_zeros()
}


/// Reads single bits, most significant bit first.
#[derive(Debug)]
struct BitReader<'b> {
    bytes: &'b [u8],
    bit_position: usize,
}

impl<'b> BitReader<'b> {
    fn new(bytes: &'b [u8]) -> Self {
        BitReader { bytes, bit_position: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() * 8 - self.bit_position
    }

    /// Consume `count` bits if that many are left.
    fn skip(&mut self, count: usize) -> bool {
        if self.remaining() < count { return false; }
        self.bit_position += count;
        true
    }

    /// Consume up to 32 bits as an unsigned value, or nothing if not enough bits are left.
    fn read(&mut self, count: u32) -> Option<u32> {
        if self.remaining() < count as usize { return None; }

        let mut value = 0_u32;
        for _ in 0 .. count {
            let byte = self.bytes[self.bit_position / 8];
            let bit = (byte >> (7 - self.bit_position % 8)) & 1;
            value = (value << 1) | u32::from(bit);
            self.bit_position += 1;
        }

        Some(value)
    }

    /// Consume all consecutive bits equal to `bit`, returning how many there were.
    fn skip_run(&mut self, bit: bool) -> usize {
        let start = self.bit_position;
        let end = self.bytes.len() * 8;

        while self.bit_position < end {
            let byte = self.bytes[self.bit_position / 8];
            let byte = if bit { !byte } else { byte }; // count zeroes only
            let offset = self.bit_position % 8;

            let available = 8 - offset;
            let run = ((byte << offset).leading_zeros() as usize).min(available);
            self.bit_position += run;

            if run < available { break; }
        }

        self.bit_position - start
    }
}


/// Writes bits most significant bit first into a fixed buffer.
#[derive(Debug)]
struct BitWriter<'b> {
    output: &'b mut [u8],
    byte_position: usize,

    /// Pending bits, right aligned.
    pending: u64,
    pending_count: u32,
}

impl<'b> BitWriter<'b> {
    fn new(output: &'b mut [u8]) -> Self {
        BitWriter { output, byte_position: 0, pending: 0, pending_count: 0 }
    }

    fn write_bit(&mut self, bit: bool) -> UnitResult {
        self.write(u32::from(bit), 1)
    }

    /// Write the lowest `count` bits of the value, `count <= 32`.
    fn write(&mut self, value: u32, count: u32) -> UnitResult {
        debug_assert!(count <= 32, "bit count bug");
        if count == 0 { return Ok(()); }

        let mask = (1_u64 << count) - 1;
        self.pending = (self.pending << count) | (u64::from(value) & mask);
        self.pending_count += count;

        while self.pending_count >= 8 {
            self.pending_count -= 8;
            self.push_byte((self.pending >> self.pending_count) as u8)?;
        }

        self.pending &= (1 << self.pending_count) - 1;
        Ok(())
    }

    fn write_repeated(&mut self, bit: bool, mut count: usize) -> UnitResult {
        let pattern = if bit { u32::MAX } else { 0 };

        while count > 0 {
            let chunk = count.min(32);
            self.write(pattern, chunk as u32)?;
            count -= chunk;
        }

        Ok(())
    }

    fn push_byte(&mut self, byte: u8) -> UnitResult {
        let target = self.output.get_mut(self.byte_position)
            .ok_or_else(|| Error::resource("entropy coder output buffer too small"))?;

        *target = byte;
        self.byte_position += 1;
        Ok(())
    }

    /// Pad the last byte with zeroes and return the number of bytes written.
    fn finish(mut self) -> Result<usize> {
        if self.pending_count > 0 {
            let padding = 8 - self.pending_count;
            self.write(0, padding)?;
        }

        Ok(self.byte_position)
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    fn roundtrip(mode: EntropyAlgorithm, values: &[i16]) {
        let mut encoded = vec![0_u8; 16 * 1024];
        let size = encode(mode, values, &mut encoded).unwrap();
        assert!(size > 0);

        let mut decoded = vec![7_i16; values.len()];
        decode(mode, &encoded[.. size], &mut decoded).unwrap();
        assert_eq!(decoded.as_slice(), values, "{:?} roundtrip", mode);
    }

    #[test]
    fn known_vector(){
        // run terminator, zero run remainder, positive sign, gr code 10+0 for magnitude 3
        let mut encoded = [0_u8; 4];
        let size = encode(EntropyAlgorithm::Rlgr1, &[3], &mut encoded).unwrap();
        assert_eq!(&encoded[.. size], &[0x90]);

        let mut decoded = [0_i16; 1];
        decode(EntropyAlgorithm::Rlgr1, &[0x90], &mut decoded).unwrap();
        assert_eq!(decoded, [3]);
    }

    #[test]
    fn zeroes_are_compact(){
        let zeroes = [0_i16; 4096];
        let mut encoded = vec![0_u8; 1024];

        for mode in [EntropyAlgorithm::Rlgr1, EntropyAlgorithm::Rlgr3] {
            let size = encode(mode, &zeroes, &mut encoded).unwrap();
            assert!(size < 64, "{} bytes for zeroes", size);
            roundtrip(mode, &zeroes);
        }
    }

    #[test]
    fn trailing_zeroes_survive(){
        let mut values = [0_i16; 4096];
        values[0] = 72;
        values[100] = -5;

        roundtrip(EntropyAlgorithm::Rlgr1, &values);
        roundtrip(EntropyAlgorithm::Rlgr3, &values);
    }

    #[test]
    fn random_coefficients(){
        let mut random = StdRng::seed_from_u64(0x52_46_58);

        for _ in 0 .. 64 {
            let density: f32 = random.random();
            let range: i16 = random.random_range(1 .. 2000);

            let values: Vec<i16> = (0 .. 4096).map(|_| {
                if random.random::<f32>() < density { random.random_range(-range ..= range) } else { 0 }
            }).collect();

            roundtrip(EntropyAlgorithm::Rlgr1, &values);
            roundtrip(EntropyAlgorithm::Rlgr3, &values);
        }
    }

    #[test]
    fn odd_lengths(){
        roundtrip(EntropyAlgorithm::Rlgr3, &[0, 0, 0, 1, -1, 2, -2, 0, 9]);
        roundtrip(EntropyAlgorithm::Rlgr3, &[5, 7, -9]);
        roundtrip(EntropyAlgorithm::Rlgr1, &[-32768, 32767, 0, 1]);
    }

    #[test]
    fn output_too_small(){
        let values: Vec<i16> = (0 .. 4096).map(|index| (index % 200) as i16 - 100).collect();
        let mut encoded = [0_u8; 16];

        let result = encode(EntropyAlgorithm::Rlgr1, &values, &mut encoded);
        assert!(matches!(result, Err(Error::Resource(_))));
    }

    #[test]
    fn truncated_input_fills_zeroes(){
        let values: Vec<i16> = (0 .. 4096).map(|index| (index % 7) as i16 - 3).collect();
        let mut encoded = vec![0_u8; 16 * 1024];
        let size = encode(EntropyAlgorithm::Rlgr3, &values, &mut encoded).unwrap();

        let mut decoded = vec![1_i16; 4096];
        decode(EntropyAlgorithm::Rlgr3, &encoded[.. size / 2], &mut decoded).unwrap();
        assert_eq!(decoded[4000 ..], [0_i16; 96][..]);

        assert!(matches!(decode(EntropyAlgorithm::Rlgr1, &[], &mut decoded), Err(Error::Corrupt(_))));
    }

    #[test]
    fn garbage_never_panics(){
        let mut random = StdRng::seed_from_u64(7);
        let mut decoded = vec![0_i16; 4096];

        for _ in 0 .. 256 {
            let length = random.random_range(1 .. 600);
            let bytes: Vec<u8> = (0 .. length).map(|_| random.random()).collect();

            decode(EntropyAlgorithm::Rlgr1, &bytes, &mut decoded).unwrap();
            decode(EntropyAlgorithm::Rlgr3, &bytes, &mut decoded).unwrap();
        }

        decode(EntropyAlgorithm::Rlgr1, &[0xFF; 300], &mut decoded).unwrap();
        decode(EntropyAlgorithm::Rlgr3, &[0x00; 300], &mut decoded).unwrap();
    }
}
