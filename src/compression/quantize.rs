
//! Scalar quantization of the ten wavelet subbands.

use std::ops::Range;
use crate::io::*;
use crate::error::{Error, Result, UnitResult};


/// Ten quantization factors, one per subband, in wire order:
/// `LL3, LH3, HL3, HH3, LH2, HL2, HH2, LH1, HL1, HH1`.
/// Each factor is a nibble on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QuantTable(pub [u8; 10]);

impl Default for QuantTable {
    fn default() -> Self { QuantTable::DEFAULT }
}

impl QuantTable {

    /// The table used by encoders that were not configured otherwise.
    pub const DEFAULT: QuantTable = QuantTable([6, 6, 6, 6, 7, 7, 8, 8, 8, 9]);

    /// Number of bytes of one packed table.
    pub const BYTE_SIZE: usize = 5;

    /// Unpack two factors per byte, low nibble first.
    pub fn read(read: &mut impl Read) -> Result<Self> {
        let mut bytes = [0_u8; Self::BYTE_SIZE];
        u8::read_slice(read, &mut bytes)?;

        let mut factors = [0_u8; 10];
        for (pair, byte) in factors.chunks_exact_mut(2).zip(bytes.iter()) {
            pair[0] = byte & 0x0F;
            pair[1] = byte >> 4;
        }

        Ok(QuantTable(factors))
    }

    /// Pack two factors per byte, low nibble first.
    pub fn write(&self, write: &mut impl Write) -> UnitResult {
        self.validate()?;

        for pair in self.0.chunks_exact(2) {
            (pair[0] | (pair[1] << 4)).write(write)?;
        }

        Ok(())
    }

    /// Factors must fit into a nibble.
    pub fn validate(&self) -> UnitResult {
        if self.0.iter().any(|&factor| factor > 15) {
            return Err(Error::invalid("quantization factor larger than 15"));
        }

        Ok(())
    }
}


/// One wavelet subband inside the 4096 coefficients of a tile component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subband {

    /// Index of the first coefficient.
    pub offset: usize,

    /// Number of coefficients.
    pub len: usize,

    /// Index into the quantization table.
    pub factor: usize,
}

impl Subband {
    const fn new(offset: usize, len: usize, factor: usize) -> Self {
        Subband { offset, len, factor }
    }

    /// The coefficients of this subband.
    pub fn range(self) -> Range<usize> {
        self.offset .. self.offset + self.len
    }
}

/// Position of the subbands, in buffer order HL1, LH1, HH1, HL2, LH2, HH2, HL3, LH3, HH3, LL3.
pub type Layout = [Subband; 10];

/// Power of two subbands: 32, 16 and 8 coefficients wide.
pub const LEGACY_LAYOUT: Layout = [
    Subband::new(0, 1024, 8), Subband::new(1024, 1024, 7), Subband::new(2048, 1024, 9),
    Subband::new(3072, 256, 5), Subband::new(3328, 256, 4), Subband::new(3584, 256, 6),
    Subband::new(3840, 64, 2), Subband::new(3904, 64, 1), Subband::new(3968, 64, 3),
    Subband::new(4032, 64, 0),
];

/// Subbands with one extra low coefficient per level: 33/31, 17/16 and 9/8 rows and columns.
pub const EXTRAPOLATED_LAYOUT: Layout = [
    Subband::new(0, 1023, 8), Subband::new(1023, 1023, 7), Subband::new(2046, 961, 9),
    Subband::new(3007, 272, 5), Subband::new(3279, 272, 4), Subband::new(3551, 256, 6),
    Subband::new(3807, 72, 2), Subband::new(3879, 72, 1), Subband::new(3951, 64, 3),
    Subband::new(4015, 81, 0),
];


/// Left shift of the decoder, `factor - 1`.
/// A factor of zero is illegal and leaves the coefficients as they are.
pub fn decode_shift(factor: u8) -> u32 {
    u32::from(factor.saturating_sub(1)).min(15)
}

/// Right shift of the encoder for one subband.
/// The color conversion produces values with five fractional bits,
/// which are removed by a separate final shift of five.
pub fn encode_shift(factor: u8) -> u32 {
    u32::from(factor.saturating_sub(6)).min(15)
}

/// The fractional bits of the forward color conversion.
pub const FRACTIONAL_BITS: u32 = 5;


/// Multiply each subband by its quantization factor.
pub fn decode(coefficients: &mut [i16], table: &QuantTable, layout: &Layout) {
    for subband in layout {
        let shift = decode_shift(table.0[subband.factor]);
        decode_block(&mut coefficients[subband.range()], shift);
    }
}

/// Divide each subband by its quantization factor, rounding to nearest.
pub fn encode(coefficients: &mut [i16], table: &QuantTable) {
    for subband in &LEGACY_LAYOUT {
        let shift = encode_shift(table.0[subband.factor]);
        encode_block(&mut coefficients[subband.range()], shift);
    }

    encode_block(coefficients, FRACTIONAL_BITS);
}

/// `value << shift`, truncated to 16 bits.
pub fn decode_block(coefficients: &mut [i16], shift: u32) {
    if shift == 0 { return; }

    for value in coefficients {
        *value = (i32::from(*value) << shift) as i16;
    }
}

/// `(value + 2^(shift - 1)) >> shift`.
pub fn encode_block(coefficients: &mut [i16], shift: u32) {
    if shift == 0 { return; }

    let half = 1_i32 << (shift - 1);
    for value in coefficients {
        *value = ((i32::from(*value) + half) >> shift) as i16;
    }
}
