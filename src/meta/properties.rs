
//! The packed properties of context and tileset blocks.

use bit_field::BitField;
use crate::compression::EntropyAlgorithm;
use crate::error::{Error, Result};


/// Color conversion transform: irreversible, ITU-R BT.601 based.
pub const COLOR_CONVERSION_ICT: u16 = 0x1;

/// Wavelet transform: Le Gall 5/3 lifting.
pub const WAVELET_DWT_53_A: u16 = 0x1;

/// Quantization: scalar.
pub const QUANTIZATION_SCALAR: u16 = 0x0;


/// Flags of the codec, the lowest three bits of the context properties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CodecFlags(pub u8);

impl CodecFlags {

    /// The stream contains independent images instead of video.
    pub const IMAGE_MODE: CodecFlags = CodecFlags(0x02);

    /// Whether the image mode flag is set.
    pub fn is_image_mode(self) -> bool {
        self.0.get_bit(1)
    }
}


/// The properties of a context block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextProperties {

    /// Video or image mode.
    pub flags: CodecFlags,

    /// The variant of the entropy coder.
    pub entropy: EntropyAlgorithm,
}

impl ContextProperties {

    /// Unpack and validate the properties.
    pub fn from_bits(bits: u16) -> Result<Self> {
        let flags = CodecFlags(bits.get_bits(0 .. 3) as u8);
        let color_conversion = bits.get_bits(3 .. 5);
        let wavelet = bits.get_bits(5 .. 9);
        let entropy = EntropyAlgorithm::from_wire(bits.get_bits(9 .. 13))?;
        let quantization = bits.get_bits(13 .. 15);

        if color_conversion != COLOR_CONVERSION_ICT || wavelet != WAVELET_DWT_53_A || quantization != QUANTIZATION_SCALAR {
            log::debug!(
                "context announces color conversion {}, wavelet {}, quantization {}",
                color_conversion, wavelet, quantization
            );
        }

        Ok(ContextProperties { flags, entropy })
    }

    /// Pack the properties.
    pub fn to_bits(self) -> u16 {
        let mut bits = 0_u16;
        bits.set_bits(0 .. 3, u16::from(self.flags.0 & 0x07));
        bits.set_bits(3 .. 5, COLOR_CONVERSION_ICT);
        bits.set_bits(5 .. 9, WAVELET_DWT_53_A);
        bits.set_bits(9 .. 13, self.entropy.to_wire());
        bits.set_bits(13 .. 15, QUANTIZATION_SCALAR);
        bits
    }

    /// The properties of the tilesets that a context with these properties writes.
    pub fn tileset_properties(self) -> TilesetProperties {
        TilesetProperties { flags: self.flags, entropy: self.entropy }
    }
}


/// The properties of a tileset block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilesetProperties {

    /// Video or image mode.
    pub flags: CodecFlags,

    /// The variant of the entropy coder.
    pub entropy: EntropyAlgorithm,
}

impl TilesetProperties {

    /// Unpack and validate the properties.
    /// Decoders only log invalid tileset properties, as the context block already defines them.
    pub fn from_bits(bits: u16) -> Result<Self> {
        if !bits.get_bit(0) {
            return Err(Error::invalid("tileset last flag"));
        }

        Ok(TilesetProperties {
            flags: CodecFlags(bits.get_bits(1 .. 4) as u8),
            entropy: EntropyAlgorithm::from_wire(bits.get_bits(10 .. 14))?,
        })
    }

    /// Pack the properties.
    pub fn to_bits(self) -> u16 {
        let mut bits = 0_u16;
        bits.set_bit(0, true);
        bits.set_bits(1 .. 4, u16::from(self.flags.0 & 0x07));
        bits.set_bits(4 .. 6, COLOR_CONVERSION_ICT);
        bits.set_bits(6 .. 10, WAVELET_DWT_53_A);
        bits.set_bits(10 .. 14, self.entropy.to_wire());
        bits.set_bits(14 .. 16, QUANTIZATION_SCALAR);
        bits
    }
}
