
//! The tile codec: entropy coding, quantization, wavelet transform
//! and color conversion of one tile of 64x64 pixels.

pub mod rlgr;
pub mod quantize;
pub mod dwt;
pub mod color;
pub mod backend;

use std::fmt;
use crate::error::{Error, Result, UnitResult};
use crate::math::{Rect, Vec2};
use self::backend::TransformBackend;
use self::color::PixelFormat;
use self::quantize::{Layout, QuantTable, LEGACY_LAYOUT, EXTRAPOLATED_LAYOUT};


/// A byte vector.
pub type ByteVec = Vec<u8>;

/// A byte slice.
pub type Bytes<'s> = &'s [u8];

/// Width and height of a tile in pixels.
pub const TILE_SIZE: usize = 64;

/// Number of pixels of a tile, which is also the number of coefficients per component.
pub const TILE_PIXELS: usize = TILE_SIZE * TILE_SIZE;

/// Capacity of the buffer that receives the entropy coded bytes of one component.
pub const ENCODED_COMPONENT_CAPACITY: usize = 16 * 1024;


/// The variant of the adaptive entropy coder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntropyAlgorithm {

    /// Codes one value per Golomb-Rice step.
    Rlgr1,

    /// Codes two values per Golomb-Rice step.
    Rlgr3,
}

impl Default for EntropyAlgorithm {
    fn default() -> Self { EntropyAlgorithm::Rlgr1 }
}

impl fmt::Display for EntropyAlgorithm {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            EntropyAlgorithm::Rlgr1 => "rlgr1",
            EntropyAlgorithm::Rlgr3 => "rlgr3",
        })
    }
}

impl EntropyAlgorithm {

    /// The value of the entropy field in the properties of context and tileset blocks.
    pub fn to_wire(self) -> u16 {
        match self {
            EntropyAlgorithm::Rlgr1 => 0x01,
            EntropyAlgorithm::Rlgr3 => 0x04,
        }
    }

    /// Parse the entropy field of the properties.
    pub fn from_wire(value: u16) -> Result<Self> {
        match value {
            0x01 => Ok(EntropyAlgorithm::Rlgr1),
            0x04 => Ok(EntropyAlgorithm::Rlgr3),
            _ => Err(Error::invalid("entropy algorithm")),
        }
    }
}


/// The subband layout of the wavelet transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {

    /// Power of two subbands. Used by all known encoders.
    Legacy,

    /// Subbands with one extra low coefficient per level.
    /// Only available for decoding.
    Extrapolate,
}

impl Default for Transform {
    fn default() -> Self { Transform::Legacy }
}

impl Transform {

    /// Where the subbands of this transform are located.
    pub fn layout(self) -> &'static Layout {
        match self {
            Transform::Legacy => &LEGACY_LAYOUT,
            Transform::Extrapolate => &EXTRAPOLATED_LAYOUT,
        }
    }
}


/// Everything a tile job needs to know about the context.
/// Copied into each job, so that jobs never look at the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSettings {

    /// The entropy coder variant.
    pub entropy: EntropyAlgorithm,

    /// The subband layout.
    pub transform: Transform,

    /// The pixel format of decoded tiles and of encoder input.
    pub format: PixelFormat,
}


/// Reusable working memory of one tile job.
/// The default value holds no memory, use `Scratch::new` to allocate.
#[derive(Debug, Default)]
pub struct Scratch {

    /// The Y, Cb and Cr coefficients.
    pub planes: [Vec<i16>; 3],

    /// Temporary storage of the wavelet transform.
    pub temp: Vec<i16>,

    /// Receives the entropy coded bytes of one component.
    pub encoded: ByteVec,
}

impl Scratch {

    /// Allocate all buffers, returning `Error::Resource` if memory is exhausted.
    pub fn new() -> Result<Self> {
        Ok(Scratch {
            planes: [zeroed(TILE_PIXELS)?, zeroed(TILE_PIXELS)?, zeroed(TILE_PIXELS)?],
            temp: zeroed(dwt::TEMP_SIZE)?,
            encoded: zeroed(ENCODED_COMPONENT_CAPACITY)?,
        })
    }
}

/// A vector of default values, allocated without aborting on failure.
pub fn zeroed<T: Default + Clone>(len: usize) -> Result<Vec<T>> {
    let mut vec = Vec::new();
    vec.try_reserve_exact(len)?;
    vec.resize(len, T::default());
    Ok(vec)
}


/// Decode the three components of a tile into `pixels`,
/// which holds 64 rows of 64 pixels in the format of the settings.
pub fn decode_tile(
    backend: &dyn TransformBackend, settings: TileSettings,
    components: [Bytes<'_>; 3], quants: [&QuantTable; 3],
    scratch: &mut Scratch, pixels: &mut [u8],
) -> UnitResult
{
    debug_assert_eq!(pixels.len(), TILE_PIXELS * settings.format.bytes_per_pixel());

    let Scratch { planes, temp, .. } = scratch;
    for ((plane, data), quant) in planes.iter_mut().zip(components.iter()).zip(quants.iter()) {
        decode_component(backend, settings, data, quant, plane, temp)?;
    }

    let [y, cb, cr] = planes;
    backend.ycbcr_to_rgb(y, cb, cr, pixels, settings.format);
    Ok(())
}

fn decode_component(
    backend: &dyn TransformBackend, settings: TileSettings,
    data: Bytes<'_>, quant: &QuantTable, coefficients: &mut [i16], temp: &mut [i16]
) -> UnitResult
{
    let layout = settings.transform.layout();

    rlgr::decode(settings.entropy, data, coefficients)?;
    differential_decode(&mut coefficients[layout[9].range()]);
    backend.dequantize(coefficients, quant, layout);

    match settings.transform {
        Transform::Legacy => backend.dwt_decode(coefficients, temp),
        Transform::Extrapolate => backend.dwt_decode_extrapolated(coefficients, temp),
    }

    Ok(())
}


/// Load the pixels of a tile from a source image into the planes of the scratch,
/// as red, green and blue samples.
/// Pixels of the tile that lie outside `bounds` repeat the last column and row inside.
pub fn load_tile(
    source: &[u8], stride: usize, format: PixelFormat,
    tile_position: Vec2<usize>, bounds: Rect, scratch: &mut Scratch
) -> UnitResult
{
    let tile = Rect::new(tile_position, (TILE_SIZE, TILE_SIZE));
    let visible = tile.intersect(bounds)
        .ok_or_else(|| Error::invalid("tile outside of the source image"))?;

    let pixel_size = format.bytes_per_pixel();
    let last_byte = (visible.end().1 - 1) * stride + visible.end().0 * pixel_size;
    if stride < bounds.end().0 * pixel_size || last_byte > source.len() {
        return Err(Error::invalid("source buffer too small"));
    }

    let [red, green, blue] = &mut scratch.planes;

    for y in 0 .. TILE_SIZE {
        let source_y = (tile_position.1 + y).min(visible.end().1 - 1);
        let row = &source[source_y * stride ..];

        for x in 0 .. TILE_SIZE {
            let source_x = (tile_position.0 + x).min(visible.end().0 - 1);
            let [r, g, b] = format.read_pixel(&row[source_x * pixel_size ..]);

            let index = y * TILE_SIZE + x;
            red[index] = i16::from(r);
            green[index] = i16::from(g);
            blue[index] = i16::from(b);
        }
    }

    Ok(())
}

/// Encode the red, green and blue planes of the scratch into three components.
/// The planes are consumed.
pub fn encode_tile(
    backend: &dyn TransformBackend, entropy: EntropyAlgorithm,
    quants: [&QuantTable; 3], scratch: &mut Scratch
) -> Result<[ByteVec; 3]>
{
    let Scratch { planes, temp, encoded } = scratch;

    {
        let [red, green, blue] = &mut *planes;
        backend.rgb_to_ycbcr(red, green, blue);
    }

    let mut components: [ByteVec; 3] = Default::default();
    for ((plane, quant), component) in planes.iter_mut().zip(quants.iter()).zip(components.iter_mut()) {
        backend.dwt_encode(plane, temp);
        backend.quantize(plane, quant);
        differential_encode(&mut plane[LEGACY_LAYOUT[9].range()]);

        let byte_count = rlgr::encode(entropy, plane, encoded)?;

        component.try_reserve_exact(byte_count)?;
        component.extend_from_slice(&encoded[.. byte_count]);
    }

    Ok(components)
}


/// Replace each value by the sum of itself and all previous values.
pub fn differential_decode(values: &mut [i16]) {
    for index in 1 .. values.len() {
        values[index] = values[index].wrapping_add(values[index - 1]);
    }
}

/// Replace each value by its difference to the previous value.
pub fn differential_encode(values: &mut [i16]) {
    for index in (1 .. values.len()).rev() {
        values[index] = values[index].wrapping_sub(values[index - 1]);
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use super::backend::{BackendChoice, ScalarBackend, ChunkedBackend};

    fn settings(format: PixelFormat) -> TileSettings {
        TileSettings { entropy: EntropyAlgorithm::Rlgr1, transform: Transform::Legacy, format }
    }

    fn flat_source(color: [u8; 3], width: usize, height: usize) -> Vec<u8> {
        let mut pixels = vec![0_u8; width * height * 4];
        for pixel in pixels.chunks_exact_mut(4) {
            PixelFormat::Bgra32.write_pixel(color, pixel);
        }

        pixels
    }

    fn round_trip(color: [u8; 3], entropy: EntropyAlgorithm, backend: &dyn TransformBackend) -> Vec<u8> {
        let mut scratch = Scratch::new().unwrap();
        let source = flat_source(color, 64, 64);
        let quants = [&QuantTable::DEFAULT; 3];

        load_tile(&source, 64 * 4, PixelFormat::Bgra32, Vec2(0, 0), Rect::from_dimensions((64, 64)), &mut scratch).unwrap();
        let [y, cb, cr] = encode_tile(backend, entropy, quants, &mut scratch).unwrap();

        let mut pixels = vec![0_u8; TILE_PIXELS * 4];
        let settings = TileSettings { entropy, .. settings(PixelFormat::Bgra32) };
        decode_tile(backend, settings, [y.as_slice(), cb.as_slice(), cr.as_slice()], quants, &mut scratch, &mut pixels).unwrap();
        pixels
    }

    #[test]
    fn differential_coding(){
        let mut values = [5_i16, 7, 7, -1, i16::MAX, i16::MIN];
        let original = values;

        differential_encode(&mut values);
        assert_eq!(&values[.. 4], &[5, 2, 0, -8]);

        differential_decode(&mut values);
        assert_eq!(values, original);
    }

    #[test]
    fn entropy_wire_values(){
        assert_eq!(EntropyAlgorithm::from_wire(0x04).unwrap(), EntropyAlgorithm::Rlgr3);
        assert_eq!(EntropyAlgorithm::from_wire(EntropyAlgorithm::Rlgr1.to_wire()).unwrap(), EntropyAlgorithm::Rlgr1);
        assert!(EntropyAlgorithm::from_wire(0x02).is_err());
    }

    #[test]
    fn flat_grey_tile_is_exact(){
        for &entropy in &[EntropyAlgorithm::Rlgr1, EntropyAlgorithm::Rlgr3] {
            for &grey in &[0_u8, 0x80, 200, 255] {
                let pixels = round_trip([grey, grey, grey], entropy, &ScalarBackend);
                assert!(pixels.chunks_exact(4).all(|pixel| pixel == [grey, grey, grey, 0xFF]), "grey {} with {}", grey, entropy);
            }
        }
    }

    #[test]
    fn backends_produce_identical_tiles(){
        let scalar = round_trip([10, 180, 77], EntropyAlgorithm::Rlgr3, &ScalarBackend);
        let chunked = round_trip([10, 180, 77], EntropyAlgorithm::Rlgr3, &ChunkedBackend);
        assert_eq!(scalar, chunked);

        let selected = BackendChoice::default().select();
        assert_eq!(round_trip([10, 180, 77], EntropyAlgorithm::Rlgr3, selected.as_ref()), scalar);
    }

    #[test]
    fn partial_tile_replicates_edges(){
        let mut source = vec![0_u8; 10 * 3 * 4];
        for (index, pixel) in source.chunks_exact_mut(4).enumerate() {
            let grey = if index % 10 == 9 { 200 } else { 20 };
            PixelFormat::Bgra32.write_pixel([grey, grey, grey], pixel);
        }

        let mut scratch = Scratch::new().unwrap();
        load_tile(&source, 40, PixelFormat::Bgra32, Vec2(0, 0), Rect::from_dimensions((10, 3)), &mut scratch).unwrap();

        let red = &scratch.planes[0];
        assert_eq!(red[0], 20);
        assert_eq!(red[9], 200);
        assert_eq!(red[63], 200, "last column is repeated");
        assert_eq!(red[63 * 64 + 2], 20, "last row is repeated");

        assert!(load_tile(&source[.. 100], 40, PixelFormat::Bgra32, Vec2(0, 0), Rect::from_dimensions((10, 3)), &mut scratch).is_err());
        assert!(load_tile(&source, 40, PixelFormat::Bgra32, Vec2(64, 0), Rect::from_dimensions((10, 3)), &mut scratch).is_err());
    }

    #[test]
    fn corrupt_component_is_reported(){
        let mut scratch = Scratch::new().unwrap();
        let mut pixels = vec![0_u8; TILE_PIXELS * 3];
        let quants = [&QuantTable::DEFAULT; 3];

        let result = decode_tile(&ScalarBackend, settings(PixelFormat::Rgb24), [&[][..], &[0_u8][..], &[0_u8][..]], quants, &mut scratch, &mut pixels);
        assert!(matches!(result, Err(Error::Corrupt(_))));
    }

    #[test]
    fn extrapolated_decoding_of_flat_data(){
        let mut scratch = Scratch::new().unwrap();
        let mut pixels = vec![0_u8; TILE_PIXELS * 4];
        let quants = [&QuantTable([1; 10]); 3];

        // differential decoding spreads the first coefficient over the whole LL3 band
        let mut luma = vec![0_i16; TILE_PIXELS];
        luma[4015] = 2304;

        let mut luma_bytes = vec![0_u8; ENCODED_COMPONENT_CAPACITY];
        let luma_length = rlgr::encode(EntropyAlgorithm::Rlgr1, &luma, &mut luma_bytes).unwrap();

        let mut chroma_bytes = vec![0_u8; ENCODED_COMPONENT_CAPACITY];
        let chroma_length = rlgr::encode(EntropyAlgorithm::Rlgr1, &[0; TILE_PIXELS], &mut chroma_bytes).unwrap();

        let settings = TileSettings { transform: Transform::Extrapolate, .. settings(PixelFormat::Bgra32) };
        let components = [&luma_bytes[.. luma_length], &chroma_bytes[.. chroma_length], &chroma_bytes[.. chroma_length]];
        decode_tile(&ScalarBackend, settings, components, quants, &mut scratch, &mut pixels).unwrap();

        assert!(pixels.chunks_exact(4).all(|pixel| pixel == [200, 200, 200, 0xFF]));
    }
}
