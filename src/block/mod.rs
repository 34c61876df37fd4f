
//! Tiles in flight: the tiles of a parsed frame, encoded tiles,
//! and the jobs that decode and encode them.
//!
//! Each job receives a copy of the settings and a reference to the shared pools,
//! it never looks at the context that spawned it.

pub mod pool;
pub mod scheduler;
pub mod compose;

use crate::compression::{self, ByteVec, Bytes, Scratch, TileSettings, TILE_SIZE, TILE_PIXELS, EntropyAlgorithm};
use crate::compression::backend::TransformBackend;
use crate::compression::color::PixelFormat;
use crate::compression::quantize::QuantTable;
use crate::error::{Error, Result, UnitResult};
use crate::io::Write;
use crate::math::{Rect, Vec2};
use crate::meta::frame::TileHeader;
use self::pool::{Pool, Pooled};


/// A tile of a received message.
/// The components are views into the message, they are never copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBlock<'m> {

    /// Column and row of the tile in the tile grid.
    pub grid_position: Vec2<usize>,

    /// Index into the quantization tables of the tileset, for Y, Cb and Cr.
    pub quant_indices: [u8; 3],

    /// The entropy coded Y, Cb and Cr components.
    pub components: [Bytes<'m>; 3],
}

impl<'m> TileBlock<'m> {

    /// Locate the components inside the bytes that follow the tile header.
    /// Returns `Error::Corrupt` if the components overrun the block
    /// or a quantization index does not refer to one of the tables.
    pub fn from_header(header: TileHeader, mut data: Bytes<'m>, quant_count: usize) -> Result<Self> {
        if header.quant_indices.iter().any(|&index| usize::from(index) >= quant_count) {
            return Err(Error::corrupt("quantization table index out of range"));
        }

        let mut components: [Bytes<'m>; 3] = [&[][..]; 3];
        for (component, &size) in components.iter_mut().zip(header.component_sizes.iter()) {
            if size > data.len() {
                return Err(Error::corrupt("component exceeds tile block"));
            }

            let (front, back) = data.split_at(size);
            *component = front;
            data = back;
        }

        Ok(TileBlock { grid_position: header.grid_position, quant_indices: header.quant_indices, components })
    }

    /// Top left pixel of the tile in the frame.
    pub fn pixel_position(&self) -> Vec2<usize> {
        self.grid_position.map(|index| index * TILE_SIZE)
    }
}


/// A tile produced by the encoder, owning its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTile {

    /// Column and row of the tile in the tile grid.
    pub grid_position: Vec2<usize>,

    /// Index into the quantization tables of the message, for Y, Cb and Cr.
    pub quant_indices: [u8; 3],

    /// The entropy coded Y, Cb and Cr components.
    pub components: [ByteVec; 3],
}

impl EncodedTile {

    /// The header that precedes the components on the wire.
    pub fn header(&self) -> TileHeader {
        TileHeader {
            quant_indices: self.quant_indices,
            grid_position: self.grid_position,
            component_sizes: [self.components[0].len(), self.components[1].len(), self.components[2].len()],
        }
    }

    /// Number of bytes of the complete tile block.
    pub fn block_size(&self) -> usize {
        self.header().block_size()
    }

    /// Write the complete tile block.
    pub fn write(&self, write: &mut impl Write) -> UnitResult {
        let [y, cb, cr] = &self.components;
        self.header().write([y.as_slice(), cb.as_slice(), cr.as_slice()], write)
    }
}


/// The pixels of a decoded tile, held until they are composed.
#[derive(Debug)]
pub struct DecodedTile<'p> {

    /// Top left pixel of the tile in the frame.
    pub position: Vec2<usize>,

    /// 64 rows of 64 pixels.
    pub pixels: Pooled<'p, ByteVec>,
}


/// The buffers shared by all tile jobs of a context.
#[derive(Debug, Default)]
pub struct TilePools {

    /// Decoded pixels of one tile.
    pub pixels: Pool<ByteVec>,

    /// Working memory of one tile job.
    pub scratch: Pool<Scratch>,
}

impl TilePools {

    /// Empty pools.
    pub fn new() -> Self {
        Self::default()
    }

    fn pixel_buffer(&self, format: PixelFormat) -> Result<Pooled<'_, ByteVec>> {
        let byte_size = TILE_PIXELS * format.bytes_per_pixel();
        let mut buffer = self.pixels.take(|| Ok(Vec::new()))?;

        if buffer.len() != byte_size {
            buffer.clear();
            buffer.try_reserve_exact(byte_size)?;
            buffer.resize(byte_size, 0);
        }

        Ok(buffer)
    }

    fn scratch(&self) -> Result<Pooled<'_, Scratch>> {
        self.scratch.take(Scratch::new)
    }
}


/// Decode one tile into a pooled pixel buffer.
pub fn decode_tile<'p>(
    tile: &TileBlock<'_>, quant_tables: &[QuantTable], settings: TileSettings,
    backend: &dyn TransformBackend, pools: &'p TilePools,
) -> Result<DecodedTile<'p>>
{
    let quant = |index: u8| quant_tables.get(usize::from(index))
        .ok_or_else(|| Error::corrupt("quantization table index out of range"));

    let [y, cb, cr] = tile.quant_indices;
    let quants = [quant(y)?, quant(cb)?, quant(cr)?];

    let mut scratch = pools.scratch()?;
    let mut pixels = pools.pixel_buffer(settings.format)?;

    compression::decode_tile(backend, settings, tile.components, quants, &mut scratch, &mut pixels)?;
    Ok(DecodedTile { position: tile.pixel_position(), pixels })
}


/// Everything the encoder needs to know about the source image.
#[derive(Debug, Clone, Copy)]
pub struct EncodeJob<'s> {

    /// The pixels of the whole frame.
    pub source: &'s [u8],

    /// Number of bytes from one source row to the next.
    pub stride: usize,

    /// The format of the source pixels.
    pub format: PixelFormat,

    /// The pixels that may be read. Tiles that extend beyond repeat the edge pixels.
    pub bounds: Rect,

    /// The entropy coder variant.
    pub entropy: EntropyAlgorithm,

    /// The quantization tables for Y, Cb and Cr.
    pub quants: [&'s QuantTable; 3],

    /// The indices of the quantization tables, as written to each tile.
    pub quant_indices: [u8; 3],
}

/// Encode the tile at the specified grid position.
pub fn encode_tile(
    job: &EncodeJob<'_>, grid_position: Vec2<usize>,
    backend: &dyn TransformBackend, pools: &TilePools,
) -> Result<EncodedTile>
{
    let mut scratch = pools.scratch()?;
    let position = grid_position.map(|index| index * TILE_SIZE);

    compression::load_tile(job.source, job.stride, job.format, position, job.bounds, &mut scratch)?;
    let components = compression::encode_tile(backend, job.entropy, job.quants, &mut scratch)?;

    Ok(EncodedTile { grid_position, quant_indices: job.quant_indices, components })
}
