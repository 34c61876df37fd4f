
//! Copies decoded tiles into the caller's buffer,
//! clipped to the rectangles of the frame, and records what changed.

use smallvec::SmallVec;
use crate::compression::TILE_SIZE;
use crate::compression::color::PixelFormat;
use crate::error::{Error, UnitResult};
use crate::math::{Rect, Vec2};


/// A set of rectangles, for example the area that a message invalidated.
/// Rectangles may overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    rects: SmallVec<[Rect; 8]>,
}

impl Region {

    /// A region without any rectangles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rectangle. Empty rectangles are ignored.
    pub fn add(&mut self, rect: Rect) {
        if !rect.is_empty() {
            self.rects.push(rect);
        }
    }

    /// All rectangles, in the order they were added.
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// The smallest rectangle that contains all rectangles of this region.
    pub fn extents(&self) -> Option<Rect> {
        let first = *self.rects.first()?;

        let (start, end) = self.rects.iter().skip(1).fold(
            (first.position, first.end()),
            |(start, end), rect| (
                Vec2(start.0.min(rect.position.0), start.1.min(rect.position.1)),
                Vec2(end.0.max(rect.end().0), end.1.max(rect.end().1)),
            )
        );

        Some(Rect { position: start, size: end - start })
    }

    /// Whether this region contains no pixels.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Remove all rectangles.
    pub fn clear(&mut self) {
        self.rects.clear();
    }
}


/// The buffer that decoded frames are written to.
#[derive(Debug)]
pub struct Destination<'b> {

    /// The pixels, with `stride` bytes per row.
    pub pixels: &'b mut [u8],

    /// The format of each pixel.
    pub format: PixelFormat,

    /// Number of bytes from one row to the next.
    pub stride: usize,

    /// Number of rows.
    pub height: usize,

    /// Where the top left pixel of the frame is placed in the buffer.
    pub offset: Vec2<usize>,
}

impl<'b> Destination<'b> {

    /// A destination that places the frame at the top left corner.
    pub fn new(pixels: &'b mut [u8], format: PixelFormat, stride: usize, height: usize) -> Self {
        Destination { pixels, format, stride, height, offset: Vec2(0, 0) }
    }

    /// Place the top left pixel of the frame at the specified position.
    pub fn with_offset(self, left: usize, top: usize) -> Self {
        Destination { offset: Vec2(left, top), .. self }
    }

    /// The pixels that can be written, `stride / bytes per pixel` wide.
    pub fn bounds(&self) -> Rect {
        Rect::from_dimensions((self.stride / self.format.bytes_per_pixel(), self.height))
    }

    /// Check that the buffer contains all rows.
    pub fn validate(&self) -> UnitResult {
        let required = self.stride.checked_mul(self.height)
            .ok_or_else(|| Error::resource("destination size overflow"))?;

        if self.pixels.len() < required {
            return Err(Error::resource("destination buffer smaller than stride times height"));
        }

        Ok(())
    }
}


/// The rectangles of a frame, moved to the destination offset and clipped to the destination.
pub fn clipping_rects(frame_rects: &[Rect], offset: Vec2<usize>, bounds: Rect) -> SmallVec<[Rect; 8]> {
    frame_rects.iter()
        .filter_map(|rect| rect.translated(offset).intersect(bounds))
        .collect()
}

/// Copy the parts of a decoded tile that lie inside the clipping rectangles,
/// and add each copied rectangle to the invalid region.
/// The tile position is in frame coordinates, the clipping rectangles are in destination coordinates.
pub fn compose_tile(
    tile_pixels: &[u8], tile_position: Vec2<usize>,
    clips: &[Rect], destination: &mut Destination<'_>, invalid: &mut Region,
){
    let pixel_size = destination.format.bytes_per_pixel();
    let tile_row_size = TILE_SIZE * pixel_size;
    let footprint = Rect::new(tile_position + destination.offset, (TILE_SIZE, TILE_SIZE));

    for clip in clips {
        let visible = match footprint.intersect(*clip) {
            Some(visible) => visible,
            None => continue,
        };

        let in_tile = visible.position - footprint.position;
        let row_bytes = visible.size.width() * pixel_size;

        for row in 0 .. visible.size.height() {
            let source_start = (in_tile.y() + row) * tile_row_size + in_tile.x() * pixel_size;
            let target_start = (visible.position.y() + row) * destination.stride + visible.position.x() * pixel_size;

            destination.pixels[target_start .. target_start + row_bytes]
                .copy_from_slice(&tile_pixels[source_start .. source_start + row_bytes]);
        }

        invalid.add(visible);
    }
}
