
//! Conversion between RGB pixels and YCbCr planes in 11.5 fixed point,
//! and the packed pixel formats of the caller's buffers.

/// Lowest luma or chroma value of a plane, `-128` in 11.5 fixed point.
pub const PLANE_MIN: i32 = -128 << 5;

/// Highest luma or chroma value of a plane, `127.97` in 11.5 fixed point.
pub const PLANE_MAX: i32 = (128 << 5) - 1;


/// The memory layout of one pixel in a caller's buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {

    /// Blue, green, red, alpha bytes.
    Bgra32,

    /// Red, green, blue, alpha bytes.
    Rgba32,

    /// Blue, green, red bytes.
    Bgr24,

    /// Red, green, blue bytes.
    Rgb24,

    /// Little endian `u16` with blue in the five highest bits, then six bits green, then five bits red.
    Bgr16,

    /// Little endian `u16` with red in the five highest bits, then six bits green, then five bits blue.
    Rgb16,
}

impl Default for PixelFormat {
    fn default() -> Self { PixelFormat::Bgra32 }
}

impl PixelFormat {

    /// Number of bits of one pixel.
    pub fn bits_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra32 | PixelFormat::Rgba32 => 32,
            PixelFormat::Bgr24 | PixelFormat::Rgb24 => 24,
            PixelFormat::Bgr16 | PixelFormat::Rgb16 => 16,
        }
    }

    /// Number of bytes of one pixel.
    pub fn bytes_per_pixel(self) -> usize {
        self.bits_per_pixel() / 8
    }

    /// Store red, green and blue into the first `bytes_per_pixel` bytes.
    /// Alpha is always opaque.
    #[inline]
    pub fn write_pixel(self, [red, green, blue]: [u8; 3], bytes: &mut [u8]) {
        match self {
            PixelFormat::Bgra32 => bytes[.. 4].copy_from_slice(&[blue, green, red, 0xFF]),
            PixelFormat::Rgba32 => bytes[.. 4].copy_from_slice(&[red, green, blue, 0xFF]),
            PixelFormat::Bgr24 => bytes[.. 3].copy_from_slice(&[blue, green, red]),
            PixelFormat::Rgb24 => bytes[.. 3].copy_from_slice(&[red, green, blue]),
            PixelFormat::Bgr16 => bytes[.. 2].copy_from_slice(&pack_565(blue, green, red).to_le_bytes()),
            PixelFormat::Rgb16 => bytes[.. 2].copy_from_slice(&pack_565(red, green, blue).to_le_bytes()),
        }
    }

    /// Load red, green and blue from the first `bytes_per_pixel` bytes.
    #[inline]
    pub fn read_pixel(self, bytes: &[u8]) -> [u8; 3] {
        match self {
            PixelFormat::Bgra32 | PixelFormat::Bgr24 => [bytes[2], bytes[1], bytes[0]],
            PixelFormat::Rgba32 | PixelFormat::Rgb24 => [bytes[0], bytes[1], bytes[2]],

            PixelFormat::Bgr16 => {
                let [blue, green, red] = unpack_565(u16::from_le_bytes([bytes[0], bytes[1]]));
                [red, green, blue]
            },

            PixelFormat::Rgb16 => unpack_565(u16::from_le_bytes([bytes[0], bytes[1]])),
        }
    }
}

fn pack_565(high: u8, middle: u8, low: u8) -> u16 {
    (u16::from(high >> 3) << 11) | (u16::from(middle >> 2) << 5) | u16::from(low >> 3)
}

fn unpack_565(value: u16) -> [u8; 3] {
    let high = (value >> 11) as u8 & 0x1F;
    let middle = (value >> 5) as u8 & 0x3F;
    let low = value as u8 & 0x1F;

    [(high << 3) | (high >> 2), (middle << 2) | (middle >> 4), (low << 3) | (low >> 2)]
}


/// Convert one sample of the three planes to red, green and blue.
#[inline]
pub fn ycbcr_to_rgb_pixel(y: i16, cb: i16, cr: i16) -> [u8; 3] {
    let luma = (i64::from(y) + 4096) << 16;
    let cb = i64::from(cb);
    let cr = i64::from(cr);

    let channel = |value: i64| (value >> 21).max(0).min(255) as u8;

    [
        channel(luma + 91916 * cr),
        channel(luma - 22526 * cb - 46818 * cr),
        channel(luma + 115992 * cb),
    ]
}

/// Convert red, green and blue to one sample of the three planes.
#[inline]
pub fn rgb_to_ycbcr_pixel([red, green, blue]: [u8; 3]) -> [i16; 3] {
    let (red, green, blue) = (i32::from(red), i32::from(green), i32::from(blue));
    let clamp = |value: i32| value.max(PLANE_MIN).min(PLANE_MAX) as i16;

    [
        clamp(((9798 * red + 19235 * green + 3735 * blue) >> 10) - 4096),
        clamp((-5535 * red - 10868 * green + 16403 * blue) >> 10),
        clamp((16377 * red - 13714 * green - 2663 * blue) >> 10),
    ]
}

/// Convert three planes of a tile into packed pixels,
/// `pixels` holding exactly one pixel per sample.
pub fn ycbcr_to_rgb(y: &[i16], cb: &[i16], cr: &[i16], pixels: &mut [u8], format: PixelFormat) {
    let pixel_size = format.bytes_per_pixel();
    debug_assert_eq!(pixels.len(), y.len() * pixel_size);

    let samples = y.iter().zip(cb.iter()).zip(cr.iter());
    for (((&y, &cb), &cr), pixel) in samples.zip(pixels.chunks_exact_mut(pixel_size)) {
        format.write_pixel(ycbcr_to_rgb_pixel(y, cb, cr), pixel);
    }
}

/// Convert planes that hold red, green and blue samples into luma and chroma, in place.
pub fn rgb_to_ycbcr(red_to_y: &mut [i16], green_to_cb: &mut [i16], blue_to_cr: &mut [i16]) {
    let samples = red_to_y.iter_mut().zip(green_to_cb.iter_mut()).zip(blue_to_cr.iter_mut());

    for ((y, cb), cr) in samples {
        let channel = |value: i16| value.max(0).min(255) as u8;
        let [luma, blue_difference, red_difference] = rgb_to_ycbcr_pixel([channel(*y), channel(*cb), channel(*cr)]);

        *y = luma;
        *cb = blue_difference;
        *cr = red_difference;
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn greys_are_exact(){
        for grey in (0 ..= 255).step_by(5) {
            let grey = grey as u8;
            let [y, cb, cr] = rgb_to_ycbcr_pixel([grey, grey, grey]);
            assert_eq!((cb, cr), (0, 0));
            assert_eq!(ycbcr_to_rgb_pixel(y, cb, cr), [grey, grey, grey]);
        }

        assert_eq!(rgb_to_ycbcr_pixel([200, 200, 200])[0], 2304);
    }

    #[test]
    fn colors_are_close(){
        for &color in &[[255, 0, 0], [0, 255, 0], [0, 0, 255], [12, 200, 99], [255, 255, 0]] {
            let [y, cb, cr] = rgb_to_ycbcr_pixel(color);
            let decoded = ycbcr_to_rgb_pixel(y, cb, cr);

            for (&expected, &actual) in color.iter().zip(decoded.iter()) {
                assert!((i32::from(expected) - i32::from(actual)).abs() <= 3, "{:?} became {:?}", color, decoded);
            }
        }
    }

    #[test]
    fn out_of_range_planes_clamp(){
        assert_eq!(ycbcr_to_rgb_pixel(i16::MAX, i16::MAX, i16::MAX)[0], 255);
        assert_eq!(ycbcr_to_rgb_pixel(i16::MIN, 0, 0), [0, 0, 0]);
        assert_eq!(ycbcr_to_rgb_pixel(i16::MIN, i16::MIN, i16::MIN)[2], 0);
    }

    #[test]
    fn pixel_layouts(){
        let color = [0xF8, 0xFC, 0x08];

        let mut bytes = [0_u8; 4];
        PixelFormat::Bgra32.write_pixel(color, &mut bytes);
        assert_eq!(bytes, [0x08, 0xFC, 0xF8, 0xFF]);

        PixelFormat::Rgb24.write_pixel(color, &mut bytes);
        assert_eq!(&bytes[.. 3], &[0xF8, 0xFC, 0x08]);

        PixelFormat::Rgb16.write_pixel(color, &mut bytes);
        assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]), 0xFFE1);

        PixelFormat::Bgr16.write_pixel(color, &mut bytes);
        assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]), 0x0FFF);

        for &format in &[PixelFormat::Bgra32, PixelFormat::Rgba32, PixelFormat::Bgr24, PixelFormat::Rgb24] {
            format.write_pixel(color, &mut bytes);
            assert_eq!(format.read_pixel(&bytes), color);
        }

        for &format in &[PixelFormat::Bgr16, PixelFormat::Rgb16] {
            format.write_pixel([0xFF, 0x00, 0xFF], &mut bytes);
            assert_eq!(format.read_pixel(&bytes), [0xFF, 0x00, 0xFF]);
            assert_eq!(format.bytes_per_pixel(), 2);
        }
    }
}
