#[macro_use]
extern crate bencher;

extern crate rfx;
use rfx::prelude::*;
use rfx::compression::rlgr;

use bencher::Bencher;

const WIDTH: usize = 256;
const HEIGHT: usize = 256;

fn image() -> Vec<u8> {
    let mut pixels = vec![0_u8; WIDTH * HEIGHT * 4];

    for (index, pixel) in pixels.chunks_exact_mut(4).enumerate() {
        let (x, y) = (index % WIDTH, index / WIDTH);
        PixelFormat::Bgra32.write_pixel([x as u8, y as u8, ((x * y) >> 8) as u8], pixel);
    }

    pixels
}

fn encode_frame(options: ContextOptions) -> impl FnMut(&mut Bencher) {
    move |bench| {
        let pixels = image();
        let mut encoder = Context::with_options(Role::Encoder, options);
        encoder.reset(WIDTH, HEIGHT).unwrap();

        bench.iter(|| {
            let message = encoder.encode_message(&[Rect::from_dimensions((WIDTH, HEIGHT))], &Source::new(&pixels, WIDTH, HEIGHT, WIDTH * 4)).unwrap();
            bencher::black_box(message);
        })
    }
}

fn decode_frame(options: ContextOptions) -> impl FnMut(&mut Bencher) {
    move |bench| {
        let pixels = image();
        let mut encoder = Context::new(Role::Encoder);
        encoder.reset(WIDTH, HEIGHT).unwrap();

        let message = encoder.encode_message(&[Rect::from_dimensions((WIDTH, HEIGHT))], &Source::new(&pixels, WIDTH, HEIGHT, WIDTH * 4)).unwrap();
        let bytes = encoder.write_message(&message).unwrap();

        let mut decoder = Context::with_options(Role::Decoder, options);
        let mut buffer = vec![0_u8; WIDTH * HEIGHT * 4];

        bench.iter(|| {
            let mut destination = Destination::new(&mut buffer, PixelFormat::Bgra32, WIDTH * 4, HEIGHT);
            let report = decoder.process_message(&bytes, &mut destination, &mut Region::new()).unwrap();
            bencher::black_box(report);
        })
    }
}

fn encode_sequential(bench: &mut Bencher) { encode_frame(ContextOptions::default().non_parallel())(bench) }
fn encode_parallel(bench: &mut Bencher) { encode_frame(ContextOptions::default())(bench) }
fn decode_sequential(bench: &mut Bencher) { decode_frame(ContextOptions::default().non_parallel())(bench) }
fn decode_parallel(bench: &mut Bencher) { decode_frame(ContextOptions::default())(bench) }
fn decode_scalar(bench: &mut Bencher) { decode_frame(ContextOptions::default().non_parallel().with_backend(BackendChoice::Scalar))(bench) }

fn rlgr_component(bench: &mut Bencher) {
    let coefficients: Vec<i16> = (0 .. 4096_i32).map(|index| {
        if index % 7 == 0 { ((index % 41) - 20) as i16 } else { 0 }
    }).collect();

    let mut bytes = vec![0_u8; 8192];
    let mut decoded = vec![0_i16; 4096];

    bench.iter(|| {
        let size = rlgr::encode(EntropyAlgorithm::Rlgr3, &coefficients, &mut bytes).unwrap();
        rlgr::decode(EntropyAlgorithm::Rlgr3, &bytes[.. size], &mut decoded).unwrap();
        bencher::black_box(&decoded);
    })
}

benchmark_group!(codec,
    encode_sequential,
    encode_parallel,
    decode_sequential,
    decode_parallel,
    decode_scalar,
    rlgr_component
);

benchmark_main!(codec);
