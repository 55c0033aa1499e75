// Run with:  cargo bench --bench fill_framebuffer

use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use embedded_graphics::pixelcolor::{Rgb565, RgbColor};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use st7789_dma::framebuffer::FrameBuffer240x240;

const ROWS: u32 = 240;
const COLS: u32 = 240;

fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(100)
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(3))
        .confidence_level(0.95)
        .significance_level(0.05)
}

const TEST_COLORS: &[(&str, Rgb565)] = &[("red", Rgb565::RED), ("gray", Rgb565::new(16, 32, 16))];

fn test_rectangles() -> Vec<(&'static str, Rectangle)> {
    vec![
        (
            "full_panel",
            Rectangle::new(Point::zero(), Size::new(COLS, ROWS)),
        ),
        (
            "half_panel",
            Rectangle::new(Point::zero(), Size::new(COLS, ROWS / 2)),
        ),
        (
            "small_rect",
            Rectangle::new(Point::new(112, 112), Size::new(16, 16)),
        ),
        // Column-dominant access
        (
            "tall_rect",
            Rectangle::new(Point::new(118, 0), Size::new(4, ROWS)),
        ),
        (
            "clipped",
            Rectangle::new(Point::new(200, 200), Size::new(80, 80)),
        ),
    ]
}

// Pixel by pixel through draw_iter, bypassing fill_solid
fn draw_rect_baseline(fb: &mut FrameBuffer240x240, rect: &Rectangle, color: Rgb565) {
    fb.draw_iter(rect.points().map(|point| Pixel(point, color)))
        .unwrap();
}

fn draw_rect_filled(fb: &mut FrameBuffer240x240, rect: &Rectangle, color: Rgb565) {
    rect.into_styled(PrimitiveStyle::with_fill(color))
        .draw(fb)
        .unwrap();
}

fn fill_framebuffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_framebuffer");
    group.throughput(Throughput::Bytes(FrameBuffer240x240::size_bytes() as u64));

    group.bench_function("fill", |b| {
        let mut fb = Box::new(FrameBuffer240x240::new());
        b.iter(|| black_box(&mut *fb).fill(black_box(Rgb565::BLUE)));
    });

    group.bench_function("clear", |b| {
        let mut fb = Box::new(FrameBuffer240x240::new());
        b.iter(|| black_box(&mut *fb).clear());
    });

    for (rect_name, rect) in &test_rectangles() {
        let pixel_count = u64::from(rect.size.width * rect.size.height);
        group.throughput(Throughput::Elements(pixel_count));

        for (color_name, color) in TEST_COLORS {
            group.bench_with_input(
                BenchmarkId::new(format!("{rect_name}_baseline"), color_name),
                &(rect, *color),
                |b, (rect, color)| {
                    let mut fb = Box::new(FrameBuffer240x240::new());
                    b.iter(|| draw_rect_baseline(black_box(&mut fb), black_box(rect), *color));
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("{rect_name}_filled"), color_name),
                &(rect, *color),
                |b, (rect, color)| {
                    let mut fb = Box::new(FrameBuffer240x240::new());
                    b.iter(|| draw_rect_filled(black_box(&mut fb), black_box(rect), *color));
                },
            );
        }
    }

    group.finish();
}

criterion_group!(name = benches; config = configure_criterion(); targets = fill_framebuffer);
criterion_main!(benches);
