use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use ogrender::assets::NoopLoader;
use ogrender::rendering::{render_svg, BlockLayout, ConverterRegistry, RasterConverter};
use ogrender::{default_logger, ConverterKind, Element, FontDescriptor, RenderOptions};

const DEJAVU: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

fn card() -> Element {
    Element::new("div")
        .with_style("backgroundColor", "#1e1e2e")
        .with_style("color", "#cdd6f4")
        .with_style("padding", "48px")
        .with_child(
            Element::new("h1")
                .with_style("fontSize", 64.0)
                .with_child("Benchmarking the layout path"),
        )
        .with_child(
            Element::new("p")
                .with_style("fontSize", 28.0)
                .with_child("A paragraph long enough to wrap across more than one line at the default width."),
        )
}

fn bench_render_svg(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let tree = card();
    let fonts = vec![FontDescriptor::new("sans serif", DEJAVU)];
    let options = RenderOptions::default();
    let logger = default_logger();

    c.bench_function("render_svg_offline", |b| {
        b.iter(|| {
            rt.block_on(render_svg(
                &BlockLayout,
                &tree,
                &options,
                &fonts,
                Arc::new(NoopLoader),
                &logger,
            ))
            .unwrap()
        })
    });
}

fn bench_converters(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let fonts = vec![FontDescriptor::new("sans serif", DEJAVU)];
    let logger = default_logger();
    let svg = rt
        .block_on(render_svg(
            &BlockLayout,
            &card(),
            &RenderOptions::default(),
            &fonts,
            Arc::new(NoopLoader),
            &logger,
        ))
        .unwrap();
    let converter = RasterConverter::new(ConverterRegistry::with_defaults());

    for kind in ConverterKind::ALL {
        let options = RenderOptions {
            converter: kind,
            ..Default::default()
        };
        c.bench_function(&format!("svg_to_png_{}", kind), |b| {
            b.iter(|| rt.block_on(converter.convert(&svg, &options, &logger)).unwrap())
        });
    }
}

criterion_group!(benches, bench_render_svg, bench_converters);
criterion_main!(benches);
