use std::fs;
use std::path::Path;

use ribalta::{
    CacheOpts, Fill, GradientStop, LinearGradient, Point, Rect, Rgba8, Shadow, ShapeStyle, Stage,
    StageOpts, Stroke, Vec2, path_draw_fn, paths,
};

fn probe(stage: &mut Stage, x: f64, y: f64) -> anyhow::Result<()> {
    match stage.intersection(Point::new(x, y))? {
        Some(id) => {
            let name = stage.name(id);
            let label = if name.is_empty() { "(unnamed)" } else { name };
            println!("({x:>5.1}, {y:>5.1}) -> {label}");
        }
        None => println!("({x:>5.1}, {y:>5.1}) -> empty"),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut stage = Stage::new(StageOpts::new(578, 200))?;

    // Backdrop on its own layer, excluded from hit testing.
    let backdrop_layer = stage.new_layer()?;
    let backdrop = stage.new_shape(
        ShapeStyle::default().with_fill(Fill::LinearGradient(LinearGradient {
            start: Point::new(0.0, 0.0),
            end: Point::new(0.0, 200.0),
            stops: vec![
                GradientStop {
                    offset: 0.0,
                    color: Rgba8::rgb(230, 240, 255),
                },
                GradientStop {
                    offset: 1.0,
                    color: Rgba8::rgb(180, 200, 235),
                },
            ],
        })),
        path_draw_fn(paths::rect(0.0, 0.0, 578.0, 200.0)),
    )?;
    stage.add(backdrop_layer, backdrop)?;
    stage.set_listening(backdrop, false);

    let layer = stage.new_layer()?;

    let circle = stage.new_shape(
        ShapeStyle::filled(Rgba8::rgb(235, 77, 75))
            .with_stroke(Stroke::new(Rgba8::BLACK, 4.0))
            .with_shadow(Shadow::new(Rgba8::BLACK, 10.0).with_offset(Vec2::new(5.0, 5.0))),
        path_draw_fn(paths::circle(0.0, 0.0, 50.0)),
    )?;
    stage.add(layer, circle)?;
    stage.set_position(circle, 100.0, 100.0);
    stage.set_name(circle, "circle");

    let card = stage.new_shape(
        ShapeStyle::filled(Rgba8::rgb(72, 126, 235)).with_stroke(Stroke::new(Rgba8::BLACK, 4.0)),
        path_draw_fn(paths::rounded_rect(0.0, 0.0, 120.0, 100.0, 12.0)),
    )?;
    stage.add(layer, card)?;
    stage.set_position(card, 280.0, 50.0);
    stage.set_name(card, "card");

    // A dotted cluster frozen into a bitmap; it hits as one entity.
    let cluster = stage.new_group();
    stage.add(layer, cluster)?;
    stage.set_position(cluster, 460.0, 60.0);
    stage.set_name(cluster, "cluster");
    for row in 0..3 {
        for col in 0..3 {
            let dot = stage.new_shape(
                ShapeStyle::filled(Rgba8::rgb(38, 160, 113)),
                path_draw_fn(paths::circle(0.0, 0.0, 8.0)),
            )?;
            stage.add(cluster, dot)?;
            stage.set_position(dot, f64::from(col) * 28.0, f64::from(row) * 28.0);
        }
    }
    stage.cache(cluster, CacheOpts::new(Rect::new(-10.0, -10.0, 76.0, 76.0)))?;

    stage.draw()?;

    println!("-- initial scene --");
    probe(&mut stage, 100.0, 100.0)?;
    probe(&mut stage, 340.0, 100.0)?;
    probe(&mut stage, 460.0, 60.0)?;
    probe(&mut stage, 30.0, 30.0)?;

    // The card stops listening; probes fall through to nothing (the backdrop
    // never listens).
    stage.set_listening(card, false);
    println!("-- card muted --");
    probe(&mut stage, 340.0, 100.0)?;
    stage.set_listening(card, true);

    // Drag the circle right. No explicit draw between mutation and probe:
    // the hit surface refreshes on demand.
    stage.set_x(circle, 220.0);
    println!("-- circle dragged to x=220 --");
    probe(&mut stage, 100.0, 100.0)?;
    probe(&mut stage, 220.0, 100.0)?;

    stage.draw()?;

    let out_dir = Path::new("target/hit_playground");
    fs::create_dir_all(out_dir)?;
    stage.write_png(out_dir.join("stage.png"))?;
    fs::write(out_dir.join("stage.json"), stage.to_json()?)?;
    eprintln!("wrote {}", out_dir.display());
    Ok(())
}
