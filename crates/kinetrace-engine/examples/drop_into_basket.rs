//! Runs a small basket scene and prints the exported causal trace.
//!
//! The scene: a floor, a basket with a container sensor region, one ball
//! dropped straight into the basket and one bounced off a second ball on the
//! floor. Expect `ContainerEndUp` for the basket ball, `Collision` events
//! for the bounce, and `StartTouching`/`EndTouching` for contacts that
//! settle.
//!
//! Run with: `cargo run --example drop_into_basket`

use anyhow::Result;
use kinetrace_engine::prelude::*;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = RunSettings {
        step_count: 900,
        terminate_on_rest: true,
        ..Default::default()
    };
    let mut runner = TraceRunner::new(settings)?;

    // Static scene: floor plus a basket body carrying the container sensor.
    let floor = ObjectId::new(0);
    runner.add_object(
        floor,
        &BodySpec::fixed(ShapeSpec::Box {
            half_width: 25.0,
            half_height: 0.5,
        }),
        (0.0, 0.0),
        (0.0, 0.0),
    );
    let basket = ObjectId::new(1);
    runner.add_object(
        basket,
        &BodySpec::fixed(ShapeSpec::Box {
            half_width: 3.0,
            half_height: 0.3,
        }),
        (10.0, 1.0),
        (0.0, 0.0),
    );
    runner.add_container_sensor(
        basket,
        &ShapeSpec::Box {
            half_width: 2.5,
            half_height: 1.5,
        },
        (0.0, 2.0),
    );

    // Dynamic objects: one ball dropped into the basket, two meeting above
    // the floor.
    runner.add_object(
        ObjectId::new(2),
        &BodySpec::dynamic(ShapeSpec::Circle { radius: 0.5 }).with_restitution(0.1),
        (10.0, 12.0),
        (0.0, 0.0),
    );
    runner.add_object(
        ObjectId::new(3),
        &BodySpec::dynamic(ShapeSpec::Circle { radius: 0.5 }).with_restitution(0.6),
        (-6.0, 8.0),
        (2.0, 0.0),
    );
    runner.add_object(
        ObjectId::new(4),
        &BodySpec::dynamic(ShapeSpec::Circle { radius: 0.6 }).with_restitution(0.6),
        (-3.0, 1.2),
        (0.0, 0.0),
    );

    let document = runner.run()?;
    println!("{}", document.to_json_string()?);
    Ok(())
}
