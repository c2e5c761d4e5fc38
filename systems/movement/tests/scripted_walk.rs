use std::time::Duration;

use hopgrid_core::{CellCoord, Direction, GridFrame, GridFrameConfig, ScriptedInput};
use hopgrid_system_layout::{LayoutConfig, LayoutGenerator};
use hopgrid_system_movement::{MovementConfig, MovementController, TickOutcome};
use hopgrid_world::{query, World, WorldConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[test]
fn scripted_walk_replays_identically() {
    let first = walk(7);
    let second = walk(7);

    assert_eq!(first, second, "walk diverged between runs");
    assert!(first
        .iter()
        .any(|outcome| matches!(outcome, TickOutcome::Arrived { .. })));
}

#[test]
fn committed_cells_are_always_open() {
    for seed in 0..10 {
        let world = generated_world(seed);
        let frame = *query::frame(&world);
        let mut actor = MovementController::new(
            MovementConfig::default(),
            frame,
            CellCoord::new(0, 0),
            &world,
        )
        .expect("valid movement config");
        let mut input = ScriptedInput::new(script());

        while input.remaining() > 0 {
            let outcome = actor.drive(Duration::from_millis(40), &mut input, &world);
            if let TickOutcome::Arrived { cell } = outcome {
                assert!(query::is_open(&world, cell), "seed {seed}: entered {cell:?}");
            }
        }
    }
}

fn walk(seed: u64) -> Vec<TickOutcome> {
    let world = generated_world(seed);
    let frame = *query::frame(&world);
    let mut actor =
        MovementController::new(MovementConfig::default(), frame, CellCoord::new(0, 0), &world)
            .expect("valid movement config");
    let mut input = ScriptedInput::new(script());

    let mut outcomes = Vec::new();
    while input.remaining() > 0 {
        outcomes.push(actor.drive(Duration::from_millis(40), &mut input, &world));
    }
    outcomes
}

fn generated_world(seed: u64) -> World {
    let frame = GridFrame::new(&GridFrameConfig::default()).expect("valid frame");
    let generator = LayoutGenerator::new(LayoutConfig::default()).expect("valid layout config");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let (occupancy, reward) = generator.generate(&frame, &mut rng).into_parts();
    World::new(frame, occupancy, reward, WorldConfig::default()).expect("matching dimensions")
}

fn script() -> Vec<Option<Direction>> {
    let legs = [
        (Direction::North, 6),
        (Direction::East, 5),
        (Direction::South, 2),
        (Direction::East, 8),
        (Direction::North, 9),
        (Direction::West, 4),
    ];
    legs.iter()
        .flat_map(|(direction, steps)| {
            (0..*steps).flat_map(move |_| {
                std::iter::once(Some(*direction)).chain(std::iter::repeat(None).take(6))
            })
        })
        .collect()
}
