use glam::{Quat, Vec3};
use hopgrid_core::{
    CellCoord, CellRect, CellRectSize, GridFrame, GridFrameConfig, Instantiator, PlacementKind,
};
use hopgrid_system_layout::{Layout, LayoutConfig, LayoutError, LayoutGenerator};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn frame(width: u32, height: u32) -> GridFrame {
    GridFrame::new(&GridFrameConfig {
        width,
        height,
        ..GridFrameConfig::default()
    })
    .expect("valid frame")
}

fn generate(config: LayoutConfig, frame: &GridFrame, seed: u64) -> Layout {
    let generator = LayoutGenerator::new(config).expect("valid layout config");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    generator.generate(frame, &mut rng)
}

#[derive(Debug, Default)]
struct Recorder {
    cleared: usize,
    placements: Vec<(PlacementKind, Vec3, Quat)>,
}

impl Instantiator for Recorder {
    fn place(&mut self, kind: PlacementKind, position: Vec3, rotation: Quat) {
        self.placements.push((kind, position, rotation));
    }

    fn clear_all(&mut self) {
        self.cleared += 1;
        self.placements.clear();
    }
}

#[test]
fn rejects_invalid_configuration() {
    assert_eq!(
        LayoutGenerator::new(LayoutConfig {
            min_fill: 6,
            max_fill: 2,
            ..LayoutConfig::default()
        })
        .err(),
        Some(LayoutError::InvertedFillRange {
            min_fill: 6,
            max_fill: 2
        })
    );
    assert_eq!(
        LayoutGenerator::new(LayoutConfig {
            cluster_size: 0,
            ..LayoutConfig::default()
        })
        .err(),
        Some(LayoutError::EmptyCluster)
    );
    assert!(matches!(
        LayoutGenerator::new(LayoutConfig {
            spawn_chance: 1.5,
            ..LayoutConfig::default()
        }),
        Err(LayoutError::SpawnChanceOutOfRange { .. })
    ));
}

#[test]
fn same_seed_produces_same_layout() {
    let frame = frame(24, 18);
    let first = generate(LayoutConfig::default(), &frame, 99);
    let second = generate(LayoutConfig::default(), &frame, 99);

    assert_eq!(first.occupancy(), second.occupancy());
    assert_eq!(first.reward(), second.reward());
    assert_eq!(first.clusters(), second.clusters());
}

#[test]
fn accepted_clusters_never_share_reserved_space() {
    let frame = frame(30, 30);
    for seed in 0..25 {
        for separation in 0..3 {
            let layout = generate(
                LayoutConfig {
                    separation,
                    spawn_chance: 0.9,
                    ..LayoutConfig::default()
                },
                &frame,
                seed,
            );
            let spawn_safe = layout.spawn_safe().expect("spawn zone inside grid");
            let reward = layout.reward().expect("room for reward").region();

            for (index, cluster) in layout.clusters().iter().enumerate() {
                let expected = cluster
                    .region
                    .with_margin(separation)
                    .clipped(30, 30)
                    .expect("cluster inside grid");
                assert_eq!(cluster.reserved, expected);
                assert!(!cluster.reserved.intersects(&spawn_safe), "seed {seed}");
                assert!(!cluster.reserved.intersects(&reward), "seed {seed}");

                for other in &layout.clusters()[index + 1..] {
                    assert!(
                        !cluster.reserved.intersects(&other.reserved),
                        "seed {seed}: {cluster:?} overlaps {other:?}"
                    );
                }

                for cell in cluster.reserved.cells() {
                    assert!(layout.occupancy().is_blocked(cell));
                }
            }
        }
    }
}

#[test]
fn cluster_fill_respects_bounds() {
    let frame = frame(25, 25);
    let config = LayoutConfig {
        min_fill: 2,
        max_fill: 5,
        spawn_chance: 1.0,
        ..LayoutConfig::default()
    };

    for seed in 0..20 {
        let layout = generate(config.clone(), &frame, seed);
        assert!(!layout.clusters().is_empty());
        for cluster in layout.clusters() {
            let filled = layout.occupancy().occupied_in(cluster.region.footprint());
            assert_eq!(filled, cluster.filled as usize);
            assert!((2..=5).contains(&filled), "seed {seed}: filled {filled}");
        }
    }
}

#[test]
fn fill_is_clamped_to_footprint() {
    let frame = frame(12, 12);
    let layout = generate(
        LayoutConfig {
            cluster_size: 2,
            min_fill: 7,
            max_fill: 12,
            spawn_chance: 1.0,
            ..LayoutConfig::default()
        },
        &frame,
        5,
    );

    assert!(!layout.clusters().is_empty());
    for cluster in layout.clusters() {
        assert_eq!(cluster.filled, 4);
        assert_eq!(layout.occupancy().occupied_in(cluster.region.footprint()), 4);
    }
}

#[test]
fn empty_clusters_still_consume_separation_space() {
    let frame = frame(20, 20);
    let layout = generate(
        LayoutConfig {
            min_fill: 0,
            max_fill: 0,
            spawn_chance: 1.0,
            ..LayoutConfig::default()
        },
        &frame,
        8,
    );

    assert_eq!(layout.occupancy().occupied_count(), 0);
    assert!(!layout.clusters().is_empty());
    for cluster in layout.clusters() {
        assert!(cluster
            .reserved
            .cells()
            .all(|cell| layout.occupancy().is_blocked(cell)));
    }
}

#[test]
fn spawn_zone_and_reward_stay_clear() {
    let frame = frame(20, 20);
    for seed in 0..30 {
        let layout = generate(LayoutConfig::default(), &frame, seed);
        let spawn = layout.spawn_safe().expect("spawn zone inside grid");
        assert_eq!(spawn.size(), CellRectSize::new(2, 2));
        for cell in spawn.cells() {
            assert!(layout.occupancy().is_blocked(cell));
            assert!(!layout.occupancy().is_occupied(cell));
        }

        let reward = layout.reward().expect("room for reward");
        assert_eq!(reward.center().row(), 18);
        assert!((1..=18).contains(&reward.center().column()));
        for cell in reward.region().cells() {
            assert!(layout.occupancy().is_blocked(cell));
            assert!(!layout.occupancy().is_occupied(cell));
        }
    }
}

#[test]
fn full_fill_without_margin_tiles_the_free_space() {
    let frame = frame(20, 20);
    let layout = generate(
        LayoutConfig {
            cluster_size: 3,
            spawn_chance: 1.0,
            min_fill: 9,
            max_fill: 9,
            separation: 0,
            ..LayoutConfig::default()
        },
        &frame,
        2024,
    );
    let occupancy = layout.occupancy();

    for cluster in layout.clusters() {
        assert_eq!(occupancy.occupied_in(cluster.region.footprint()), 9);
        assert_eq!(cluster.reserved, cluster.region.footprint());
    }
    assert_eq!(occupancy.occupied_count(), 9 * layout.clusters().len());

    // The first column of clusters starts right above the 2x2 spawn zone.
    let first = CellRect::square(CellCoord::new(0, 2), 3);
    assert_eq!(occupancy.occupied_in(first), 9);

    // Greedy acceptance leaves no anchor whose footprint is still entirely free.
    for ax in 0..=17 {
        for ay in 0..=17 {
            let footprint = CellRect::square(CellCoord::new(ax, ay), 3);
            assert!(
                footprint.cells().any(|cell| occupancy.is_blocked(cell)),
                "anchor ({ax}, {ay}) was left free"
            );
        }
    }
}

#[test]
fn oversized_clusters_leave_only_the_spawn_zone_and_reward() {
    let frame = frame(6, 6);
    let layout = generate(
        LayoutConfig {
            cluster_size: 7,
            spawn_chance: 1.0,
            ..LayoutConfig::default()
        },
        &frame,
        1,
    );

    assert!(layout.clusters().is_empty());
    assert_eq!(layout.occupancy().occupied_count(), 0);
    let reward = layout.reward().expect("room for reward").region();
    let spawn = layout.spawn_safe().expect("spawn zone inside grid");
    for column in 0..6 {
        for row in 0..6 {
            let cell = CellCoord::new(column, row);
            assert_eq!(
                layout.occupancy().is_blocked(cell),
                spawn.contains(cell) || reward.contains(cell)
            );
        }
    }
}

#[test]
fn short_grid_skips_reward_but_keeps_obstacles() {
    let frame = frame(16, 2);
    let layout = generate(
        LayoutConfig {
            cluster_size: 2,
            spawn_chance: 1.0,
            separation: 0,
            min_fill: 4,
            max_fill: 4,
            ..LayoutConfig::default()
        },
        &frame,
        3,
    );

    assert_eq!(layout.reward(), None);
    assert!(!layout.clusters().is_empty());
    assert!(layout.occupancy().occupied_count() > 0);
}

#[test]
fn instantiate_places_every_obstacle_then_reward() {
    let frame = frame(20, 20);
    let layout = generate(
        LayoutConfig {
            obstacle_variants: 3,
            ..LayoutConfig::default()
        },
        &frame,
        17,
    );
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let mut recorder = Recorder::default();
    recorder.placements.push((PlacementKind::Reward, Vec3::ZERO, Quat::IDENTITY));

    layout.instantiate(&frame, &mut rng, &mut recorder);

    assert_eq!(recorder.cleared, 1);
    let occupied = layout.occupancy().occupied_count();
    assert_eq!(recorder.placements.len(), occupied + 1);

    for ((kind, position, rotation), cell) in recorder
        .placements
        .iter()
        .zip(layout.occupancy().occupied_cells())
    {
        let PlacementKind::Obstacle { variant } = kind else {
            panic!("expected obstacle placement, found {kind:?}");
        };
        assert!(*variant < 3);
        assert_eq!(
            *position,
            Vec3::new(
                cell.column() as f32 + 0.5,
                0.05,
                cell.row() as f32 + 0.5
            )
        );
        let facing = *rotation * Vec3::Z;
        assert!(facing.y.abs() < 1e-5);
        assert!(
            (facing.x.abs() - 1.0).abs() < 1e-5 || (facing.z.abs() - 1.0).abs() < 1e-5,
            "rotation {rotation:?} is not a quarter turn"
        );
    }

    let (kind, position, rotation) = recorder.placements.last().expect("reward placed");
    let reward = layout.reward().expect("room for reward").center();
    assert_eq!(*kind, PlacementKind::Reward);
    assert_eq!(position.x, reward.column() as f32 + 0.5);
    assert_eq!(position.z, reward.row() as f32 + 0.5);
    assert_eq!(*rotation, Quat::IDENTITY);
}

#[test]
fn instantiate_without_variants_places_only_reward() {
    let frame = frame(20, 20);
    let layout = generate(
        LayoutConfig {
            obstacle_variants: 0,
            ..LayoutConfig::default()
        },
        &frame,
        4,
    );
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let mut recorder = Recorder::default();

    layout.instantiate(&frame, &mut rng, &mut recorder);

    assert!(layout.occupancy().occupied_count() > 0);
    assert_eq!(recorder.placements.len(), 1);
    assert_eq!(recorder.placements[0].0, PlacementKind::Reward);
}

#[test]
fn reward_reaches_every_interior_column() {
    let frame = frame(6, 6);
    let mut columns: Vec<i32> = (0..60)
        .filter_map(|seed| generate(LayoutConfig::default(), &frame, seed).reward())
        .map(|reward| reward.center().column())
        .collect();
    columns.sort_unstable();
    columns.dedup();

    assert_eq!(columns, [1, 2, 3, 4]);
}
