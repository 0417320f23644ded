use catrack_algorithms::{AutomatonConfig, FinderConfig};
use catrack_core::{AngularCoord, AngularHit, GeometryConfig, PlanarCoord, PlanarHit, Position};

fn planar(layers: u32) -> FinderConfig {
    FinderConfig {
        geometry: GeometryConfig::Planar {
            layers,
            modules: 1,
            sensors: 1,
        },
        ..FinderConfig::default()
    }
}

fn hit(x: f64, y: f64, z: f64, layer: u32) -> PlanarHit {
    PlanarHit::new(Position::new(x, y, z), PlanarCoord::new(0, layer, 0, 0))
}

/// Two straight tracks that meet in the innermost layer.
///
/// Track A runs along x, track B along y starting from A's innermost hit.
/// Hit 0 is the shared hit, 1..=3 belong to A and 4..=6 to B.
fn crossing_event() -> Vec<PlanarHit> {
    let mut hits = vec![hit(3.0, 0.0, 3.0, 0)];
    for k in 1..=3 {
        let step = 3.0 * f64::from(k);
        hits.push(hit(3.0 + step, 0.0, 3.0 + step, k));
    }
    for k in 1..=3 {
        let step = 3.0 * f64::from(k);
        hits.push(hit(3.0, step, 3.0 + step, k));
    }
    hits
}

#[test]
fn test_straight_track_five_layers() {
    let finder = planar(5).planar_finder().unwrap();
    let hits: Vec<PlanarHit> = (0..5)
        .map(|layer| {
            let r = 2.0 * f64::from(layer + 1);
            hit(r, 0.0, 0.5 * r, layer)
        })
        .collect();

    let result = finder.find(&hits).unwrap();

    assert_eq!(result.candidates.len(), 1, "expected exactly one candidate");
    assert_eq!(result.candidates[0].len(), 5);
    assert_eq!(result.candidates[0].hits, vec![4, 3, 2, 1, 0]);
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts.num_conflicting_pairs(), 0);
    assert!(result.graph.edges_consistent());
}

#[test]
fn test_rounded_straight_track_at_any_angle() {
    let finder = planar(5).planar_finder().unwrap();
    let round = |v: f64| (v * 1e6).round() / 1e6;

    for angle in [0.1_f64, 0.5236, 1.0, -0.7] {
        let (sin, cos) = angle.sin_cos();
        let hits: Vec<PlanarHit> = (0..5)
            .map(|layer| {
                let r = 3.0 + 4.0 * f64::from(layer);
                hit(round(r * cos), round(r * sin), round(0.5 * r), layer)
            })
            .collect();

        let result = finder.find(&hits).unwrap();
        assert_eq!(result.candidates.len(), 1, "angle {angle}");
        assert_eq!(result.candidates[0].hits, vec![4, 3, 2, 1, 0], "angle {angle}");
    }
}

#[test]
fn test_angular_track_across_phi_wrap() {
    let finder = FinderConfig {
        geometry: GeometryConfig::Angular {
            layers: 5,
            phi: 8,
            theta: 4,
        },
        ..FinderConfig::default()
    }
    .angular_finder()
    .unwrap();

    // Along the x axis, on the boundary between phi divisions 7 and 0
    let hits: Vec<AngularHit> = (0..5)
        .map(|layer| {
            let r = 2.0 * f64::from(layer + 1);
            let phi = if layer % 2 == 0 { 0 } else { 7 };
            AngularHit::new(Position::new(r, 0.0, 0.5 * r), AngularCoord::new(layer, phi, 1))
        })
        .collect();

    let result = finder.find(&hits).unwrap();
    assert_eq!(result.candidates.len(), 1);
    assert_eq!(result.candidates[0].hits, vec![4, 3, 2, 1, 0]);
    assert!(result.graph.edges_consistent());
}

#[test]
fn test_shared_hit_is_reported_as_conflict() {
    let finder = planar(4).planar_finder().unwrap();
    let result = finder.find(&crossing_event()).unwrap();

    let mut tracks: Vec<Vec<usize>> = result.candidates.iter().map(|c| c.hits.clone()).collect();
    tracks.sort();
    assert_eq!(tracks, vec![vec![3, 2, 1, 0], vec![6, 5, 4, 0]]);

    assert_eq!(result.conflicts.len(), 2);
    assert!(result.conflicts.get(0, 1));
    assert!(result.conflicts.get(1, 0));
    assert!(!result.conflicts.get(0, 0));
    assert_eq!(result.conflicts.num_conflicting_pairs(), 1);
}

#[test]
fn test_parallel_and_serial_agree() {
    let hits = crossing_event();
    let parallel = planar(4).planar_finder().unwrap();
    let serial = FinderConfig {
        automaton: AutomatonConfig::new().with_parallel(false),
        ..planar(4)
    }
    .planar_finder()
    .unwrap();

    let a = parallel.find(&hits).unwrap();
    let b = serial.find(&hits).unwrap();
    assert_eq!(a.candidates, b.candidates);
    assert_eq!(a.conflicts, b.conflicts);
    assert_eq!(a.statistics, b.statistics);

    for _ in 0..5 {
        assert_eq!(parallel.find(&hits).unwrap().candidates, a.candidates);
    }
}

#[test]
fn test_diagnostics_cover_every_evaluation() {
    let finder = FinderConfig {
        diagnostics: true,
        ..planar(4)
    }
    .planar_finder()
    .unwrap();
    let result = finder.find(&crossing_event()).unwrap();

    assert!(!result.diagnostics.is_empty());
    assert!(result
        .diagnostics
        .iter()
        .filter(|r| r.criterion == "RzRatioChange")
        .all(|r| r.values.get("rz_ratio_change").is_some()));
    // Every accepted pair passed every criterion, so each edge has a PtWindow record.
    let accepted_pt = result
        .diagnostics
        .iter()
        .filter(|r| r.criterion == "PtWindow" && r.accepted)
        .count();
    assert_eq!(accepted_pt, result.statistics.edges);
}

#[test]
fn test_hits_below_min_length_yield_nothing() {
    let finder = FinderConfig {
        automaton: AutomatonConfig::new().with_min_track_hits(5),
        ..planar(4)
    }
    .planar_finder()
    .unwrap();
    let result = finder.find(&crossing_event()).unwrap();
    assert!(result.candidates.is_empty());
    assert!(result.conflicts.is_empty());
}

#[test]
fn test_out_of_range_hit_aborts() {
    let finder = planar(4).planar_finder().unwrap();
    let mut hits = crossing_event();
    hits.push(hit(20.0, 0.0, 20.0, 9));
    assert!(finder.find(&hits).is_err());
}
