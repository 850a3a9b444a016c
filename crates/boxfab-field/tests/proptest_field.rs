//! Property-based tests for the energy field and box storage.
//!
//! Run with: cargo test -p boxfab-field -- proptest

use boxfab_field::{
    Box3D, BoxList, DescentParams, Direction, EnergyField, ScalarGrid, Termination,
};
use boxfab_mesh::{Mesh, Vertex};
use nalgebra::{Point3, Rotation3};
use proptest::prelude::*;

// =============================================================================
// Fixtures and strategies
// =============================================================================

/// Smooth, non-polynomial field on [0, 12]^3 at unit spacing.
fn wavy_grid() -> ScalarGrid {
    ScalarGrid::from_fn([13, 13, 13], [0, 0, 0], [12, 12, 12], |p| {
        (0.5 * p.x).sin() * (0.3 * p.y).cos() + 0.05 * p.z
    })
    .unwrap()
}

/// Field that rewards growth, with a frozen slab at z = 5..6 under a
/// plane at z = 6.
fn frozen_slab_grid() -> ScalarGrid {
    let mut grid =
        ScalarGrid::from_fn([13, 13, 13], [0, 0, 0], [12, 12, 12], |p| p.z - 6.0).unwrap();
    let mut plane = Mesh::new();
    for (x, y) in [(0.0, 0.0), (12.0, 0.0), (0.0, 12.0), (12.0, 12.0)] {
        plane.vertices.push(Vertex::from_coords(x, y, 6.0));
    }
    plane.faces.push([0, 1, 2]);
    plane.faces.push([1, 3, 2]);
    grid.set_target(Direction::PosZ);
    grid.freeze_kernel(&plane, 1.0).unwrap();
    grid
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    (0usize..6).prop_map(|i| Direction::ALL[i])
}

/// Boxes well inside [0, 12]^3.
fn arb_interior_box() -> impl Strategy<Value = Box3D> {
    (
        prop::array::uniform3(0.5..6.0f64),
        prop::array::uniform3(0.5..5.0f64),
        arb_direction(),
    )
        .prop_map(|(lo, ext, target)| {
            Box3D::new(
                Point3::from(lo),
                Point3::new(lo[0] + ext[0], lo[1] + ext[1], lo[2] + ext[2]),
            )
            .unwrap()
            .with_target(target)
        })
}

/// Boxes below the frozen slab.
fn arb_low_box() -> impl Strategy<Value = Box3D> {
    (
        prop::array::uniform3(0.5..3.0f64),
        (1.0..6.0f64, 1.0..6.0f64, 0.5..1.2f64),
    )
        .prop_map(|(lo, (ex, ey, ez))| {
            Box3D::new(
                Point3::new(lo[0], lo[1], lo[2].min(3.0)),
                Point3::new(lo[0] + ex, lo[1] + ey, lo[2].min(3.0) + ez),
            )
            .unwrap()
            .with_target(Direction::PosZ)
        })
}

/// Boxes whose side faces cross the frozen slab.
fn arb_straddling_box() -> impl Strategy<Value = Box3D> {
    (
        prop::array::uniform2(0.5..4.0f64),
        prop::array::uniform2(1.0..5.0f64),
        (3.0..4.9f64, 5.1..7.5f64),
        arb_direction(),
    )
        .prop_map(|(lo, ext, (z0, z1), target)| {
            Box3D::new(
                Point3::new(lo[0], lo[1], z0),
                Point3::new(lo[0] + ext[0], lo[1] + ext[1], z1),
            )
            .unwrap()
            .with_target(target)
        })
}

/// Boxes with random metadata for serialization.
fn arb_any_box() -> impl Strategy<Value = Box3D> {
    (
        prop::array::uniform3(-50.0..50.0f64),
        prop::array::uniform3(0.01..20.0f64),
        arb_direction(),
        prop::array::uniform3(-3.0..3.0f64),
        prop::option::of(prop::array::uniform3(-50.0..50.0f64)),
        any::<[u8; 4]>(),
    )
        .prop_map(|(lo, ext, target, angles, anchor, color)| {
            let mut b = Box3D::new(
                Point3::from(lo),
                Point3::new(lo[0] + ext[0], lo[1] + ext[1], lo[2] + ext[2]),
            )
            .unwrap()
            .with_target(target)
            .with_rotation(*Rotation3::from_euler_angles(angles[0], angles[1], angles[2]).matrix())
            .with_color(color);
            if let Some(p) = anchor {
                b.set_constraint(2, Point3::from(p)).unwrap();
            }
            b
        })
}

fn short_descent() -> DescentParams {
    DescentParams {
        max_iterations: 200,
        ..Default::default()
    }
}

// =============================================================================
// Property Tests: Energy
// =============================================================================

proptest! {
    /// Energy and every gradient component are finite for boxes in the domain.
    #[test]
    fn proptest_energy_is_finite(b in arb_interior_box()) {
        let grid = wavy_grid();
        let field = EnergyField::new(&grid);
        let (e, g) = field.energy_and_gradient(&b).unwrap();
        prop_assert!(e.is_finite());
        prop_assert!(g.iter().all(|v| v.is_finite()));
        prop_assert_eq!(g.len(), 6);
    }

    /// The analytic gradient agrees with central differences.
    #[test]
    fn proptest_gradient_matches_finite_difference(b in arb_interior_box()) {
        let grid = wavy_grid();
        let field = EnergyField::new(&grid);
        let g = field.gradient(&b).unwrap();
        let fd = field.gradient_finite_difference(&b).unwrap();
        let err = (g - fd).norm() / g.norm().max(1.0);
        prop_assert!(err < 1e-3, "relative error {} for {:?}", err, b);
    }
}

// =============================================================================
// Property Tests: Descent
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Recorded energies never increase, and every recorded box is valid.
    #[test]
    fn proptest_trajectory_is_monotone(b in arb_interior_box()) {
        let grid = wavy_grid();
        let field = EnergyField::new(&grid).with_descent(short_descent());
        let mut b = b;
        let start = field.energy(&b).unwrap();
        let mut trajectory = BoxList::new();
        let report = field.gradient_descent(&mut b, Some(&mut trajectory)).unwrap();

        let mut previous = start;
        for t in trajectory.iter() {
            let e = field.energy(t).unwrap();
            prop_assert!(e <= previous);
            for a in 0..3 {
                prop_assert!(t.min()[a] < t.max()[a]);
            }
            previous = e;
        }
        prop_assert!(report.energy <= report.initial_energy);
        prop_assert_eq!(report.initial_energy, start);
    }

    /// No face of an optimized box ends up on a frozen node.
    #[test]
    fn proptest_descent_avoids_frozen_nodes(b in arb_low_box()) {
        let grid = frozen_slab_grid();
        let field = EnergyField::new(&grid).with_descent(short_descent());
        prop_assume!(field.frozen_faces(&b) == [false; 6]);

        let mut b = b;
        let mut trajectory = BoxList::new();
        field.gradient_descent(&mut b, Some(&mut trajectory)).unwrap();
        for t in trajectory.iter() {
            prop_assert_eq!(field.frozen_faces(t), [false; 6]);
        }
        prop_assert!(!grid.region_touches_frozen(&b.min(), &b.max()));
    }

    /// Faces that start on the slab only ever release frozen nodes.
    #[test]
    fn proptest_descent_never_gains_frozen_nodes(b in arb_straddling_box()) {
        let grid = frozen_slab_grid();
        let field = EnergyField::new(&grid).with_descent(short_descent());
        let seed = field.frozen_face_nodes(&b);
        prop_assert!(seed.iter().any(|nodes| !nodes.is_empty()));

        let mut b = b;
        let mut trajectory = BoxList::new();
        field.gradient_descent(&mut b, Some(&mut trajectory)).unwrap();

        let mut previous = seed.clone();
        for t in trajectory.iter() {
            let nodes = field.frozen_face_nodes(t);
            for face in 0..6 {
                prop_assert!(nodes[face].iter().all(|n| previous[face].contains(n)));
                prop_assert!(nodes[face].iter().all(|n| seed[face].contains(n)));
            }
            previous = nodes;
        }
    }

    /// Descent is deterministic.
    #[test]
    fn proptest_descent_is_reproducible(b in arb_interior_box()) {
        let grid = wavy_grid();
        let field = EnergyField::new(&grid).with_descent(short_descent());
        let (mut first, mut second) = (b.clone(), b);
        let r1 = field.gradient_descent(&mut first, None).unwrap();
        let r2 = field.gradient_descent(&mut second, None).unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(r1, r2);
    }
}

// =============================================================================
// Property Tests: Box lists
// =============================================================================

proptest! {
    /// Serialization preserves every field and the order.
    #[test]
    fn proptest_box_list_roundtrip(boxes in prop::collection::vec(arb_any_box(), 0..12)) {
        let list: BoxList = boxes.into_iter().collect();
        let bytes = list.to_bytes().unwrap();
        prop_assert_eq!(bytes.len(), list.encoded_len());
        prop_assert_eq!(BoxList::from_bytes(&bytes).unwrap(), list);
    }

    /// Merging concatenates in order.
    #[test]
    fn proptest_merge_preserves_order(
        a in prop::collection::vec(arb_any_box(), 0..6),
        b in prop::collection::vec(arb_any_box(), 0..6),
    ) {
        let (a, b): (BoxList, BoxList) = (a.into_iter().collect(), b.into_iter().collect());
        let mut merged = a.clone();
        merged.merge(&b);
        prop_assert_eq!(merged.len(), a.len() + b.len());
        prop_assert_eq!(&merged.as_slice()[..a.len()], a.as_slice());
        prop_assert_eq!(&merged.as_slice()[a.len()..], b.as_slice());
    }
}

#[test]
fn flat_field_converges_in_one_iteration() {
    let grid = ScalarGrid::from_fn([6, 6, 6], [0, 0, 0], [5, 5, 5], |_| 0.0).unwrap();
    let field = EnergyField::new(&grid);
    for target in Direction::ALL {
        let mut b = Box3D::new(Point3::new(1.0, 1.5, 2.0), Point3::new(3.0, 4.0, 4.5))
            .unwrap()
            .with_target(target);
        let report = field.gradient_descent(&mut b, None).unwrap();
        assert_eq!(report.iterations, 1);
        assert_eq!(report.termination, Termination::Converged);
        assert_eq!(report.energy, 0.0);
    }
}
