//! Property-based tests for the sorted spatial hash using proptest.
//!
//! These tests verify the index invariants and that grid-accelerated queries
//! agree with a brute-force scan across random particle configurations:
//! - Sorted entries, non-decreasing in bucket key
//! - Start indices point at the first entry of each key's run
//! - Grid neighbor set equals brute-force neighbor set

use proptest::prelude::*;
use sph2d_kernel::neighbor::{NeighborSearch, SpatialHash, EMPTY_BUCKET};

/// Particle positions, including negative coordinates (negative cells).
fn positions() -> impl Strategy<Value = Vec<(f32, f32)>> {
    prop::collection::vec((-50.0f32..150.0, -50.0f32..150.0), 1..200)
}

fn split(points: &[(f32, f32)]) -> (Vec<f32>, Vec<f32>) {
    points.iter().copied().unzip()
}

fn sorted(mut v: Vec<usize>) -> Vec<usize> {
    v.sort_unstable();
    v
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn entries_sorted_by_key(points in positions(), cell in 1.0f32..40.0) {
        let (x, y) = split(&points);
        let mut grid = SpatialHash::new(cell).unwrap();
        grid.rebuild(&x, &y).unwrap();

        let entries = grid.entries();
        prop_assert_eq!(entries.len(), x.len());
        for w in entries.windows(2) {
            prop_assert!(w[0].key <= w[1].key, "keys out of order: {} > {}", w[0].key, w[1].key);
        }

        // Every particle appears exactly once
        let ids = sorted(entries.iter().map(|e| e.particle as usize).collect());
        prop_assert_eq!(ids, (0..x.len()).collect::<Vec<_>>());
    }

    #[test]
    fn start_indices_mark_runs(points in positions(), cell in 1.0f32..40.0) {
        let (x, y) = split(&points);
        let mut grid = SpatialHash::new(cell).unwrap();
        grid.rebuild(&x, &y).unwrap();

        let entries = grid.entries();
        let starts = grid.start_indices();
        prop_assert_eq!(starts.len(), x.len());

        for (k, &s) in starts.iter().enumerate() {
            let occupancy = entries.iter().filter(|e| e.key as usize == k).count();
            if s == EMPTY_BUCKET {
                prop_assert_eq!(occupancy, 0);
                continue;
            }
            let s = s as usize;
            prop_assert!(s == 0 || entries[s - 1].key as usize != k);
            prop_assert!(entries[s..s + occupancy].iter().all(|e| e.key as usize == k));
            prop_assert!(s + occupancy == entries.len() || entries[s + occupancy].key as usize != k);
        }
    }

    #[test]
    fn grid_query_equals_brute_force(
        points in positions(),
        cell in 1.0f32..40.0,
        radius_frac in 0.1f32..=1.0,
        qx in -60.0f32..160.0,
        qy in -60.0f32..160.0,
    ) {
        let (x, y) = split(&points);
        let mut grid = SpatialHash::new(cell).unwrap();
        grid.rebuild(&x, &y).unwrap();
        let radius = cell * radius_frac;

        let mut fast = Vec::new();
        NeighborSearch::Grid(&grid).for_each_within([qx, qy], &x, &y, radius, |j, _| fast.push(j));
        let mut slow = Vec::new();
        NeighborSearch::BruteForce.for_each_within([qx, qy], &x, &y, radius, |j, _| slow.push(j));

        // No duplicates from aliased buckets
        let fast = sorted(fast);
        let mut dedup = fast.clone();
        dedup.dedup();
        prop_assert_eq!(&dedup, &fast);

        prop_assert_eq!(fast, sorted(slow));
    }

    #[test]
    fn query_at_particle_includes_itself(points in positions(), cell in 1.0f32..40.0) {
        let (x, y) = split(&points);
        let mut grid = SpatialHash::new(cell).unwrap();
        grid.rebuild(&x, &y).unwrap();

        for i in 0..x.len() {
            let mut found_self = false;
            grid.for_each_neighbor([x[i], y[i]], &x, &y, cell, |j, _| found_self |= j == i);
            prop_assert!(found_self, "particle {} missing from its own query", i);
        }
    }
}
