//! Sorted spatial hash for neighbor search.
//!
//! Space is divided into square cells of side `cell_size` (the influence
//! radius). Each cell hashes to a bucket key in `0..n`, where `n` is the
//! particle count, so the load factor is about one and unrelated cells are
//! expected to share keys. Rather than chaining, the `(particle, key)` table
//! is radix-sorted by key and a start-index table records where each key's
//! run begins. Queries scan the 3x3 cell block around a point and filter
//! candidates by true distance, which also discards particles from aliased
//! cells.

use crate::error::{Error, Result};
use crate::radix;

/// Start-index sentinel for a bucket key that no particle maps to.
pub const EMPTY_BUCKET: u32 = u32::MAX;

const HASH_X: u32 = 15_823;
const HASH_Y: u32 = 9_737_333;

/// One row of the sorted lookup table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpatialLookupEntry {
    /// Index of the particle.
    pub particle: u32,
    /// Bucket key of the particle's cell.
    pub key: u32,
}

/// Integer cell coordinate containing `(x, y)`. May be negative.
#[inline]
pub fn position_to_cell(x: f32, y: f32, cell_size: f32) -> (i32, i32) {
    (
        (x / cell_size).floor() as i32,
        (y / cell_size).floor() as i32,
    )
}

/// Order-sensitive hash of a cell coordinate.
#[inline]
pub fn hash_cell(cx: i32, cy: i32) -> u32 {
    (cx as u32)
        .wrapping_mul(HASH_X)
        .wrapping_add((cy as u32).wrapping_mul(HASH_Y))
}

/// Reduce a cell hash to a bucket key in `0..n`. `n` must be non-zero.
#[inline]
pub fn bucket_key(hash: u32, n: usize) -> u32 {
    debug_assert!(n > 0, "bucket table must be non-empty");
    (hash as u64 % n as u64) as u32
}

/// Spatial hash over a particle set, rebuilt from scratch on demand.
#[derive(Debug, Clone)]
pub struct SpatialHash {
    cell_size: f32,
    /// Entries sorted ascending by `key`.
    entries: Vec<SpatialLookupEntry>,
    /// `start_indices[k]` is the first position of key `k` in `entries`,
    /// or `EMPTY_BUCKET`.
    start_indices: Vec<u32>,
    /// Sort buffer, kept between rebuilds.
    scratch: Vec<SpatialLookupEntry>,
    /// Particle count of the last successful rebuild.
    built_for: Option<usize>,
}

impl SpatialHash {
    /// Create an empty (unbuilt) spatial hash.
    ///
    /// Fails with [`Error::InvalidParam`] unless `cell_size` is a positive
    /// finite number.
    pub fn new(cell_size: f32) -> Result<Self> {
        Self::with_capacity(cell_size, 0)
    }

    /// Create an empty spatial hash with storage for `capacity` particles.
    pub fn with_capacity(cell_size: f32, capacity: usize) -> Result<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Error::InvalidParam(format!(
                "cell_size must be > 0, got {cell_size}"
            )));
        }
        Ok(Self {
            cell_size,
            entries: Vec::with_capacity(capacity),
            start_indices: Vec::with_capacity(capacity),
            scratch: Vec::with_capacity(capacity),
            built_for: None,
        })
    }

    /// Cell side length (the influence radius).
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// `true` if the last successful rebuild covered exactly `n` particles.
    pub fn is_built_for(&self, n: usize) -> bool {
        self.built_for == Some(n)
    }

    /// Mark the index as unusable until the next rebuild.
    pub fn invalidate(&mut self) {
        self.built_for = None;
    }

    /// Sorted lookup table from the last rebuild.
    pub fn entries(&self) -> &[SpatialLookupEntry] {
        &self.entries
    }

    /// Bucket start-index table from the last rebuild.
    pub fn start_indices(&self) -> &[u32] {
        &self.start_indices
    }

    /// Rebuild the index from current particle positions.
    ///
    /// The two slices must have the same length (one entry per particle).
    /// On error the index is left invalidated.
    pub fn rebuild(&mut self, x: &[f32], y: &[f32]) -> Result<()> {
        let n = x.len();
        debug_assert_eq!(n, y.len());
        self.built_for = None;

        // --- 1. Cell and bucket key for each particle ---
        self.entries.clear();
        if n > 0 {
            let cell_size = self.cell_size;
            self.entries.extend((0..n).map(|i| {
                let (cx, cy) = position_to_cell(x[i], y[i], cell_size);
                SpatialLookupEntry {
                    particle: i as u32,
                    key: bucket_key(hash_cell(cx, cy), n),
                }
            }));
        }

        // --- 2. Stable sort by key ---
        radix::radix_sort_by_key(&mut self.entries, &mut self.scratch, |e| e.key);
        if let Some(index) = radix::first_unsorted(&self.entries, |e| e.key) {
            let err = Error::IndexCorrupted {
                index,
                previous: self.entries[index - 1].key,
                key: self.entries[index].key,
            };
            tracing::error!("{err}");
            return Err(err);
        }

        // --- 3. Reset start indices ---
        self.start_indices.clear();
        self.start_indices.resize(n, EMPTY_BUCKET);

        // --- 4. Record the first position of every key ---
        for (s, entry) in self.entries.iter().enumerate() {
            if s == 0 || self.entries[s - 1].key != entry.key {
                self.start_indices[entry.key as usize] = s as u32;
            }
        }

        self.built_for = Some(n);
        tracing::trace!(particles = n, "spatial hash rebuilt");
        Ok(())
    }

    /// The contiguous run of entries with bucket key `key` (empty if none).
    pub fn bucket(&self, key: u32) -> &[SpatialLookupEntry] {
        let start = match self.start_indices.get(key as usize) {
            Some(&s) if s != EMPTY_BUCKET => s as usize,
            _ => return &[],
        };
        let len = self.entries[start..]
            .iter()
            .take_while(|e| e.key == key)
            .count();
        &self.entries[start..start + len]
    }

    /// Invoke `f` with every particle whose cell is in the 3x3 block around
    /// `point`. No distance filtering; each particle is reported at most once.
    pub fn for_each_candidate<F>(&self, point: [f32; 2], mut f: F)
    where
        F: FnMut(usize),
    {
        let n = self.start_indices.len();
        if n == 0 {
            return;
        }
        let (cx, cy) = position_to_cell(point[0], point[1], self.cell_size);

        // Aliased cells can share a key; scan each distinct key once.
        let mut seen = [0u32; 9];
        let mut seen_len = 0;
        for dx in -1i32..=1 {
            for dy in -1i32..=1 {
                let key = bucket_key(hash_cell(cx.wrapping_add(dx), cy.wrapping_add(dy)), n);
                if seen[..seen_len].contains(&key) {
                    continue;
                }
                seen[seen_len] = key;
                seen_len += 1;

                for entry in self.bucket(key) {
                    f(entry.particle as usize);
                }
            }
        }
    }

    /// Invoke `f(j, distance)` for every particle `j` strictly closer than
    /// `radius` to `point`. `radius` must not exceed the cell size.
    pub fn for_each_neighbor<F>(&self, point: [f32; 2], x: &[f32], y: &[f32], radius: f32, mut f: F)
    where
        F: FnMut(usize, f32),
    {
        debug_assert!(radius <= self.cell_size, "query radius exceeds cell size");
        let radius_sq = radius * radius;
        self.for_each_candidate(point, |j| {
            let dx = x[j] - point[0];
            let dy = y[j] - point[1];
            let dist_sq = dx * dx + dy * dy;
            if dist_sq < radius_sq {
                f(j, dist_sq.sqrt());
            }
        });
    }
}

/// Where neighbor candidates come from.
#[derive(Debug, Clone, Copy)]
pub enum NeighborSearch<'a> {
    /// Use a built spatial hash.
    Grid(&'a SpatialHash),
    /// Scan every particle (used before any index exists).
    BruteForce,
}

impl<'a> NeighborSearch<'a> {
    /// Grid search if `grid` is valid for `n` particles, otherwise a full scan.
    pub fn for_particles(grid: &'a SpatialHash, n: usize) -> Self {
        if grid.is_built_for(n) {
            NeighborSearch::Grid(grid)
        } else {
            NeighborSearch::BruteForce
        }
    }

    /// Invoke `f(j, distance)` for every particle strictly within `radius`
    /// of `point`, including a particle located at `point` itself.
    #[inline]
    pub fn for_each_within<F>(self, point: [f32; 2], x: &[f32], y: &[f32], radius: f32, mut f: F)
    where
        F: FnMut(usize, f32),
    {
        match self {
            NeighborSearch::Grid(grid) => grid.for_each_neighbor(point, x, y, radius, f),
            NeighborSearch::BruteForce => {
                let radius_sq = radius * radius;
                for j in 0..x.len() {
                    let dx = x[j] - point[0];
                    let dy = y[j] - point[1];
                    let dist_sq = dx * dx + dy * dy;
                    if dist_sq < radius_sq {
                        f(j, dist_sq.sqrt());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(grid: &SpatialHash, point: [f32; 2], x: &[f32], y: &[f32]) -> Vec<usize> {
        let mut found = Vec::new();
        grid.for_each_neighbor(point, x, y, grid.cell_size(), |j, _| found.push(j));
        found.sort_unstable();
        found
    }

    #[test]
    fn cells_floor_toward_negative_infinity() {
        assert_eq!(position_to_cell(0.5, 0.5, 1.0), (0, 0));
        assert_eq!(position_to_cell(1.5, 2.0, 1.0), (1, 2));
        assert_eq!(position_to_cell(-0.1, -1.5, 1.0), (-1, -2));
    }

    #[test]
    fn hash_is_order_sensitive() {
        assert_ne!(hash_cell(1, 2), hash_cell(2, 1));
        assert_eq!(hash_cell(0, 0), 0);
        // Negative coordinates wrap instead of overflowing
        let _ = hash_cell(-1, i32::MIN);
    }

    #[test]
    fn bucket_key_is_in_range() {
        for n in 1..50usize {
            for h in [0u32, 1, 17, 9_737_333, u32::MAX] {
                assert!((bucket_key(h, n) as usize) < n);
            }
        }
    }

    #[test]
    fn rejects_bad_cell_size() {
        for cell in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(
                matches!(SpatialHash::new(cell), Err(Error::InvalidParam(_))),
                "cell_size {cell} accepted"
            );
        }
        assert!(SpatialHash::with_capacity(2.0, 16).is_ok());
    }

    #[test]
    fn unbuilt_grid_finds_nothing() {
        let grid = SpatialHash::new(1.0).unwrap();
        assert!(!grid.is_built_for(0));
        let mut count = 0;
        grid.for_each_candidate([0.0, 0.0], |_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn empty_rebuild_is_ok() -> Result<()> {
        let mut grid = SpatialHash::new(1.0).unwrap();
        grid.rebuild(&[], &[])?;
        assert!(grid.is_built_for(0));
        assert!(grid.entries().is_empty());
        Ok(())
    }

    #[test]
    fn rebuild_sorts_and_indexes() -> Result<()> {
        let x = [0.5, 3.2, 0.7, 9.9, -4.0, 3.3, 0.1];
        let y = [0.5, 1.1, 0.2, 9.9, 2.0, 1.0, 0.9];
        let mut grid = SpatialHash::new(1.0).unwrap();
        grid.rebuild(&x, &y)?;
        assert!(grid.is_built_for(x.len()));

        let entries = grid.entries();
        assert_eq!(entries.len(), x.len());
        assert!(entries.windows(2).all(|w| w[0].key <= w[1].key));

        for (k, &s) in grid.start_indices().iter().enumerate() {
            if s == EMPTY_BUCKET {
                assert!(entries.iter().all(|e| e.key as usize != k));
                continue;
            }
            let s = s as usize;
            assert_eq!(entries[s].key as usize, k);
            assert!(s == 0 || entries[s - 1].key as usize != k);
            let run = grid.bucket(k as u32).len();
            let occupancy = entries.iter().filter(|e| e.key as usize == k).count();
            assert_eq!(run, occupancy);
        }
        Ok(())
    }

    #[test]
    fn two_close_particles() -> Result<()> {
        let x = [0.5, 0.51];
        let y = [0.5, 0.5];
        let mut grid = SpatialHash::new(0.2).unwrap();
        grid.rebuild(&x, &y)?;
        assert_eq!(collect(&grid, [x[0], y[0]], &x, &y), vec![0, 1]);
        Ok(())
    }

    #[test]
    fn two_far_particles() -> Result<()> {
        let x = [0.1, 0.9];
        let y = [0.1, 0.9];
        let mut grid = SpatialHash::new(0.2).unwrap();
        grid.rebuild(&x, &y)?;
        assert_eq!(collect(&grid, [x[0], y[0]], &x, &y), vec![0]);
        Ok(())
    }

    #[test]
    fn particles_across_cell_boundary() -> Result<()> {
        let x = [0.19, 0.21];
        let y = [0.5, 0.5];
        let mut grid = SpatialHash::new(0.2).unwrap();
        grid.rebuild(&x, &y)?;
        assert_eq!(collect(&grid, [x[0], y[0]], &x, &y), vec![0, 1]);
        Ok(())
    }

    #[test]
    fn adjacent_cell_but_outside_radius_is_filtered() -> Result<()> {
        // Diagonal neighbor cell, distance ~0.28 > 0.2
        let x = [0.01, 0.21];
        let y = [0.01, 0.21];
        let mut grid = SpatialHash::new(0.2).unwrap();
        grid.rebuild(&x, &y)?;
        assert_eq!(collect(&grid, [x[0], y[0]], &x, &y), vec![0]);
        Ok(())
    }

    #[test]
    fn single_bucket_table_reports_each_particle_once() -> Result<()> {
        // n = 1: every cell aliases to key 0
        let x = [0.5];
        let y = [0.5];
        let mut grid = SpatialHash::new(1.0).unwrap();
        grid.rebuild(&x, &y)?;
        let mut hits = 0;
        grid.for_each_candidate([0.5, 0.5], |_| hits += 1);
        assert_eq!(hits, 1);
        Ok(())
    }

    #[test]
    fn aliased_far_particle_is_filtered() -> Result<()> {
        // Two particles, table size 2: far-apart cells collide often.
        let x = [0.5, 50.5];
        let y = [0.5, 70.5];
        let mut grid = SpatialHash::new(1.0).unwrap();
        grid.rebuild(&x, &y)?;
        assert_eq!(collect(&grid, [0.5, 0.5], &x, &y), vec![0]);
        Ok(())
    }

    #[test]
    fn brute_force_matches_grid() -> Result<()> {
        let x: Vec<f32> = (0..40).map(|i| (i as f32 * 0.37) % 3.0).collect();
        let y: Vec<f32> = (0..40).map(|i| (i as f32 * 0.91) % 3.0).collect();
        let mut grid = SpatialHash::new(0.5).unwrap();
        grid.rebuild(&x, &y)?;
        for &p in &[[0.0, 0.0], [1.5, 1.5], [2.9, 0.1], [-0.3, 1.0]] {
            let mut a = Vec::new();
            NeighborSearch::Grid(&grid).for_each_within(p, &x, &y, 0.5, |j, _| a.push(j));
            let mut b = Vec::new();
            NeighborSearch::BruteForce.for_each_within(p, &x, &y, 0.5, |j, _| b.push(j));
            a.sort_unstable();
            b.sort_unstable();
            assert_eq!(a, b, "point {p:?}");
        }
        Ok(())
    }

    #[test]
    fn search_selection_follows_particle_count() -> Result<()> {
        let mut grid = SpatialHash::new(1.0).unwrap();
        grid.rebuild(&[0.0, 1.0], &[0.0, 1.0])?;
        assert!(matches!(NeighborSearch::for_particles(&grid, 2), NeighborSearch::Grid(_)));
        assert!(matches!(NeighborSearch::for_particles(&grid, 3), NeighborSearch::BruteForce));
        grid.invalidate();
        assert!(matches!(NeighborSearch::for_particles(&grid, 2), NeighborSearch::BruteForce));
        Ok(())
    }
}
