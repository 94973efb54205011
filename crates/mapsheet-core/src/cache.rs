//! `TileCache`: a bounded-size working set of resident tiles over a
//! potentially much larger logical `TileGrid`. LRU-by-`last_touch`-tick,
//! tile-count-budgeted, with a `dirty`-bit write-back and a `sell_by`
//! age threshold for `minimize_memory`.

use std::num::NonZeroUsize;

use lru::LruCache;
use mapsheet_common::error::Result;
use storage::BackingStore;
use tracing::{debug, warn};

use crate::algorithm::Algorithm;
use crate::persistence::TileCodec;
use crate::tile::{NodeHandle, Tile, TileGrid};

/// Running counters for cache diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub flush_writes: u64,
}

/// The bounded working set of resident `Tile`s. Recency order (for
/// capacity eviction) is kept by the underlying `LruCache`; the
/// `sell_by` sweep in `minimize_memory` instead reasons about each
/// tile's `last_touch` clock tick, since a tile can be the single
/// most-recently-used entry and still be arbitrarily stale in
/// wall/ingest time.
pub struct TileCache<S: BackingStore> {
    grid: TileGrid,
    codec: TileCodec,
    store: S,
    sell_by: u64,
    resident: LruCache<(u32, u32), Tile>,
    clock: u64,
    stats: CacheStats,
}

impl<S: BackingStore> TileCache<S> {
    pub fn new(grid: TileGrid, algorithm: Algorithm, max_hypotheses: u32, binned_max_slots: u32, store: S, capacity: usize, sell_by: u64) -> Self {
        Self {
            grid,
            codec: TileCodec {
                algorithm,
                max_hypotheses,
                binned_max_slots,
            },
            store,
            sell_by,
            resident: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()),
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Load a tile from the backing store on miss, evicting the
    /// least-recently-used resident tile if already at capacity.
    fn ensure_resident(&mut self, tc: u32, tr: u32) -> Result<()> {
        if self.resident.contains(&(tc, tr)) {
            self.stats.hits += 1;
            return Ok(());
        }
        self.stats.misses += 1;

        if self.resident.len() >= self.resident.cap().get() {
            self.evict_one()?;
        }

        let (active_cols, active_rows) = self.grid.active_extent(tc, tr);
        let tile = match self.store.read_tile(tc, tr)? {
            Some(bytes) => {
                debug!(tc, tr, "loading tile from backing store");
                self.codec.decode(
                    &bytes,
                    tc,
                    tr,
                    self.grid.tile_width,
                    self.grid.tile_height,
                    active_cols,
                    active_rows,
                )?
            }
            None => {
                debug!(tc, tr, "creating tile lazily on first touch");
                Tile::new(
                    self.codec.algorithm,
                    tc,
                    tr,
                    self.grid.tile_width,
                    self.grid.tile_height,
                    active_cols,
                    active_rows,
                )
            }
        };
        self.resident.put((tc, tr), tile);
        Ok(())
    }

    /// Evict the least-recently-used resident tile. Dirty tiles are
    /// flushed first; write failure is retried once, then surfaced as
    /// `MapSheetError::Persistence`.
    fn evict_one(&mut self) -> Result<()> {
        let Some((coord, tile)) = self.resident.pop_lru() else {
            return Ok(());
        };
        if tile.dirty {
            self.write_through(&tile).or_else(|e| {
                warn!(tc = coord.0, tr = coord.1, error = %e, "tile flush failed on eviction, retrying once");
                self.write_through(&tile)
            })?;
        }
        self.stats.evictions += 1;
        Ok(())
    }

    fn write_through(&mut self, tile: &Tile) -> Result<()> {
        let bytes = self.codec.encode(tile)?;
        self.store.write_tile(tile.tc, tile.tr, &bytes)?;
        self.stats.flush_writes += 1;
        Ok(())
    }

    /// A mutable handle to node `(col, row)`, loading its tile on miss
    /// and marking it dirty.
    pub fn get_node_mut(&mut self, col: u32, row: u32) -> Result<NodeHandle<'_>> {
        let (tc, tr, lc, lr) = self.grid.locate(col, row);
        self.ensure_resident(tc, tr)?;
        let tick = self.tick();
        let tile = self.resident.get_mut(&(tc, tr)).expect("just made resident");
        tile.last_touch = tick;
        tile.dirty = true;
        Ok(NodeHandle {
            state: tile.node_mut(lc, lr),
        })
    }

    /// A read-only handle to node `(col, row)` with the same residency
    /// semantics as `get_node_mut`, but without marking the tile dirty.
    pub fn get_node(&mut self, col: u32, row: u32) -> Result<&crate::node::NodeState> {
        let (tc, tr, lc, lr) = self.grid.locate(col, row);
        self.ensure_resident(tc, tr)?;
        let tick = self.tick();
        let tile = self.resident.get_mut(&(tc, tr)).expect("just made resident");
        tile.last_touch = tick;
        Ok(tile.node(lc, lr))
    }

    /// Write every dirty resident tile through to the backing store and
    /// clear their dirty bits; a durability barrier. A
    /// second call in succession with no intervening updates performs
    /// no additional disk writes.
    pub fn flush(&mut self) -> Result<()> {
        let dirty: Vec<(u32, u32)> = self
            .resident
            .iter()
            .filter(|(_, t)| t.dirty)
            .map(|(&c, _)| c)
            .collect();
        for coord in dirty {
            let tile = self.resident.peek(&coord).expect("coord came from resident map").clone();
            self.write_through(&tile)?;
            self.resident.peek_mut(&coord).unwrap().dirty = false;
        }
        Ok(())
    }

    /// Write dirty tiles through, then evict every resident tile whose
    /// `last_touch` is older than `sell_by` clock ticks. Residency may drop to zero.
    pub fn minimize_memory(&mut self) -> Result<()> {
        self.flush()?;
        let now = self.clock;
        let stale: Vec<(u32, u32)> = self
            .resident
            .iter()
            .filter(|(_, t)| now.saturating_sub(t.last_touch) >= self.sell_by)
            .map(|(&c, _)| c)
            .collect();
        for coord in stale {
            self.resident.pop(&coord);
        }
        Ok(())
    }

    /// Iterate every tile in the logical grid, loading lazily, calling
    /// `f` in row-major north-to-south order; visited tiles are marked
    /// with the current clock.
    pub fn snapshot_visit(&mut self, mut f: impl FnMut(&Tile)) -> Result<()> {
        let coords: Vec<(u32, u32)> = self.grid.iter_tiles().collect();
        for (tc, tr) in coords {
            self.ensure_resident(tc, tr)?;
            let tick = self.tick();
            let tile = self.resident.get_mut(&(tc, tr)).expect("just made resident");
            tile.last_touch = tick;
            f(tile);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::DirectoryBackingStore;

    fn cache(capacity: usize) -> TileCache<DirectoryBackingStore> {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryBackingStore::open(dir.path()).unwrap();
        let grid = TileGrid::new(4, 4, 16, 16);
        TileCache::new(grid, Algorithm::Hypothesis, 8, 32, store, capacity, 1000)
    }

    #[test]
    fn never_holds_more_than_capacity_tiles() {
        let mut c = cache(1);
        for tc in 0..4u32 {
            c.get_node_mut(tc * 4, 0).unwrap();
            assert!(c.resident_count() <= 1);
        }
    }

    #[test]
    fn flush_twice_writes_only_once() {
        let mut c = cache(4);
        c.get_node_mut(0, 0).unwrap();
        c.flush().unwrap();
        let writes_after_first = c.stats().flush_writes;
        c.flush().unwrap();
        assert_eq!(c.stats().flush_writes, writes_after_first);
    }

    #[test]
    fn minimize_memory_evicts_stale_tiles() {
        let mut c = cache(16);
        c.get_node_mut(0, 0).unwrap();
        c.sell_by = 0;
        c.minimize_memory().unwrap();
        assert_eq!(c.resident_count(), 0);
    }
}
