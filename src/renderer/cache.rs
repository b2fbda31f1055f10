//! Bounded set of tiles holding decoded bitmaps
//!
//! Slots are reused in place: at capacity the least-recently-touched tile
//! finer than the cutoff level gives up its slot to the newcomer. Tiles
//! drawn in the last frame are never evicted.

use crate::tile::{Tile, TileKey};
use std::collections::HashMap;

/// Result of offering a freshly loaded tile to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheInsert {
    /// Took a free slot
    Added,
    /// Took the slot of the returned tile, which must now be unloaded
    Replaced(TileKey),
    /// Already cached
    Present,
    /// Full and every cached tile is on screen
    Full,
}

#[derive(Debug)]
pub struct TileCache {
    capacity: usize,
    keys: Vec<TileKey>,
}

impl TileCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            keys: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> &[TileKey] {
        &self.keys
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Whether a tile loaded now would get a slot
    pub fn has_room(&self, tiles: &HashMap<TileKey, Tile>) -> bool {
        self.keys.len() < self.capacity || self.find_victim(tiles, None).is_some()
    }

    /// Record `key` as loaded, evicting if needed. `tiles` supplies touch
    /// times and draw state; levels at or below `cutoff` are evicted only
    /// when nothing finer is evictable.
    pub fn insert(&mut self, key: TileKey, tiles: &HashMap<TileKey, Tile>, cutoff: i32) -> CacheInsert {
        if self.contains(&key) {
            return CacheInsert::Present;
        }
        if self.keys.len() < self.capacity {
            self.keys.push(key);
            return CacheInsert::Added;
        }

        let victim = self
            .find_victim(tiles, Some(cutoff))
            .or_else(|| self.find_victim(tiles, None));
        match victim {
            Some(index) => {
                let evicted = std::mem::replace(&mut self.keys[index], key);
                CacheInsert::Replaced(evicted)
            }
            None => CacheInsert::Full,
        }
    }

    /// Oldest evictable slot; deeper levels lose ties
    fn find_victim(&self, tiles: &HashMap<TileKey, Tile>, cutoff: Option<i32>) -> Option<usize> {
        let mut worst: Option<(usize, &Tile)> = None;

        for (index, key) in self.keys.iter().enumerate().rev() {
            let Some(tile) = tiles.get(key) else {
                // slot outlived its tile
                return Some(index);
            };
            if tile.being_drawn || cutoff.is_some_and(|c| tile.key.level <= c) {
                continue;
            }
            worst = match worst {
                Some((_, w))
                    if tile.last_touch_time < w.last_touch_time
                        || (tile.last_touch_time == w.last_touch_time && tile.key.level > w.key.level) =>
                {
                    Some((index, tile))
                }
                None => Some((index, tile)),
                keep => keep,
            };
        }
        worst.map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    fn tiles(specs: &[(i32, i64, f64, bool)]) -> HashMap<TileKey, Tile> {
        specs
            .iter()
            .map(|&(level, x, touched, drawn)| {
                let key = TileKey::new(level, x, 0);
                let mut tile = Tile::new(key, Rect::default(), true, None);
                tile.last_touch_time = touched;
                tile.being_drawn = drawn;
                (key, tile)
            })
            .collect()
    }

    fn filled(map: &HashMap<TileKey, Tile>, capacity: usize) -> TileCache {
        let mut cache = TileCache::new(capacity);
        let mut keys: Vec<_> = map.keys().copied().collect();
        keys.sort();
        for key in keys {
            assert_eq!(cache.insert(key, map, 8), CacheInsert::Added);
        }
        cache
    }

    #[test]
    fn test_evicts_least_recently_touched_above_cutoff() {
        let mut map = tiles(&[(10, 0, 5.0, false), (10, 1, 1.0, false), (4, 0, 0.0, false)]);
        let mut cache = filled(&map, 3);

        let newcomer = TileKey::new(11, 0, 0);
        map.insert(newcomer, Tile::new(newcomer, Rect::default(), true, None));
        assert_eq!(cache.insert(newcomer, &map, 8), CacheInsert::Replaced(TileKey::new(10, 1, 0)));
        assert_eq!(cache.len(), 3);
        assert!(cache.contains(&newcomer));
    }

    #[test]
    fn test_ties_prefer_deeper_level() {
        let mut map = tiles(&[(10, 0, 1.0, false), (12, 0, 1.0, false)]);
        let mut cache = filled(&map, 2);
        let newcomer = TileKey::new(9, 3, 0);
        map.insert(newcomer, Tile::new(newcomer, Rect::default(), true, None));
        assert_eq!(cache.insert(newcomer, &map, 8), CacheInsert::Replaced(TileKey::new(12, 0, 0)));
    }

    #[test]
    fn test_never_evicts_drawn_tiles() {
        let map = tiles(&[(10, 0, 0.0, true), (10, 1, 1.0, true)]);
        let mut cache = filled(&map, 2);
        assert!(!cache.has_room(&map));
        assert_eq!(cache.insert(TileKey::new(10, 2, 0), &map, 8), CacheInsert::Full);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_room_while_not_full_or_evictable() {
        let map = tiles(&[(10, 0, 0.0, true), (10, 1, 1.0, false)]);
        assert!(TileCache::new(3).has_room(&map));
        assert!(filled(&map, 2).has_room(&map));
    }

    #[test]
    fn test_falls_back_below_cutoff() {
        let map = tiles(&[(3, 0, 2.0, false), (2, 0, 1.0, false), (10, 0, 0.0, true)]);
        let mut cache = filled(&map, 3);
        assert_eq!(cache.insert(TileKey::new(9, 0, 0), &map, 8), CacheInsert::Replaced(TileKey::new(2, 0, 0)));
    }

    #[test]
    fn test_present_is_not_duplicated() {
        let map = tiles(&[(10, 0, 0.0, false)]);
        let mut cache = filled(&map, 4);
        assert_eq!(cache.insert(TileKey::new(10, 0, 0), &map, 8), CacheInsert::Present);
        assert_eq!(cache.len(), 1);
    }
}
