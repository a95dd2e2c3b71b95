// Copyright 2026 atrium Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use hashbrown::HashMap;

use atrium_common::strict_assert;

/// Position index: ordering of live items for eviction.
///
/// Positions are stamped from a monotonically increasing counter and never reused. The next-to-delete cursor only
/// moves forward, every live position is at or after it, so finding the oldest item is amortized O(1).
#[derive(Debug)]
pub struct Indexer<K> {
    positions: HashMap<u64, K>,
    counter: u64,
    cursor: u64,
}

impl<K> Default for Indexer<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Indexer<K> {
    /// Create an empty position index.
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
            counter: 1,
            cursor: 1,
        }
    }

    /// Take the next unused position.
    pub fn next(&mut self) -> u64 {
        let position = self.counter;
        self.counter += 1;
        position
    }

    /// Register `key` at a position taken from [`Indexer::next`].
    pub fn insert(&mut self, position: u64, key: K) {
        strict_assert!(position >= self.cursor && position < self.counter);
        let old = self.positions.insert(position, key);
        strict_assert!(old.is_none(), "position {position} reused");
    }

    /// Move the key at `from` to a fresh position and return it.
    pub fn refresh(&mut self, from: u64) -> u64 {
        let to = self.next();
        let key = self.positions.remove(&from);
        strict_assert!(key.is_some(), "refresh of unknown position {from}");
        if let Some(key) = key {
            self.insert(to, key);
        }
        to
    }

    /// Remove the key at `position`.
    pub fn remove(&mut self, position: u64) -> Option<K> {
        self.positions.remove(&position)
    }

    /// Remove and return the oldest surviving entry.
    pub fn pop_oldest(&mut self) -> Option<(u64, K)> {
        if self.positions.is_empty() {
            return None;
        }
        while self.cursor < self.counter {
            let position = self.cursor;
            self.cursor += 1;
            if let Some(key) = self.positions.remove(&position) {
                return Some((position, key));
            }
        }
        strict_assert!(self.positions.is_empty(), "live position behind the cursor");
        None
    }

    /// Live entry count.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if there is no live entry.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Key at `position`, if live.
    pub fn get(&self, position: u64) -> Option<&K> {
        self.positions.get(&position)
    }

    /// Next-to-delete cursor.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(indexer: &mut Indexer<&'static str>, key: &'static str) -> u64 {
        let position = indexer.next();
        indexer.insert(position, key);
        position
    }

    #[test]
    fn test_positions_are_monotonic() {
        let mut indexer = Indexer::new();
        let a = push(&mut indexer, "a");
        let b = push(&mut indexer, "b");
        let a2 = indexer.refresh(a);
        assert!(a < b && b < a2);
        assert_eq!(indexer.len(), 2);
        assert_eq!(indexer.get(a), None);
        assert_eq!(indexer.get(a2), Some(&"a"));
    }

    #[test]
    fn test_pop_oldest_skips_refreshed() {
        let mut indexer = Indexer::new();
        let a = push(&mut indexer, "a");
        push(&mut indexer, "b");
        push(&mut indexer, "c");
        indexer.refresh(a);

        assert_eq!(indexer.pop_oldest().map(|(_, k)| k), Some("b"));
        assert_eq!(indexer.pop_oldest().map(|(_, k)| k), Some("c"));
        assert_eq!(indexer.pop_oldest().map(|(_, k)| k), Some("a"));
        assert_eq!(indexer.pop_oldest(), None);
        assert!(indexer.is_empty());
    }

    #[test]
    fn test_cursor_only_moves_forward() {
        let mut indexer = Indexer::new();
        let a = push(&mut indexer, "a");
        let b = push(&mut indexer, "b");
        assert_eq!(indexer.cursor(), 1);

        indexer.remove(a);
        assert_eq!(indexer.pop_oldest(), Some((b, "b")));
        let cursor = indexer.cursor();
        assert_eq!(cursor, b + 1);

        let c = push(&mut indexer, "c");
        assert!(c >= cursor);
        assert_eq!(indexer.pop_oldest(), Some((c, "c")));
        assert!(indexer.cursor() > cursor);
    }
}
