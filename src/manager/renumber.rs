// src/manager/renumber.rs

//! Index renumbering after a candidate leaves the batch
//!
//! Every per-candidate cache is keyed by the candidate's position. When the
//! candidate at `removed` goes away its entry is dropped and every later key
//! moves down by one.

use std::collections::BTreeMap;

/// Renumber an index-keyed map
pub fn shift_keys<V>(map: &mut BTreeMap<usize, V>, removed: usize) {
    let tail = map.split_off(&removed);
    for (key, value) in tail {
        if key > removed {
            map.insert(key - 1, value);
        }
    }
}

/// Renumber a list of indices, keeping its order
pub fn shift_indices(indices: &mut Vec<usize>, removed: usize) {
    indices.retain(|&i| i != removed);
    for i in indices.iter_mut() {
        if *i > removed {
            *i -= 1;
        }
    }
}

/// Where an index ends up, `None` if it was the one removed
pub fn shift_index(index: usize, removed: usize) -> Option<usize> {
    match index.cmp(&removed) {
        std::cmp::Ordering::Less => Some(index),
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Greater => Some(index - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_keys() {
        let mut map: BTreeMap<usize, &str> = [(0, "a"), (1, "b"), (2, "c"), (4, "e")].into_iter().collect();
        shift_keys(&mut map, 1);
        assert_eq!(map.into_iter().collect::<Vec<_>>(), vec![(0, "a"), (1, "c"), (3, "e")]);
    }

    #[test]
    fn test_shift_keys_missing_removed_key() {
        // Later keys move down even when the removed index had no entry
        let mut map: BTreeMap<usize, u8> = [(0, 0), (3, 3)].into_iter().collect();
        shift_keys(&mut map, 1);
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_shift_indices() {
        let mut indices = vec![3, 0, 2, 5];
        shift_indices(&mut indices, 2);
        assert_eq!(indices, vec![2, 0, 4]);
    }

    #[test]
    fn test_shift_index() {
        assert_eq!(shift_index(0, 1), Some(0));
        assert_eq!(shift_index(1, 1), None);
        assert_eq!(shift_index(2, 1), Some(1));
    }
}
