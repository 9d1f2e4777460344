//! Duplicate detection within a single collection
//!
//! Albums sharing an identity key are one album. The most recently added
//! copy is canonical; when timestamps tie (or are both missing) the copy that
//! appears first in the input wins. Missing timestamps count as oldest.

use std::collections::{HashMap, HashSet};

use super::identity::AlbumIdentityKey;
use crate::library::Album;

/// Superseded (non-canonical) albums in `albums`
///
/// Groups are reported in order of first appearance; within a group the
/// superseded copies are oldest first.
pub fn find_duplicates(albums: &[Album]) -> Vec<Album> {
    superseded_indices(albums)
        .into_iter()
        .map(|idx| albums[idx].clone())
        .collect()
}

/// The canonical albums of `albums`, one per identity key, in input order
pub fn canonical_albums(albums: &[Album]) -> Vec<&Album> {
    let superseded: HashSet<usize> = superseded_indices(albums).into_iter().collect();
    albums
        .iter()
        .enumerate()
        .filter(|(idx, _)| !superseded.contains(idx))
        .map(|(_, album)| album)
        .collect()
}

fn superseded_indices(albums: &[Album]) -> Vec<usize> {
    let mut groups: HashMap<AlbumIdentityKey, Vec<usize>> = HashMap::new();
    let mut order: Vec<AlbumIdentityKey> = Vec::new();

    for (idx, album) in albums.iter().enumerate() {
        let key = album.identity_key();
        let group = groups.entry(key.clone()).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(idx);
    }

    let mut superseded = Vec::new();
    for key in &order {
        let group = &groups[key];
        if group.len() < 2 {
            continue;
        }

        // Newest wins; among equal timestamps the lowest index wins.
        let canonical = group
            .iter()
            .copied()
            .max_by(|&a, &b| {
                albums[a]
                    .added_at
                    .cmp(&albums[b].added_at)
                    .then(b.cmp(&a))
            })
            .unwrap_or(group[0]);

        let mut rest: Vec<usize> = group.iter().copied().filter(|&i| i != canonical).collect();
        rest.sort_by(|&a, &b| {
            albums[a]
                .added_at
                .cmp(&albums[b].added_at)
                .then(a.cmp(&b))
        });
        superseded.extend(rest);
    }

    superseded
}
