//! Difference calculation between the local and remote libraries

use serde::Serialize;
use std::collections::HashSet;

use super::apply::SyncAction;
use super::duplicates::{canonical_albums, find_duplicates};
use super::identity::AlbumIdentityKey;
use crate::library::Album;

/// Snapshot comparison of the two libraries
///
/// Built once per reconciliation run by [`compute_differences`] and never
/// modified afterwards. Counts are over canonical albums: duplicates within a
/// side are set aside first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryDifferences {
    local_collection: Vec<Album>,
    remote_collection: Vec<Album>,
    local_only_count: usize,
    remote_only_count: usize,
    both_count: usize,
    local_duplicates: Vec<Album>,
    remote_duplicates: Vec<Album>,
}

/// Compare a local and a remote collection
pub fn compute_differences(local: Vec<Album>, remote: Vec<Album>) -> LibraryDifferences {
    let local_duplicates = find_duplicates(&local);
    let remote_duplicates = find_duplicates(&remote);

    let local_keys = canonical_keys(&local);
    let remote_keys = canonical_keys(&remote);

    let both_count = local_keys.intersection(&remote_keys).count();

    LibraryDifferences {
        local_only_count: local_keys.len() - both_count,
        remote_only_count: remote_keys.len() - both_count,
        both_count,
        local_collection: local,
        remote_collection: remote,
        local_duplicates,
        remote_duplicates,
    }
}

fn canonical_keys(albums: &[Album]) -> HashSet<AlbumIdentityKey> {
    canonical_albums(albums)
        .into_iter()
        .map(Album::identity_key)
        .collect()
}

/// Canonical albums of `albums` whose key is absent from `other`
fn exclusive_albums<'a>(albums: &'a [Album], other: &[Album]) -> Vec<&'a Album> {
    let other_keys = canonical_keys(other);
    canonical_albums(albums)
        .into_iter()
        .filter(|album| !other_keys.contains(&album.identity_key()))
        .collect()
}

impl LibraryDifferences {
    pub fn local_collection(&self) -> &[Album] {
        &self.local_collection
    }

    pub fn remote_collection(&self) -> &[Album] {
        &self.remote_collection
    }

    pub fn local_only_count(&self) -> usize {
        self.local_only_count
    }

    pub fn remote_only_count(&self) -> usize {
        self.remote_only_count
    }

    pub fn both_count(&self) -> usize {
        self.both_count
    }

    pub fn local_duplicates(&self) -> &[Album] {
        &self.local_duplicates
    }

    pub fn remote_duplicates(&self) -> &[Album] {
        &self.remote_duplicates
    }

    /// Canonical local album count
    pub fn local_count(&self) -> usize {
        self.local_only_count + self.both_count
    }

    /// Canonical remote album count
    pub fn remote_count(&self) -> usize {
        self.remote_only_count + self.both_count
    }

    pub fn total_duplicates(&self) -> usize {
        self.local_duplicates.len() + self.remote_duplicates.len()
    }

    /// True when both sides already hold the same albums
    pub fn is_in_sync(&self) -> bool {
        self.local_only_count == 0 && self.remote_only_count == 0
    }

    /// Canonical local albums missing from the remote library
    pub fn local_only_albums(&self) -> Vec<&Album> {
        exclusive_albums(&self.local_collection, &self.remote_collection)
    }

    /// Canonical remote albums missing from the local library
    pub fn remote_only_albums(&self) -> Vec<&Album> {
        exclusive_albums(&self.remote_collection, &self.local_collection)
    }

    /// Library size both sides would have after applying `action`
    ///
    /// For `PreferRemote` and `PreferLocal` this is the size of the
    /// preferred side, since that side's exclusive albums are kept.
    pub fn projected_count(&self, action: SyncAction) -> usize {
        match action {
            SyncAction::Combine => self.local_only_count + self.remote_only_count + self.both_count,
            SyncAction::PreferRemote => self.remote_count(),
            SyncAction::PreferLocal => self.local_count(),
            SyncAction::Intersection => self.both_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    #[test]
    fn test_shared_album_with_different_ids() {
        let local = vec![
            Album::new("spotify-old", "Rumours", "Fleetwood Mac"),
            Album::new("b", "Unique1", "X"),
        ];
        let remote = vec![
            Album::new("spotify-new", "Rumours", "Fleetwood Mac"),
            Album::new("c", "Unique2", "Y"),
        ];

        let diff = compute_differences(local, remote);

        assert_eq!(diff.local_only_count(), 1);
        assert_eq!(diff.remote_only_count(), 1);
        assert_eq!(diff.both_count(), 1);
        assert_eq!(diff.local_only_albums()[0].name, "Unique1");
        assert_eq!(diff.remote_only_albums()[0].name, "Unique2");
    }

    #[test]
    fn test_duplicates_excluded_from_counts() {
        let t1 = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let local = vec![
            Album::new("d1", "Same", "Artist").added(t1),
            Album::new("d2", "Same", "Artist").added(t2),
            Album::new("x", "Other", "Artist"),
        ];
        let remote = vec![Album::new("r", "Same", "Artist")];

        let diff = compute_differences(local, remote);

        assert_eq!(diff.local_duplicates().len(), 1);
        assert_eq!(diff.local_duplicates()[0].id, "d1");
        assert!(diff.remote_duplicates().is_empty());
        assert_eq!(diff.both_count(), 1);
        assert_eq!(diff.local_only_count(), 1);
        assert_eq!(diff.local_collection().len(), 3);
        assert_eq!(diff.total_duplicates(), 1);
    }

    #[test]
    fn test_empty_collections() {
        let diff = compute_differences(Vec::new(), Vec::new());

        assert_eq!(diff.both_count(), 0);
        assert!(diff.is_in_sync());
        assert!(diff.local_only_albums().is_empty());
    }

    #[test]
    fn test_one_side_empty() {
        let local = vec![Album::new("a", "A", "X"), Album::new("b", "B", "X")];
        let diff = compute_differences(local, Vec::new());

        assert_eq!(diff.local_only_count(), 2);
        assert_eq!(diff.remote_only_count(), 0);
        assert!(!diff.is_in_sync());
    }

    #[test]
    fn test_projected_counts() {
        let local = vec![
            Album::new("1", "Shared", "X"),
            Album::new("2", "Local A", "X"),
            Album::new("3", "Local B", "X"),
        ];
        let remote = vec![Album::new("4", "Shared", "X"), Album::new("5", "Remote", "X")];

        let diff = compute_differences(local, remote);

        assert_eq!(diff.projected_count(SyncAction::Combine), 4);
        assert_eq!(diff.projected_count(SyncAction::PreferRemote), 2);
        assert_eq!(diff.projected_count(SyncAction::PreferLocal), 3);
        assert_eq!(diff.projected_count(SyncAction::Intersection), 1);
    }

    #[test]
    fn test_serializes_counts() {
        let diff = compute_differences(vec![Album::new("1", "A", "X")], Vec::new());
        let json = serde_json::to_value(&diff).unwrap();

        assert_eq!(json["localOnlyCount"], 1);
        assert_eq!(json["bothCount"], 0);
    }

    fn collection() -> impl Strategy<Value = Vec<Album>> {
        prop::collection::vec((0..6u8, 0..3u8, 0..4u32, any::<bool>()), 0..12).prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (title, artist, day, shout))| {
                    let mut name = format!("Album {title}");
                    if shout {
                        name = name.to_uppercase();
                    }
                    Album::new(&format!("id{i}"), &name, &format!("Artist {artist}"))
                        .added(Utc.with_ymd_and_hms(2024, 3, 1 + day, 0, 0, 0).unwrap())
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_both_count_is_symmetric(local in collection(), remote in collection()) {
            let forward = compute_differences(local.clone(), remote.clone());
            let backward = compute_differences(remote, local);

            prop_assert_eq!(forward.both_count(), backward.both_count());
            prop_assert_eq!(forward.local_only_count(), backward.remote_only_count());
        }

        #[test]
        fn prop_partition_is_complete(local in collection(), remote in collection()) {
            let distinct_local: HashSet<_> = local.iter().map(Album::identity_key).collect();
            let distinct_remote: HashSet<_> = remote.iter().map(Album::identity_key).collect();
            let local_len = local.len();

            let diff = compute_differences(local, remote);

            prop_assert_eq!(diff.local_only_count() + diff.both_count(), distinct_local.len());
            prop_assert_eq!(diff.remote_only_count() + diff.both_count(), distinct_remote.len());
            prop_assert_eq!(diff.local_duplicates().len(), local_len - distinct_local.len());
            prop_assert_eq!(diff.local_only_albums().len(), diff.local_only_count());
        }
    }
}
