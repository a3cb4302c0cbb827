//! Reader cache capacity and eviction tests.

use std::path::{Path, PathBuf};

use frameseek::{FrameSeekError, ReaderCache};

fn path(name: &str) -> PathBuf {
    PathBuf::from(format!("/videos/{name}.mp4"))
}

#[test]
fn capacity_is_never_exceeded() {
    let mut cache: ReaderCache<u32> = ReaderCache::new(3);

    for i in 0..10 {
        let key = path(&i.to_string());
        cache.find(&key, Some(i)).expect("insert");
        assert!(cache.len() <= 3);
    }
    assert_eq!(cache.len(), 3);
}

#[test]
fn not_full_tracks_remaining_room() {
    let mut cache: ReaderCache<u32> = ReaderCache::new(2);
    assert!(cache.not_full());
    assert!(cache.is_empty());

    cache.find(&path("a"), Some(1)).expect("insert a");
    assert!(cache.not_full());

    cache.find(&path("b"), Some(2)).expect("insert b");
    assert!(!cache.not_full());
    assert_eq!(cache.len(), 2);
}

#[test]
fn contains_reflects_cached_paths() {
    let mut cache: ReaderCache<u32> = ReaderCache::new(2);
    cache.find(&path("a"), Some(1)).expect("insert");

    assert!(cache.contains(&path("a")));
    assert!(!cache.contains(&path("b")));
    assert!(!cache.contains(Path::new("/videos/a.mp4.bak")));
}

#[test]
fn hit_returns_the_cached_handle() {
    let mut cache: ReaderCache<u32> = ReaderCache::new(2);
    cache.find(&path("a"), Some(7)).expect("insert");

    // A hit ignores the fresh handle and returns the cached one.
    let value = cache.find(&path("a"), Some(99)).expect("hit");
    assert_eq!(*value, 7);

    // The handle is mutable in place.
    *value = 8;
    assert_eq!(*cache.find(&path("a"), None).expect("hit"), 8);
}

#[test]
fn miss_without_a_fresh_handle_fails() {
    let mut cache: ReaderCache<u32> = ReaderCache::new(2);
    assert!(matches!(
        cache.find(&path("missing"), None),
        Err(FrameSeekError::Configuration(_))
    ));
}

#[test]
fn eviction_prefers_the_least_frequently_used() {
    let mut cache: ReaderCache<u32> = ReaderCache::new(2);
    cache.find(&path("hot"), Some(1)).expect("insert hot");
    cache.find(&path("cold"), Some(2)).expect("insert cold");

    // Three extra hits on "hot".
    for _ in 0..3 {
        cache.find(&path("hot"), None).expect("hit");
    }

    cache.find(&path("new"), Some(3)).expect("insert new");

    assert!(cache.contains(&path("hot")));
    assert!(cache.contains(&path("new")));
    assert!(!cache.contains(&path("cold")));
}

#[test]
fn recency_breaks_frequency_ties() {
    let mut cache: ReaderCache<u32> = ReaderCache::new(2);
    cache.find(&path("older"), Some(1)).expect("insert older");
    cache.find(&path("newer"), Some(2)).expect("insert newer");

    // Equal access counts; "older" was touched longer ago.
    cache.find(&path("third"), Some(3)).expect("insert third");

    assert!(!cache.contains(&path("older")));
    assert!(cache.contains(&path("newer")));
    assert!(cache.contains(&path("third")));
}

#[test]
fn clear_all_drops_every_handle() {
    let mut cache: ReaderCache<u32> = ReaderCache::new(4);
    for name in ["a", "b", "c"] {
        cache.find(&path(name), Some(0)).expect("insert");
    }

    cache.clear_all();
    assert!(cache.is_empty());
    assert!(!cache.contains(&path("a")));
    assert!(cache.not_full());
}

#[test]
fn zero_capacity_clamps_to_one() {
    let mut cache: ReaderCache<u32> = ReaderCache::new(0);
    assert_eq!(cache.capacity(), 1);
    cache.find(&path("only"), Some(1)).expect("insert");
    assert_eq!(cache.len(), 1);
}
