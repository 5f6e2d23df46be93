use rand::prelude::*;

use super::{unit_size_for, SuffixIndex, INDEX_MAGIC};

/// Longest prefix match found by trying every suffix.
fn naive_search(data: &[u8], needle: &[u8]) -> usize {
    (0..data.len())
        .map(|i| super::lcp(&data[i..], needle))
        .max()
        .unwrap_or(0)
}

#[test]
fn search_finds_longest_prefix() {
    for &n in [0, 1, 2, 7, 64, 256, 1024].iter() {
        let data = cyclic_bytes(n, 13);
        let index = SuffixIndex::build(&data);
        assert_eq!(index.len(), n);

        for &t in [0usize, 1, 3, 7, 50, 200, 900].iter().filter(|&&t| t <= n) {
            let needle = &data[t..];
            let (pos, len) = index.prefix_search(&data, needle);
            assert_eq!(len, naive_search(&data, needle));
            assert_eq!(&data[pos - 1..pos - 1 + len], &needle[..len]);
        }
    }
}

#[test]
fn search_match_is_maximal() {
    let mut rng = thread_rng();
    for _ in 0..50 {
        let n = rng.gen_range(1..400);
        let data = cyclic_bytes(n, rng.gen_range(1..32));
        let index = SuffixIndex::build(&data);

        let mut needle = vec![0u8; rng.gen_range(0..64)];
        rng.fill(&mut needle[..]);

        let (pos, len) = index.prefix_search(&data, &needle);
        assert_eq!(len, naive_search(&data, &needle));
        assert_eq!(&data[pos - 1..pos - 1 + len], &needle[..len]);

        // The match cannot be extended in place.
        if pos - 1 + len < data.len() && len < needle.len() {
            assert_ne!(data[pos - 1 + len], needle[len]);
        }
    }
}

#[test]
fn search_empty_inputs() {
    let index = SuffixIndex::build(b"");
    assert!(index.is_empty());
    assert_eq!(index.prefix_search(b"", b"whatever"), (1, 0));

    let data = b"abcdef";
    let index = SuffixIndex::build(data);
    let (_, len) = index.prefix_search(data, b"");
    assert_eq!(len, 0);
}

#[test]
fn unit_sizes() {
    assert_eq!(unit_size_for(0), 1);
    assert_eq!(unit_size_for(1), 1);
    assert_eq!(unit_size_for(256), 1);
    assert_eq!(unit_size_for(257), 2);
    assert_eq!(unit_size_for(0x10000), 2);
    assert_eq!(unit_size_for(0x10000 + 1), 4);
}

#[test]
fn persistence_round_trip() {
    for &n in [0, 1, 200, 300, 1000].iter() {
        let data = cyclic_bytes(n, 17);
        let index = SuffixIndex::build(&data);

        let mut blob = Vec::new();
        index.write_to(&mut blob).unwrap();
        assert_eq!(&blob[..13], INDEX_MAGIC);
        assert_eq!(blob[13], index.hint_unit_size());
        assert_eq!(
            blob.len(),
            14 + n * index.hint_unit_size() as usize
        );

        let reloaded = SuffixIndex::read_from(&blob[..], data.len()).unwrap();
        assert_eq!(reloaded.sa, index.sa);
    }
}

#[test]
fn rejects_malformed_index() {
    let data = cyclic_bytes(100, 9);
    let index = SuffixIndex::build(&data);
    let mut blob = Vec::new();
    index.write_to(&mut blob).unwrap();

    // Bad magic.
    let mut bad = blob.clone();
    bad[0] ^= 0x20;
    assert!(SuffixIndex::read_from(&bad[..], data.len()).is_err());

    // Unit size outside {1, 2, 4, 8}.
    let mut bad = blob.clone();
    bad[13] = 3;
    assert!(SuffixIndex::read_from(&bad[..], data.len()).is_err());

    // Truncated element list.
    let bad = &blob[..blob.len() - 1];
    assert!(SuffixIndex::read_from(bad, data.len()).is_err());

    // Offset beyond the data (elements are one byte wide here).
    let mut bad = blob;
    bad[14] = 0xff;
    assert!(SuffixIndex::read_from(&bad[..], data.len()).is_err());
}

/// Repetitive sample data with some noise, so suffixes share long
/// prefixes and the lcp counters actually engage.
fn cyclic_bytes(n: usize, cycle: usize) -> Vec<u8> {
    let mut rng = thread_rng();
    let cycle = Ord::max(cycle, 1);
    let mut pat = vec![0u8; cycle];
    rng.fill(&mut pat[..]);

    let mut bytes = Vec::with_capacity(n);
    while bytes.len() < n {
        let k = Ord::min(cycle, n - bytes.len());
        bytes.extend_from_slice(&pat[..k]);
        if rng.gen_bool(0.2) {
            let i = bytes.len() - 1;
            bytes[i] = rng.gen();
        }
    }
    bytes
}
