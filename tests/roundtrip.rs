mod common;

use bsdelta::Format;
use common::{bsdiff, bspatch, distort, random_bytes};

const FORMATS: [Format; 2] = [Format::Classic, Format::Endsley];

#[test]
fn identity() {
    let s = b"hello world";
    for &format in FORMATS.iter() {
        let p = bsdiff(s, s, format).unwrap();
        let t = bspatch(s, &p[..], format).unwrap();
        assert_eq!(&t[..], &s[..]);
        assert_eq!(t.len(), 11);
    }
}

#[test]
fn single_byte_substitution() {
    let s = b"abcdef";
    let t = b"abcXef";
    for &format in FORMATS.iter() {
        let p = bsdiff(s, t, format).unwrap();
        assert_eq!(&bspatch(s, &p[..], format).unwrap()[..], &t[..]);
    }
}

#[test]
fn insertion() {
    let s = b"abcdef";
    let t = b"abcZZZdef";
    for &format in FORMATS.iter() {
        let p = bsdiff(s, t, format).unwrap();
        assert_eq!(&bspatch(s, &p[..], format).unwrap()[..], &t[..]);
    }
}

#[test]
fn block_move() {
    let a = random_bytes(4096);
    let b = random_bytes(4096);
    let mut s = a.clone();
    s.extend_from_slice(&b[..]);
    let mut t = b;
    t.extend_from_slice(&a[..]);

    for &format in FORMATS.iter() {
        let p = bsdiff(&s[..], &t[..], format).unwrap();
        assert!(
            p.len() < 2 * 4096,
            "patch of a pure block move should undercut the moved data ({} bytes)",
            p.len()
        );
        assert_eq!(bspatch(&s[..], &p[..], format).unwrap(), t);
    }
}

#[test]
fn empty_target() {
    for &format in FORMATS.iter() {
        let p = bsdiff(b"some source bytes", b"", format).unwrap();
        // The patch carries no controls, so it reconstructs the empty
        // target from any source.
        assert_eq!(bspatch(b"some source bytes", &p[..], format).unwrap(), b"");
        assert_eq!(bspatch(b"another source", &p[..], format).unwrap(), b"");
        assert_eq!(bspatch(b"", &p[..], format).unwrap(), b"");
    }
}

#[test]
fn empty_source() {
    let t = b"fresh content with no source to lean on";
    for &format in FORMATS.iter() {
        let p = bsdiff(b"", t, format).unwrap();
        assert_eq!(&bspatch(b"", &p[..], format).unwrap()[..], &t[..]);
    }
}

#[test]
fn both_empty() {
    for &format in FORMATS.iter() {
        let p = bsdiff(b"", b"", format).unwrap();
        assert_eq!(bspatch(b"", &p[..], format).unwrap(), b"");
    }
}

#[test]
fn random_samples() {
    for &n in [1, 100, 1000, 20000].iter() {
        for &similar in [0.0, 0.5, 0.9].iter() {
            let s = random_bytes(n);
            let t = distort(&s[..], similar);
            for &format in FORMATS.iter() {
                eprintln!(
                    "random sample: {} source bytes, similarity {}, {:?}",
                    n, similar, format
                );
                let p = bsdiff(&s[..], &t[..], format).unwrap();
                let t1 = bspatch(&s[..], &p[..], format).unwrap();
                assert_eq!(t1, t, "round trip diverged on {:?}", format);
            }
        }
    }
}

#[test]
fn repetitive_samples() {
    // Long runs stress the match scan far more than uniform noise.
    let mut s = Vec::new();
    for i in 0..2000 {
        s.push((i % 7) as u8);
    }
    let mut t = s.clone();
    t.splice(500..500, [9u8; 64].iter().copied());
    t.truncate(1800);

    for &format in FORMATS.iter() {
        let p = bsdiff(&s[..], &t[..], format).unwrap();
        assert_eq!(bspatch(&s[..], &p[..], format).unwrap(), t);
    }
}

#[test]
fn deterministic_output() {
    let s = random_bytes(5000);
    let t = distort(&s[..], 0.7);
    for &format in FORMATS.iter() {
        let p1 = bsdiff(&s[..], &t[..], format).unwrap();
        let p2 = bsdiff(&s[..], &t[..], format).unwrap();
        assert_eq!(p1, p2);
    }
}
