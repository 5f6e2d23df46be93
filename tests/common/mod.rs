#![allow(dead_code)]

use bsdelta::{Bsdiff, Bspatch, Format};
use rand::prelude::*;
use std::convert::TryInto;
use std::io;

pub fn bsdiff(s: &[u8], t: &[u8], format: Format) -> bsdelta::Result<Vec<u8>> {
    let mut p = Vec::new();
    Bsdiff::new(s, t)
        .format(format)
        .compare(io::Cursor::new(&mut p))?;
    Ok(p)
}

pub fn bspatch(s: &[u8], p: &[u8], format: Format) -> bsdelta::Result<Vec<u8>> {
    let patcher = Bspatch::new(p, format)?;
    let mut t = Vec::with_capacity(patcher.hint_target_size() as usize);
    patcher.apply(s, io::Cursor::new(&mut t))?;
    Ok(t)
}

pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut rng = thread_rng();
    let mut bytes = vec![0u8; n];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Derive a target from the source by keeping runs, mutating bytes and
/// splicing in fresh data, so patches exercise all three payload kinds.
pub fn distort(source: &[u8], similar: f64) -> Vec<u8> {
    let mut rng = thread_rng();
    let mut target = Vec::with_capacity(source.len() + source.len() / 4);
    let mut pos = 0;

    while pos < source.len() {
        let run = Ord::min(rng.gen_range(1..=64), source.len() - pos);
        if rng.gen_bool(similar) {
            target.extend_from_slice(&source[pos..pos + run]);
        } else if rng.gen_bool(0.5) {
            for &x in source[pos..pos + run].iter() {
                target.push(x.wrapping_add(rng.gen_range(0..4)));
            }
        } else {
            for _ in 0..rng.gen_range(0..=run) {
                target.push(rng.gen());
            }
        }
        pos += run;
    }

    target
}

// Wire helpers for byte-level container checks; these mirror the
// sign-magnitude integer layout of the patch formats.

pub fn encode_int(x: i64, b: &mut [u8]) {
    let raw = if x < 0 {
        x.wrapping_neg() as u64 | 0x8000000000000000
    } else {
        x as u64
    };
    b[..8].copy_from_slice(&raw.to_le_bytes());
}

pub fn decode_int(b: &[u8]) -> i64 {
    let x = u64::from_le_bytes(b[..8].try_into().unwrap());
    if x >> 63 == 0 || x == 0x8000000000000000 {
        x as i64
    } else {
        ((x & 0x7fffffffffffffff) as i64).wrapping_neg()
    }
}
