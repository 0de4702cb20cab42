//! Flat path table and collision resolver.
//!
//! The flat path table gives the mounted filesystem O(1) full-path lookup:
//! a sorted array of `(hash, value)` pairs where the value is the inode
//! number, or an offset into the collision resolver when two paths share a
//! hash. The resolver exists only when at least one collision does.

use std::collections::BTreeMap;

use byteorder::{LittleEndian, WriteBytesExt};

/// Marks a flat-path-table value as a collision-resolver offset.
pub const COLLISION_BIT: u32 = 0x8000_0000;

/// Case-folded path hash.
pub fn path_hash(path: &str) -> u32 {
    let mut hash: u32 = 0;
    for c in path.chars() {
        for lc in c.to_lowercase() {
            hash = hash.wrapping_mul(31).wrapping_add(lc as u32);
        }
    }
    hash
}

pub struct FlatPathTable {
    entries: Vec<(u32, u32)>,
}

pub struct CollisionResolver {
    data: Vec<u8>,
}

/// Build the lookup blobs from `(full path, inode number)` pairs.
pub fn build(paths: &[(String, u32)]) -> (FlatPathTable, Option<CollisionResolver>) {
    let mut buckets: BTreeMap<u32, Vec<(&str, u32)>> = BTreeMap::new();
    for (path, ino) in paths {
        buckets
            .entry(path_hash(path))
            .or_default()
            .push((path, *ino));
    }

    let has_collision = buckets.values().any(|b| b.len() > 1);
    if !has_collision {
        let entries = buckets
            .into_iter()
            .map(|(hash, bucket)| (hash, bucket[0].1))
            .collect();
        return (FlatPathTable { entries }, None);
    }

    let mut entries = Vec::with_capacity(buckets.len());
    let mut data = Vec::new();
    for (hash, bucket) in buckets {
        if bucket.len() == 1 {
            entries.push((hash, bucket[0].1));
            continue;
        }
        entries.push((hash, COLLISION_BIT | data.len() as u32));
        for (path, ino) in bucket {
            data.write_u32::<LittleEndian>(ino).expect("vec write");
            data.extend_from_slice(path.as_bytes());
            data.push(0);
            while data.len() % 4 != 0 {
                data.push(0);
            }
        }
        // bucket terminator
        data.extend_from_slice(&[0u8; 4]);
    }
    (FlatPathTable { entries }, Some(CollisionResolver { data }))
}

impl FlatPathTable {
    pub fn size(&self) -> u64 {
        self.entries.len() as u64 * 8
    }

    pub fn has_collision(&self) -> bool {
        self.entries.iter().any(|(_, v)| v & COLLISION_BIT != 0)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.len() * 8);
        for (hash, value) in &self.entries {
            out.write_u32::<LittleEndian>(*hash).expect("vec write");
            out.write_u32::<LittleEndian>(*value).expect("vec write");
        }
        out
    }

    /// Look a path up the way a mounted image would; collided buckets
    /// resolve through `cr`.
    pub fn lookup(&self, path: &str, cr: Option<&CollisionResolver>) -> Option<u32> {
        let hash = path_hash(path);
        let idx = self.entries.binary_search_by_key(&hash, |e| e.0).ok()?;
        let value = self.entries[idx].1;
        if value & COLLISION_BIT == 0 {
            return Some(value);
        }
        cr?.resolve((value & !COLLISION_BIT) as usize, path)
    }
}

impl CollisionResolver {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Walk one bucket starting at `offset`, matching on the stored path.
    fn resolve(&self, mut offset: usize, path: &str) -> Option<u32> {
        while offset + 4 <= self.data.len() {
            let ino = u32::from_le_bytes(self.data[offset..offset + 4].try_into().ok()?);
            offset += 4;
            let rest = &self.data[offset..];
            let nul = rest.iter().position(|&b| b == 0)?;
            if nul == 0 && ino == 0 {
                return None; // terminator
            }
            let stored = std::str::from_utf8(&rest[..nul]).ok()?;
            if stored == path {
                return Some(ino);
            }
            offset += (nul + 1 + 3) & !3;
        }
        None
    }
}
