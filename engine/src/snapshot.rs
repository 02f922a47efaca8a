//! Snapshot blobs written by the failure hook and read by the restore hook.
//!
//! Layout (little-endian, see `fusion_primitives::codec`):
//!
//! ```text
//! magic "FSNP" | format u32 | total_len u32 | abi u32 | module_id [32]
//! state u8 | counters 2 x u64 | heap capacity u64 | heap allocated u64
//! refs: count u32, then (kind u8, handle u64, raw i64) per entry
//! payload: len u32 + bytes
//! checksum [32] = BLAKE3 of every preceding byte
//! ```
//!
//! `total_len` covers the whole blob, checksum included, so the restore hook
//! can find the end of a blob that sits in a larger arena block.

use alloc::vec::Vec;

use fusion_primitives::codec::{self, Reader};
use fusion_primitives::{ModuleState, SnapshotFault, ABI_VERSION};

use crate::capabilities::{ResourceKind, ResourceRef};
use crate::controller::Counters;

pub const MAGIC: [u8; 4] = *b"FSNP";
pub const FORMAT_VERSION: u32 = 1;

/// Magic, format version, and total length.
pub const HEADER_LEN: usize = 12;

pub const CHECKSUM_LEN: usize = 32;

/// Digest identifying a module by name.
pub type ModuleId = [u8; 32];

const REF_LEN: usize = 1 + 8 + 8;

pub fn module_id(name: &str) -> ModuleId {
    *blake3::hash(name.as_bytes()).as_bytes()
}

/// Arena statistics captured before the blob itself was allocated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub capacity: u64,
    pub allocated: u64,
}

/// Decoded contents of a snapshot blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub abi_version: u32,
    pub module_id: ModuleId,
    pub state: ModuleState,
    pub counters: Counters,
    pub heap: HeapStats,
    pub references: Vec<ResourceRef>,
    /// Module-specific state written by `ModuleLogic::save`.
    pub payload: Vec<u8>,
}

impl Snapshot {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            HEADER_LEN + 64 + 64 + self.references.len() * REF_LEN + self.payload.len() + CHECKSUM_LEN,
        );
        buf.extend_from_slice(&MAGIC);
        codec::write_u32(&mut buf, FORMAT_VERSION);
        // Patched below once the length is known.
        codec::write_u32(&mut buf, 0);
        codec::write_u32(&mut buf, self.abi_version);
        buf.extend_from_slice(&self.module_id);
        codec::write_u8(&mut buf, self.state.as_u8());

        codec::write_u64(&mut buf, self.counters.ticks);
        codec::write_u64(&mut buf, self.counters.setup_errors);

        codec::write_u64(&mut buf, self.heap.capacity);
        codec::write_u64(&mut buf, self.heap.allocated);

        codec::write_u32(&mut buf, self.references.len() as u32);
        for r in &self.references {
            codec::write_u8(&mut buf, r.kind as u8);
            codec::write_u64(&mut buf, r.handle);
            codec::write_i64(&mut buf, r.raw);
        }
        codec::write_var_bytes(&mut buf, &self.payload);

        let total = (buf.len() + CHECKSUM_LEN) as u32;
        buf[8..HEADER_LEN].copy_from_slice(&total.to_le_bytes());
        let checksum = blake3::hash(&buf);
        buf.extend_from_slice(checksum.as_bytes());
        buf
    }

    /// Decode and verify a blob produced for module `expected`.
    ///
    /// `bytes` must be exactly one blob; see [`blob_len`] for finding its end.
    pub fn decode(bytes: &[u8], expected: &ModuleId) -> Result<Self, SnapshotFault> {
        let total = blob_len(bytes)?;
        if total != bytes.len() || total < HEADER_LEN + CHECKSUM_LEN {
            return Err(SnapshotFault::Truncated);
        }
        let (body, checksum) = bytes.split_at(total - CHECKSUM_LEN);
        if blake3::hash(body).as_bytes() != checksum {
            return Err(SnapshotFault::ChecksumMismatch);
        }

        let mut r = Reader::new(&body[HEADER_LEN..]);
        let abi_version = r.read_u32().map_err(truncated)?;
        let module_id: ModuleId = r
            .read_bytes(32)
            .map_err(truncated)?
            .try_into()
            .map_err(|_| SnapshotFault::Truncated)?;
        if &module_id != expected {
            return Err(SnapshotFault::ForeignModule);
        }
        if abi_version != ABI_VERSION {
            return Err(SnapshotFault::UnsupportedVersion(abi_version));
        }
        let state = ModuleState::from_u8(r.read_u8().map_err(truncated)?)
            .ok_or(SnapshotFault::InvalidField)?;

        let counters = Counters {
            ticks: r.read_u64().map_err(truncated)?,
            setup_errors: r.read_u64().map_err(truncated)?,
        };
        let heap = HeapStats {
            capacity: r.read_u64().map_err(truncated)?,
            allocated: r.read_u64().map_err(truncated)?,
        };
        if heap.allocated > heap.capacity {
            return Err(SnapshotFault::InvalidField);
        }

        let count = r.read_count(REF_LEN).map_err(truncated)?;
        let mut references = Vec::with_capacity(count);
        for _ in 0..count {
            let kind = ResourceKind::from_u8(r.read_u8().map_err(truncated)?)
                .ok_or(SnapshotFault::InvalidField)?;
            references.push(ResourceRef {
                kind,
                handle: r.read_u64().map_err(truncated)?,
                raw: r.read_i64().map_err(truncated)?,
            });
        }
        let payload = r.read_var_bytes().map_err(truncated)?.to_vec();
        r.finish().map_err(truncated)?;

        Ok(Self {
            abi_version,
            module_id,
            state,
            counters,
            heap,
            references,
            payload,
        })
    }
}

fn truncated<E>(_: E) -> SnapshotFault {
    SnapshotFault::Truncated
}

/// Validate the header of a blob and return its total length.
pub fn blob_len(bytes: &[u8]) -> Result<usize, SnapshotFault> {
    let header = bytes.get(..HEADER_LEN).ok_or(SnapshotFault::Truncated)?;
    if header[..4] != MAGIC {
        return Err(SnapshotFault::BadMagic);
    }
    let mut r = Reader::new(&header[4..]);
    let version = r.read_u32().map_err(truncated)?;
    if version != FORMAT_VERSION {
        return Err(SnapshotFault::UnsupportedVersion(version));
    }
    Ok(r.read_u32().map_err(truncated)? as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn sample() -> Snapshot {
        Snapshot {
            abi_version: ABI_VERSION,
            module_id: module_id("fusion.example"),
            state: ModuleState::Initialized,
            counters: Counters {
                ticks: 42,
                setup_errors: 0,
            },
            heap: HeapStats {
                capacity: 1 << 20,
                allocated: 4096,
            },
            references: vec![ResourceRef {
                kind: ResourceKind::Udp,
                handle: 1 << 32,
                raw: 3,
            }],
            payload: b"module state".to_vec(),
        }
    }

    #[test]
    fn test_round_trip() {
        let snap = sample();
        let bytes = snap.encode();
        assert_eq!(blob_len(&bytes).unwrap(), bytes.len());
        assert_eq!(Snapshot::decode(&bytes, &snap.module_id).unwrap(), snap);
    }

    #[test]
    fn test_foreign_module_rejected() {
        let bytes = sample().encode();
        let other = module_id("someone.else");
        assert_eq!(Snapshot::decode(&bytes, &other), Err(SnapshotFault::ForeignModule));
    }

    #[test]
    fn test_flipped_byte_fails_checksum() {
        let snap = sample();
        let mut bytes = snap.encode();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x01;
        assert_eq!(Snapshot::decode(&bytes, &snap.module_id), Err(SnapshotFault::ChecksumMismatch));
    }

    #[test]
    fn test_bad_magic_and_version() {
        let snap = sample();
        let mut bytes = snap.encode();
        bytes[0] = b'X';
        assert_eq!(blob_len(&bytes), Err(SnapshotFault::BadMagic));

        let mut bytes = snap.encode();
        bytes[4..8].copy_from_slice(&9u32.to_le_bytes());
        assert_eq!(Snapshot::decode(&bytes, &snap.module_id), Err(SnapshotFault::UnsupportedVersion(9)));
    }

    #[test]
    fn test_truncation_detected() {
        let snap = sample();
        let bytes = snap.encode();
        assert_eq!(Snapshot::decode(&bytes[..bytes.len() - 1], &snap.module_id), Err(SnapshotFault::Truncated));
        assert_eq!(blob_len(&bytes[..5]), Err(SnapshotFault::Truncated));
        assert_eq!(Snapshot::decode(&[], &snap.module_id), Err(SnapshotFault::Truncated));
    }

    #[test]
    fn test_invalid_state_rejected_even_with_valid_checksum() {
        let snap = sample();
        let mut bytes = snap.encode();
        let state_at = HEADER_LEN + 4 + 32;
        bytes[state_at] = 200;
        let body_len = bytes.len() - CHECKSUM_LEN;
        let checksum = blake3::hash(&bytes[..body_len]);
        bytes[body_len..].copy_from_slice(checksum.as_bytes());
        assert_eq!(Snapshot::decode(&bytes, &snap.module_id), Err(SnapshotFault::InvalidField));
    }

    #[test]
    fn test_module_id_is_stable() {
        assert_eq!(module_id("a"), module_id("a"));
        assert_ne!(module_id("a"), module_id("b"));
    }
}
