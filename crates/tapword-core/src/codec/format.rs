//! Binary layout of a dictionary file.
//!
//! ```text
//! 0..4    magic "TPWD"
//! 4       format version (2 = static, 4 = dynamic)
//! 5..8    reserved
//! 8..12   header block length   (u32 LE)
//! 12..16  node block length     (u32 LE)
//! 16..20  bigram block length   (u32 LE)
//! 20..24  shortcut block length (u32 LE)
//! 24..28  CRC32 of the four blocks
//! 28..    header | nodes | bigrams | shortcuts   (bincode)
//! ```
//!
//! Node ids are slot indices and are written as-is, vacant slots included, so
//! a plain flush keeps the free list valid. Compaction renumbers before
//! writing.

use std::collections::{BTreeMap, VecDeque};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::dict::{
    is_supported_version, BigramEntry, DictError, DictStore, HistoricalInfo, PtNode, ShortcutEntry,
    UnigramEntry, ROOT,
};
use crate::dict::{BigramEdge, FORMAT_VERSION_DYNAMIC};
use crate::MAX_WORD_LENGTH;

pub const MAGIC: &[u8; 4] = b"TPWD";
pub const HEADER_SIZE: usize = 28;

const FLAG_NOT_A_WORD: u8 = 0x01;
const FLAG_BLACKLISTED: u8 = 0x02;

#[derive(Serialize, Deserialize)]
struct HeaderBlock {
    attributes: BTreeMap<String, String>,
    free: Vec<u32>,
    clock: i32,
}

#[derive(Serialize, Deserialize)]
struct NodeRecord {
    code_point: u32,
    parent: u32,
    live: bool,
    unigram: Option<UnigramRecord>,
}

#[derive(Serialize, Deserialize)]
struct UnigramRecord {
    probability: u8,
    flags: u8,
    historical: HistoricalInfo,
}

#[derive(Serialize, Deserialize)]
struct BigramRecord {
    source: u32,
    target: u32,
    probability: u8,
    historical: HistoricalInfo,
    live: bool,
}

#[derive(Serialize, Deserialize)]
struct ShortcutRecord {
    source: u32,
    target: Vec<u32>,
    probability: u8,
}

fn block_len(data: &[u8], what: &str) -> Result<u32, DictError> {
    data.len()
        .try_into()
        .map_err(|_| DictError::Corrupt(format!("{what} block exceeds u32::MAX")))
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

pub fn encode(store: &DictStore) -> Result<Vec<u8>, DictError> {
    let header = HeaderBlock {
        attributes: store.header.attributes.clone(),
        free: store.free.clone(),
        clock: store.clock,
    };
    let mut nodes = Vec::with_capacity(store.nodes.len());
    let mut bigrams = Vec::new();
    let mut shortcuts = Vec::new();
    for (id, node) in store.nodes.iter().enumerate() {
        nodes.push(NodeRecord {
            code_point: node.code_point,
            parent: node.parent,
            live: node.live,
            unigram: node.unigram.map(|u| UnigramRecord {
                probability: u.probability,
                flags: (if u.is_not_a_word { FLAG_NOT_A_WORD } else { 0 })
                    | (if u.is_blacklisted { FLAG_BLACKLISTED } else { 0 }),
                historical: u.historical,
            }),
        });
        for edge in &node.bigrams {
            bigrams.push(BigramRecord {
                source: id as u32,
                target: edge.target,
                probability: edge.entry.probability,
                historical: edge.entry.historical,
                live: edge.live,
            });
        }
        for shortcut in &node.shortcuts {
            shortcuts.push(ShortcutRecord {
                source: id as u32,
                target: shortcut.target.clone(),
                probability: shortcut.probability,
            });
        }
    }

    let blocks = [
        bincode::serialize(&header).map_err(DictError::Serialize)?,
        bincode::serialize(&nodes).map_err(DictError::Serialize)?,
        bincode::serialize(&bigrams).map_err(DictError::Serialize)?,
        bincode::serialize(&shortcuts).map_err(DictError::Serialize)?,
    ];
    let names = ["header", "node", "bigram", "shortcut"];

    let mut hasher = crc32fast::Hasher::new();
    for block in &blocks {
        hasher.update(block);
    }
    let crc = hasher.finalize();

    let body_len: usize = blocks.iter().map(|b| b.len()).sum();
    let mut buf = Vec::with_capacity(HEADER_SIZE + body_len);
    buf.extend_from_slice(MAGIC);
    buf.push(store.header.version);
    buf.extend_from_slice(&[0u8; 3]); // reserved
    for (block, name) in blocks.iter().zip(names) {
        buf.extend_from_slice(&block_len(block, name)?.to_le_bytes());
    }
    buf.extend_from_slice(&crc.to_le_bytes());
    for block in &blocks {
        buf.extend_from_slice(block);
    }
    Ok(buf)
}

pub fn decode(data: &[u8]) -> Result<DictStore, DictError> {
    if data.len() < 5 {
        return Err(DictError::InvalidHeader);
    }
    if &data[..4] != MAGIC {
        return Err(DictError::InvalidMagic);
    }
    let version = data[4];
    if !is_supported_version(version) {
        return Err(DictError::UnsupportedVersion(version));
    }
    if data.len() < HEADER_SIZE {
        return Err(DictError::InvalidHeader);
    }

    let lens = [
        read_u32(data, 8) as usize,
        read_u32(data, 12) as usize,
        read_u32(data, 16) as usize,
        read_u32(data, 20) as usize,
    ];
    let expected_crc = read_u32(data, 24);
    let body_len = lens.iter().try_fold(0usize, |acc, &l| acc.checked_add(l));
    let body_len = match body_len {
        Some(len) if HEADER_SIZE + len <= data.len() => len,
        _ => return Err(DictError::InvalidHeader),
    };
    let body = &data[HEADER_SIZE..HEADER_SIZE + body_len];
    if crc32fast::hash(body) != expected_crc {
        return Err(DictError::Corrupt("checksum mismatch".into()));
    }

    let mut offset = 0;
    let mut slices = [&body[..0]; 4];
    for (slice, len) in slices.iter_mut().zip(lens) {
        *slice = &body[offset..offset + len];
        offset += len;
    }
    let header: HeaderBlock = bincode::deserialize(slices[0]).map_err(DictError::Deserialize)?;
    let node_records: Vec<NodeRecord> =
        bincode::deserialize(slices[1]).map_err(DictError::Deserialize)?;
    let bigram_records: Vec<BigramRecord> =
        bincode::deserialize(slices[2]).map_err(DictError::Deserialize)?;
    let shortcut_records: Vec<ShortcutRecord> =
        bincode::deserialize(slices[3]).map_err(DictError::Deserialize)?;

    let mut store = DictStore::empty(version, header.attributes)?;
    store.nodes = build_nodes(node_records)?;
    store.free = header.free;
    store.clock = header.clock;

    let slot_count = store.nodes.len() as u32;
    for rec in bigram_records {
        if rec.source >= slot_count || rec.target >= slot_count {
            return Err(DictError::Corrupt("bigram refers to a missing node".into()));
        }
        if rec.live {
            store.bigram_count += 1;
        } else {
            store.dead_bigrams += 1;
        }
        store.nodes[rec.source as usize].bigrams.push(BigramEdge {
            target: rec.target,
            entry: BigramEntry {
                probability: rec.probability,
                historical: rec.historical,
            },
            live: rec.live,
        });
    }
    for rec in shortcut_records {
        if rec.source >= slot_count || rec.target.is_empty() || rec.target.len() > MAX_WORD_LENGTH
        {
            return Err(DictError::Corrupt("invalid shortcut record".into()));
        }
        store.nodes[rec.source as usize].shortcuts.push(ShortcutEntry {
            target: rec.target,
            probability: rec.probability,
        });
    }
    store.unigram_count = store
        .nodes
        .iter()
        .filter(|n| n.live && n.unigram.is_some())
        .count();

    store.validate()?;
    Ok(store)
}

/// Rebuild child lists and depths from parent links, rejecting cycles and orphans.
fn build_nodes(records: Vec<NodeRecord>) -> Result<Vec<PtNode>, DictError> {
    if records.is_empty() {
        return Err(DictError::Corrupt("missing root node".into()));
    }
    let count = records.len();
    let mut nodes: Vec<PtNode> = records
        .iter()
        .map(|rec| {
            let mut node = PtNode::new(rec.code_point, rec.parent, 0);
            node.live = rec.live;
            node.unigram = rec.unigram.as_ref().map(|u| UnigramEntry {
                probability: u.probability,
                is_not_a_word: u.flags & FLAG_NOT_A_WORD != 0,
                is_blacklisted: u.flags & FLAG_BLACKLISTED != 0,
                historical: u.historical,
            });
            node
        })
        .collect();

    for (id, rec) in records.iter().enumerate().skip(1) {
        if !rec.live {
            continue;
        }
        let parent = rec.parent as usize;
        if parent >= count || !records[parent].live || parent == id {
            return Err(DictError::Corrupt(format!("node {id} has an invalid parent")));
        }
        nodes[parent].children.push(id as u32);
    }
    for id in 0..count {
        let mut children = std::mem::take(&mut nodes[id].children);
        children.sort_by_key(|&c| records[c as usize].code_point);
        nodes[id].children = children;
    }

    // Breadth-first from the root: assigns depths and proves every live node is reachable.
    let mut reached = 0usize;
    let mut queue = VecDeque::from([ROOT]);
    while let Some(id) = queue.pop_front() {
        reached += 1;
        let depth = nodes[id as usize].depth;
        if depth as usize > MAX_WORD_LENGTH {
            return Err(DictError::Corrupt("word exceeds max length".into()));
        }
        for i in 0..nodes[id as usize].children.len() {
            let child = nodes[id as usize].children[i];
            nodes[child as usize].depth = depth + 1;
            queue.push_back(child);
        }
    }
    let live = records.iter().filter(|r| r.live).count();
    if reached != live {
        return Err(DictError::Corrupt("unreachable nodes".into()));
    }
    Ok(nodes)
}

/// Read and decode `length` bytes at `offset` of a file.
///
/// The file is memory-mapped for the duration of decoding only; the store
/// owns its data afterwards.
pub fn read_file(path: &Path, offset: u64, length: u64) -> Result<DictStore, DictError> {
    let file = File::open(path)?;
    // SAFETY: The file is opened read-only and the mapping is immutable.
    // The Mmap is dropped after decoding completes below.
    let mmap = unsafe { Mmap::map(&file)? };
    let start = usize::try_from(offset).map_err(|_| DictError::InvalidHeader)?;
    let len = usize::try_from(length).map_err(|_| DictError::InvalidHeader)?;
    let end = start.checked_add(len).ok_or(DictError::InvalidHeader)?;
    if end > mmap.len() {
        return Err(DictError::InvalidHeader);
    }
    decode(&mmap[start..end])
}

/// Atomic write: write to .tmp then rename, so a failed write leaves the
/// previous file intact.
pub fn write_file(store: &DictStore, path: &Path) -> Result<(), DictError> {
    let bytes = encode(store)?;
    let tmp = path.with_extension("tmp");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let result = (|| -> Result<(), DictError> {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    })();
    if result.is_err() {
        fs::remove_file(&tmp).ok();
    }
    result
}

/// Open a dictionary for use by the engine.
///
/// An updatable open needs a dynamic-format file read whole from offset 0;
/// anything else is opened read-only.
pub fn open_file(
    path: &Path,
    offset: u64,
    length: u64,
    updatable: bool,
) -> Result<DictStore, DictError> {
    let mut store = read_file(path, offset, length)?;
    if updatable {
        let whole = fs::metadata(path)?.len();
        if store.version() != FORMAT_VERSION_DYNAMIC || offset != 0 || length != whole {
            return Err(DictError::InvalidArgument(
                "updatable open needs a whole dynamic-format file".into(),
            ));
        }
    }
    store.set_updatable(updatable);
    Ok(store)
}

/// Write `store` to `path` and mark it clean. A clean store is not rewritten.
pub fn flush_file(store: &mut DictStore, path: &Path) -> Result<bool, DictError> {
    if !store.is_dirty() {
        return Ok(false);
    }
    write_file(store, path)?;
    store.mark_clean();
    Ok(true)
}
