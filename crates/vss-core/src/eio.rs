//! Byte trees: the nested binary format used on the wire and on disk.
//!
//! A leaf is encoded as the byte `1`, a 4-byte big-endian length and the
//! raw bytes. A node is encoded as the byte `0`, a 4-byte big-endian child
//! count and the concatenated encodings of its children.

use std::fs;
use std::io::Write;
use std::path::Path;

use digest::Update;

use crate::{Error, Result};

const NODE: u8 = 0;
const LEAF: u8 = 1;
const HEADER_LEN: usize = 5;

/// A recursive byte tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteTree {
    /// Raw bytes
    Leaf(Vec<u8>),
    /// Ordered children
    Node(Vec<ByteTree>),
}

impl ByteTree {
    /// Leaf holding `bytes`
    pub fn leaf(bytes: impl Into<Vec<u8>>) -> Self {
        ByteTree::Leaf(bytes.into())
    }

    /// Node holding `children`
    pub fn node(children: Vec<ByteTree>) -> Self {
        ByteTree::Node(children)
    }

    /// Leaf holding a single boolean byte
    pub fn boolean(value: bool) -> Self {
        ByteTree::Leaf(vec![value as u8])
    }

    /// Leaf holding a big-endian `u32`
    pub fn int(value: u32) -> Self {
        ByteTree::Leaf(value.to_be_bytes().to_vec())
    }

    /// The bytes of a leaf
    pub fn as_leaf(&self) -> Result<&[u8]> {
        match self {
            ByteTree::Leaf(bytes) => Ok(bytes),
            ByteTree::Node(_) => Err(Error::format("Expected a leaf")),
        }
    }

    /// The children of a node
    pub fn children(&self) -> Result<&[ByteTree]> {
        match self {
            ByteTree::Node(children) => Ok(children),
            ByteTree::Leaf(_) => Err(Error::format("Expected a node")),
        }
    }

    /// The children of a node, which must number exactly `count`
    pub fn children_exact(&self, count: usize) -> Result<&[ByteTree]> {
        let children = self.children()?;
        if children.len() != count {
            return Err(Error::format(format!(
                "Expected {count} children, found {}",
                children.len()
            )));
        }
        Ok(children)
    }

    /// Interpret a one-byte leaf as a boolean
    pub fn to_boolean(&self) -> Result<bool> {
        match self.as_leaf()? {
            [0] => Ok(false),
            [1] => Ok(true),
            _ => Err(Error::format("Malformed boolean")),
        }
    }

    /// Interpret a four-byte leaf as a big-endian `u32`
    pub fn to_int(&self) -> Result<u32> {
        let bytes: [u8; 4] = self
            .as_leaf()?
            .try_into()
            .map_err(|_| Error::format("Malformed integer"))?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Number of bytes of the encoding
    pub fn total_byte_size(&self) -> usize {
        HEADER_LEN
            + match self {
                ByteTree::Leaf(bytes) => bytes.len(),
                ByteTree::Node(children) => children.iter().map(Self::total_byte_size).sum(),
            }
    }

    /// Encode this tree
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_byte_size());
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut Vec<u8>) {
        match self {
            ByteTree::Leaf(bytes) => {
                out.push(LEAF);
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            ByteTree::Node(children) => {
                out.push(NODE);
                out.extend_from_slice(&(children.len() as u32).to_be_bytes());
                for child in children {
                    child.write_into(out);
                }
            }
        }
    }

    /// Feed the encoding of this tree into a hasher without materialising it
    pub fn update<D: Update>(&self, digest: &mut D) {
        match self {
            ByteTree::Leaf(bytes) => {
                digest.update(&[LEAF]);
                digest.update(&(bytes.len() as u32).to_be_bytes());
                digest.update(bytes);
            }
            ByteTree::Node(children) => {
                digest.update(&[NODE]);
                digest.update(&(children.len() as u32).to_be_bytes());
                for child in children {
                    child.update(digest);
                }
            }
        }
    }

    /// Check that `bytes` encode exactly one byte tree of depth at most
    /// `max_depth`. A leaf has depth zero.
    ///
    /// This walks the headers only and never allocates per child, so it is
    /// safe on untrusted input.
    pub fn verify_format(bytes: &[u8], max_depth: usize) -> bool {
        matches!(scan(bytes, 0, max_depth), Some(end) if end == bytes.len())
    }

    /// Decode untrusted bytes, rejecting trees deeper than `max_depth`
    pub fn from_bytes(bytes: &[u8], max_depth: usize) -> Result<Self> {
        if !Self::verify_format(bytes, max_depth) {
            return Err(Error::format("Input does not represent a byte tree"));
        }
        let (tree, _) = parse(bytes, 0);
        Ok(tree)
    }

    /// Write the encoding to a file. The file appears under its final name
    /// only once completely written.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut staging = path.as_os_str().to_owned();
        staging.push(".partial");
        let mut file = fs::File::create(&staging)?;
        file.write_all(&self.to_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&staging, path)?;
        Ok(())
    }

    /// Read a file holding a byte tree of depth at most `max_depth`
    pub fn read_from(path: &Path, max_depth: usize) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes, max_depth)
    }
}

fn header(bytes: &[u8], offset: usize) -> Option<(u8, usize)> {
    let head = bytes.get(offset..offset.checked_add(HEADER_LEN)?)?;
    let len = u32::from_be_bytes([head[1], head[2], head[3], head[4]]) as usize;
    Some((head[0], len))
}

/// Returns the offset just past the tree starting at `offset`
fn scan(bytes: &[u8], offset: usize, depth_left: usize) -> Option<usize> {
    let (tag, len) = header(bytes, offset)?;
    let mut pos = offset + HEADER_LEN;
    match tag {
        LEAF => {
            let end = pos.checked_add(len)?;
            (end <= bytes.len()).then_some(end)
        }
        NODE => {
            if depth_left == 0 {
                return None;
            }
            // Every child needs at least a header.
            if len > (bytes.len() - pos) / HEADER_LEN {
                return None;
            }
            for _ in 0..len {
                pos = scan(bytes, pos, depth_left - 1)?;
            }
            Some(pos)
        }
        _ => None,
    }
}

/// Parse input already accepted by `scan`
fn parse(bytes: &[u8], offset: usize) -> (ByteTree, usize) {
    let (tag, len) = header(bytes, offset).unwrap_or((LEAF, 0));
    let mut pos = offset + HEADER_LEN;
    if tag == LEAF {
        let leaf = ByteTree::Leaf(bytes[pos..pos + len].to_vec());
        (leaf, pos + len)
    } else {
        let mut children = Vec::with_capacity(len);
        for _ in 0..len {
            let (child, next) = parse(bytes, pos);
            children.push(child);
            pos = next;
        }
        (ByteTree::Node(children), pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn sample() -> ByteTree {
        ByteTree::node(vec![
            ByteTree::leaf(b"label".to_vec()),
            ByteTree::node(vec![ByteTree::int(7), ByteTree::boolean(true)]),
        ])
    }

    #[test]
    fn test_encoding_layout() {
        let leaf = ByteTree::leaf(vec![0xAB, 0xCD]);
        assert_eq!(leaf.to_bytes(), vec![1, 0, 0, 0, 2, 0xAB, 0xCD]);

        let node = ByteTree::node(vec![leaf]);
        assert_eq!(node.to_bytes()[..5], [0, 0, 0, 0, 1]);
        assert_eq!(node.total_byte_size(), 12);
    }

    #[test]
    fn test_decode_encoded() {
        let tree = sample();
        let decoded = ByteTree::from_bytes(&tree.to_bytes(), 2).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn test_depth_bound() {
        let bytes = sample().to_bytes();
        assert!(ByteTree::verify_format(&bytes, 2));
        assert!(!ByteTree::verify_format(&bytes, 1));

        let leaf = ByteTree::leaf(vec![1, 2, 3]).to_bytes();
        assert!(ByteTree::verify_format(&leaf, 0));
    }

    #[test]
    fn test_rejects_truncated_and_trailing() {
        let bytes = sample().to_bytes();
        assert!(!ByteTree::verify_format(&bytes[..bytes.len() - 1], 4));

        let mut extended = bytes.clone();
        extended.push(0);
        assert!(!ByteTree::verify_format(&extended, 4));
    }

    #[test]
    fn test_rejects_huge_child_count() {
        // A node claiming 2^32 - 1 children must be rejected without allocation.
        let bytes = vec![0, 0xFF, 0xFF, 0xFF, 0xFF];
        assert!(ByteTree::from_bytes(&bytes, 10).is_err());
    }

    #[test]
    fn test_update_matches_encoding() {
        let tree = sample();
        let mut streamed = Sha256::new();
        tree.update(&mut streamed);
        assert_eq!(streamed.finalize(), Sha256::digest(tree.to_bytes()));
    }

    #[test]
    fn test_accessors() {
        let tree = sample();
        let children = tree.children_exact(2).unwrap();
        assert_eq!(children[0].as_leaf().unwrap(), b"label");
        let inner = children[1].children().unwrap();
        assert_eq!(inner[0].to_int().unwrap(), 7);
        assert!(inner[1].to_boolean().unwrap());
        assert!(tree.as_leaf().is_err());
        assert!(tree.children_exact(3).is_err());
    }

    #[test]
    fn test_state_file_replaced_atomically() {
        let dir = std::env::temp_dir().join(format!("vss-eio-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("State");
        sample().write_to(&path).unwrap();
        assert_eq!(ByteTree::read_from(&path, 2).unwrap(), sample());

        let replacement = ByteTree::leaf(b"next".to_vec());
        replacement.write_to(&path).unwrap();
        assert_eq!(ByteTree::read_from(&path, 0).unwrap(), replacement);
        assert!(!dir.join("nested").join("State.partial").exists());
        std::fs::remove_dir_all(dir).unwrap();
    }
}
