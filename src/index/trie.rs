//! Fixed-Alphabet Trie
//!
//! Each node has one child slot per printable ASCII byte (`0x20..=0x7e`,
//! 95 slots). Keys are walked byte by byte; a key containing any other byte
//! is rejected up front, before a single node is allocated.
//!
//! ```text
//! insert("APPLE"), insert("APRICOT")
//!
//!   root ─A─ • ─P─ • ─P─ • ─L─ • ─E─ ◉
//!                    └─R─ • ─I─ • ─C─ • ─O─ • ─T─ ◉
//!
//!   ◉ = end-of-key marker
//! ```
//!
//! The trie is insert-only: nothing is ever pruned.

use thiserror::Error;

/// First byte of the supported alphabet (space)
pub const ALPHABET_START: u8 = 0x20;

/// Last byte of the supported alphabet (`~`)
pub const ALPHABET_END: u8 = 0x7e;

/// Number of child slots per node
pub const ALPHABET_SIZE: usize = (ALPHABET_END - ALPHABET_START) as usize + 1;

/// A key contained a byte outside the supported alphabet.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("byte {byte:#04x} at position {position} is outside the index alphabet")]
pub struct InvalidByte {
    pub byte: u8,
    pub position: usize,
}

/// Maps a byte to its child slot.
#[inline]
fn slot(byte: u8) -> Option<usize> {
    if (ALPHABET_START..=ALPHABET_END).contains(&byte) {
        Some((byte - ALPHABET_START) as usize)
    } else {
        None
    }
}

#[derive(Debug)]
struct TrieNode {
    children: [Option<Box<TrieNode>>; ALPHABET_SIZE],
    is_end: bool,
}

impl TrieNode {
    fn new() -> Self {
        Self {
            children: std::array::from_fn(|_| None),
            is_end: false,
        }
    }
}

/// Insert-only prefix index over keys.
#[derive(Debug)]
pub struct PrefixIndex {
    root: TrieNode,
    /// Number of distinct keys ever inserted
    keys: usize,
}

impl Default for PrefixIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefixIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self {
            root: TrieNode::new(),
            keys: 0,
        }
    }

    /// Checks that every byte of `key` is inside the alphabet.
    pub fn validate(key: &str) -> Result<(), InvalidByte> {
        match key.bytes().enumerate().find(|&(_, b)| slot(b).is_none()) {
            Some((position, byte)) => Err(InvalidByte { byte, position }),
            None => Ok(()),
        }
    }

    /// Registers `key`. Inserting the same key twice is a no-op.
    pub fn insert(&mut self, key: &str) -> Result<(), InvalidByte> {
        let slots = key
            .bytes()
            .enumerate()
            .map(|(position, byte)| slot(byte).ok_or(InvalidByte { byte, position }))
            .collect::<Result<Vec<_>, _>>()?;

        let mut node = &mut self.root;
        for idx in slots {
            node = node.children[idx]
                .get_or_insert_with(|| Box::new(TrieNode::new()))
                .as_mut();
        }

        if !node.is_end {
            node.is_end = true;
            self.keys += 1;
        }
        Ok(())
    }

    /// Walks the path for `prefix`, returning the node it ends on.
    fn search_prefix(&self, prefix: &str) -> Option<&TrieNode> {
        let mut node = &self.root;
        for byte in prefix.bytes() {
            node = node.children[slot(byte)?].as_deref()?;
        }
        Some(node)
    }

    /// Returns true if any key ever inserted starts with `prefix`.
    ///
    /// A prefix containing bytes outside the alphabet can never match.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.search_prefix(prefix).is_some()
    }

    /// Returns true if exactly `key` was ever inserted.
    pub fn contains(&self, key: &str) -> bool {
        self.search_prefix(key).is_some_and(|node| node.is_end)
    }

    /// Number of distinct keys ever inserted.
    pub fn len(&self) -> usize {
        self.keys
    }

    /// Returns true if nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.keys == 0
    }
}
