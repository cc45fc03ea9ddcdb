//! Cursor arithmetic: which block range to scan next.
//!
//! The cursor value itself lives in a [crate::store::CursorStore]; this module only
//! decides the inclusive range that follows it.

/// Last fully persisted block for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub source_id: String,
    pub last_block: u64,
}

impl Cursor {
    pub fn new(source_id: impl Into<String>, last_block: u64) -> Self {
        Self {
            source_id: source_id.into(),
            last_block,
        }
    }

    /// Next chunk to scan, or `None` once the cursor has reached `head`.
    pub fn next_range(&self, head: u64, max_chunk_size: u64) -> Option<BlockRange> {
        BlockRange::after(self.last_block, head, max_chunk_size)
    }
}

/// Inclusive block range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    /// Range starting right after `last`, spanning at most `max_chunk_size + 1` blocks and
    /// never past `head`.
    pub fn after(last: u64, head: u64, max_chunk_size: u64) -> Option<Self> {
        if head <= last {
            return None;
        }
        let from = last + 1;
        let to = from.saturating_add(max_chunk_size).min(head);
        Some(Self { from, to })
    }
}
