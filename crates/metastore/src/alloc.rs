//! ID allocator.

use crate::error::Result;
use crate::leadership::LeadershipHandle;
use parking_lot::Mutex;
use std::sync::Arc;

const WATERMARK_KEY: &[u8] = b"alloc_id";

struct Block {
    next: u64,
    end_exclusive: u64,
}

/// Hands out ids in blocks of `block_size`. Crash-safe: any unused tail of
/// a block is simply abandoned on restart (ids only need to be unique, not
/// dense).
pub struct IdAllocator {
    block: Mutex<Option<Block>>,
    block_size: u64,
}

impl IdAllocator {
    pub fn new(block_size: u64) -> Self {
        Self {
            block: Mutex::new(None),
            block_size,
        }
    }

    /// Hand out one id, requesting and persisting a new block via `handle`
    /// whenever the local block is exhausted or not yet initialized.
    pub fn alloc(&self, handle: &LeadershipHandle) -> Result<u64> {
        let mut guard = self.block.lock();
        if guard.as_ref().map(|b| b.next >= b.end_exclusive).unwrap_or(true) {
            *guard = Some(self.refill(handle)?);
        }
        let block = guard.as_mut().expect("just refilled");
        let id = block.next;
        block.next += 1;
        Ok(id)
    }

    fn refill(&self, handle: &LeadershipHandle) -> Result<Block> {
        let store = handle.store();
        let current = store
            .get(WATERMARK_KEY)?
            .map(|kv| decode_watermark(&kv.value))
            .unwrap_or(0);
        let new_watermark = current + self.block_size;
        handle.cas_write(WATERMARK_KEY, &encode_watermark(new_watermark))?;
        Ok(Block {
            next: current + 1,
            end_exclusive: new_watermark + 1,
        })
    }
}

fn encode_watermark(v: u64) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

fn decode_watermark(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let len = bytes.len().min(8);
    buf[8 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    u64::from_be_bytes(buf)
}

#[allow(dead_code)]
pub(crate) fn shared(block_size: u64) -> Arc<IdAllocator> {
    Arc::new(IdAllocator::new(block_size))
}
