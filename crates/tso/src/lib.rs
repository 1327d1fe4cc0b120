//! Timestamp Oracle.
//!
//! A timestamp is a 64-bit value split into a millisecond-resolution
//! physical part (upper 46 bits) and an 18-bit logical counter. The cell
//! holding the current `(physical, logical)` pair is guarded by a single
//! `parking_lot::Mutex` rather than a lock-free atomic swap, because both
//! fields must move together.

use pd_metastore::{Error as MetaError, LeadershipHandle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use tracing::debug;

pub const LOGICAL_BITS: u32 = 18;
pub const LOGICAL_MAX: i64 = 1 << LOGICAL_BITS;
pub const GUARD_MS: i64 = 1;
pub const DEFAULT_SAVE_INTERVAL_MS: i64 = 3_000;
pub const DEFAULT_UPDATE_STEP_MS: u64 = 50;
pub const DEFAULT_MAX_RESET_GAP_MS: i64 = 24 * 60 * 60 * 1000;

const TIMESTAMP_KEY: &[u8] = b"timestamp";
const MAX_INITIALIZE_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum Error {
    #[error("tso not bootstrapped")]
    NotBootstrapped,
    #[error("not leader")]
    NotLeader,
    #[error("logical clock overflow, retry")]
    LogicalOverflow,
    #[error("meta-store error: {0}")]
    MetaStore(#[from] MetaError),
    #[error("invalid reset: {0}")]
    InvalidReset(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub physical: i64,
    pub logical: i64,
}

impl Timestamp {
    pub fn is_zero(&self) -> bool {
        self.physical == 0 && self.logical == 0
    }

    /// Pack into the wire 64-bit representation: upper 46 bits physical,
    /// lower 18 bits logical.
    pub fn pack(&self) -> u64 {
        ((self.physical as u64) << LOGICAL_BITS) | (self.logical as u64)
    }

    pub fn unpack(v: u64) -> Self {
        Self {
            physical: (v >> LOGICAL_BITS) as i64,
            logical: (v & (LOGICAL_MAX as u64 - 1)) as i64,
        }
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

fn encode_saved_upper(physical_ms: i64) -> Vec<u8> {
    // Persisted as big-endian nanoseconds, matching the other durable
    // watermark encodings in this workspace.
    (physical_ms.saturating_mul(1_000_000)).to_be_bytes().to_vec()
}

fn decode_saved_upper(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    let len = bytes.len().min(8);
    buf[8 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    i64::from_be_bytes(buf) / 1_000_000
}

/// Generates monotonic `(physical, logical)` timestamps, persisting a
/// future window to the meta store so a new leader always starts strictly
/// above the last window any previous leader could have served from.
pub struct TsoAllocator {
    cell: Mutex<Timestamp>,
    saved_upper: AtomicI64,
    save_interval_ms: i64,
    max_reset_gap_ms: i64,
}

impl TsoAllocator {
    pub fn new(save_interval_ms: i64) -> Self {
        Self {
            cell: Mutex::new(Timestamp::default()),
            saved_upper: AtomicI64::new(0),
            save_interval_ms,
            max_reset_gap_ms: DEFAULT_MAX_RESET_GAP_MS,
        }
    }

    pub fn with_default_interval() -> Self {
        Self::new(DEFAULT_SAVE_INTERVAL_MS)
    }

    /// Bootstrap on becoming leader: reads the last persisted upper bound
    /// and picks a starting physical time strictly above both it and the
    /// wall clock, then persists a fresh upper bound before publishing.
    pub fn initialize(&self, handle: &LeadershipHandle) -> Result<()> {
        for attempt in 0..MAX_INITIALIZE_RETRIES {
            let saved_upper = handle
                .store()
                .get(TIMESTAMP_KEY)?
                .map(|kv| decode_saved_upper(&kv.value))
                .unwrap_or(0);
            let next = now_ms().max(saved_upper + GUARD_MS);
            let new_upper = next + self.save_interval_ms;
            match handle.cas_write(TIMESTAMP_KEY, &encode_saved_upper(new_upper)) {
                Ok(_) => {
                    self.saved_upper.store(new_upper, Ordering::Release);
                    *self.cell.lock() = Timestamp {
                        physical: next,
                        logical: 0,
                    };
                    debug!(next, new_upper, "tso initialized");
                    return Ok(());
                }
                Err(MetaError::NotLeader) if attempt + 1 < MAX_INITIALIZE_RETRIES => continue,
                Err(MetaError::NotLeader) => return Err(Error::NotLeader),
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::NotLeader)
    }

    /// Allocate `count` consecutive logical ticks at the current physical
    /// time, returning the first of them.
    pub fn generate(&self, handle: &LeadershipHandle, count: u32) -> Result<Timestamp> {
        const MAX_RETRIES: u32 = 50;
        for _ in 0..MAX_RETRIES {
            let result = {
                let mut cell = self.cell.lock();
                if cell.is_zero() {
                    return Err(Error::NotBootstrapped);
                }
                let first_logical = cell.logical;
                let new_logical = cell.logical + count as i64;
                if new_logical >= LOGICAL_MAX {
                    None
                } else {
                    cell.logical = new_logical;
                    Some(Timestamp {
                        physical: cell.physical,
                        logical: first_logical,
                    })
                }
            };
            match result {
                Some(ts) => {
                    if handle.is_expired() {
                        return Err(Error::NotLeader);
                    }
                    return Ok(ts);
                }
                None => {
                    std::thread::sleep(std::time::Duration::from_millis(DEFAULT_UPDATE_STEP_MS));
                    self.update_once(handle)?;
                }
            }
        }
        Err(Error::LogicalOverflow)
    }

    /// Advance the physical clock and, when the persisted upper bound is
    /// getting close, extend it before publishing the new cell.
    pub fn update_once(&self, handle: &LeadershipHandle) -> Result<()> {
        let prev = *self.cell.lock();
        let now = now_ms();
        if now - prev.physical < GUARD_MS {
            return Ok(());
        }
        let next_physical = now.max(prev.physical + 1);
        let saved_upper = self.saved_upper.load(Ordering::Acquire);
        if saved_upper - next_physical <= GUARD_MS {
            let new_upper = next_physical + self.save_interval_ms;
            handle.cas_write(TIMESTAMP_KEY, &encode_saved_upper(new_upper))?;
            self.saved_upper.store(new_upper, Ordering::Release);
        }
        let mut cell = self.cell.lock();
        *cell = Timestamp {
            physical: next_physical,
            logical: 0,
        };
        Ok(())
    }

    /// Admin reset. Only allowed strictly forward and bounded to avoid an
    /// operator fat-fingering a far-future value.
    pub fn set_tso(&self, handle: &LeadershipHandle, ts: Timestamp) -> Result<()> {
        let current = *self.cell.lock();
        if ts.pack() <= current.pack() {
            return Err(Error::InvalidReset("new ts must be greater than current".into()));
        }
        if ts.physical - current.physical >= self.max_reset_gap_ms {
            return Err(Error::InvalidReset("reset gap exceeds max_reset_gap".into()));
        }
        let new_upper = ts.physical + self.save_interval_ms;
        handle.cas_write(TIMESTAMP_KEY, &encode_saved_upper(new_upper))?;
        self.saved_upper.store(new_upper, Ordering::Release);
        *self.cell.lock() = ts;
        Ok(())
    }

    pub fn current(&self) -> Timestamp {
        *self.cell.lock()
    }
}
