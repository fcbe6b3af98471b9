//! Persistence for mined blocks.

pub mod disk;

use crate::block::BlockData;
use crate::error::Result;

/// Append-only, read-by-number block storage.
pub trait Storage: Send + Sync {
    fn write(&self, block_data: &BlockData) -> Result<()>;
    fn get_block_by_number(&self, number: u64) -> Result<BlockData>;
    /// Not implemented by the disk backend; callers fall back to
    /// [`Storage::get_block_by_number`].
    fn get_block(&self, hash: &str) -> Result<BlockData>;
    fn for_each(&self) -> Box<dyn Iterator<Item = BlockData> + '_>;
    fn close(&self) -> Result<()>;
    fn reset(&self) -> Result<()>;
}
