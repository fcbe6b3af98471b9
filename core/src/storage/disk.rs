//! A JSON-file-per-block disk-backed [`Storage`] implementation.

use std::fs;
use std::path::PathBuf;

use crate::block::BlockData;
use crate::error::{Error, Result};
use crate::storage::Storage;

pub struct Disk {
    db_path: PathBuf,
}

impl Disk {
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        fs::create_dir_all(&db_path)?;
        Ok(Self { db_path })
    }

    fn path_for(&self, number: u64) -> PathBuf {
        self.db_path.join(format!("{number}.json"))
    }
}

impl Storage for Disk {
    fn write(&self, block_data: &BlockData) -> Result<()> {
        let data = serde_json::to_vec_pretty(block_data)?;
        fs::write(self.path_for(block_data.header.number), data)?;
        Ok(())
    }

    fn get_block_by_number(&self, number: u64) -> Result<BlockData> {
        let data = fs::read(self.path_for(number))?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn get_block(&self, _hash: &str) -> Result<BlockData> {
        Err(Error::Storage(std::io::Error::new(std::io::ErrorKind::Unsupported, "get_block by hash is not implemented by the disk backend")))
    }

    fn for_each(&self) -> Box<dyn Iterator<Item = BlockData> + '_> {
        Box::new(DiskIterator { disk: self, current: 0 })
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        fs::remove_dir_all(&self.db_path)?;
        fs::create_dir_all(&self.db_path)?;
        Ok(())
    }
}

/// Walks block numbers starting at 1, stopping at the first missing file.
struct DiskIterator<'a> {
    disk: &'a Disk,
    current: u64,
}

impl<'a> Iterator for DiskIterator<'a> {
    type Item = BlockData;

    fn next(&mut self) -> Option<Self::Item> {
        self.current += 1;
        self.disk.get_block_by_number(self.current).ok()
    }
}
