use super::{Block, BlockPool, BlockRecycler};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

struct Shared {
	block_size: usize,
	max_free: usize,
	free: Mutex<Vec<Box<[u8]>>>,
	outstanding: AtomicUsize,
}

impl BlockRecycler for Shared {
	fn reclaim(&self, storage: Box<[u8]>) {
		self.outstanding.fetch_sub(1, Ordering::Relaxed);
		let mut free = self.free.lock();
		if free.len() < self.max_free && storage.len() == self.block_size {
			free.push(storage);
		} else {
			debug!(free = free.len(), "free list is full, dropping block");
		}
	}
}

/**
Pool of fixed-size heap blocks.

Blocks come back on their own once every segment referencing them is gone;
up to `max_free` of them are kept around for reuse, the rest are freed.
*/
#[derive(Clone)]
pub struct VecPool {
	shared: Arc<Shared>,
}

impl VecPool {
	pub fn new(block_size: usize) -> Self {
		Self::with_retention(block_size, 64)
	}

	pub fn with_retention(block_size: usize, max_free: usize) -> Self {
		if block_size == 0 {
			panic!("zero-sized blocks requested")
		}
		VecPool {
			shared: Arc::new(Shared {
				block_size, max_free,
				free: Mutex::new(Vec::with_capacity(max_free)),
				outstanding: AtomicUsize::new(0),
			}),
		}
	}

	/// Blocks waiting in the free list.
	pub fn free_blocks(&self) -> usize {
		self.shared.free.lock().len()
	}

	/// Blocks leased and not yet reclaimed.
	pub fn outstanding(&self) -> usize {
		self.shared.outstanding.load(Ordering::Relaxed)
	}
}

impl BlockPool for VecPool {
	fn lease(&self) -> Block {
		let reused = self.shared.free.lock().pop();
		let storage = match reused {
			Some(storage) => storage,
			None => {
				debug!(block_size = self.shared.block_size, "pool miss, allocating block");
				vec![0; self.shared.block_size].into_boxed_slice()
			},
		};
		self.shared.outstanding.fetch_add(1, Ordering::Relaxed);
		Block::pooled(storage, self.shared.clone())
	}

	fn block_size(&self) -> usize {
		self.shared.block_size
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reuses_storage() {
		let pool = VecPool::new(16);
		let block = pool.lease();
		assert_eq!(pool.outstanding(), 1);
		drop(block);
		assert_eq!(pool.outstanding(), 0);
		assert_eq!(pool.free_blocks(), 1);

		let _block = pool.lease();
		assert_eq!(pool.free_blocks(), 0);
	}

	#[test]
	fn retention_is_bounded() {
		let pool = VecPool::with_retention(16, 1);
		let a = pool.lease();
		let b = pool.lease();
		drop(a);
		drop(b);
		assert_eq!(pool.free_blocks(), 1);
	}

	#[test]
	#[should_panic]
	fn zero_block_size() {
		VecPool::new(0);
	}
}
