// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The gap index: a size-sorted flat array of free segments, supporting
//! best-fit lookup in sorted order. Ordered by `(size, offset)` ascending
//! (see `DESIGN.md`/SPEC_FULL.md §4.3).

use crate::arena::NodeId;
use crate::error::{Error, Result};

#[derive(Copy, Clone, Debug)]
pub(crate) struct GapEntry {
	pub size: usize,
	pub offset: usize,
	pub node: NodeId,
}

impl GapEntry {
	/// The total order key: size first, then offset as a tie-break.
	fn key(&self) -> (usize, usize) {
		(self.size, self.offset)
	}
}

pub(crate) struct GapIndex {
	entries: Vec<GapEntry>,
	len: usize,
}

impl GapIndex {
	/// Initial capacity, matching the source's `MEM_GAP_IX_INIT_CAPACITY`.
	pub const INITIAL_CAPACITY: usize = 40;
	/// Fill factor beyond which the index grows, matching `MEM_GAP_IX_FILL_FACTOR`.
	pub const FILL_FACTOR: f64 = 0.75;
	/// Growth factor applied on expansion, matching `MEM_GAP_IX_EXPAND_FACTOR`.
	pub const GROWTH_FACTOR: usize = 2;

	pub fn new() -> Result<Self> {
		let mut entries = Vec::new();
		entries
			.try_reserve_exact(Self::INITIAL_CAPACITY)
			.map_err(|_| Error::AllocationFailed { requested: Self::INITIAL_CAPACITY })?;

		Ok(Self { entries, len: 0 })
	}

	/// The live, ordered entries: `[0, len)`.
	pub fn entries(&self) -> &[GapEntry] {
		&self.entries[..self.len]
	}

	fn fill_factor(&self) -> f64 {
		self.len as f64 / self.entries.capacity().max(1) as f64
	}

	/// Grows the backing storage if needed so a subsequent [`Self::insert`]
	/// cannot fail. Callers that remove-then-reinsert across a segment-list
	/// mutation (pool.rs's coalesce paths) must call this *before* mutating
	/// the segment list, so a host-allocator failure here can't leave the
	/// list and gap index out of sync.
	pub(crate) fn grow_if_needed(&mut self) -> Result<()> {
		if self.fill_factor() <= Self::FILL_FACTOR {
			return Ok(());
		}

		let old_capacity = self.entries.capacity();
		let new_capacity = old_capacity * Self::GROWTH_FACTOR;
		let extra = new_capacity - old_capacity;

		self.entries
			.try_reserve_exact(extra)
			.map_err(|_| Error::AllocationFailed { requested: extra })?;

		tracing::debug!(old_capacity, new_capacity, "gap index grown");

		Ok(())
	}

	/// Appends `(size, offset, node)` and bubbles it up into sorted position.
	///
	/// Growth is handled separately by [`Self::grow_if_needed`] so that
	/// callers who must mutate other state (the segment list) between
	/// reserving capacity and inserting can do so without this call being
	/// able to fail partway through.
	pub fn add(&mut self, size: usize, offset: usize, node: NodeId) -> Result<()> {
		self.grow_if_needed()?;
		self.insert(size, offset, node);
		Ok(())
	}

	/// Inserts `(size, offset, node)` in sorted position, assuming capacity
	/// was already reserved via [`Self::grow_if_needed`]. Never fails.
	pub(crate) fn insert(&mut self, size: usize, offset: usize, node: NodeId) {
		let entry = GapEntry { size, offset, node };
		if self.len < self.entries.len() {
			self.entries[self.len] = entry;
		} else {
			self.entries.push(entry);
		}
		let mut index = self.len;
		self.len += 1;

		while index > 0 && entry.key() < self.entries[index - 1].key() {
			self.entries.swap(index, index - 1);
			index -= 1;
		}
	}

	/// Removes the entry for `node`, shifting later entries left by one.
	///
	/// Aborts via `debug_assert!` if `node` is not present; callers only ever
	/// remove nodes known (from the descriptor's `used && !allocated` state)
	/// to have a live entry, so a miss indicates a corrupted index.
	pub fn remove(&mut self, node: NodeId) {
		let position = self.entries[..self.len]
			.iter()
			.position(|entry| entry.node == node);
		let position = match position {
			Some(position) => position,
			None => unreachable!("gap index missing an entry for a live gap descriptor"),
		};

		for i in position..self.len - 1 {
			self.entries[i] = self.entries[i + 1];
		}
		self.len -= 1;
		self.entries[self.len] = GapEntry { size: 0, offset: 0, node: self.entries[self.len].node };
	}
}
