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

//! The pool manager: composes the node arena, segment list and gap index
//! into `open`/`close`/`allocate`/`release`/`inspect`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::arena::{Arena, Descriptor, NodeId, SegmentHandle};
use crate::error::{Error, Result};
use crate::gap_index::GapIndex;
use crate::registry;
use crate::segment::{self, Segment};

/// Placement policy used by [`Pool::allocate`] to pick a gap.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Policy {
	/// Scan the segment list from the head; choose the first sufficient gap.
	FirstFit,
	/// Scan the gap index from the smallest entry; choose the smallest
	/// sufficient gap, ties broken by earliest offset.
	BestFit,
}

/// The per-pool bookkeeping: a byte region plus the node arena and gap index
/// that tile it.
pub(crate) struct Pool {
	policy: Policy,
	total_size: usize,
	alloc_size: usize,
	num_allocs: usize,
	num_gaps: usize,
	#[allow(dead_code)] // kept for parity with the byte-owning contract in §3; never read directly
	bytes: Box<[u8]>,
	arena: Arena,
	gaps: GapIndex,
	head: NodeId,
}

impl Pool {
	fn open(size: usize, policy: Policy) -> Result<Self> {
		debug_assert!(size >= 1, "pool size must be at least one byte");

		let mut bytes = Vec::new();
		bytes
			.try_reserve_exact(size)
			.map_err(|_| Error::AllocationFailed { requested: size })?;
		bytes.resize(size, 0);
		let bytes = bytes.into_boxed_slice();

		let mut arena = Arena::new()?;
		let mut gaps = GapIndex::new()?;

		let head = arena.reserve_slot();
		let generation = arena.get(head).generation;
		arena.occupy(
			head,
			Descriptor {
				size,
				offset: 0,
				allocated: false,
				used: true,
				prev: None,
				next: None,
				generation,
			},
		);
		gaps.add(size, 0, head)?;

		tracing::debug!(size, ?policy, "pool opened");

		Ok(Self {
			policy,
			total_size: size,
			alloc_size: 0,
			num_allocs: 0,
			num_gaps: 1,
			bytes,
			arena,
			gaps,
			head,
		})
	}

	/// Whether this pool satisfies `close`'s preconditions: no outstanding
	/// allocations and exactly one gap (the whole pool, untouched).
	pub(crate) fn can_close(&self) -> bool {
		self.num_gaps == 1 && self.num_allocs == 0
	}

	fn allocate(&mut self, requested: usize) -> Result<SegmentHandle> {
		debug_assert!(requested >= 1, "allocation size must be at least one byte");

		if self.num_gaps == 0 {
			return Err(Error::NoMemory { requested });
		}

		self.arena.grow_if_needed()?;

		let chosen = match self.policy {
			Policy::FirstFit => self.first_fit(requested),
			Policy::BestFit => self.best_fit(requested),
		}
		.ok_or(Error::NoMemory { requested })?;

		let offset = self.arena.get(chosen).offset;

		// Reserve gap-index capacity before touching the segment list: once
		// `split` below has shrunk/relinked descriptors there is no way to
		// roll it back, so a capacity failure must be surfaced before any
		// mutation happens, not after.
		self.gaps.grow_if_needed()?;

		self.gaps.remove(chosen);
		self.num_gaps -= 1;

		if let Some(new_gap) = segment::split(&mut self.arena, chosen, requested) {
			let descriptor = self.arena.get(new_gap);
			self.gaps.insert(descriptor.size, descriptor.offset, new_gap);
			self.num_gaps += 1;
		}

		self.num_allocs += 1;
		self.alloc_size += requested;

		tracing::trace!(offset, requested, policy = ?self.policy, "segment allocated");

		Ok(self.arena.handle_for(chosen))
	}

	fn first_fit(&self, requested: usize) -> Option<NodeId> {
		segment::walk(&self.arena, self.head)
			.find(|(_, descriptor)| descriptor.is_gap() && descriptor.size >= requested)
			.map(|(id, _)| id)
	}

	fn best_fit(&self, requested: usize) -> Option<NodeId> {
		self.gaps
			.entries()
			.iter()
			.find(|entry| entry.size >= requested)
			.map(|entry| entry.node)
	}

	fn release(&mut self, handle: SegmentHandle) -> Result<()> {
		let node = self.arena.resolve(handle).ok_or(Error::NotFreed)?;
		if !self.arena.get(node).allocated {
			return Err(Error::NotFreed);
		}

		let size = self.arena.get(node).size;
		self.arena.get_mut(node).allocated = false;
		self.num_allocs -= 1;
		self.alloc_size -= size;

		// Reserve gap-index capacity up front. Every coalesce below removes
		// at least as many entries as it reinserts, so the index's logical
		// length never exceeds what it was before this call; growth (if
		// ever actually triggered) happens here, before `absorb_right`/
		// `absorb_left` irreversibly merge descriptors, instead of after.
		self.gaps.grow_if_needed()?;

		// Right coalesce first, so the surviving descriptor (`node`) is the
		// one the subsequent left-coalesce check examines.
		if let Some(next) = self.arena.get(node).next {
			if self.arena.get(next).is_gap() {
				self.gaps.remove(next);
				self.num_gaps -= 1;
				segment::absorb_right(&mut self.arena, node);
			}
		}

		let merged = self.arena.get(node);
		self.gaps.insert(merged.size, merged.offset, node);
		self.num_gaps += 1;

		if let Some(prev) = self.arena.get(node).prev {
			if self.arena.get(prev).is_gap() {
				self.gaps.remove(prev);
				self.gaps.remove(node);
				self.num_gaps -= 2;
				segment::absorb_left(&mut self.arena, prev, node);

				let merged = self.arena.get(prev);
				self.gaps.insert(merged.size, merged.offset, prev);
				self.num_gaps += 1;
			}
		}

		tracing::trace!(size, "segment released");

		Ok(())
	}

	fn inspect(&self) -> Vec<Segment> {
		segment::walk(&self.arena, self.head)
			.map(|(_, descriptor)| Segment { size: descriptor.size, allocated: descriptor.allocated })
			.collect()
	}

	pub fn total_size(&self) -> usize {
		self.total_size
	}

	pub fn alloc_size(&self) -> usize {
		self.alloc_size
	}

	pub fn num_allocs(&self) -> usize {
		self.num_allocs
	}

	pub fn num_gaps(&self) -> usize {
		self.num_gaps
	}

	pub fn policy(&self) -> Policy {
		self.policy
	}
}

/// A handle to an open pool, returned by [`Pool::open`](PoolHandle::open).
///
/// Wraps the pool in `Rc<RefCell<..>>` (mirroring the teacher crate's
/// `LocalPool`, whose segment container is an `Rc<RefCell<Vec<Segment>>>`) so
/// that the registry can reach into a pool's state during [`crate::free`]
/// without taking ownership away from whichever caller is still holding this
/// handle.
///
/// Deliberately not `Clone`: `close` takes `self` by value and unregisters
/// the pool's slot, but it has no way to invalidate a second handle to the
/// same `Rc<RefCell<Pool>>`, so a clone could keep allocating/releasing
/// against a pool that was supposedly destroyed.
pub struct PoolHandle {
	slot: usize,
	inner: Rc<RefCell<Pool>>,
}

impl PoolHandle {
	/// Opens a new pool of `size` bytes under `policy`. The registry must
	/// already be initialized via [`crate::init`].
	pub fn open(size: usize, policy: Policy) -> Result<Self> {
		let pool = Rc::new(RefCell::new(Pool::open(size, policy)?));
		let slot = registry::register(pool.clone())?;
		Ok(Self { slot, inner: pool })
	}

	/// Closes the pool, refusing if it has outstanding allocations or more
	/// than one gap.
	pub fn close(self) -> Result<()> {
		if !self.inner.borrow().can_close() {
			return Err(Error::NotFreed);
		}
		registry::unregister(self.slot);
		tracing::debug!(slot = self.slot, "pool closed");
		Ok(())
	}

	/// Allocates `size` bytes from the pool, returning a handle to the new
	/// segment.
	pub fn allocate(&self, size: usize) -> Result<SegmentHandle> {
		self.inner.borrow_mut().allocate(size)
	}

	/// Releases a previously allocated segment, coalescing with adjacent
	/// gaps.
	pub fn release(&self, segment: SegmentHandle) -> Result<()> {
		self.inner.borrow_mut().release(segment)
	}

	/// Returns the pool's segments in list order (offset 0 to `total_size`).
	pub fn inspect(&self) -> Vec<Segment> {
		self.inner.borrow().inspect()
	}

	pub fn total_size(&self) -> usize {
		self.inner.borrow().total_size()
	}

	pub fn alloc_size(&self) -> usize {
		self.inner.borrow().alloc_size()
	}

	pub fn num_allocs(&self) -> usize {
		self.inner.borrow().num_allocs()
	}

	pub fn num_gaps(&self) -> usize {
		self.inner.borrow().num_gaps()
	}

	pub fn policy(&self) -> Policy {
		self.inner.borrow().policy()
	}
}
