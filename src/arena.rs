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

//! The node arena: a growable flat array of segment descriptors, addressed by
//! stable index rather than raw pointer so that growth never dangles a live
//! reference (see `DESIGN.md`, "Pointer identities vs. relocatable arenas").

use crate::error::{Error, Result};

/// A stable identity for a descriptor slot within one [`Arena`]. Not portable
/// across pools or across a slot's reuse history on its own; see
/// [`SegmentHandle`] for the externally-exposed, reuse-safe handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// A handle to an allocated segment, returned by [`crate::Pool::allocate`].
///
/// Pairs an arena index with the generation the slot had when the handle was
/// issued. Arena slots are recycled on coalesce, so a bare index would be
/// ambiguous across reuse (ABA); the generation lets [`Arena::resolve`] reject
/// stale or double-released handles instead of operating on an unrelated
/// segment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SegmentHandle {
	id: NodeId,
	generation: u32,
}

/// A segment descriptor: either a live segment (`used`) in the pool's segment
/// list, allocated or a gap, or a free slot available for reuse.
#[derive(Clone, Debug)]
pub(crate) struct Descriptor {
	pub size: usize,
	pub offset: usize,
	pub allocated: bool,
	pub used: bool,
	pub prev: Option<NodeId>,
	pub next: Option<NodeId>,
	pub generation: u32,
}

impl Descriptor {
	const fn free_slot(generation: u32) -> Self {
		Self {
			size: 0,
			offset: 0,
			allocated: false,
			used: false,
			prev: None,
			next: None,
			generation,
		}
	}

	/// True iff this descriptor is a live, unallocated segment (a gap).
	pub fn is_gap(&self) -> bool {
		self.used && !self.allocated
	}
}

pub(crate) struct Arena {
	slots: Vec<Descriptor>,
	used_count: usize,
}

impl Arena {
	/// Initial slot capacity, matching the source's `MEM_NODE_HEAP_INIT_CAPACITY`.
	pub const INITIAL_CAPACITY: usize = 40;
	/// Fill factor beyond which the arena grows, matching `MEM_FILL_FACTOR`.
	pub const FILL_FACTOR: f64 = 0.75;
	/// Growth factor applied on expansion, matching `MEM_EXPAND_FACTOR`.
	pub const GROWTH_FACTOR: usize = 2;

	pub fn new() -> Result<Self> {
		let mut slots = Vec::new();
		slots
			.try_reserve_exact(Self::INITIAL_CAPACITY)
			.map_err(|_| Error::AllocationFailed { requested: Self::INITIAL_CAPACITY })?;
		slots.resize_with(Self::INITIAL_CAPACITY, || Descriptor::free_slot(0));

		Ok(Self { slots, used_count: 0 })
	}

	fn fill_factor(&self) -> f64 {
		self.used_count as f64 / self.slots.len() as f64
	}

	/// Grows the arena to `2 × capacity` if the fill factor exceeds 0.75.
	pub fn grow_if_needed(&mut self) -> Result<()> {
		if self.fill_factor() <= Self::FILL_FACTOR {
			return Ok(());
		}

		let old_capacity = self.slots.len();
		let new_capacity = old_capacity * Self::GROWTH_FACTOR;
		let extra = new_capacity - old_capacity;

		self.slots
			.try_reserve_exact(extra)
			.map_err(|_| Error::AllocationFailed { requested: extra })?;
		self.slots.resize_with(new_capacity, || Descriptor::free_slot(0));

		tracing::debug!(old_capacity, new_capacity, "node arena grown");

		Ok(())
	}

	/// Returns a free slot's identity, to be initialized by the caller and
	/// marked `used`. The arena must have been grown beforehand so that a
	/// free slot is guaranteed to exist.
	pub fn reserve_slot(&mut self) -> NodeId {
		for (index, descriptor) in self.slots.iter().enumerate() {
			if !descriptor.used {
				return NodeId(index);
			}
		}

		unreachable!("arena was not grown before a slot was reserved")
	}

	/// Marks a reserved slot as `used`, initializing its fields. Increments
	/// the used-slot counter.
	pub fn occupy(&mut self, id: NodeId, descriptor: Descriptor) {
		debug_assert!(!self.slots[id.0].used, "occupying an already-used slot");
		self.slots[id.0] = descriptor;
		self.slots[id.0].used = true;
		self.used_count += 1;
	}

	/// Reverts a slot to free, bumping its generation so stale handles into
	/// it are rejected, and clearing its links/size.
	pub fn vacate(&mut self, id: NodeId) {
		let generation = self.slots[id.0].generation.wrapping_add(1);
		self.slots[id.0] = Descriptor::free_slot(generation);
		self.used_count -= 1;
	}

	pub fn get(&self, id: NodeId) -> &Descriptor {
		&self.slots[id.0]
	}

	pub fn get_mut(&mut self, id: NodeId) -> &mut Descriptor {
		&mut self.slots[id.0]
	}

	/// Mints a handle for the descriptor currently occupying `id`.
	pub fn handle_for(&self, id: NodeId) -> SegmentHandle {
		SegmentHandle { id, generation: self.slots[id.0].generation }
	}

	/// Resolves a handle to a live node identity, or `None` if the slot has
	/// since been released, reused, or never existed (stale/foreign handle).
	pub fn resolve(&self, handle: SegmentHandle) -> Option<NodeId> {
		let id = handle.id;
		let descriptor = self.slots.get(id.0)?;
		(descriptor.used && descriptor.generation == handle.generation).then_some(id)
	}
}
