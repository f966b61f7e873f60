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

//! The segment list: a logical doubly-linked list threaded through the node
//! arena, tiling a pool contiguously from offset 0. Mutated only through the
//! three primitives below, invoked by the pool manager.

use crate::arena::{Arena, Descriptor, NodeId};

/// One tile of a pool, as returned by [`crate::Pool::inspect`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Segment {
	pub size: usize,
	pub allocated: bool,
}

/// Splits an allocated prefix of `requested` bytes off the gap at `node`.
///
/// `node` shrinks to `requested` bytes and becomes allocated. If a remainder
/// is left over, a fresh descriptor is spliced in immediately after `node`
/// with the remainder, still a gap. Returns the new descriptor's identity, if
/// one was created.
pub(crate) fn split(arena: &mut Arena, node: NodeId, requested: usize) -> Option<NodeId> {
	let (remainder, offset, old_next) = {
		let descriptor = arena.get_mut(node);
		debug_assert!(descriptor.is_gap());
		debug_assert!(descriptor.size >= requested);

		let remainder = descriptor.size - requested;
		let offset = descriptor.offset;
		let old_next = descriptor.next;

		descriptor.size = requested;
		descriptor.allocated = true;

		(remainder, offset, old_next)
	};

	if remainder == 0 {
		return None;
	}

	let new_id = arena.reserve_slot();
	let generation = arena.get(new_id).generation;
	arena.occupy(
		new_id,
		Descriptor {
			size: remainder,
			offset: offset + requested,
			allocated: false,
			used: true,
			prev: Some(node),
			next: old_next,
			generation,
		},
	);

	if let Some(next) = old_next {
		arena.get_mut(next).prev = Some(new_id);
	}
	arena.get_mut(node).next = Some(new_id);

	Some(new_id)
}

/// Unlinks `node` from the segment list, re-linking its neighbors past it,
/// and returns its slot to the arena.
pub(crate) fn unlink(arena: &mut Arena, node: NodeId) {
	let (prev, next) = {
		let descriptor = arena.get(node);
		(descriptor.prev, descriptor.next)
	};

	if let Some(prev) = prev {
		arena.get_mut(prev).next = next;
	}
	if let Some(next) = next {
		arena.get_mut(next).prev = prev;
	}

	arena.vacate(node);
}

/// Grows `node` by absorbing its right neighbor, which is unlinked and
/// returned to the arena. Caller must ensure the right neighbor is a gap.
pub(crate) fn absorb_right(arena: &mut Arena, node: NodeId) {
	let next = arena.get(node).next.expect("absorb_right with no right neighbor");
	debug_assert!(arena.get(next).is_gap());

	let next_size = arena.get(next).size;
	arena.get_mut(node).size += next_size;
	unlink(arena, next);
}

/// Grows `prev` by absorbing `node`, which is unlinked and returned to the
/// arena. Caller must ensure `prev` is a gap.
pub(crate) fn absorb_left(arena: &mut Arena, prev: NodeId, node: NodeId) {
	debug_assert!(arena.get(prev).is_gap());
	debug_assert_eq!(arena.get(node).prev, Some(prev));

	let node_size = arena.get(node).size;
	arena.get_mut(prev).size += node_size;
	unlink(arena, node);
}

/// Walks the segment list from `head` to the tail, yielding `(id, &Descriptor)`
/// pairs in list order.
pub(crate) fn walk(arena: &Arena, head: NodeId) -> impl Iterator<Item = (NodeId, &Descriptor)> {
	let mut current = Some(head);
	std::iter::from_fn(move || {
		let id = current?;
		let descriptor = arena.get(id);
		current = descriptor.next;
		Some((id, descriptor))
	})
}
