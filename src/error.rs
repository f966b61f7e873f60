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

use thiserror::Error;

/// The tagged status values returned by every fallible operation.
///
/// There is no panic/exception channel for caller-triggered conditions; only
/// detected internal invariant violations (a corrupted arena/gap index) abort
/// the process, via `debug_assert!`/`unreachable!` in the modules that touch
/// them.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
	/// The host allocator could not satisfy a byte region or descriptor-slot
	/// request.
	#[error("host allocator failed to provide {requested} bytes")]
	AllocationFailed { requested: usize },
	/// A `close` or `release` precondition was violated: the pool has
	/// outstanding allocations, more than one gap, or the handle does not
	/// identify a live allocated segment in this pool.
	#[error("pool has outstanding allocations, is not in a closable state, or the handle is unknown")]
	NotFreed,
	/// `init`/`free` were called out of sequence.
	#[error("registry init/free called again out of sequence")]
	CalledAgain,
	/// No gap in the pool is large enough to satisfy the request.
	#[error("no gap large enough for a {requested}-byte allocation")]
	NoMemory { requested: usize },
}

/// A `Result` alias for fallible suballocator operations.
pub type Result<T = ()> = std::result::Result<T, Error>;
