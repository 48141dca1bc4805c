//! Build-once, read-many publication cell.
//!
//! # Invariants
//!
//! - Readers never take the lock once a value is published.
//!   - Enforced in: [`PublishOnce::get_or_try_init`]
//! - At most one initializer runs at a time; a failed initializer publishes nothing.
//!   - Enforced in: [`PublishOnce::get_or_try_init`]
//!   - Tested by: `tests::failed_init_is_retried`

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

pub(crate) struct PublishOnce<T> {
	slot: ArcSwapOption<T>,
	init: Mutex<()>,
}

impl<T> Default for PublishOnce<T> {
	fn default() -> Self {
		Self {
			slot: ArcSwapOption::empty(),
			init: Mutex::new(()),
		}
	}
}

impl<T> PublishOnce<T> {
	#[inline]
	pub(crate) fn get(&self) -> Option<Arc<T>> {
		self.slot.load_full()
	}

	/// Returns the published value, running `init` under the lock if there is none yet.
	pub(crate) fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<Arc<T>, E> {
		if let Some(value) = self.slot.load_full() {
			return Ok(value);
		}

		let _guard = self.init.lock();
		if let Some(value) = self.slot.load_full() {
			return Ok(value);
		}

		let value = Arc::new(init()?);
		self.slot.store(Some(Arc::clone(&value)));
		Ok(value)
	}

	/// Unpublishes and returns the current value.
	pub(crate) fn take(&self) -> Option<Arc<T>> {
		let _guard = self.init.lock();
		self.slot.swap(None)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	#[test]
	fn failed_init_is_retried() {
		let cell = PublishOnce::<u32>::default();
		assert_eq!(cell.get_or_try_init(|| Err::<u32, &str>("boom")), Err("boom"));
		assert!(cell.get().is_none());
		assert_eq!(*cell.get_or_try_init(|| Ok::<_, &str>(7)).unwrap(), 7);
		assert_eq!(*cell.get_or_try_init(|| Ok::<_, &str>(8)).unwrap(), 7);
	}

	#[test]
	fn concurrent_init_runs_once() {
		let cell = Arc::new(PublishOnce::<usize>::default());
		let calls = Arc::new(AtomicUsize::new(0));

		let handles: Vec<_> = (0..8)
			.map(|_| {
				let (cell, calls) = (Arc::clone(&cell), Arc::clone(&calls));
				std::thread::spawn(move || {
					*cell
						.get_or_try_init(|| Ok::<_, ()>(calls.fetch_add(1, Ordering::SeqCst)))
						.unwrap()
				})
			})
			.collect();

		for handle in handles {
			assert_eq!(handle.join().unwrap(), 0);
		}
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn take_unpublishes() {
		let cell = PublishOnce::<u32>::default();
		cell.get_or_try_init(|| Ok::<_, ()>(1)).unwrap();
		assert_eq!(cell.take().as_deref(), Some(&1));
		assert!(cell.get().is_none());
	}
}
