/*
 * Copyright 2019-2020 Wren Powell
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::cell::RefCell;
use std::rc::Rc;

/// A client-side queue of deferred store operations.
///
/// Nothing enqueued onto a `Batch` is observable until [`execute`](Batch::execute)
/// is called. Operations run in enqueue order; a failure in one operation
/// does not prevent the rest from running (see the crate-level docs for why).
/// There is no guarantee that operations against different namespaces become
/// observable atomically relative to an external reader.
#[derive(Default)]
pub struct Batch {
    ops: Vec<Box<dyn FnOnce() -> crate::Result<()>>>,
}

impl Batch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Batch { ops: Vec::new() }
    }

    /// Enqueue an operation to run when the batch is executed.
    pub fn enqueue(&mut self, op: impl FnOnce() -> crate::Result<()> + 'static) {
        self.ops.push(Box::new(op));
    }

    /// Returns `true` if no operations have been enqueued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Run every enqueued operation in order.
    ///
    /// Every operation runs even if an earlier one fails; each failure is
    /// logged. The return value is the conjunction of all per-operation
    /// results: `true` only if every operation succeeded.
    pub fn execute(self) -> bool {
        let mut all_succeeded = true;

        for (index, op) in self.ops.into_iter().enumerate() {
            if let Err(error) = op() {
                tracing::error!(index, %error, "batch operation failed");
                all_succeeded = false;
            }
        }

        all_succeeded
    }
}

/// A single-resolution, single-threaded future-or-continuation.
///
/// Used to carry the result of a batched read (such as `item_get_async`)
/// from the point it's enqueued to the point after [`Batch::execute`]
/// resolves it. Cloning a `Promise` shares the same underlying cell, so the
/// closure that resolves it and the caller that later reads it can each hold
/// their own handle.
pub struct Promise<T>(Rc<RefCell<Option<T>>>);

impl<T> Promise<T> {
    /// Create an unresolved promise.
    pub fn new() -> Self {
        Promise(Rc::new(RefCell::new(None)))
    }

    /// Resolve the promise with a value.
    ///
    /// If called more than once, the most recent value wins.
    pub fn resolve(&self, value: T) {
        *self.0.borrow_mut() = Some(value);
    }

    /// Take the resolved value, if any.
    ///
    /// Returns `None` if the promise has not yet been resolved (typically
    /// because the batch it was enqueued on hasn't been executed).
    pub fn take(&self) -> Option<T> {
        self.0.borrow_mut().take()
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise(Rc::clone(&self.0))
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Promise::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc as StdRc;

    #[test]
    fn batch_runs_operations_in_order() {
        let order = StdRc::new(RefCell::new(Vec::new()));
        let mut batch = Batch::new();

        for i in 0..5 {
            let order = StdRc::clone(&order);
            batch.enqueue(move || {
                order.borrow_mut().push(i);
                Ok(())
            });
        }

        assert!(batch.execute());
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn batch_runs_every_operation_even_after_a_failure() {
        let ran = Rc::new(Cell::new(0));
        let mut batch = Batch::new();

        let ran1 = Rc::clone(&ran);
        batch.enqueue(move || {
            ran1.set(ran1.get() + 1);
            Err(crate::Error::NotFound)
        });

        let ran2 = Rc::clone(&ran);
        batch.enqueue(move || {
            ran2.set(ran2.get() + 1);
            Ok(())
        });

        assert!(!batch.execute());
        assert_eq!(ran.get(), 2);
    }

    #[test]
    fn promise_resolves_after_execute() {
        let promise = Promise::new();
        let resolver = promise.clone();
        let mut batch = Batch::new();

        batch.enqueue(move || {
            resolver.resolve(42);
            Ok(())
        });

        assert_eq!(promise.take(), None);
        batch.execute();
        assert_eq!(promise.take(), Some(42));
    }
}
