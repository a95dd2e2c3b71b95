// Copyright 2026 atrium Project Authors
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

use atrium_common::{
    code::Value,
    error::{Error, Result},
    strict_assert,
};

use crate::inflight::Waiter;

/// Lifecycle state of a cache item.
#[derive(Debug)]
pub enum State<V> {
    /// Registered, fetch outstanding. Holds the completion signal shared by all waiters.
    InFlight(Waiter<V>),
    /// The fetch succeeded; the value is readable without synchronization.
    Materialized(V),
    /// The fetch failed; the error was delivered to every waiter of that attempt.
    Failed(Error),
}

/// A cache item, stored in the key index.
#[derive(Debug)]
pub struct Record<V> {
    position: u64,
    state: State<V>,
}

impl<V> Record<V>
where
    V: Value,
{
    /// Create an in-flight record at the given position.
    pub fn in_flight(position: u64, waiter: Waiter<V>) -> Self {
        Self {
            position,
            state: State::InFlight(waiter),
        }
    }

    /// Position of the record in the position index.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Update the position after a refresh.
    pub fn set_position(&mut self, position: u64) {
        strict_assert!(position > self.position);
        self.position = position;
    }

    /// Lifecycle state.
    pub fn state(&self) -> &State<V> {
        &self.state
    }

    /// Convert an in-flight record whose result has already been published into its terminal state.
    ///
    /// No-op for records that are still pending or already terminal.
    pub fn settle(&mut self) {
        if let State::InFlight(waiter) = &self.state {
            if let Some(result) = waiter.try_get() {
                self.state = Self::terminal(result);
            }
        }
    }

    /// Record the outcome of the fetch attached to `waiter`.
    ///
    /// Returns `false` and leaves the record untouched if it no longer belongs to that fetch, e.g. it was replaced or
    /// has been settled already.
    pub fn complete(&mut self, waiter: &Waiter<V>, result: &Result<V>) -> bool {
        match &self.state {
            State::InFlight(w) if w.same_fetch(waiter) => {
                self.state = Self::terminal(result.clone());
                true
            }
            _ => false,
        }
    }

    /// Consume the record, returning its value if it ever materialized.
    pub fn into_value(self) -> Option<V> {
        match self.state {
            State::Materialized(value) => Some(value),
            State::InFlight(waiter) => waiter.try_get().and_then(|result| result.ok()),
            State::Failed(_) => None,
        }
    }

    fn terminal(result: Result<V>) -> State<V> {
        match result {
            Ok(value) => State::Materialized(value),
            Err(e) => State::Failed(e),
        }
    }
}
