//! Sequential batch execution.
//!
//! A [`BatchProvider`] drives one batch at a time, in order, advancing
//! only when the previous batch completed. After the last batch the
//! result buffer holds the sum of all batches' contributions. A
//! mid-batch failure is fatal to the whole computation: the result is
//! zeroed before the error propagates, so a partially summed state is
//! never observable.

use anyhow::Result;
use num_traits::Zero;

use crate::batch_list::IdxRange;

/// Drives repeated execution over a batch list.
pub struct BatchProvider {
    batch_list: Vec<IdxRange>,
    completed: usize,
}

impl BatchProvider {
    /// Create a provider over the given batch list.
    pub fn new(batch_list: Vec<IdxRange>) -> Self {
        Self {
            batch_list,
            completed: 0,
        }
    }

    /// The batch ranges, in execution order.
    pub fn batch_list(&self) -> &[IdxRange] {
        &self.batch_list
    }

    /// Number of batches.
    pub fn n_batches(&self) -> usize {
        self.batch_list.len()
    }

    /// Batches completed by the last [`BatchProvider::get_batch`] call.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Zero `result`, then run `body` once per batch range in order,
    /// accumulating into `result`.
    ///
    /// `body` receives the result buffer and the batch's block-index
    /// range. Execution is strictly sequential; the next batch starts
    /// only after the previous one returned successfully.
    ///
    /// # Errors
    ///
    /// Propagates the first batch failure; `result` is zeroed first so
    /// no partial sums remain observable.
    pub fn get_batch<T, F>(&mut self, result: &mut [T], mut body: F) -> Result<()>
    where
        T: Copy + Zero,
        F: FnMut(&mut [T], IdxRange) -> Result<()>,
    {
        result.fill(T::zero());
        self.completed = 0;
        for &range in &self.batch_list {
            if let Err(err) = body(result, range) {
                result.fill(T::zero());
                return Err(err);
            }
            self.completed += 1;
        }
        Ok(())
    }
}
