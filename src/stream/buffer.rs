// SampleBuffer - single-slot hand-off from the producer callback to the tick
//
// The producer overwrites the pending batch; the tick moves it out. Only the
// copy-in and the move-out happen under the lock, never any pipeline work.
// Two pushes between drains drop the older batch entirely (last write wins);
// rows are never processed twice and batches are never mixed.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{log_stream_error, StreamError};

/// One batch of rows delivered by the input stream
pub type SampleBatch = Vec<Vec<f64>>;

/// Cloneable handle to the shared pending slot
#[derive(Clone, Default)]
pub struct SampleBuffer {
    pending: Arc<Mutex<Option<SampleBatch>>>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_pending(&self) -> Result<MutexGuard<'_, Option<SampleBatch>>, StreamError> {
        self.pending.lock().map_err(|_| {
            let err = StreamError::LockPoisoned {
                component: "sample_buffer".to_string(),
            };
            log_stream_error(&err, "lock_pending");
            err
        })
    }

    /// Replace the pending batch; safe to call from any thread
    ///
    /// # Returns
    /// `true` when an undrained batch was overwritten
    pub fn push(&self, batch: SampleBatch) -> Result<bool, StreamError> {
        let mut pending = self.lock_pending()?;
        Ok(pending.replace(batch).is_some())
    }

    /// Move the pending batch out, leaving the slot empty
    pub fn take(&self) -> Result<Option<SampleBatch>, StreamError> {
        Ok(self.lock_pending()?.take())
    }

    pub fn has_pending(&self) -> Result<bool, StreamError> {
        Ok(self.lock_pending()?.is_some())
    }

    /// Move the pending batch out and apply `f` to each row outside the lock
    ///
    /// # Returns
    /// Number of rows processed (0 when nothing was pending)
    pub fn drain_and_process<F>(&self, mut f: F) -> Result<usize, StreamError>
    where
        F: FnMut(&[f64]),
    {
        let Some(batch) = self.take()? else {
            return Ok(0);
        };
        for row in &batch {
            f(row);
        }
        Ok(batch.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn batch(tag: f64, rows: usize) -> SampleBatch {
        (0..rows).map(|i| vec![tag, i as f64]).collect()
    }

    #[test]
    fn test_drain_empty_processes_nothing() {
        let buffer = SampleBuffer::new();
        let mut seen = 0;
        assert_eq!(buffer.drain_and_process(|_| seen += 1).unwrap(), 0);
        assert_eq!(seen, 0);
    }

    #[test]
    fn test_last_write_wins() {
        let buffer = SampleBuffer::new();
        assert!(!buffer.push(batch(1.0, 3)).unwrap());
        assert!(buffer.push(batch(2.0, 4)).unwrap());
        assert!(buffer.push(batch(3.0, 2)).unwrap());

        let mut tags = Vec::new();
        let processed = buffer.drain_and_process(|row| tags.push(row[0])).unwrap();
        assert_eq!(processed, 2);
        assert_eq!(tags, vec![3.0, 3.0]);
    }

    #[test]
    fn test_rows_are_never_processed_twice() {
        let buffer = SampleBuffer::new();
        buffer.push(batch(1.0, 5)).unwrap();

        let mut count = 0;
        buffer.drain_and_process(|_| count += 1).unwrap();
        buffer.drain_and_process(|_| count += 1).unwrap();
        assert_eq!(count, 5);
        assert!(!buffer.has_pending().unwrap());
    }

    #[test]
    fn test_concurrent_producer_never_mixes_batches() {
        let buffer = SampleBuffer::new();
        let producer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for tag in 0..500 {
                    buffer.push(batch(tag as f64, 8)).unwrap();
                }
            })
        };

        let mut last_tag = -1.0;
        while !producer.is_finished() || buffer.has_pending().unwrap() {
            let mut tags = Vec::new();
            buffer.drain_and_process(|row| tags.push(row[0])).unwrap();
            if let Some(first) = tags.first().copied() {
                assert_eq!(tags.len(), 8);
                assert!(tags.iter().all(|t| *t == first));
                assert!(first > last_tag);
                last_tag = first;
            }
        }
        producer.join().unwrap();
    }
}
