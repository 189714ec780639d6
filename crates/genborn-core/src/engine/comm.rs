use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};
use std::ops::Range;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CommError {
    #[error("Collective called with {found} values on rank {rank}, but rank 0 supplied {expected}")]
    LengthMismatch {
        rank: usize,
        expected: usize,
        found: usize,
    },
    #[error("A rank panicked while holding the collective buffers")]
    Poisoned,
    #[error("Rank {rank} left the group before completing a collective")]
    Aborted { rank: usize },
    #[error("Communicator group must have at least one rank")]
    EmptyGroup,
    #[error("Failed to start the local rank pool: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}

/// A contiguous block of atoms owned by one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomRange {
    pub start: usize,
    pub end: usize,
}

impl AtomRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The `index`-th of `parts` near-equal blocks of `0..n`; the first `n % parts` blocks
    /// hold one extra element.
    pub fn split(n: usize, parts: usize, index: usize) -> Self {
        let parts = parts.max(1);
        let base = n / parts;
        let extra = n % parts;
        let start = index * base + index.min(extra);
        let len = base + usize::from(index < extra);
        Self::new(start.min(n), (start + len).min(n))
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// The collective operations the solver needs from its parallel environment.
///
/// Every rank must call the same collectives in the same order with equally sized buffers.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Replaces `values` on every rank with the element-wise sum over all ranks.
    fn sum_reduce(&self, values: &mut [f64]) -> Result<(), CommError>;

    /// Replaces `values` on every rank with rank 0's copy.
    fn broadcast(&self, values: &mut [f64]) -> Result<(), CommError>;

    fn is_master(&self) -> bool {
        self.rank() == 0
    }

    /// The atoms this rank evaluates in per-atom loops.
    fn home_range(&self, natoms: usize) -> AtomRange {
        AtomRange::split(natoms, self.size(), self.rank())
    }
}

/// The single-process communicator; every collective is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn sum_reduce(&self, _values: &mut [f64]) -> Result<(), CommError> {
        Ok(())
    }

    fn broadcast(&self, _values: &mut [f64]) -> Result<(), CommError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    departed: Option<usize>,
}

/// A reusable barrier that fails every waiter once any rank has left the group.
#[derive(Debug)]
struct RankBarrier {
    size: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl RankBarrier {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(BarrierState::default()),
            released: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<(), CommError> {
        let mut state = self.state.lock().map_err(|_| CommError::Poisoned)?;
        if let Some(rank) = state.departed {
            return Err(CommError::Aborted { rank });
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation += 1;
            self.released.notify_all();
            return Ok(());
        }
        loop {
            state = self
                .released
                .wait(state)
                .map_err(|_| CommError::Poisoned)?;
            if state.generation != generation {
                return Ok(());
            }
            if let Some(rank) = state.departed {
                return Err(CommError::Aborted { rank });
            }
        }
    }

    /// Marks `rank` as gone. Collectives still in flight, and every later one, fail.
    fn leave(&self, rank: usize) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.departed.get_or_insert(rank);
        self.released.notify_all();
    }
}

#[derive(Debug)]
struct Shared {
    size: usize,
    barrier: RankBarrier,
    slots: Mutex<Vec<Vec<f64>>>,
}

impl Shared {
    fn slots(&self) -> Result<MutexGuard<'_, Vec<Vec<f64>>>, CommError> {
        self.slots.lock().map_err(|_| CommError::Poisoned)
    }
}

/// Leaves the group when a rank's closure returns or unwinds.
struct Departure<'a> {
    rank: usize,
    shared: &'a Shared,
}

impl Drop for Departure<'_> {
    fn drop(&mut self) {
        self.shared.barrier.leave(self.rank);
    }
}

/// One rank of an in-process [`LocalGroup`].
#[derive(Debug, Clone)]
pub struct LocalCommunicator {
    rank: usize,
    shared: Arc<Shared>,
}

impl LocalCommunicator {
    /// Publishes `values` in this rank's slot and waits until every rank has done the same.
    fn publish(&self, values: &[f64]) -> Result<(), CommError> {
        {
            let mut slots = self.shared.slots()?;
            let slot = &mut slots[self.rank];
            slot.clear();
            slot.extend_from_slice(values);
        }
        self.shared.barrier.wait()
    }

    fn check_lengths(&self, slots: &[Vec<f64>], len: usize) -> Result<(), CommError> {
        let expected = slots[0].len();
        if slots.iter().any(|slot| slot.len() != expected) {
            return Err(CommError::LengthMismatch {
                rank: self.rank,
                expected,
                found: len,
            });
        }
        Ok(())
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn sum_reduce(&self, values: &mut [f64]) -> Result<(), CommError> {
        self.publish(values)?;
        let result = self.shared.slots().and_then(|slots| {
            self.check_lengths(&slots, values.len())?;
            for (k, value) in values.iter_mut().enumerate() {
                // Rank order keeps the result identical on every rank.
                let mut sum = slots[0][k];
                for slot in &slots[1..] {
                    sum += slot[k];
                }
                *value = sum;
            }
            Ok(())
        });
        let released = self.shared.barrier.wait();
        result.and(released)
    }

    fn broadcast(&self, values: &mut [f64]) -> Result<(), CommError> {
        self.publish(values)?;
        let result = self.shared.slots().and_then(|slots| {
            self.check_lengths(&slots, values.len())?;
            values.copy_from_slice(&slots[0]);
            Ok(())
        });
        let released = self.shared.barrier.wait();
        result.and(released)
    }
}

/// Runs `size` ranks in-process, each on its own thread of a dedicated rayon pool, connected
/// by barrier-synchronised collectives.
pub struct LocalGroup;

impl LocalGroup {
    /// Calls `f` once per rank and returns the per-rank results in rank order.
    ///
    /// A rank whose closure finishes leaves the group; any collective another rank is still
    /// waiting in, or starts afterwards, fails with [`CommError::Aborted`].
    pub fn run<F, R>(size: usize, f: F) -> Result<Vec<R>, CommError>
    where
        F: Fn(LocalCommunicator) -> R + Sync,
        R: Send,
    {
        if size == 0 {
            return Err(CommError::EmptyGroup);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("genborn-rank-{}", i))
            .build()?;
        let shared = Arc::new(Shared {
            size,
            barrier: RankBarrier::new(size),
            slots: Mutex::new(vec![Vec::new(); size]),
        });

        debug!("Starting local communicator group with {} ranks", size);
        Ok(pool.broadcast(|ctx| {
            let rank = ctx.index();
            let _departure = Departure {
                rank,
                shared: &shared,
            };
            f(LocalCommunicator {
                rank,
                shared: Arc::clone(&shared),
            })
        }))
    }
}
