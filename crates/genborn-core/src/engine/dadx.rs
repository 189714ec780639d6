use super::error::EngineError;
use crate::core::neighbors::{NeighborList, PairSlot};

const CAPACITY_HEADROOM: f64 = 1.1;

/// Per-pair radial derivatives written by the radius pass and consumed by the chain rule.
///
/// Entries are tagged with the neighbor-list slot they belong to and the buffer remembers
/// the generation of the list it was filled against, so a consumer walking a different list
/// or a different order is rejected instead of silently pairing the wrong derivatives.
#[derive(Debug, Clone, Default)]
pub struct DerivativeBuffer {
    generation: u64,
    slots: Vec<PairSlot>,
    values: Vec<f64>,
}

impl DerivativeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties the buffer for a pass over `list` and makes room for every listed pair.
    pub fn reset(&mut self, list: &NeighborList) -> Result<(), EngineError> {
        self.slots.clear();
        self.values.clear();
        self.generation = list.generation();

        let required = list.len();
        if required > self.values.capacity() || required > self.slots.capacity() {
            let requested = ((required as f64) * CAPACITY_HEADROOM).ceil() as usize;
            self.values
                .try_reserve_exact(requested)
                .map_err(|_| EngineError::BufferAllocation { requested })?;
            self.slots
                .try_reserve_exact(requested)
                .map_err(|_| EngineError::BufferAllocation { requested })?;
        }
        Ok(())
    }

    #[inline]
    pub fn push(&mut self, slot: PairSlot, value: f64) {
        self.slots.push(slot);
        self.values.push(value);
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.values.capacity().min(self.slots.capacity())
    }

    /// Entries in the order they were written.
    pub fn entries(&self) -> impl Iterator<Item = (PairSlot, f64)> + '_ {
        self.slots.iter().copied().zip(self.values.iter().copied())
    }

    /// The value written for `slot`, if any.
    #[cfg(test)]
    pub(crate) fn get(&self, slot: PairSlot) -> Option<f64> {
        self.slots
            .binary_search(&slot)
            .ok()
            .map(|index| self.values[index])
    }

    /// Checks that the buffer belongs to `list` and that its slots strictly increase.
    pub fn verify(&self, list: &NeighborList) -> Result<(), EngineError> {
        if self.generation != list.generation() {
            return Err(EngineError::StaleDerivatives {
                buffer: self.generation,
                list: list.generation(),
            });
        }
        let mut previous: Option<PairSlot> = None;
        for &slot in &self.slots {
            if previous.is_some_and(|p| p >= slot) || slot.index() >= list.len() {
                return Err(EngineError::TraversalOrder {
                    previous: previous.map(PairSlot::index),
                    found: slot.index(),
                });
            }
            previous = Some(slot);
        }
        Ok(())
    }
}
