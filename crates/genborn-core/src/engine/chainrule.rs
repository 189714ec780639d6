use super::dadx::DerivativeBuffer;
use super::error::EngineError;
use crate::core::models::atom::AtomRecord;
use crate::core::neighbors::NeighborList;
use nalgebra::Vector3;
use std::ops::Range;

/// Converts `dE/dR` into Cartesian forces through the buffered radial derivatives.
///
/// Walks the neighbor-list rows `rows` in the same order the radius pass did and pairs each
/// entry with the derivative stored for its slot. `factors[i]` is the model's rescaled
/// chain-rule factor of atom `i` and must be fully reduced before this is called. Every
/// buffered entry must be consumed by the walk, otherwise the buffer and the list disagree.
pub fn distribute_forces(
    list: &NeighborList,
    dadx: &DerivativeBuffer,
    factors: &[f64],
    atoms: &[AtomRecord],
    rows: Range<usize>,
    forces: &mut [Vector3<f64>],
) -> Result<(), EngineError> {
    dadx.verify(list)?;

    let mut buffered = dadx.entries().peekable();
    let mut previous = None;

    for entry in list.entries(rows) {
        let Some(&(slot, value)) = buffered.peek() else {
            break;
        };
        if slot != entry.slot {
            continue;
        }
        buffered.next();
        previous = Some(slot.index());

        let dx = atoms[entry.i].position - atoms[entry.j].position;
        let t = dx * (factors[entry.i] * value);
        forces[entry.i] += t;
        forces[entry.j] -= t;
    }

    match buffered.next() {
        Some((slot, _)) => Err(EngineError::TraversalOrder {
            previous,
            found: slot.index(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::pairlist::ShortRangePairList;
    use crate::core::models::topology::GbTopology;
    use crate::core::neighbors::{BondedInclusion, NeighborListBuilder, PairSlot};
    use nalgebra::Point3;

    fn chain() -> (Vec<AtomRecord>, NeighborListBuilder) {
        let atoms = vec![
            AtomRecord::new(Point3::new(0.0, 0.0, 0.0), 0.1, 0),
            AtomRecord::new(Point3::new(0.2, 0.1, 0.0), 0.2, 0),
            AtomRecord::new(Point3::new(0.3, -0.1, 0.2), -0.3, 0),
        ];
        let mut builder = NeighborListBuilder::new(3);
        builder
            .rebuild(
                BondedInclusion::All,
                &GbTopology::default(),
                &ShortRangePairList::from_pairs([(0, 1), (0, 2), (1, 2)]),
            )
            .unwrap();
        (atoms, builder)
    }

    fn filled(list: &NeighborList, skip: &[usize]) -> DerivativeBuffer {
        let mut dadx = DerivativeBuffer::new();
        dadx.reset(list).unwrap();
        for entry in list.entries(0..list.natoms()) {
            if !skip.contains(&entry.slot.index()) {
                dadx.push(entry.slot, 0.5 + entry.slot.index() as f64);
            }
        }
        dadx
    }

    #[test]
    fn forces_obey_newtons_third_law() {
        let (atoms, builder) = chain();
        let list = builder.list();
        let dadx = filled(list, &[]);
        let mut forces = vec![Vector3::zeros(); 3];

        distribute_forces(list, &dadx, &[1.0, -2.0, 0.5], &atoms, 0..3, &mut forces).unwrap();

        let total: Vector3<f64> = forces.iter().sum();
        assert!(total.norm() < 1e-12);
        assert!(forces.iter().all(|f| f.norm() > 0.0));
    }

    #[test]
    fn each_entry_pushes_along_its_own_displacement() {
        let (atoms, builder) = chain();
        let list = builder.list();
        let first = list.entries(0..1).next().unwrap();
        let dadx = filled(list, &[]);
        let mut forces = vec![Vector3::zeros(); 3];

        // Only atom 0's row and only atom 0 has a non-zero factor.
        let mut rowwise = vec![Vector3::zeros(); 3];
        distribute_forces(list, &dadx, &[2.0, 0.0, 0.0], &atoms, 0..3, &mut forces).unwrap();
        for entry in list.entries(0..1) {
            let dx = atoms[0].position - atoms[entry.j].position;
            let t = dx * (2.0 * dadx.get(entry.slot).unwrap());
            rowwise[0] += t;
            rowwise[entry.j] -= t;
        }
        assert_eq!(first.i, 0);
        for (a, b) in forces.iter().zip(&rowwise) {
            assert!((a - b).norm() < 1e-15);
        }
    }

    #[test]
    fn sparse_buffers_skip_missing_slots() {
        let (atoms, builder) = chain();
        let list = builder.list();
        let dadx = filled(list, &[1, 4]);
        let mut forces = vec![Vector3::zeros(); 3];

        assert!(distribute_forces(list, &dadx, &[1.0; 3], &atoms, 0..3, &mut forces).is_ok());
    }

    #[test]
    fn partial_rows_only_consume_their_own_entries() {
        let (atoms, builder) = chain();
        let list = builder.list();
        let mut dadx = DerivativeBuffer::new();
        dadx.reset(list).unwrap();
        for entry in list.entries(1..3) {
            dadx.push(entry.slot, 1.0);
        }
        let mut forces = vec![Vector3::zeros(); 3];
        assert!(distribute_forces(list, &dadx, &[1.0; 3], &atoms, 1..3, &mut forces).is_ok());

        // The same buffer walked over fewer rows leaves entries unconsumed.
        let result = distribute_forces(list, &dadx, &[1.0; 3], &atoms, 1..2, &mut forces);
        assert!(matches!(result, Err(EngineError::TraversalOrder { .. })));
    }

    #[test]
    fn stale_buffer_is_rejected() {
        let (atoms, mut builder) = chain();
        let dadx = filled(builder.list(), &[]);
        builder
            .rebuild(
                BondedInclusion::All,
                &GbTopology::default(),
                &ShortRangePairList::from_pairs([(0, 1), (0, 2), (1, 2)]),
            )
            .unwrap();
        let mut forces = vec![Vector3::zeros(); 3];

        let result = distribute_forces(builder.list(), &dadx, &[1.0; 3], &atoms, 0..3, &mut forces);
        assert!(matches!(result, Err(EngineError::StaleDerivatives { .. })));
    }

    #[test]
    fn out_of_order_buffer_is_rejected() {
        let (atoms, builder) = chain();
        let list = builder.list();
        let mut dadx = DerivativeBuffer::new();
        dadx.reset(list).unwrap();
        dadx.push(PairSlot::new(2), 1.0);
        dadx.push(PairSlot::new(1), 1.0);
        let mut forces = vec![Vector3::zeros(); 3];

        let result = distribute_forces(list, &dadx, &[1.0; 3], &atoms, 0..3, &mut forces);
        assert!(matches!(
            result,
            Err(EngineError::TraversalOrder {
                previous: Some(2),
                found: 1
            })
        ));
    }
}
