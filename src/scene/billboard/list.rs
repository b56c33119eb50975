//! Ordered billboard membership, dirty tracking, and reconciliation.
//!
//! `BillboardList` is the CPU half of a collection: it owns the ordered
//! record list, the shared dirty/rewrite core that records notify on
//! mutation, and the staging arrays. [`BillboardList::reconcile`] turns
//! accumulated dirtiness into a [`SyncPlan`] the GPU half executes.

use std::cell::RefCell;
use std::rc::Rc;

use super::attributes::{coalesce_runs, AttributeArrays, DirtyRun};
use super::record::Billboard;
use crate::error::OrbisError;

/// Mutable state shared between a collection and its live records.
#[derive(Debug, Default)]
pub(crate) struct CollectionCore {
    /// Records whose GPU slots are stale, in notification order.
    pub(crate) dirty: Vec<Billboard>,
    /// Set by any membership change; forces a full storage rewrite.
    pub(crate) rewrite: bool,
}

/// What the GPU half must do to bring storage in sync.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SyncPlan {
    /// Storage already matches record state.
    Clean,
    /// Drop existing storage; allocate and fill `count` slots (none for
    /// an empty list).
    Rebuild {
        /// Live record count after the rewrite.
        count: usize,
    },
    /// Patch the given slot runs from the staging arrays.
    Patch(Vec<DirtyRun>),
}

pub(crate) struct BillboardList {
    billboards: Vec<Billboard>,
    core: Rc<RefCell<CollectionCore>>,
    staging: AttributeArrays,
}

impl BillboardList {
    pub(crate) fn new() -> Self {
        Self::with_capacity(0)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            billboards: Vec::with_capacity(capacity),
            core: Rc::new(RefCell::new(CollectionCore::default())),
            staging: AttributeArrays::new(),
        }
    }

    /// Take ownership of a detached record and flag a rewrite.
    fn claim(&self, billboard: &Billboard) -> Result<(), OrbisError> {
        if let Some(owner) = billboard.owner() {
            let same = owner
                .upgrade()
                .is_some_and(|core| Rc::ptr_eq(&core, &self.core));
            return Err(OrbisError::AlreadyOwned {
                other_collection: !same,
            });
        }
        billboard.set_owner(Rc::downgrade(&self.core));
        self.core.borrow_mut().rewrite = true;
        Ok(())
    }

    /// Detach a record, purging it from the dirty set, and flag a rewrite.
    fn release(&self, billboard: &Billboard) {
        let mut core = self.core.borrow_mut();
        if billboard.is_dirty() {
            core.dirty.retain(|d| d != billboard);
        }
        core.rewrite = true;
        drop(core);
        billboard.detach();
    }

    pub(crate) fn add(&mut self, billboard: &Billboard) -> Result<(), OrbisError> {
        self.claim(billboard)?;
        self.billboards.push(billboard.clone());
        Ok(())
    }

    pub(crate) fn insert(
        &mut self,
        index: usize,
        billboard: &Billboard,
    ) -> Result<(), OrbisError> {
        if index > self.billboards.len() {
            return Err(OrbisError::InvalidArgument(
                "insert index past the end of the collection",
            ));
        }
        self.claim(billboard)?;
        self.billboards.insert(index, billboard.clone());
        Ok(())
    }

    pub(crate) fn remove_at(
        &mut self,
        index: usize,
    ) -> Result<Billboard, OrbisError> {
        if index >= self.billboards.len() {
            return Err(OrbisError::InvalidArgument(
                "remove index past the end of the collection",
            ));
        }
        let billboard = self.billboards.remove(index);
        self.release(&billboard);
        Ok(billboard)
    }

    /// Replace the record at `index`, returning the displaced record.
    /// The incoming record must be detached, the outgoing one is detached
    /// on return.
    pub(crate) fn replace(
        &mut self,
        index: usize,
        billboard: &Billboard,
    ) -> Result<Billboard, OrbisError> {
        if index >= self.billboards.len() {
            return Err(OrbisError::InvalidArgument(
                "replace index past the end of the collection",
            ));
        }
        self.claim(billboard)?;
        let old =
            std::mem::replace(&mut self.billboards[index], billboard.clone());
        self.release(&old);
        Ok(old)
    }

    /// Detach and remove the record if present; returns whether it was
    /// found.
    pub(crate) fn remove(&mut self, billboard: &Billboard) -> bool {
        match self.billboards.iter().position(|b| b == billboard) {
            Some(index) => {
                let _ = self.billboards.remove(index);
                self.release(billboard);
                true
            }
            None => false,
        }
    }

    /// Detach every record and empty the list. GPU storage is kept until
    /// the next reconciliation.
    pub(crate) fn clear(&mut self) {
        for billboard in &self.billboards {
            billboard.detach();
        }
        self.billboards.clear();
        let mut core = self.core.borrow_mut();
        core.dirty.clear();
        core.rewrite = true;
    }

    pub(crate) fn len(&self) -> usize {
        self.billboards.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.billboards.is_empty()
    }

    pub(crate) fn contains(&self, billboard: &Billboard) -> bool {
        self.billboards.iter().any(|b| b == billboard)
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Billboard> {
        self.billboards.get(index)
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, Billboard> {
        self.billboards.iter()
    }

    pub(crate) fn staging(&self) -> &AttributeArrays {
        &self.staging
    }

    /// Fold accumulated dirtiness into the staging arrays and describe the
    /// GPU work left to do.
    ///
    /// A pending rewrite repacks every record in list order and assigns
    /// dense buffer offsets `0..count`, clearing all per-record dirty
    /// flags. Otherwise dirty records are repacked slot-wise, sorted by
    /// offset, and coalesced into contiguous runs.
    pub(crate) fn reconcile(&mut self) -> SyncPlan {
        let (rewrite, mut dirty) = {
            let mut core = self.core.borrow_mut();
            if core.rewrite {
                core.rewrite = false;
                core.dirty.clear();
                (true, Vec::new())
            } else {
                (false, std::mem::take(&mut core.dirty))
            }
        };

        if rewrite {
            self.staging.resize(self.billboards.len());
            for (slot, billboard) in self.billboards.iter().enumerate() {
                billboard.assign_slot(slot);
                self.staging.pack_slot(slot, &billboard.snapshot());
            }
            return SyncPlan::Rebuild {
                count: self.billboards.len(),
            };
        }

        if dirty.is_empty() {
            return SyncPlan::Clean;
        }

        dirty.sort_unstable_by_key(Billboard::buffer_offset);
        for billboard in &dirty {
            self.staging
                .pack_slot(billboard.buffer_offset(), &billboard.snapshot());
            billboard.clear_dirty();
        }
        SyncPlan::Patch(coalesce_runs(
            dirty.iter().map(Billboard::buffer_offset),
        ))
    }
}

impl Drop for BillboardList {
    fn drop(&mut self) {
        for billboard in &self.billboards {
            billboard.detach();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn list_of(n: usize) -> (BillboardList, Vec<Billboard>) {
        let mut list = BillboardList::new();
        let billboards: Vec<Billboard> = (0..n)
            .map(|i| Billboard::new(Vec3::new(i as f32, 0.0, 0.0)))
            .collect();
        for b in &billboards {
            list.add(b).unwrap();
        }
        (list, billboards)
    }

    #[test]
    fn add_assigns_dense_offsets_on_reconcile() {
        let (mut list, billboards) = list_of(3);
        assert_eq!(list.reconcile(), SyncPlan::Rebuild { count: 3 });
        for (i, b) in billboards.iter().enumerate() {
            assert_eq!(b.buffer_offset(), i);
            assert!(!b.is_dirty());
            assert!(b.is_live());
        }
        assert_eq!(list.reconcile(), SyncPlan::Clean);
    }

    #[test]
    fn double_add_same_collection() {
        let (mut list, billboards) = list_of(1);
        let err = list.add(&billboards[0]).unwrap_err();
        assert!(matches!(
            err,
            OrbisError::AlreadyOwned {
                other_collection: false
            }
        ));
    }

    #[test]
    fn double_add_other_collection() {
        let (_list, billboards) = list_of(1);
        let mut other = BillboardList::new();
        let err = other.add(&billboards[0]).unwrap_err();
        assert!(matches!(
            err,
            OrbisError::AlreadyOwned {
                other_collection: true
            }
        ));
    }

    #[test]
    fn mutation_enqueues_once() {
        let (mut list, billboards) = list_of(2);
        let _ = list.reconcile();
        billboards[1].set_color([0.0, 1.0, 0.0, 1.0]);
        billboards[1].set_position(Vec3::Z);
        billboards[1].set_position(Vec3::Y);
        assert_eq!(list.core.borrow().dirty.len(), 1);
        assert_eq!(list.reconcile(), SyncPlan::Patch(vec![DirtyRun {
            first: 1,
            len: 1
        }]));
        assert!(!billboards[1].is_dirty());
        assert!(list.core.borrow().dirty.is_empty());
    }

    #[test]
    fn structural_change_overrides_dirty_marks() {
        let (mut list, billboards) = list_of(3);
        let _ = list.reconcile();
        billboards[0].set_color([0.5; 4]);
        let removed = list.remove_at(2).unwrap();
        assert!(!removed.is_live());
        assert_eq!(list.reconcile(), SyncPlan::Rebuild { count: 2 });
        assert!(!billboards[0].is_dirty());
    }

    #[test]
    fn dirty_runs_coalesce_by_offset() {
        let (mut list, billboards) = list_of(5);
        let _ = list.reconcile();
        // Mark out of ascending order; reconcile sorts before coalescing.
        billboards[4].set_color([0.1; 4]);
        billboards[1].set_color([0.2; 4]);
        billboards[2].set_color([0.3; 4]);
        assert_eq!(
            list.reconcile(),
            SyncPlan::Patch(vec![
                DirtyRun { first: 1, len: 2 },
                DirtyRun { first: 4, len: 1 },
            ])
        );
    }

    #[test]
    fn removing_dirty_record_empties_dirty_set() {
        let (mut list, billboards) = list_of(1);
        let _ = list.reconcile();
        billboards[0].set_color([0.0; 4]);
        assert!(list.remove(&billboards[0]));
        assert!(list.core.borrow().dirty.is_empty());
        assert!(!billboards[0].is_dirty());
        assert_eq!(list.reconcile(), SyncPlan::Rebuild { count: 0 });
    }

    #[test]
    fn removed_record_joins_another_collection() {
        let (mut list, billboards) = list_of(1);
        assert!(list.remove(&billboards[0]));
        let mut other = BillboardList::new();
        assert!(other.add(&billboards[0]).is_ok());
        assert!(other.contains(&billboards[0]));
    }

    #[test]
    fn remove_unknown_record_returns_false() {
        let (mut list, _billboards) = list_of(2);
        let stranger = Billboard::new(Vec3::ZERO);
        assert!(!list.remove(&stranger));
    }

    #[test]
    fn insert_keeps_list_order() {
        let (mut list, billboards) = list_of(2);
        let _ = list.reconcile();
        let inserted = Billboard::new(Vec3::splat(9.0));
        list.insert(1, &inserted).unwrap();
        let _ = list.reconcile();
        assert_eq!(billboards[0].buffer_offset(), 0);
        assert_eq!(inserted.buffer_offset(), 1);
        assert_eq!(billboards[1].buffer_offset(), 2);
    }

    #[test]
    fn insert_past_end_is_invalid() {
        let (mut list, _billboards) = list_of(1);
        let b = Billboard::new(Vec3::ZERO);
        assert!(matches!(
            list.insert(3, &b),
            Err(OrbisError::InvalidArgument(_))
        ));
        assert!(!b.is_live());
    }

    #[test]
    fn replace_detaches_old_and_claims_new() {
        let (mut list, billboards) = list_of(2);
        let newcomer = Billboard::new(Vec3::splat(7.0));
        let old = list.replace(0, &newcomer).unwrap();
        assert_eq!(old, billboards[0]);
        assert!(!old.is_live());
        assert!(newcomer.is_live());
        assert!(list.contains(&newcomer));
        assert!(!list.contains(&old));
    }

    #[test]
    fn replace_with_member_of_this_collection_fails() {
        let (mut list, billboards) = list_of(2);
        let err = list.replace(0, &billboards[1]).unwrap_err();
        assert!(matches!(
            err,
            OrbisError::AlreadyOwned {
                other_collection: false
            }
        ));
    }

    #[test]
    fn clear_detaches_members() {
        let (mut list, billboards) = list_of(3);
        let _ = list.reconcile();
        billboards[1].set_color([0.0; 4]);
        list.clear();
        assert!(list.is_empty());
        assert!(list.core.borrow().dirty.is_empty());
        for b in &billboards {
            assert!(!b.is_live());
            assert!(!b.is_dirty());
        }
        assert_eq!(list.reconcile(), SyncPlan::Rebuild { count: 0 });
    }

    #[test]
    fn fresh_list_is_clean_until_touched() {
        let mut list = BillboardList::new();
        assert_eq!(list.reconcile(), SyncPlan::Clean);
    }

    #[test]
    fn emptied_list_rebuilds_to_zero_slots_once() {
        let (mut list, _billboards) = list_of(2);
        let _ = list.reconcile();
        list.clear();
        assert_eq!(list.reconcile(), SyncPlan::Rebuild { count: 0 });
        assert_eq!(list.reconcile(), SyncPlan::Clean);
    }

    #[test]
    fn detached_mutation_after_removal_is_harmless() {
        let (mut list, billboards) = list_of(2);
        let _ = list.reconcile();
        assert!(list.remove(&billboards[0]));
        billboards[0].set_color([0.25; 4]);
        assert!(list.core.borrow().dirty.is_empty());
        assert_eq!(list.reconcile(), SyncPlan::Rebuild { count: 1 });
    }

    #[test]
    fn dropping_list_detaches_members() {
        let (list, billboards) = list_of(2);
        drop(list);
        for b in &billboards {
            assert!(!b.is_live());
        }
        let mut other = BillboardList::new();
        assert!(other.add(&billboards[0]).is_ok());
    }

    #[test]
    fn staging_matches_packed_snapshots_after_rebuild() {
        use super::super::attributes::{pack_color, COLOR_STRIDE};

        let (mut list, billboards) = list_of(3);
        billboards[2].set_color([0.0, 0.5, 1.0, 1.0]);
        let _ = list.reconcile();
        let colors = list.staging().colors();
        assert_eq!(
            &colors[2 * COLOR_STRIDE..3 * COLOR_STRIDE],
            &pack_color([0.0, 0.5, 1.0, 1.0])
        );
        assert_eq!(list.staging().count(), 3);
    }
}
