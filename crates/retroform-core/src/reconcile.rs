//! Ordered child reconciliation.
//!
//! A parent aggregate (form, template, review) owns an ordered collection of
//! child records. Clients submit the *desired* collection as a list of edits:
//! each entry either references an existing child by identity (update it) or
//! carries no reference (create a new child). Reconciliation produces the new
//! authoritative sequence — matched children keep their identity, unreferenced
//! children are dropped, and every survivor gets `position = index` in the
//! submitted order.
//!
//! This is a pure in-memory operation; persistence of the result is the
//! storage layer's job, inside one transaction.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

use crate::error::{Error, Result};

/// One desired child state, as submitted by a client.
///
/// The order of a `SubmittedEdit` list is semantically significant: it defines
/// the resulting `position` assignment.
#[derive(Debug, Clone)]
pub struct SubmittedEdit<Id, P> {
    /// Identity of the existing child to update, or `None` to create one.
    pub target: Option<Id>,
    /// The new payload for the child.
    pub payload: P,
}

impl<Id, P> SubmittedEdit<Id, P> {
    /// An edit that creates a new child.
    pub fn create(payload: P) -> Self {
        Self { target: None, payload }
    }

    /// An edit that updates the child with the given identity.
    pub fn update(target: Id, payload: P) -> Self {
        Self { target: Some(target), payload }
    }
}

/// A child record that can be reconciled against submitted edits.
pub trait ChildRecord: Sized {
    /// Persisted identity type.
    type Id: Copy + Eq + Hash + Display;
    /// The client-supplied value carried by an edit.
    type Payload;

    /// Persisted identity, absent until the storage layer assigns one.
    fn id(&self) -> Option<Self::Id>;

    /// Build a brand-new child from a payload. Fails with
    /// [`Error::InvalidArgument`] if the payload fails content validation.
    fn create(payload: Self::Payload) -> Result<Self>;

    /// Replace this child's payload. Same validation rules as [`create`].
    ///
    /// [`create`]: ChildRecord::create
    fn apply(&mut self, payload: Self::Payload) -> Result<()>;

    /// Record the child's index within its parent's sequence.
    fn set_position(&mut self, position: i32);
}

/// Reconcile a parent's current children against a submitted edit list,
/// returning the new authoritative ordered sequence.
///
/// - An edit referencing an identity not present among `existing` fails with
///   [`Error::NotFound`]; stale or foreign identities are never silently
///   turned into creates.
/// - Any payload failing validation fails the whole call; the caller must not
///   persist a partial result.
/// - Existing children not referenced by any edit are dropped.
/// - Duplicate references to the same identity resolve **last-wins**: every
///   occurrence applies (and validates) its payload, and the child ends up at
///   the index of its last occurrence. The earlier slot collapses, so the
///   result can be shorter than the edit list, but positions stay dense.
pub fn reconcile<C: ChildRecord>(
    existing: Vec<C>,
    edits: Vec<SubmittedEdit<C::Id, C::Payload>>,
) -> Result<Vec<C>> {
    // Children still waiting to be claimed by an edit. Unpersisted children
    // cannot be referenced, so dropping them from the pool is correct.
    let mut pool: HashMap<C::Id, C> = existing
        .into_iter()
        .filter_map(|child| child.id().map(|id| (id, child)))
        .collect();

    // Slots are Options so a duplicate reference can vacate its earlier slot.
    let mut slots: Vec<Option<C>> = Vec::with_capacity(edits.len());
    let mut claimed: HashMap<C::Id, usize> = HashMap::new();

    for edit in edits {
        match edit.target {
            Some(id) => {
                if let Some(mut child) = pool.remove(&id) {
                    child.apply(edit.payload)?;
                    claimed.insert(id, slots.len());
                    slots.push(Some(child));
                } else if let Some(&earlier) = claimed.get(&id) {
                    // Duplicate reference: re-apply and move to this slot.
                    if let Some(mut child) = slots[earlier].take() {
                        child.apply(edit.payload)?;
                        claimed.insert(id, slots.len());
                        slots.push(Some(child));
                    }
                } else {
                    return Err(Error::NotFound(format!(
                        "child {id} is not part of this collection"
                    )));
                }
            }
            None => {
                slots.push(Some(C::create(edit.payload)?));
            }
        }
    }

    let mut children: Vec<C> = slots.into_iter().flatten().collect();
    for (index, child) in children.iter_mut().enumerate() {
        child.set_position(index as i32);
    }
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Item {
        id: Option<u32>,
        text: String,
        position: i32,
    }

    impl Item {
        fn persisted(id: u32, text: &str, position: i32) -> Self {
            Item { id: Some(id), text: text.into(), position }
        }
    }

    impl ChildRecord for Item {
        type Id = u32;
        type Payload = String;

        fn id(&self) -> Option<u32> {
            self.id
        }

        fn create(payload: String) -> Result<Self> {
            if payload.trim().is_empty() {
                return Err(Error::InvalidArgument("empty text".into()));
            }
            Ok(Item { id: None, text: payload, position: 0 })
        }

        fn apply(&mut self, payload: String) -> Result<()> {
            if payload.trim().is_empty() {
                return Err(Error::InvalidArgument("empty text".into()));
            }
            self.text = payload;
            Ok(())
        }

        fn set_position(&mut self, position: i32) {
            self.position = position;
        }
    }

    fn edits(specs: &[(Option<u32>, &str)]) -> Vec<SubmittedEdit<u32, String>> {
        specs
            .iter()
            .map(|(target, text)| SubmittedEdit { target: *target, payload: (*text).to_string() })
            .collect()
    }

    #[test]
    fn test_positions_follow_submitted_order() {
        let result = reconcile::<Item>(
            vec![],
            edits(&[(None, "a"), (None, "b"), (None, "c")]),
        )
        .unwrap();

        assert_eq!(result.len(), 3);
        for (i, item) in result.iter().enumerate() {
            assert_eq!(item.position, i as i32);
        }
        assert_eq!(result[0].text, "a");
        assert_eq!(result[2].text, "c");
    }

    #[test]
    fn test_update_and_create_drops_unreferenced() {
        // Worked example: existing [{1,"q1"},{2,"q2"}], submit
        // [{id:2,"q2-edited"},{new "q3"}] -> [{2,"q2-edited",0},{new,"q3",1}].
        let existing = vec![
            Item::persisted(1, "q1", 0),
            Item::persisted(2, "q2", 1),
        ];

        let result = reconcile(
            existing,
            edits(&[(Some(2), "q2-edited"), (None, "q3")]),
        )
        .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0], Item::persisted(2, "q2-edited", 0));
        assert_eq!(result[1].id, None);
        assert_eq!(result[1].text, "q3");
        assert_eq!(result[1].position, 1);
        assert!(!result.iter().any(|item| item.id == Some(1)));
    }

    #[test]
    fn test_unknown_identity_is_not_found() {
        let existing = vec![Item::persisted(1, "q1", 0)];
        let err = reconcile(existing, edits(&[(Some(99), "nope")])).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_empty_edits_empties_collection() {
        let existing = vec![
            Item::persisted(1, "q1", 0),
            Item::persisted(2, "q2", 1),
        ];
        let result = reconcile(existing, edits(&[])).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_duplicate_reference_last_wins() {
        let existing = vec![Item::persisted(1, "q1", 0)];

        let result = reconcile(
            existing,
            edits(&[(Some(1), "first"), (None, "fresh"), (Some(1), "second")]),
        )
        .unwrap();

        // Child 1 collapses to its last occurrence; positions stay dense.
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].text, "fresh");
        assert_eq!(result[0].position, 0);
        assert_eq!(result[1], Item::persisted(1, "second", 1));
    }

    #[test]
    fn test_invalid_payload_fails_whole_call() {
        let existing = vec![Item::persisted(1, "q1", 0)];
        let err = reconcile(
            existing,
            edits(&[(Some(1), "ok"), (None, "   ")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
