//! Pure merge policy for joins and leaves.
//!
//! These functions only look at a participant map and decide what should change,
//! the [super::ParticipantReconciler] turns the decision into targeted writes.

use std::collections::BTreeMap;

use crate::{FieldPath, FieldUpdate};

use super::{Identity, Participant, ParticipantKey};

/// What a join request resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinPlan {
    /// The exact same user and session is already in the room
    AlreadyJoined(ParticipantKey),
    /// A fresh entry is created after removing the user's entries from other sessions
    Register { stale: Vec<ParticipantKey> },
}

/// Decides how a join should be applied. The last session of a user always wins,
/// so a user never appears twice in the same room.
pub fn reconcile_join(
    participants: &BTreeMap<ParticipantKey, Participant>,
    identity: &Identity,
) -> JoinPlan {
    if let Some((key, _)) = participants
        .iter()
        .find(|(_, p)| p.matches_session(identity))
    {
        return JoinPlan::AlreadyJoined(key.clone());
    }

    let stale = participants
        .iter()
        .filter(|(_, p)| p.user_id == identity.user_id)
        .map(|(key, _)| key.clone())
        .collect();

    JoinPlan::Register { stale }
}

/// Returns the keys a leave request removes: the exact session if one is given,
/// otherwise every entry of the user.
pub fn reconcile_leave(
    participants: &BTreeMap<ParticipantKey, Participant>,
    identity: &Identity,
) -> Vec<ParticipantKey> {
    participants
        .iter()
        .filter(|(_, p)| match &identity.session_id {
            Some(_) => p.matches_session(identity),
            None => p.user_id == identity.user_id,
        })
        .map(|(key, _)| key.clone())
        .collect()
}

/// Path of a participant record in a room document
pub fn participant_path(key: &str) -> FieldPath {
    FieldPath::new("participants").child(key)
}

impl JoinPlan {
    /// The writes that register `participant` under `key`, removing stale entries first
    pub fn field_updates(
        &self,
        key: &str,
        participant: &Participant,
    ) -> serde_json::Result<Vec<FieldUpdate>> {
        let JoinPlan::Register { stale } = self else {
            return Ok(vec![]);
        };

        let mut updates: Vec<_> = stale
            .iter()
            .map(|k| FieldUpdate::delete(participant_path(k)))
            .collect();

        updates.push(FieldUpdate::set(
            participant_path(key),
            serde_json::to_value(participant)?,
        ));

        Ok(updates)
    }

    /// Applies the plan to a copy of the map
    pub fn apply(
        &self,
        participants: &BTreeMap<ParticipantKey, Participant>,
        key: &str,
        participant: Participant,
    ) -> BTreeMap<ParticipantKey, Participant> {
        let mut next = participants.clone();

        if let JoinPlan::Register { stale } = self {
            for k in stale {
                next.remove(k);
            }

            next.insert(key.to_string(), participant);
        }

        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldValue;

    fn map(entries: &[(&str, &Identity)]) -> BTreeMap<ParticipantKey, Participant> {
        entries
            .iter()
            .map(|(key, identity)| (key.to_string(), Participant::new(identity, "someone", false)))
            .collect()
    }

    #[test]
    fn test_same_session_is_idempotent() {
        let ada = Identity::new("ada").with_session("tab-1");
        let participants = map(&[("k1", &ada)]);

        let plan = reconcile_join(&participants, &ada);
        assert_eq!(plan, JoinPlan::AlreadyJoined("k1".to_string()));

        let next = plan.apply(&participants, "k2", Participant::new(&ada, "Ada", false));
        assert_eq!(next, participants);
    }

    #[test]
    fn test_new_session_replaces_old_ones() {
        let ada_tab_1 = Identity::new("ada").with_session("tab-1");
        let ada_no_session = Identity::new("ada");
        let bob = Identity::new("bob").with_session("tab-1");
        let participants = map(&[("k1", &ada_tab_1), ("k2", &ada_no_session), ("k3", &bob)]);

        let ada_tab_2 = Identity::new("ada").with_session("tab-2");
        let plan = reconcile_join(&participants, &ada_tab_2);

        assert_eq!(
            plan,
            JoinPlan::Register {
                stale: vec!["k1".to_string(), "k2".to_string()]
            }
        );

        let next = plan.apply(&participants, "k4", Participant::new(&ada_tab_2, "Ada", false));
        let ada_entries: Vec<_> = next.iter().filter(|(_, p)| p.user_id == "ada").collect();

        assert_eq!(next.len(), 2);
        assert_eq!(ada_entries.len(), 1);
        assert_eq!(ada_entries[0].0, "k4");
        assert!(next.contains_key("k3"));
    }

    #[test]
    fn test_new_user_registers_without_removals() {
        let participants = map(&[("k1", &Identity::new("ada"))]);
        let bob = Identity::new("bob");

        let plan = reconcile_join(&participants, &bob);
        assert_eq!(plan, JoinPlan::Register { stale: vec![] });

        let updates = plan
            .field_updates("k2", &Participant::new(&bob, "Bob", false))
            .unwrap();

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].path.to_string(), "participants.k2");
        assert!(matches!(updates[0].value, FieldValue::Set(_)));
    }

    #[test]
    fn test_leave_targets_session_or_user() {
        let ada_tab_1 = Identity::new("ada").with_session("tab-1");
        let ada_tab_2 = Identity::new("ada").with_session("tab-2");
        let bob = Identity::new("bob");
        let participants = map(&[("k1", &ada_tab_1), ("k2", &ada_tab_2), ("k3", &bob)]);

        assert_eq!(reconcile_leave(&participants, &ada_tab_2), vec!["k2".to_string()]);
        assert_eq!(
            reconcile_leave(&participants, &Identity::new("ada")),
            vec!["k1".to_string(), "k2".to_string()]
        );
        assert!(reconcile_leave(&participants, &Identity::new("carol")).is_empty());
        assert!(reconcile_leave(&participants, &Identity::new("bob").with_session("x")).is_empty());
    }
}
