//! Trust service: the per-student registry of trusted reviewers and their
//! unseen-update flags.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::model::{Review, Role, TrustEntry, MAX_WEIGHT, MIN_WEIGHT};
use crate::store::{self, reviews, trust, Store};

use super::directory::{require_role, require_user};
use super::{CoreError, CoreResult};

/// What a student sees when opening a reviewer's profile.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewerProfile {
    pub reviewer: String,
    /// The student's weight for this reviewer, if trusted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u8>,
    /// Whether opening the profile cleared an unseen update.
    pub cleared_update: bool,
    pub reviews: Vec<Review>,
}

/// Service for the trusted-reviewer registry.
pub struct TrustService<'a> {
    store: &'a Store,
}

impl<'a> TrustService<'a> {
    pub(crate) const fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Trust `reviewer` with `weight`, or change the weight of an existing
    /// entry. Repeating the same call changes nothing.
    pub fn add_or_update(
        &self,
        student: &str,
        reviewer: &str,
        weight: u8,
    ) -> CoreResult<TrustEntry> {
        if !(MIN_WEIGHT..=MAX_WEIGHT).contains(&weight) {
            return Err(CoreError::validation(
                "weight",
                format!("must be between {MIN_WEIGHT} and {MAX_WEIGHT}, got {weight}"),
            ));
        }
        if student == reviewer {
            return Err(CoreError::validation("reviewer", "students cannot trust themselves"));
        }

        let tx = self.store.begin_immediate().map_err(CoreError::storage)?;
        require_user(&tx, student)?;
        require_role(&tx, reviewer, Role::Reviewer, "be trusted as a reviewer")?;
        trust::upsert_trust(&tx, student, reviewer, weight, &store::now())
            .map_err(CoreError::storage)?;
        let entry = trust::get_trust(&tx, student, reviewer)
            .map_err(CoreError::storage)?
            .ok_or_else(|| not_found(student, reviewer))?;
        store::commit(tx).map_err(CoreError::storage)?;

        tracing::info!(student, reviewer, weight, "trusted reviewer");
        Ok(entry)
    }

    /// Stop trusting a reviewer. Returns `false` if the pair did not exist.
    pub fn remove(&self, student: &str, reviewer: &str) -> CoreResult<bool> {
        let removed = trust::delete_trust(self.store.conn(), student, reviewer)
            .map_err(CoreError::storage)?
            > 0;
        if removed {
            tracing::info!(student, reviewer, "removed trusted reviewer");
        }
        Ok(removed)
    }

    /// Raise the unseen-update flag for one pair.
    ///
    /// Returns `Err(CoreError::TrustNotFound)` if the student does not trust
    /// the reviewer.
    pub fn mark_updated(&self, student: &str, reviewer: &str) -> CoreResult<()> {
        let conn = self.store.conn();
        if trust::get_trust(conn, student, reviewer)
            .map_err(CoreError::storage)?
            .is_none()
        {
            return Err(not_found(student, reviewer));
        }
        trust::set_unseen(conn, student, reviewer, true).map_err(CoreError::storage)?;
        tracing::debug!(student, reviewer, "marked reviewer updated");
        Ok(())
    }

    /// Raise the flag for every student trusting `reviewer`. Returns how many
    /// flags changed.
    ///
    /// The review service does this inside its own transaction whenever a
    /// new version is written.
    pub fn notify_followers(&self, reviewer: &str) -> CoreResult<usize> {
        trust::mark_all_followers(self.store.conn(), reviewer).map_err(CoreError::storage)
    }

    /// Clear the flag for one pair. Absent pairs are a no-op.
    ///
    /// Returns whether a raised flag was cleared.
    pub fn clear_update_flag(&self, student: &str, reviewer: &str) -> CoreResult<bool> {
        let changed = trust::set_unseen(self.store.conn(), student, reviewer, false)
            .map_err(CoreError::storage)?;
        Ok(changed > 0)
    }

    /// Trusted reviewers and their weights.
    pub fn list_trusted(&self, student: &str) -> CoreResult<BTreeMap<String, u8>> {
        Ok(self
            .entries(student)?
            .into_iter()
            .map(|e| (e.reviewer, e.weight))
            .collect())
    }

    /// Trusted reviewers with an unseen update.
    pub fn list_updated(&self, student: &str) -> CoreResult<BTreeSet<String>> {
        Ok(self
            .entries(student)?
            .into_iter()
            .filter(|e| e.has_unseen_update)
            .map(|e| e.reviewer)
            .collect())
    }

    /// Full entries for a student, highest weight first.
    pub fn entries(&self, student: &str) -> CoreResult<Vec<TrustEntry>> {
        trust::list_for_student(self.store.conn(), student).map_err(CoreError::storage)
    }

    /// Whether `reviewer` has an update `student` has not seen. False when
    /// the pair does not exist.
    pub fn has_unseen_update(&self, student: &str, reviewer: &str) -> CoreResult<bool> {
        Ok(trust::get_trust(self.store.conn(), student, reviewer)
            .map_err(CoreError::storage)?
            .is_some_and(|e| e.has_unseen_update))
    }

    /// Open a reviewer's profile: clears the student's flag and returns the
    /// reviewer's latest reviews.
    pub fn view_profile(&self, student: &str, reviewer: &str) -> CoreResult<ReviewerProfile> {
        let conn = self.store.conn();
        require_user(conn, reviewer)?;
        let weight = trust::get_trust(conn, student, reviewer)
            .map_err(CoreError::storage)?
            .map(|e| e.weight);
        let cleared_update = self.clear_update_flag(student, reviewer)?;
        let reviews = reviews::list_latest_by_reviewer(conn, reviewer).map_err(CoreError::storage)?;
        if cleared_update {
            tracing::debug!(student, reviewer, "cleared unseen update");
        }
        Ok(ReviewerProfile {
            reviewer: reviewer.to_string(),
            weight,
            cleared_update,
            reviews,
        })
    }

    /// Students trusting `reviewer`.
    pub fn list_followers(&self, reviewer: &str) -> CoreResult<Vec<TrustEntry>> {
        trust::list_followers(self.store.conn(), reviewer).map_err(CoreError::storage)
    }
}

fn not_found(student: &str, reviewer: &str) -> CoreError {
    CoreError::TrustNotFound {
        student: student.to_string(),
        reviewer: reviewer.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{seed_thread, services_with_cast};
    use crate::core::ErrorKind;
    use crate::model::ReviewTarget;

    #[test]
    fn test_add_or_update_is_idempotent() {
        let services = services_with_cast();
        let trust = services.trust();

        let first = trust.add_or_update("maan", "alex", 3).unwrap();
        let again = trust.add_or_update("maan", "alex", 3).unwrap();
        assert_eq!(first, again);
        assert_eq!(trust.entries("maan").unwrap().len(), 1);

        let changed = trust.add_or_update("maan", "alex", 5).unwrap();
        assert_eq!(changed.weight, 5);
        assert_eq!(changed.created_at, first.created_at);
        assert_eq!(trust.list_trusted("maan").unwrap().get("alex"), Some(&5));
    }

    #[test]
    fn test_add_validation() {
        let services = services_with_cast();
        let trust = services.trust();

        for weight in [0, 6] {
            assert_eq!(
                trust.add_or_update("maan", "alex", weight).unwrap_err().kind(),
                ErrorKind::Validation
            );
        }
        assert_eq!(
            trust.add_or_update("jamie", "jamie", 3).unwrap_err().kind(),
            ErrorKind::Validation
        );
        // priya is not a reviewer
        assert_eq!(
            trust.add_or_update("maan", "priya", 3).unwrap_err().kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            trust.add_or_update("ghost", "alex", 3).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(trust.list_trusted("maan").unwrap().is_empty());
    }

    #[test]
    fn test_mark_and_clear() {
        let services = services_with_cast();
        let trust = services.trust();
        trust.add_or_update("maan", "alex", 3).unwrap();

        trust.mark_updated("maan", "alex").unwrap();
        assert!(trust.has_unseen_update("maan", "alex").unwrap());
        assert!(trust.list_updated("maan").unwrap().contains("alex"));

        assert!(trust.clear_update_flag("maan", "alex").unwrap());
        assert!(!trust.clear_update_flag("maan", "alex").unwrap());
        assert!(!trust.has_unseen_update("maan", "alex").unwrap());
        assert!(trust.list_updated("maan").unwrap().is_empty());
    }

    #[test]
    fn test_missing_pairs() {
        let services = services_with_cast();
        let trust = services.trust();

        match trust.mark_updated("maan", "alex") {
            Err(CoreError::TrustNotFound { student, reviewer }) => {
                assert_eq!((student.as_str(), reviewer.as_str()), ("maan", "alex"));
            }
            other => panic!("expected TrustNotFound, got {other:?}"),
        }
        assert!(!trust.clear_update_flag("maan", "alex").unwrap());
        assert!(!trust.has_unseen_update("maan", "alex").unwrap());
        assert!(!trust.remove("maan", "alex").unwrap());
    }

    #[test]
    fn test_list_updated_only_includes_trusted() {
        let services = services_with_cast();
        let trust = services.trust();
        trust.add_or_update("maan", "alex", 3).unwrap();
        trust.add_or_update("priya", "jamie", 2).unwrap();

        trust.notify_followers("jamie").unwrap();
        trust.notify_followers("alex").unwrap();

        let updated = trust.list_updated("maan").unwrap();
        assert_eq!(updated.into_iter().collect::<Vec<_>>(), ["alex"]);

        assert!(trust.remove("maan", "alex").unwrap());
        assert!(trust.list_updated("maan").unwrap().is_empty());
    }

    #[test]
    fn test_weight_change_keeps_unseen_flag() {
        let services = services_with_cast();
        let trust = services.trust();
        trust.add_or_update("maan", "alex", 3).unwrap();
        trust.mark_updated("maan", "alex").unwrap();

        trust.add_or_update("maan", "alex", 4).unwrap();
        assert!(trust.has_unseen_update("maan", "alex").unwrap());
    }

    #[test]
    fn test_view_profile_clears_flag() {
        let services = services_with_cast();
        let (_, answer) = seed_thread(&services);
        services.trust().add_or_update("maan", "alex", 3).unwrap();
        services
            .reviews()
            .submit("alex", ReviewTarget::answer(answer), 4, Some("solid"))
            .unwrap();
        assert!(services.trust().list_updated("maan").unwrap().contains("alex"));

        let profile = services.trust().view_profile("maan", "alex").unwrap();
        assert!(profile.cleared_update);
        assert_eq!(profile.weight, Some(3));
        assert_eq!(profile.reviews.len(), 1);
        assert!(!services.trust().list_updated("maan").unwrap().contains("alex"));

        // untrusted reviewer's profile is still viewable
        let other = services.trust().view_profile("priya", "alex").unwrap();
        assert!(!other.cleared_update);
        assert!(other.weight.is_none());
    }

    #[test]
    fn test_list_followers() {
        let services = services_with_cast();
        let trust = services.trust();
        trust.add_or_update("maan", "alex", 3).unwrap();
        trust.add_or_update("priya", "alex", 1).unwrap();

        let followers: Vec<String> = trust
            .list_followers("alex")
            .unwrap()
            .into_iter()
            .map(|e| e.student)
            .collect();
        assert_eq!(followers, ["maan", "priya"]);
    }
}
