//! Review service: submit, update, delete and read review version chains.
//!
//! Each (reviewer, target) pair owns a singly linked chain of immutable
//! versions. The newest version is flagged `is_latest`; every mutation runs
//! in one immediate transaction so the flag moves atomically.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::model::{
    ids::new_review_id, Review, ReviewTarget, Role, TargetKind, MAX_RATING, MIN_RATING,
};
use crate::store::{self, content, reviews, trust, Store};

use super::directory::{require_moderator, require_role, require_user};
use super::errors::is_unique_violation;
use super::{CoreError, CoreResult};

/// Result of [`ReviewService::update`] and [`ReviewService::save`].
#[derive(Debug, Clone, Serialize)]
pub struct ReviewWrite {
    /// The current latest version after the call.
    pub review: Review,
    /// False when the call changed nothing.
    pub created: bool,
    /// Students whose unseen-update flag was raised by this write.
    pub notified: usize,
}

/// Latest reviews on a target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReviews {
    pub target: ReviewTarget,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_rating: Option<f64>,
    pub reviews: Vec<Review>,
}

/// A trusted reviewer's latest review, with the student's weight.
#[derive(Debug, Clone, Serialize)]
pub struct WeightedReview {
    pub weight: u8,
    #[serde(flatten)]
    pub review: Review,
}

/// Latest reviews on a target from one student's trusted reviewers.
#[derive(Debug, Clone, Serialize)]
pub struct TrustedFeed {
    pub student: String,
    pub target: ReviewTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_rating: Option<f64>,
    pub reviews: Vec<WeightedReview>,
}

/// Service for review version chains.
pub struct ReviewService<'a> {
    store: &'a Store,
}

impl<'a> ReviewService<'a> {
    pub(crate) const fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Submit the first review of a target.
    ///
    /// Fails with [`CoreError::ReviewAlreadyExists`] when the reviewer already
    /// has a latest review of the target; use [`Self::update`] or
    /// [`Self::save`] instead.
    pub fn submit(
        &self,
        reviewer: &str,
        target: ReviewTarget,
        rating: u8,
        comment: Option<&str>,
    ) -> CoreResult<Review> {
        self.submit_counting(reviewer, target, rating, comment)
            .map(|(review, _)| review)
    }

    fn submit_counting(
        &self,
        reviewer: &str,
        target: ReviewTarget,
        rating: u8,
        comment: Option<&str>,
    ) -> CoreResult<(Review, usize)> {
        validate_rating(rating)?;
        let comment = normalize_comment(comment);

        let tx = self.store.begin_immediate().map_err(CoreError::storage)?;
        require_role(&tx, reviewer, Role::Reviewer, "submit reviews")?;
        require_target(&tx, target)?;

        if let Some(existing) =
            reviews::get_latest(&tx, reviewer, target).map_err(CoreError::storage)?
        {
            return Err(CoreError::ReviewAlreadyExists {
                reviewer: reviewer.to_string(),
                target,
                review_id: existing.review_id,
            });
        }

        let review = Review {
            review_id: new_review_id(),
            reviewer: reviewer.to_string(),
            target_type: target.kind,
            target_id: target.id,
            rating,
            comment,
            created_at: store::now(),
            previous_review_id: None,
            is_latest: true,
        };
        insert_version(&tx, &review)?;
        let notified = trust::mark_all_followers(&tx, reviewer).map_err(CoreError::storage)?;
        store::commit(tx).map_err(CoreError::storage)?;

        tracing::info!(
            review_id = %review.review_id,
            reviewer,
            %target,
            rating,
            notified,
            "submitted review"
        );
        Ok((review, notified))
    }

    /// Supersede `existing` with a new version.
    ///
    /// Identical rating and comment is a no-op. If `existing` is no longer
    /// the latest version when the write runs, fails with
    /// [`CoreError::Concurrency`] and writes nothing.
    pub fn update(
        &self,
        existing: &Review,
        rating: u8,
        comment: Option<&str>,
    ) -> CoreResult<ReviewWrite> {
        validate_rating(rating)?;
        let comment = normalize_comment(comment);

        let tx = self.store.begin_immediate().map_err(CoreError::storage)?;
        let current = reviews::get_review(&tx, &existing.review_id)
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::ReviewNotFound {
                review_id: existing.review_id.clone(),
            })?;
        if !current.is_latest {
            tracing::warn!(review_id = %current.review_id, "update raced with another writer");
            return Err(stale(&current));
        }

        if current.has_same_content(rating, comment.as_deref()) {
            tracing::debug!(review_id = %current.review_id, "review unchanged, skipping update");
            return Ok(ReviewWrite {
                review: current,
                created: false,
                notified: 0,
            });
        }

        require_role(&tx, &current.reviewer, Role::Reviewer, "update reviews")?;

        if reviews::clear_latest(&tx, &current.review_id).map_err(CoreError::storage)? != 1 {
            return Err(stale(&current));
        }

        let review = Review {
            review_id: new_review_id(),
            reviewer: current.reviewer.clone(),
            target_type: current.target_type,
            target_id: current.target_id,
            rating,
            comment,
            created_at: successor_timestamp(current.created_at, store::now()),
            previous_review_id: Some(current.review_id.clone()),
            is_latest: true,
        };
        insert_version(&tx, &review)?;
        let notified =
            trust::mark_all_followers(&tx, &review.reviewer).map_err(CoreError::storage)?;
        store::commit(tx).map_err(CoreError::storage)?;

        tracing::info!(
            review_id = %review.review_id,
            previous = %current.review_id,
            reviewer = %review.reviewer,
            target = %review.target(),
            rating,
            notified,
            "updated review"
        );
        Ok(ReviewWrite {
            review,
            created: true,
            notified,
        })
    }

    /// Submit or update, whichever applies to the pair right now.
    pub fn save(
        &self,
        reviewer: &str,
        target: ReviewTarget,
        rating: u8,
        comment: Option<&str>,
    ) -> CoreResult<ReviewWrite> {
        match self.latest_for(reviewer, target)? {
            Some(existing) => self.update(&existing, rating, comment),
            None => {
                let (review, notified) =
                    self.submit_counting(reviewer, target, rating, comment)?;
                Ok(ReviewWrite {
                    review,
                    created: true,
                    notified,
                })
            }
        }
    }

    /// Delete `review_id` and every version reachable through its
    /// `previous_review_id` links.
    ///
    /// Later versions that pointed into the deleted chain lose their link.
    /// Returns `false` if `review_id` does not exist.
    pub fn delete_history(&self, review_id: &str) -> CoreResult<bool> {
        let tx = self.store.begin_immediate().map_err(CoreError::storage)?;
        let chain = collect_chain(&tx, review_id)?;
        if chain.is_empty() {
            return Ok(false);
        }

        for version in &chain {
            reviews::delete_review(&tx, &version.review_id).map_err(CoreError::storage)?;
        }
        let mut unlinked = 0;
        for version in &chain {
            unlinked +=
                reviews::unlink_successors(&tx, &version.review_id).map_err(CoreError::storage)?;
        }
        store::commit(tx).map_err(CoreError::storage)?;

        tracing::info!(review_id, deleted = chain.len(), unlinked, "deleted review history");
        Ok(true)
    }

    /// [`Self::delete_history`] on behalf of `actor`, who must be the
    /// reviewer or a moderator.
    pub fn delete_history_as(&self, actor: &str, review_id: &str) -> CoreResult<bool> {
        let Some(review) = self.get_optional(review_id)? else {
            return Ok(false);
        };
        if review.reviewer != actor {
            let conn = self.store.conn();
            require_user(conn, actor)?;
            require_moderator(conn, actor, "delete another reviewer's reviews").map_err(|_| {
                CoreError::Forbidden {
                    username: actor.to_string(),
                    action: format!("delete {}'s review {review_id}", review.reviewer),
                }
            })?;
        }
        self.delete_history(review_id)
    }

    /// The reviewer's current version for a target, if any.
    pub fn latest_for(&self, reviewer: &str, target: ReviewTarget) -> CoreResult<Option<Review>> {
        reviews::get_latest(self.store.conn(), reviewer, target).map_err(CoreError::storage)
    }

    /// Every version for the pair, oldest to newest by chain linkage.
    pub fn history_for(&self, reviewer: &str, target: ReviewTarget) -> CoreResult<Vec<Review>> {
        let versions = reviews::list_versions(self.store.conn(), reviewer, target)
            .map_err(CoreError::storage)?;
        Ok(order_chain(versions))
    }

    /// Get one version.
    ///
    /// Returns `Err(CoreError::ReviewNotFound)` if it does not exist.
    pub fn get(&self, review_id: &str) -> CoreResult<Review> {
        self.get_optional(review_id)?
            .ok_or_else(|| CoreError::ReviewNotFound {
                review_id: review_id.to_string(),
            })
    }

    pub fn get_optional(&self, review_id: &str) -> CoreResult<Option<Review>> {
        reviews::get_review(self.store.conn(), review_id).map_err(CoreError::storage)
    }

    /// Latest reviews of a target and their mean rating.
    pub fn list_for_target(&self, target: ReviewTarget) -> CoreResult<TargetReviews> {
        let conn = self.store.conn();
        require_target(conn, target)?;
        let reviews = reviews::list_latest_for_target(conn, target).map_err(CoreError::storage)?;
        let mean_rating = mean(reviews.iter().map(|r| (f64::from(r.rating), 1.0)));
        Ok(TargetReviews {
            target,
            count: reviews.len(),
            mean_rating,
            reviews,
        })
    }

    /// A reviewer's latest reviews across all targets.
    pub fn list_by_reviewer(&self, reviewer: &str) -> CoreResult<Vec<Review>> {
        let conn = self.store.conn();
        require_user(conn, reviewer)?;
        reviews::list_latest_by_reviewer(conn, reviewer).map_err(CoreError::storage)
    }

    /// Latest reviews of a target by the student's trusted reviewers, with
    /// the trust-weighted mean rating.
    pub fn trusted_feed(&self, student: &str, target: ReviewTarget) -> CoreResult<TrustedFeed> {
        let conn = self.store.conn();
        require_user(conn, student)?;
        require_target(conn, target)?;

        let weights: HashMap<String, u8> = trust::list_for_student(conn, student)
            .map_err(CoreError::storage)?
            .into_iter()
            .map(|entry| (entry.reviewer, entry.weight))
            .collect();

        let reviews: Vec<WeightedReview> = reviews::list_latest_for_target(conn, target)
            .map_err(CoreError::storage)?
            .into_iter()
            .filter_map(|review| {
                weights
                    .get(&review.reviewer)
                    .map(|&weight| WeightedReview { weight, review })
            })
            .collect();

        let weighted_rating = mean(
            reviews
                .iter()
                .map(|w| (f64::from(w.review.rating), f64::from(w.weight))),
        );
        Ok(TrustedFeed {
            student: student.to_string(),
            target,
            weighted_rating,
            reviews,
        })
    }
}

fn validate_rating(rating: u8) -> CoreResult<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(CoreError::validation(
            "rating",
            format!("must be between {MIN_RATING} and {MAX_RATING}, got {rating}"),
        ));
    }
    Ok(())
}

/// Blank comments are stored as no comment.
fn normalize_comment(comment: Option<&str>) -> Option<String> {
    comment
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(ToString::to_string)
}

fn stale(current: &Review) -> CoreError {
    CoreError::Concurrency {
        detail: format!(
            "review {} is no longer the latest version for {} on {}",
            current.review_id,
            current.reviewer,
            current.target()
        ),
    }
}

/// Check that the question or answer being reviewed exists.
pub(crate) fn require_target(conn: &Connection, target: ReviewTarget) -> CoreResult<()> {
    let exists = match target.kind {
        TargetKind::Question => content::get_question(conn, target.id)
            .map_err(CoreError::storage)?
            .is_some(),
        TargetKind::Answer => content::get_answer(conn, target.id)
            .map_err(CoreError::storage)?
            .is_some(),
    };
    if exists {
        Ok(())
    } else {
        Err(CoreError::TargetNotFound { target })
    }
}

fn insert_version(conn: &Connection, review: &Review) -> CoreResult<()> {
    reviews::insert_review(conn, review).map_err(|err| {
        if is_unique_violation(&err) {
            tracing::warn!(
                reviewer = %review.reviewer,
                target = %review.target(),
                "latest review changed underneath this write"
            );
            CoreError::Concurrency {
                detail: format!(
                    "another latest review exists for {} on {}",
                    review.reviewer,
                    review.target()
                ),
            }
        } else {
            CoreError::storage(err)
        }
    })
}

/// A successor is never timestamped before its predecessor, even when the
/// clock steps backwards between writes.
fn successor_timestamp(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + Duration::microseconds(1);
    now.max(floor)
}

/// Walk back from `review_id` along `previous_review_id`.
fn collect_chain(conn: &Connection, review_id: &str) -> CoreResult<Vec<Review>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = Some(review_id.to_string());
    while let Some(id) = cursor.take() {
        if !seen.insert(id.clone()) {
            break;
        }
        match reviews::get_review(conn, &id).map_err(CoreError::storage)? {
            Some(version) => {
                cursor.clone_from(&version.previous_review_id);
                chain.push(version);
            }
            None => break,
        }
    }
    Ok(chain)
}

/// Order the versions of one pair oldest to newest by linkage.
///
/// The head is the version nothing points back to. If stored data holds
/// more than one head, each sub-chain is emitted whole, with the chain
/// ending at the latest version placed last.
fn order_chain(versions: Vec<Review>) -> Vec<Review> {
    let referenced: HashSet<String> = versions
        .iter()
        .filter_map(|v| v.previous_review_id.clone())
        .collect();
    let mut heads: Vec<&Review> = versions
        .iter()
        .filter(|v| !referenced.contains(&v.review_id))
        .collect();
    heads.sort_by(|a, b| {
        (a.is_latest, a.created_at, &a.review_id).cmp(&(b.is_latest, b.created_at, &b.review_id))
    });
    let head_ids: Vec<String> = heads.iter().map(|h| h.review_id.clone()).collect();

    let mut by_id: HashMap<String, Review> = versions
        .into_iter()
        .map(|v| (v.review_id.clone(), v))
        .collect();

    let mut ordered = Vec::with_capacity(by_id.len());
    for head in head_ids {
        let mut chain = Vec::new();
        let mut cursor = Some(head);
        while let Some(id) = cursor.take() {
            match by_id.remove(&id) {
                Some(version) => {
                    cursor.clone_from(&version.previous_review_id);
                    chain.push(version);
                }
                None => break,
            }
        }
        chain.reverse();
        ordered.extend(chain);
    }

    // Pure cycles have no head; keep their rows rather than dropping them.
    let mut rest: Vec<Review> = by_id.into_values().collect();
    rest.sort_by(|a, b| (a.created_at, &a.review_id).cmp(&(b.created_at, &b.review_id)));
    rest.extend(ordered);
    rest
}

/// Weighted mean of `(value, weight)` pairs.
fn mean(values: impl Iterator<Item = (f64, f64)>) -> Option<f64> {
    let (sum, total) = values.fold((0.0, 0.0), |(s, t), (v, w)| (v.mul_add(w, s), t + w));
    if total > 0.0 {
        Some(sum / total)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{seed_thread, services_with_cast};
    use crate::core::{ErrorKind, Services};

    fn latest_count(services: &Services, reviewer: &str, target: ReviewTarget) -> i64 {
        services
            .store()
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM reviews
                 WHERE reviewer = ? AND target_type = ? AND target_id = ? AND is_latest = 1",
                rusqlite::params![reviewer, target.kind.as_str(), target.id],
                |row| row.get(0),
            )
            .unwrap()
    }

    fn version(id: &str, prev: Option<&str>, ts: &str, latest: bool) -> Review {
        Review {
            review_id: id.to_string(),
            reviewer: "alex".to_string(),
            target_type: TargetKind::Answer,
            target_id: 1,
            rating: 3,
            comment: None,
            created_at: DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc),
            previous_review_id: prev.map(ToString::to_string),
            is_latest: latest,
        }
    }

    #[test]
    fn test_submit_then_update_builds_chain() {
        let services = services_with_cast();
        let (_, answer) = seed_thread(&services);
        let target = ReviewTarget::answer(answer);
        let reviews = services.reviews();

        let first = reviews.submit("alex", target, 2, Some("Needs work")).unwrap();
        assert!(first.is_latest);
        assert_eq!(reviews.history_for("alex", target).unwrap().len(), 1);
        assert_eq!(reviews.latest_for("alex", target).unwrap().unwrap().rating, 2);

        let write = reviews.update(&first, 5, Some("Fixed everything")).unwrap();
        assert!(write.created);
        let latest = reviews.latest_for("alex", target).unwrap().unwrap();
        assert_eq!(latest.rating, 5);
        assert_eq!(latest.previous_review_id.as_deref(), Some(first.review_id.as_str()));

        let history = reviews.history_for("alex", target).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].review_id, first.review_id);
        assert!(!history[0].is_latest);
        assert_eq!(history[1].review_id, latest.review_id);
        assert!(history[1].created_at > history[0].created_at);
    }

    #[test]
    fn test_single_latest_across_many_updates() {
        let services = services_with_cast();
        let (_, answer) = seed_thread(&services);
        let target = ReviewTarget::answer(answer);
        let reviews = services.reviews();

        let mut current = reviews.submit("alex", target, 1, None).unwrap();
        for rating in [2, 3, 3, 4, 5, 1] {
            current = reviews.update(&current, rating, Some("again")).unwrap().review;
            assert_eq!(latest_count(&services, "alex", target), 1);
        }
        // 1 submit + 6 updates, one of which repeated content
        assert_eq!(reviews.history_for("alex", target).unwrap().len(), 6);
    }

    #[test]
    fn test_identical_update_is_noop() {
        let services = services_with_cast();
        let (_, answer) = seed_thread(&services);
        let target = ReviewTarget::answer(answer);
        let reviews = services.reviews();

        let first = reviews.submit("alex", target, 4, Some("Good")).unwrap();
        let write = reviews.update(&first, 4, Some("  Good  ")).unwrap();
        assert!(!write.created);
        assert_eq!(write.review.review_id, first.review_id);
        assert_eq!(reviews.history_for("alex", target).unwrap().len(), 1);
    }

    #[test]
    fn test_stale_update_is_concurrency_error() {
        let services = services_with_cast();
        let (_, answer) = seed_thread(&services);
        let target = ReviewTarget::answer(answer);
        let reviews = services.reviews();

        let first = reviews.submit("alex", target, 2, None).unwrap();
        reviews.update(&first, 3, None).unwrap();

        let err = reviews.update(&first, 4, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Concurrency);
        assert_eq!(reviews.history_for("alex", target).unwrap().len(), 2);
        assert_eq!(reviews.latest_for("alex", target).unwrap().unwrap().rating, 3);
    }

    #[test]
    fn test_duplicate_latest_insert_maps_to_concurrency() {
        let services = services_with_cast();
        let (_, answer) = seed_thread(&services);
        let target = ReviewTarget::answer(answer);
        let first = services.reviews().submit("alex", target, 2, None).unwrap();

        let mut rival = first.clone();
        rival.review_id = "rv-rival001".to_string();
        let err = insert_version(services.store().conn(), &rival).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Concurrency);
        assert_eq!(latest_count(&services, "alex", target), 1);
    }

    #[test]
    fn test_submit_rejected_when_latest_exists() {
        let services = services_with_cast();
        let (_, answer) = seed_thread(&services);
        let target = ReviewTarget::answer(answer);
        let reviews = services.reviews();

        let first = reviews.submit("alex", target, 2, None).unwrap();
        match reviews.submit("alex", target, 5, None) {
            Err(CoreError::ReviewAlreadyExists { review_id, .. }) => {
                assert_eq!(review_id, first.review_id);
            }
            other => panic!("expected ReviewAlreadyExists, got {other:?}"),
        }
        assert_eq!(latest_count(&services, "alex", target), 1);
    }

    #[test]
    fn test_save_submits_then_updates() {
        let services = services_with_cast();
        let (question, _) = seed_thread(&services);
        let target = ReviewTarget::question(question);
        let reviews = services.reviews();

        let first = reviews.save("jamie", target, 3, None).unwrap();
        assert!(first.created);
        assert!(first.review.previous_review_id.is_none());

        let second = reviews.save("jamie", target, 4, Some("clearer now")).unwrap();
        assert!(second.created);
        assert_eq!(
            second.review.previous_review_id.as_deref(),
            Some(first.review.review_id.as_str())
        );
    }

    #[test]
    fn test_validation_and_authorization() {
        let services = services_with_cast();
        let (_, answer) = seed_thread(&services);
        let target = ReviewTarget::answer(answer);
        let reviews = services.reviews();

        for rating in [0, 6, 200] {
            assert_eq!(
                reviews.submit("alex", target, rating, None).unwrap_err().kind(),
                ErrorKind::Validation
            );
        }
        assert_eq!(
            reviews.submit("maan", target, 3, None).unwrap_err().kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            reviews
                .submit("alex", ReviewTarget::answer(9999), 3, None)
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            reviews.submit("ghost", target, 3, None).unwrap_err().kind(),
            ErrorKind::NotFound
        );

        let first = reviews.submit("alex", target, 3, None).unwrap();
        assert_eq!(
            reviews.update(&first, 9, None).unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_delete_history_removes_exact_chain() {
        let services = services_with_cast();
        let (question, answer) = seed_thread(&services);
        let on_answer = ReviewTarget::answer(answer);
        let on_question = ReviewTarget::question(question);
        let reviews = services.reviews();

        let a1 = reviews.submit("alex", on_answer, 2, None).unwrap();
        let a2 = reviews.update(&a1, 4, None).unwrap().review;
        let j1 = reviews.submit("jamie", on_answer, 5, None).unwrap();
        let q1 = reviews.submit("alex", on_question, 1, None).unwrap();

        assert!(reviews.delete_history(&a2.review_id).unwrap());
        assert!(reviews.history_for("alex", on_answer).unwrap().is_empty());
        assert!(reviews.latest_for("alex", on_answer).unwrap().is_none());
        assert_eq!(reviews.get(&j1.review_id).unwrap(), j1);
        assert_eq!(reviews.get(&q1.review_id).unwrap(), q1);

        assert!(!reviews.delete_history(&a2.review_id).unwrap());
        assert!(!reviews.delete_history("rv-nothere1").unwrap());
    }

    #[test]
    fn test_delete_from_middle_unlinks_survivors() {
        let services = services_with_cast();
        let (_, answer) = seed_thread(&services);
        let target = ReviewTarget::answer(answer);
        let reviews = services.reviews();

        let v1 = reviews.submit("alex", target, 1, None).unwrap();
        let v2 = reviews.update(&v1, 2, None).unwrap().review;
        let v3 = reviews.update(&v2, 3, None).unwrap().review;

        assert!(reviews.delete_history(&v2.review_id).unwrap());
        let history = reviews.history_for("alex", target).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].review_id, v3.review_id);
        assert!(history[0].previous_review_id.is_none());
        assert!(history[0].is_latest);
        assert!(reviews::dangling_links(services.store().conn())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_delete_history_as_checks_owner() {
        let services = services_with_cast();
        let (_, answer) = seed_thread(&services);
        let reviews = services.reviews();
        let review = reviews
            .submit("alex", ReviewTarget::answer(answer), 3, None)
            .unwrap();

        assert_eq!(
            reviews
                .delete_history_as("jamie", &review.review_id)
                .unwrap_err()
                .kind(),
            ErrorKind::Forbidden
        );
        assert!(reviews.delete_history_as("sam", &review.review_id).unwrap());
    }

    #[test]
    fn test_history_follows_links_not_timestamps() {
        let services = services_with_cast();
        let (_, answer) = seed_thread(&services);
        let conn = services.store().conn();

        // Clock went backwards between versions.
        let mut v1 = version("rv-00000001", None, "2024-05-01T12:00:00Z", false);
        let mut v2 = version("rv-00000002", Some("rv-00000001"), "2024-04-01T12:00:00Z", false);
        let mut v3 = version("rv-00000003", Some("rv-00000002"), "2024-03-01T12:00:00Z", true);
        for v in [&mut v1, &mut v2, &mut v3] {
            v.target_id = answer;
            reviews::insert_review(conn, v).unwrap();
        }

        let ids: Vec<String> = services
            .reviews()
            .history_for("alex", ReviewTarget::answer(answer))
            .unwrap()
            .into_iter()
            .map(|r| r.review_id)
            .collect();
        assert_eq!(ids, ["rv-00000001", "rv-00000002", "rv-00000003"]);
    }

    #[test]
    fn test_order_chain_keeps_stray_heads() {
        let versions = vec![
            version("rv-c", Some("rv-b"), "2024-01-03T00:00:00Z", true),
            version("rv-x", None, "2024-06-01T00:00:00Z", false),
            version("rv-a", None, "2024-01-01T00:00:00Z", false),
            version("rv-b", Some("rv-a"), "2024-01-02T00:00:00Z", false),
        ];
        let ids: Vec<String> = order_chain(versions)
            .into_iter()
            .map(|r| r.review_id)
            .collect();
        assert_eq!(ids, ["rv-x", "rv-a", "rv-b", "rv-c"]);
    }

    #[test]
    fn test_successor_timestamp_never_precedes_previous() {
        let prev = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let earlier = prev - Duration::hours(1);
        assert_eq!(
            successor_timestamp(prev, earlier),
            prev + Duration::microseconds(1)
        );
        let later = prev + Duration::hours(1);
        assert_eq!(successor_timestamp(prev, later), later);
    }

    #[test]
    fn test_list_for_target_and_trusted_feed() {
        let services = services_with_cast();
        let (_, answer) = seed_thread(&services);
        let target = ReviewTarget::answer(answer);
        let reviews = services.reviews();

        let a = reviews.submit("alex", target, 2, None).unwrap();
        reviews.update(&a, 4, None).unwrap();
        reviews.submit("jamie", target, 1, None).unwrap();

        let listed = reviews.list_for_target(target).unwrap();
        assert_eq!(listed.count, 2);
        assert_eq!(listed.mean_rating, Some(2.5));

        services.trust().add_or_update("maan", "alex", 3).unwrap();
        services.trust().add_or_update("maan", "jamie", 1).unwrap();
        let feed = reviews.trusted_feed("maan", target).unwrap();
        assert_eq!(feed.reviews.len(), 2);
        // (4*3 + 1*1) / 4
        assert_eq!(feed.weighted_rating, Some(3.25));

        let empty = reviews.trusted_feed("priya", target).unwrap();
        assert!(empty.reviews.is_empty());
        assert!(empty.weighted_rating.is_none());

        assert_eq!(reviews.list_by_reviewer("alex").unwrap().len(), 1);
    }

    #[test]
    fn test_new_version_notifies_followers() {
        let services = services_with_cast();
        let (_, answer) = seed_thread(&services);
        let target = ReviewTarget::answer(answer);
        services.trust().add_or_update("maan", "alex", 3).unwrap();

        let first = services.reviews().submit("alex", target, 2, None).unwrap();
        assert!(services.trust().has_unseen_update("maan", "alex").unwrap());

        services.trust().clear_update_flag("maan", "alex").unwrap();
        let write = services.reviews().update(&first, 3, None).unwrap();
        assert_eq!(write.notified, 1);
        assert!(services.trust().has_unseen_update("maan", "alex").unwrap());
    }
}
