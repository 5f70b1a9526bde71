//! Doctor service: read-only integrity checks over the database.

use serde::Serialize;

use crate::model::{MAX_WEIGHT, MIN_WEIGHT};
use crate::store::{flags, reviews, trust, Store};

use super::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single health check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl CheckResult {
    fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Pass,
            message: message.to_string(),
            remediation: None,
        }
    }

    fn fail(name: &str, message: &str, remediation: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Fail,
            message: message.to_string(),
            remediation: Some(remediation.to_string()),
        }
    }

    fn warn(name: &str, message: &str, remediation: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warn,
            message: message.to_string(),
            remediation: Some(remediation.to_string()),
        }
    }
}

/// Overall health status.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub checks: Vec<CheckResult>,
}

pub struct DoctorService<'a> {
    store: &'a Store,
}

impl<'a> DoctorService<'a> {
    pub(crate) const fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Run every check. The report is unhealthy if any check fails;
    /// warnings do not count.
    pub fn run(&self) -> CoreResult<HealthReport> {
        let checks = vec![
            self.check_latest_counts()?,
            self.check_dangling_links()?,
            self.check_chain_order()?,
            self.check_trust_weights()?,
            self.check_orphaned_flags()?,
        ];
        let healthy = checks.iter().all(|c| c.status != CheckStatus::Fail);
        if !healthy {
            tracing::warn!("integrity checks failed");
        }
        Ok(HealthReport { healthy, checks })
    }

    fn check_latest_counts(&self) -> CoreResult<CheckResult> {
        let bad = reviews::pairs_with_bad_latest_count(self.store.conn())
            .map_err(CoreError::storage)?;
        if bad.is_empty() {
            return Ok(CheckResult::pass(
                "single_latest",
                "Every review chain has exactly one latest version",
            ));
        }
        let sample: Vec<String> = bad
            .iter()
            .take(5)
            .map(|p| {
                format!(
                    "{} on {}:{} ({} latest)",
                    p.reviewer, p.target_type, p.target_id, p.latest_count
                )
            })
            .collect();
        Ok(CheckResult::fail(
            "single_latest",
            &format!(
                "{} review chain(s) without exactly one latest version: {}",
                bad.len(),
                sample.join(", ")
            ),
            "Delete the affected chains with 'studyhall reviews delete <id>' and resubmit",
        ))
    }

    fn check_dangling_links(&self) -> CoreResult<CheckResult> {
        let ids = reviews::dangling_links(self.store.conn()).map_err(CoreError::storage)?;
        if ids.is_empty() {
            return Ok(CheckResult::pass(
                "chain_links",
                "All previous_review_id links resolve",
            ));
        }
        Ok(CheckResult::fail(
            "chain_links",
            &format!("{} review(s) link to a missing version: {}", ids.len(), ids.join(", ")),
            "Delete the affected chains with 'studyhall reviews delete <id>'",
        ))
    }

    fn check_chain_order(&self) -> CoreResult<CheckResult> {
        let ids = reviews::out_of_order_links(self.store.conn()).map_err(CoreError::storage)?;
        if ids.is_empty() {
            return Ok(CheckResult::pass(
                "chain_order",
                "No version is older than the version it supersedes",
            ));
        }
        Ok(CheckResult::warn(
            "chain_order",
            &format!(
                "{} review(s) are timestamped before their predecessor: {}",
                ids.len(),
                ids.join(", ")
            ),
            "History follows chain links, so display order is unaffected; check the writer's clock",
        ))
    }

    fn check_trust_weights(&self) -> CoreResult<CheckResult> {
        let count = trust::count_out_of_range(self.store.conn(), MIN_WEIGHT, MAX_WEIGHT)
            .map_err(CoreError::storage)?;
        if count == 0 {
            return Ok(CheckResult::pass(
                "trust_weights",
                &format!("All trust weights are within {MIN_WEIGHT}..={MAX_WEIGHT}"),
            ));
        }
        Ok(CheckResult::fail(
            "trust_weights",
            &format!("{count} trust entr(ies) have an out-of-range weight"),
            "Re-set them with 'studyhall trust add <reviewer> --weight <1-5>'",
        ))
    }

    fn check_orphaned_flags(&self) -> CoreResult<CheckResult> {
        let ids = flags::orphaned(self.store.conn()).map_err(CoreError::storage)?;
        if ids.is_empty() {
            return Ok(CheckResult::pass(
                "flag_items",
                "Every flag points at existing content",
            ));
        }
        Ok(CheckResult::warn(
            "flag_items",
            &format!("{} flag(s) point at deleted content: {}", ids.len(), ids.join(", ")),
            "Resolve them with 'studyhall flags resolve <type> <id>'",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{seed_thread, services_with_cast};
    use crate::model::{FlagKind, ReviewTarget};

    fn status_of(report: &HealthReport, name: &str) -> CheckStatus {
        report
            .checks
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.status)
            .unwrap()
    }

    #[test]
    fn test_clean_database_is_healthy() {
        let services = services_with_cast();
        let (_, answer) = seed_thread(&services);
        let first = services
            .reviews()
            .submit("alex", ReviewTarget::answer(answer), 2, None)
            .unwrap();
        services.reviews().update(&first, 4, None).unwrap();

        let report = services.doctor().run().unwrap();
        assert!(report.healthy);
        assert!(report.checks.iter().all(|c| c.status == CheckStatus::Pass));
    }

    #[test]
    fn test_detects_broken_chains() {
        let services = services_with_cast();
        let (_, answer) = seed_thread(&services);
        services
            .store()
            .conn()
            .execute(
                "INSERT INTO reviews (review_id, reviewer, target_type, target_id, rating,
                     created_at, previous_review_id, is_latest)
                 VALUES ('rv-broken01', 'alex', 'answer', ?, 3, '2024-01-01T00:00:00Z',
                     'rv-missing1', 0)",
                [answer],
            )
            .unwrap();

        let report = services.doctor().run().unwrap();
        assert!(!report.healthy);
        assert_eq!(status_of(&report, "single_latest"), CheckStatus::Fail);
        assert_eq!(status_of(&report, "chain_links"), CheckStatus::Fail);
        assert_eq!(status_of(&report, "trust_weights"), CheckStatus::Pass);
    }

    #[test]
    fn test_orphaned_flags_only_warn() {
        let services = services_with_cast();
        let (question, _) = seed_thread(&services);
        services
            .flags()
            .file(FlagKind::Question, question, "sam", "spam")
            .unwrap();
        services.questions().delete("maan", question).unwrap();

        let report = services.doctor().run().unwrap();
        assert!(report.healthy);
        assert_eq!(status_of(&report, "flag_items"), CheckStatus::Warn);
    }
}
