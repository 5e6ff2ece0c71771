//! Setting-driven allow/deny domain filtering for evidence hits.

use signalbrief_links::domain_list_matches;

use crate::provider::EvidenceHit;

#[derive(Debug, Clone, Default)]
pub struct DomainFilterSettings {
    pub allowlist: Vec<String>,
    pub denylist: Vec<String>,
}

/// When `allowlist` is non-empty it takes precedence: a hit must match it
/// and must not match `denylist`. When `allowlist` is empty, only
/// `denylist` is applied.
#[must_use]
pub fn filter_by_domain(hits: Vec<EvidenceHit>, settings: &DomainFilterSettings) -> Vec<EvidenceHit> {
    hits.into_iter()
        .filter(|hit| {
            if domain_list_matches(&hit.domain, &settings.denylist) {
                return false;
            }
            if settings.allowlist.is_empty() {
                return true;
            }
            domain_list_matches(&hit.domain, &settings.allowlist)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(domain: &str) -> EvidenceHit {
        EvidenceHit {
            url: format!("https://{domain}/a"),
            domain: domain.to_owned(),
            title: "t".into(),
            description: "d".into(),
            agreement_score: 0.5,
            is_contradiction: false,
        }
    }

    #[test]
    fn denylist_rejects_even_without_allowlist() {
        let settings = DomainFilterSettings {
            allowlist: vec![],
            denylist: vec!["bad.com".into()],
        };
        let hits = filter_by_domain(vec![hit("bad.com"), hit("good.com")], &settings);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].domain, "good.com");
    }

    #[test]
    fn allowlist_takes_precedence_over_domains_not_listed() {
        let settings = DomainFilterSettings {
            allowlist: vec!["good.com".into()],
            denylist: vec![],
        };
        let hits = filter_by_domain(vec![hit("good.com"), hit("other.com")], &settings);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].domain, "good.com");
    }

    #[test]
    fn denylist_still_applies_within_allowlist() {
        let settings = DomainFilterSettings {
            allowlist: vec!["good.com".into()],
            denylist: vec!["good.com".into()],
        };
        let hits = filter_by_domain(vec![hit("good.com")], &settings);
        assert!(hits.is_empty());
    }
}
