//! Record parser/scorer
//!
//! Turns fetched records into per-mechanism verdicts and a composite score.
//! Everything here is a pure function of its inputs.
//!
//! Weights: SPF 34, DKIM 33, DMARC up to 33 depending on policy
//! (reject 33, quarantine 22, none 11). A DKIM key missing at the queried
//! selector is `Unknown` and contributes nothing.

use super::dkim::parse_dkim;
use super::dmarc::{parse_dmarc, DmarcPolicy};
use super::spf::{parse_spf, Qualifier};
use super::types::{AuthRecord, AuthScore, CheckStatus, DomainRecords, LookupOutcome};

pub const SPF_WEIGHT: u32 = 34;
pub const DKIM_WEIGHT: u32 = 33;
pub const DMARC_WEIGHT: u32 = 33;

/// DMARC contribution for a published policy
pub fn dmarc_policy_weight(policy: DmarcPolicy) -> u32 {
    match policy {
        DmarcPolicy::Reject => DMARC_WEIGHT,
        DmarcPolicy::Quarantine => DMARC_WEIGHT * 2 / 3,
        DmarcPolicy::None => DMARC_WEIGHT / 3,
    }
}

/// Composite score from mechanism verdicts
pub fn score(spf: CheckStatus, dkim: CheckStatus, dmarc_policy: Option<DmarcPolicy>) -> AuthScore {
    let mut total = 0;
    if spf == CheckStatus::Pass {
        total += SPF_WEIGHT;
    }
    if dkim == CheckStatus::Pass {
        total += DKIM_WEIGHT;
    }
    if let Some(policy) = dmarc_policy {
        total += dmarc_policy_weight(policy);
    }
    AuthScore::new(total)
}

/// Score a raw record triple directly
pub fn score_texts(spf: Option<&str>, dkim: Option<&str>, dmarc: Option<&str>) -> AuthScore {
    let records = DomainRecords {
        spf: text_outcome(spf),
        dkim: text_outcome(dkim),
        dmarc: text_outcome(dmarc),
    };
    evaluate("", "", &records).score
}

fn text_outcome(text: Option<&str>) -> LookupOutcome {
    match text {
        Some(t) => LookupOutcome::Found(t.to_string()),
        None => LookupOutcome::Absent,
    }
}

/// Build the [`AuthRecord`] for a domain from its fetched records
pub fn evaluate(domain: &str, dkim_selector: &str, records: &DomainRecords) -> AuthRecord {
    let mut notes = Vec::new();

    let spf_status = match records.spf.text().map(parse_spf) {
        Some(Ok(spf)) => {
            if spf.all_qualifier() == Some(Qualifier::Pass) {
                notes.push("spf: +all authorizes every sender".to_string());
            }
            CheckStatus::Pass
        }
        Some(Err(e)) => {
            notes.push(format!("spf: {}", e));
            CheckStatus::Fail
        }
        None => CheckStatus::Fail,
    };

    let dkim_status = match &records.dkim {
        LookupOutcome::Found(text) => match parse_dkim(text) {
            Ok(key) => {
                if key.is_testing() {
                    notes.push("dkim: key is in testing mode (t=y)".to_string());
                }
                CheckStatus::Pass
            }
            Err(e) => {
                notes.push(format!("dkim: {}", e));
                CheckStatus::Fail
            }
        },
        LookupOutcome::Absent => {
            notes.push(format!("dkim: no key at selector '{}'", dkim_selector));
            CheckStatus::Unknown
        }
        // Reported through lookup_errors
        LookupOutcome::Failed(_) => CheckStatus::Unknown,
    };

    let (dmarc_status, dmarc_policy) = match records.dmarc.text().map(parse_dmarc) {
        Some(Ok(dmarc)) => (CheckStatus::Pass, Some(dmarc.policy)),
        Some(Err(e)) => {
            notes.push(format!("dmarc: {}", e));
            (CheckStatus::Fail, None)
        }
        None => (CheckStatus::Fail, None),
    };

    let lookup_errors = records
        .failures()
        .into_iter()
        .map(|(mechanism, failure)| format!("{} {}", mechanism, failure))
        .collect();

    AuthRecord {
        domain: domain.to_string(),
        dkim_selector: dkim_selector.to_string(),
        spf: records.spf.text().map(str::to_string),
        dkim: records.dkim.text().map(str::to_string),
        dmarc: records.dmarc.text().map(str::to_string),
        spf_status,
        dkim_status,
        dmarc_status,
        spf_pass: spf_status == CheckStatus::Pass,
        dkim_pass: dkim_status == CheckStatus::Pass,
        dmarc_pass: dmarc_status == CheckStatus::Pass,
        dmarc_policy,
        score: score(spf_status, dkim_status, dmarc_policy),
        notes,
        lookup_errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::types::LookupFailure;

    const SPF: &str = "v=spf1 include:_spf.example.com -all";
    const DKIM: &str = "v=DKIM1; k=rsa; p=MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQ";

    #[test]
    fn test_full_marks() {
        let score = score_texts(Some(SPF), Some(DKIM), Some("v=DMARC1; p=reject"));
        assert_eq!(score, AuthScore::MAX);
    }

    #[test]
    fn test_nothing_published() {
        assert_eq!(score_texts(None, None, None), AuthScore::MIN);
    }

    #[test]
    fn test_policy_strictness_orders_scores() {
        let reject = score_texts(Some(SPF), None, Some("v=DMARC1; p=reject"));
        let quarantine = score_texts(Some(SPF), None, Some("v=DMARC1; p=quarantine"));
        let none = score_texts(Some(SPF), None, Some("v=DMARC1; p=none"));

        assert!(reject > quarantine);
        assert!(quarantine > none);
        assert!(none > score_texts(Some(SPF), None, None));
        assert_eq!(reject.value(), 67);
        assert_eq!(quarantine.value(), 56);
        assert_eq!(none.value(), 45);
    }

    #[test]
    fn test_score_is_deterministic() {
        let triple = (Some(SPF), Some("v=DKIM1; p="), Some("v=DMARC1; p=quarantine"));
        let first = score_texts(triple.0, triple.1, triple.2);
        let second = score_texts(triple.0, triple.1, triple.2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_records_fail() {
        let records = DomainRecords {
            spf: LookupOutcome::Found("v=spf1".to_string()),
            dkim: LookupOutcome::Found("v=DKIM1; p=".to_string()),
            dmarc: LookupOutcome::Found("v=DMARC1; p=maybe".to_string()),
        };
        let record = evaluate("example.com", "default", &records);

        assert_eq!(record.spf_status, CheckStatus::Fail);
        assert_eq!(record.dkim_status, CheckStatus::Fail);
        assert_eq!(record.dmarc_status, CheckStatus::Fail);
        assert_eq!(record.score, AuthScore::MIN);
        assert_eq!(record.notes.len(), 3);
        assert!(record.lookup_errors.is_empty());
    }

    #[test]
    fn test_dkim_timeout_is_not_a_missing_key() {
        let records = DomainRecords {
            spf: LookupOutcome::Found(SPF.to_string()),
            dkim: LookupOutcome::Failed(LookupFailure::Timeout),
            dmarc: LookupOutcome::Found("v=DMARC1; p=reject".to_string()),
        };
        let record = evaluate("x.com", "default", &records);

        assert_eq!(record.dkim_status, CheckStatus::Unknown);
        assert!(record.notes.is_empty());
        assert_eq!(record.lookup_errors, vec!["dkim lookup timed out"]);
        assert_eq!(record.score.value(), 67);
    }

    #[test]
    fn test_missing_dkim_is_unknown_not_fail() {
        let records = DomainRecords {
            spf: LookupOutcome::Found(SPF.to_string()),
            dkim: LookupOutcome::Absent,
            dmarc: LookupOutcome::Found("v=DMARC1; p=reject".to_string()),
        };
        let record = evaluate("example.com", "default", &records);

        assert_eq!(record.dkim_status, CheckStatus::Unknown);
        assert!(!record.dkim_pass);
        assert!(record.notes.iter().any(|n| n.contains("selector 'default'")));
        assert_eq!(record.score.value(), 67);
    }

    #[test]
    fn test_lookup_errors_recorded() {
        let records = DomainRecords {
            spf: LookupOutcome::Failed(LookupFailure::Timeout),
            dkim: LookupOutcome::Absent,
            dmarc: LookupOutcome::Found("v=DMARC1; p=none".to_string()),
        };
        let record = evaluate("slow.example", "default", &records);

        assert!(record.has_lookup_errors());
        assert_eq!(record.lookup_errors, vec!["spf lookup timed out"]);
        assert!(!record.spf_pass);
        assert!(record.dmarc_pass);
        assert_eq!(record.dmarc_policy, Some(DmarcPolicy::None));
    }

    #[test]
    fn test_evaluate_matches_score_texts() {
        let records = DomainRecords {
            spf: LookupOutcome::Found(SPF.to_string()),
            dkim: LookupOutcome::Found(DKIM.to_string()),
            dmarc: LookupOutcome::Absent,
        };
        let record = evaluate("example.com", "default", &records);
        assert_eq!(record.score, score_texts(Some(SPF), Some(DKIM), None));
        assert_eq!(record.score.value(), 67);
        assert_eq!(record.spf.as_deref(), Some(SPF));
    }

    #[test]
    fn test_plus_all_noted() {
        let records = DomainRecords {
            spf: LookupOutcome::Found("v=spf1 +all".to_string()),
            dkim: LookupOutcome::Absent,
            dmarc: LookupOutcome::Absent,
        };
        let record = evaluate("open.example", "default", &records);
        assert!(record.spf_pass);
        assert!(record.notes.iter().any(|n| n.contains("+all")));
    }
}
