use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, info};

use super::RetrievalService;
use crate::dataset::LabelRow;
use crate::error::{CaseLensError, Result};
use crate::models::{CollectionHits, CollectionKind, Document, DocumentType};

/// Default cut-offs for Hit@k.
pub const DEFAULT_KS: &[usize] = &[1, 3, 5];

/// Neighbours retrieved for one query case, best first, self excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRanking {
    pub case_id: String,
    pub retrieved: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelMetrics {
    pub label: String,
    pub n: usize,
    pub hit_at: BTreeMap<usize, f64>,
    pub mrr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub evaluated: usize,
    pub micro_hit_at: BTreeMap<usize, f64>,
    pub micro_mrr: f64,
    pub macro_hit_at: BTreeMap<usize, f64>,
    pub macro_mrr: f64,
    pub per_label: Vec<LabelMetrics>,
}

#[derive(Default)]
struct Tally {
    n: usize,
    hits: BTreeMap<usize, usize>,
    rr_sum: f64,
}

fn safe_div(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        0.0
    } else {
        a / b
    }
}

/// Hit@k and mean reciprocal rank, micro-averaged over queries and
/// macro-averaged over labels. Queries with no neighbours or no known label
/// are not counted.
pub fn compute_metrics(
    rankings: &[QueryRanking],
    labels: &HashMap<String, String>,
    ks: &[usize],
) -> EvaluationReport {
    let mut overall = Tally::default();
    let mut per_label: BTreeMap<String, Tally> = BTreeMap::new();

    for ranking in rankings {
        if ranking.retrieved.is_empty() {
            continue;
        }
        let Some(truth) = labels.get(&ranking.case_id) else {
            continue;
        };
        let matches = |id: &String| labels.get(id) == Some(truth);

        let rank = ranking.retrieved.iter().position(matches);
        let rr = rank.map_or(0.0, |r| 1.0 / (r + 1) as f64);

        let tally = per_label.entry(truth.clone()).or_default();
        for t in [&mut overall, tally] {
            t.n += 1;
            t.rr_sum += rr;
            for &k in ks {
                let hit = rank.is_some_and(|r| r < k);
                *t.hits.entry(k).or_default() += usize::from(hit);
            }
        }
    }

    let rate = |t: &Tally, k: usize| {
        safe_div(
            t.hits.get(&k).copied().unwrap_or_default() as f64,
            t.n as f64,
        )
    };

    let per_label: Vec<LabelMetrics> = per_label
        .into_iter()
        .map(|(label, t)| LabelMetrics {
            hit_at: ks.iter().map(|&k| (k, rate(&t, k))).collect(),
            mrr: safe_div(t.rr_sum, t.n as f64),
            n: t.n,
            label,
        })
        .collect();

    let label_count = per_label.len() as f64;
    let macro_hit_at = ks
        .iter()
        .map(|&k| {
            let sum: f64 = per_label.iter().map(|m| m.hit_at[&k]).sum();
            (k, safe_div(sum, label_count))
        })
        .collect();
    let macro_mrr = safe_div(per_label.iter().map(|m| m.mrr).sum(), label_count);

    EvaluationReport {
        evaluated: overall.n,
        micro_hit_at: ks.iter().map(|&k| (k, rate(&overall, k))).collect(),
        micro_mrr: safe_div(overall.rr_sum, overall.n as f64),
        macro_hit_at,
        macro_mrr,
        per_label,
    }
}

/// Queries the `cases` collection with every labelled case card and scores
/// the case-card neighbours against the label table.
pub async fn evaluate_retrieval(
    retrieval: &RetrievalService,
    documents: &[Document],
    labels: &[LabelRow],
    ks: &[usize],
    frames_per_case: usize,
) -> Result<EvaluationReport> {
    let label_of: HashMap<String, String> = labels
        .iter()
        .map(|row| (row.case_id.clone(), row.label_raw.clone()))
        .collect();
    let cards: HashMap<&str, &str> = documents
        .iter()
        .filter(|d| d.document_type() == Some(DocumentType::CaseCard))
        .filter_map(|d| Some((d.case_id()?, d.content.as_str())))
        .collect();

    let wanted = ks.iter().copied().max().unwrap_or(0) + 1;
    let fetch = wanted.saturating_mul(frames_per_case + 1);

    let mut rankings = Vec::with_capacity(labels.len());
    for row in labels {
        let Some(card) = cards.get(row.case_id.as_str()) else {
            debug!(case_id = %row.case_id, "No case card, skipping");
            continue;
        };

        let hits = match retrieval.retrieve_cases(card, fetch).await? {
            CollectionHits::Hits(hits) => hits,
            CollectionHits::Unavailable { reason } => {
                return Err(CaseLensError::collection_unavailable(
                    CollectionKind::Cases.name(),
                    reason,
                ))
            }
        };

        let retrieved = hits
            .iter()
            .filter(|h| h.str_field("document_type") == Some("case_card"))
            .take(wanted)
            .filter(|h| h.id != row.case_id)
            .map(|h| h.id.clone())
            .collect();

        rankings.push(QueryRanking {
            case_id: row.case_id.clone(),
            retrieved,
        });
    }

    let report = compute_metrics(&rankings, &label_of, ks);
    info!(
        evaluated = report.evaluated,
        micro_mrr = report.micro_mrr,
        macro_mrr = report.macro_mrr,
        "Retrieval evaluation complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ranking(case_id: &str, retrieved: &[&str]) -> QueryRanking {
        QueryRanking {
            case_id: case_id.to_string(),
            retrieved: retrieved.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn labels() -> HashMap<String, String> {
        [("a1", "A"), ("a2", "A"), ("b1", "B"), ("b2", "B")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_micro_and_macro_metrics() {
        let rankings = vec![
            ranking("a1", &["a2", "b1"]),
            ranking("a2", &["b1", "a1"]),
            ranking("b1", &["a1", "a2"]),
        ];
        let report = compute_metrics(&rankings, &labels(), &[1, 3]);

        assert_eq!(report.evaluated, 3);
        assert_eq!(report.micro_hit_at[&1], 1.0 / 3.0);
        assert_eq!(report.micro_hit_at[&3], 2.0 / 3.0);
        assert!((report.micro_mrr - 0.5).abs() < 1e-12);

        // A: hit@1 = 0.5, mrr = 0.75; B: hit@1 = 0, mrr = 0
        assert_eq!(report.macro_hit_at[&1], 0.25);
        assert!((report.macro_mrr - 0.375).abs() < 1e-12);

        assert_eq!(report.per_label.len(), 2);
        assert_eq!(report.per_label[0].label, "A");
        assert_eq!(report.per_label[0].n, 2);
        assert_eq!(report.per_label[1].mrr, 0.0);
    }

    #[test]
    fn test_queries_without_neighbours_are_skipped() {
        let rankings = vec![ranking("a1", &[]), ranking("unknown", &["a1"])];
        let report = compute_metrics(&rankings, &labels(), DEFAULT_KS);
        assert_eq!(report.evaluated, 0);
        assert_eq!(report.micro_mrr, 0.0);
        assert_eq!(report.macro_hit_at[&5], 0.0);
        assert!(report.per_label.is_empty());
    }
}
