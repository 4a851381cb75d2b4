use crate::models::{LabelVote, RetrievalHit};

/// Distance-weighted label vote over neighbour cases.
///
/// Each hit contributes `1 / (1 + distance)` to its label. The result is
/// ordered by total weight, ties keeping first-seen order, and truncated to
/// `top_n`. No hits yields a single `("unknown", 0.0)` candidate.
pub fn vote_labels(hits: &[RetrievalHit], top_n: usize) -> Vec<LabelVote> {
    let mut votes: Vec<LabelVote> = Vec::new();

    for hit in hits {
        let weight = 1.0 / (1.0 + f64::from(hit.distance));
        let label = hit.label();
        match votes.iter_mut().find(|vote| vote.label == label) {
            Some(vote) => vote.weight += weight,
            None => votes.push(LabelVote {
                label: label.to_string(),
                weight,
            }),
        }
    }

    if votes.is_empty() {
        return vec![LabelVote {
            label: "unknown".to_string(),
            weight: 0.0,
        }];
    }

    // sort_by is stable, so equal weights keep first-seen order.
    votes.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    votes.truncate(top_n);
    votes
}
