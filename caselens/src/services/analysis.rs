use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{vote_labels, RetrievalService};
use crate::config::{Config, ReasoningConfig};
use crate::error::{CaseLensError, Result};
use crate::frames::{list_frame_files, uniform_sample};
use crate::llm::{image_data_url, prompts, Reasoner, ReasoningRequest};
use crate::models::{AnalysisResult, CollectionHits, EvidenceIds, RetrievalHit};

/// Knobs for one case review.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub top_k_cases: usize,
    pub top_k_guidelines: usize,
    pub vote_top_n: usize,
    /// Frame documents indexed per case; sizes the over-fetch on `cases`.
    pub frames_per_case: usize,
    pub frames_per_similar_case: usize,
    pub max_query_frames: usize,
    pub max_similar_frames: usize,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl AnalysisSettings {
    pub fn from_config(config: &Config) -> Self {
        let reasoning = config
            .reasoning
            .clone()
            .unwrap_or_else(|| ReasoningConfig::new(""));
        Self {
            top_k_cases: config.retrieval.top_k_cases,
            top_k_guidelines: config.retrieval.top_k_guidelines,
            vote_top_n: config.retrieval.vote_top_n,
            frames_per_case: config.indexing.frames_per_case,
            frames_per_similar_case: reasoning.frames_per_similar_case,
            max_query_frames: reasoning.max_query_frames,
            max_similar_frames: reasoning.max_similar_frames,
            max_output_tokens: reasoning.max_output_tokens,
            timeout: Duration::from_secs(reasoning.timeout_secs),
        }
    }
}

/// Retrieval, voting, evidence assembly and the reasoning call.
#[derive(Clone)]
pub struct AnalysisService {
    retrieval: RetrievalService,
    reasoner: Arc<dyn Reasoner>,
    images_dir: PathBuf,
    settings: AnalysisSettings,
}

/// Frames and notes gathered before the reasoning call.
struct Evidence {
    cases: Vec<RetrievalHit>,
    guidelines: Vec<RetrievalHit>,
    images: Vec<String>,
    missing_info: Vec<String>,
}

impl AnalysisService {
    pub fn new(
        retrieval: RetrievalService,
        reasoner: Arc<dyn Reasoner>,
        images_dir: PathBuf,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            retrieval,
            reasoner,
            images_dir,
            settings,
        }
    }

    /// Reviews `report_text` against the indexed corpus. Always returns a
    /// result; failures are reported through `ok` and `error`.
    pub async fn analyze(&self, report_text: &str, query_frames: &[PathBuf]) -> AnalysisResult {
        if report_text.trim().is_empty() {
            return AnalysisResult::failure("Report text is empty", EvidenceIds::default());
        }

        let evidence = match self.gather(report_text, query_frames).await {
            Ok(evidence) => evidence,
            Err(e) => {
                warn!(error = %e, "Retrieval failed");
                return AnalysisResult::failure(
                    format!("Retrieval failed: {e}"),
                    EvidenceIds::default(),
                );
            }
        };

        let evidence_ids = EvidenceIds {
            cases: evidence.cases.iter().map(case_key).collect(),
            guidelines: evidence.guidelines.iter().map(|h| h.id.clone()).collect(),
        };
        let votes = vote_labels(&evidence.cases, self.settings.vote_top_n);

        let request = ReasoningRequest {
            system: prompts::SYSTEM_PROMPT.to_string(),
            text: prompts::build_user_payload(
                report_text,
                &votes,
                &evidence.cases,
                &evidence.guidelines,
                &evidence.missing_info,
            ),
            images: evidence.images,
            max_output_tokens: self.settings.max_output_tokens,
        };

        info!(
            cases = evidence_ids.cases.len(),
            guidelines = evidence_ids.guidelines.len(),
            images = request.images.len(),
            "Invoking reasoning model"
        );

        match self.reason(&request).await {
            Ok(answer) => AnalysisResult {
                ok: true,
                answer: with_missing_info(answer, &evidence.missing_info),
                evidence_ids,
                label_votes: votes,
                missing_info: evidence.missing_info,
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "Reasoning failed");
                AnalysisResult {
                    label_votes: votes,
                    missing_info: evidence.missing_info,
                    ..AnalysisResult::failure(e.to_string(), evidence_ids)
                }
            }
        }
    }

    async fn reason(&self, request: &ReasoningRequest) -> Result<String> {
        match tokio::time::timeout(self.settings.timeout, self.reasoner.reason(request)).await {
            Ok(result) => result,
            Err(_) => Err(CaseLensError::ReasoningTimeout {
                timeout_secs: self.settings.timeout.as_secs(),
            }),
        }
    }

    async fn gather(&self, report_text: &str, query_frames: &[PathBuf]) -> Result<Evidence> {
        let settings = &self.settings;
        // Frame documents share the case's id, so fetch enough to fill k cases.
        let fetch = settings
            .top_k_cases
            .saturating_mul(settings.frames_per_case + 1);
        let outcome = self
            .retrieval
            .retrieve(report_text, fetch, settings.top_k_guidelines)
            .await?;

        let mut missing_info = Vec::new();

        let cases = distinct_cases(outcome.cases.hits(), settings.top_k_cases);
        match &outcome.cases {
            CollectionHits::Unavailable { reason } => missing_info.push(format!(
                "Similar-case collection unavailable ({reason}); no case evidence."
            )),
            CollectionHits::Hits(_) if cases.is_empty() => {
                missing_info.push("No similar cases were retrieved.".to_string())
            }
            CollectionHits::Hits(_) => {}
        }

        let guidelines = outcome.guidelines.hits().to_vec();
        match &outcome.guidelines {
            CollectionHits::Unavailable { reason } => missing_info.push(format!(
                "Guideline collection unavailable ({reason}); no guideline evidence."
            )),
            CollectionHits::Hits(hits) if hits.is_empty() => {
                missing_info.push("No guideline chunks were retrieved.".to_string())
            }
            CollectionHits::Hits(_) => {}
        }

        let query = uniform_sample(query_frames, settings.max_query_frames);
        if query.is_empty() {
            missing_info.push("No frames from the study under review were provided.".to_string());
        }

        let mut similar = Vec::new();
        for hit in &cases {
            let frames = list_frame_files(&self.images_dir.join(case_key(hit)));
            similar.extend(uniform_sample(&frames, settings.frames_per_similar_case));
        }
        let similar = uniform_sample(&similar, settings.max_similar_frames);
        if !cases.is_empty() && similar.is_empty() {
            missing_info.push("No frames were found for the retrieved similar cases.".to_string());
        }

        let images = query
            .iter()
            .chain(similar.iter())
            .filter_map(|path| encode_frame(path))
            .collect();

        Ok(Evidence {
            cases,
            guidelines,
            images,
            missing_info,
        })
    }
}

fn case_key(hit: &RetrievalHit) -> String {
    hit.case_id().unwrap_or(&hit.id).to_string()
}

/// First (closest) hit per case, up to `k` cases.
fn distinct_cases(hits: &[RetrievalHit], k: usize) -> Vec<RetrievalHit> {
    let mut seen = HashSet::new();
    hits.iter()
        .filter(|hit| seen.insert(case_key(hit)))
        .take(k)
        .cloned()
        .collect()
}

fn encode_frame(path: &Path) -> Option<String> {
    match image_data_url(path) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable frame");
            None
        }
    }
}

fn with_missing_info(answer: String, missing_info: &[String]) -> String {
    if missing_info.is_empty() {
        return answer;
    }
    let mut out = answer;
    out.push_str("\n\nMissing info (retrieval):\n");
    for note in missing_info {
        out.push_str("- ");
        out.push_str(note);
        out.push('\n');
    }
    out
}
