mod analysis;
mod evaluation;
mod indexer;
mod retrieval;
mod voting;

pub use analysis::{AnalysisService, AnalysisSettings};
pub use evaluation::{
    compute_metrics, evaluate_retrieval, EvaluationReport, LabelMetrics, QueryRanking, DEFAULT_KS,
};
pub use indexer::{CollectionReport, IndexReport, IndexerService};
pub use retrieval::RetrievalService;
pub use voting::vote_labels;
