use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectShare {
    pub subject: String,
    pub downloads: u64,
    /// Share of all paper downloads, 0..=100
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchCount {
    pub branch: String,
    pub count: usize,
}

/// Dashboard summary folded from the papers and mock tests collections.
/// Never persisted; recomputed per request.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct DerivedStats {
    pub total_papers: usize,
    pub total_subjects: usize,
    pub total_downloads: u64,
    pub total_mock_tests: usize,
    pub total_attempts: u64,
    pub active_students: u64,
    pub per_subject: Vec<SubjectShare>,
    pub per_branch: Vec<BranchCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    #[serde(flatten)]
    pub stats: DerivedStats,
    pub recent_uploads: u64,
}
