//! Folds raw paper and mock test rows into dashboard statistics.
//!
//! Everything here is pure: no I/O, no clock reads, no panics on empty input.

use std::collections::HashMap;

use crate::models::{
    mock_test::MockTest,
    paper::Paper,
    stats::{BranchCount, DerivedStats, SubjectShare},
};

pub const TOP_SUBJECTS: usize = 6;
pub const TOP_BRANCHES: usize = 5;

pub fn compute_stats(papers: &[Paper], tests: &[MockTest], session_count: u64) -> DerivedStats {
    let total_downloads = papers
        .iter()
        .fold(0u64, |acc, paper| acc.saturating_add(paper.download_count));

    let subjects = group_in_order(papers, |paper| &paper.subject, |paper| paper.download_count);
    let total_subjects = subjects.len();

    let mut per_subject: Vec<SubjectShare> = subjects
        .into_iter()
        .map(|(subject, downloads)| SubjectShare {
            subject,
            downloads,
            percentage: percentage(downloads, total_downloads),
        })
        .collect();
    // sort_by is stable, so ties keep first-seen order
    per_subject.sort_by(|a, b| b.downloads.cmp(&a.downloads));
    per_subject.truncate(TOP_SUBJECTS);

    let mut per_branch: Vec<BranchCount> = group_in_order(papers, |paper| &paper.branch, |_| 1)
        .into_iter()
        .map(|(branch, count)| BranchCount {
            branch,
            count: count as usize,
        })
        .collect();
    per_branch.sort_by(|a, b| b.count.cmp(&a.count));
    per_branch.truncate(TOP_BRANCHES);

    let total_attempts = tests
        .iter()
        .fold(0u64, |acc, test| acc.saturating_add(test.attempt_count));

    DerivedStats {
        total_papers: papers.len(),
        total_subjects,
        total_downloads,
        total_mock_tests: tests.len(),
        total_attempts,
        active_students: session_count,
        per_subject,
        per_branch,
    }
}

/// Returns a copy of `paper` with one more recorded download.
pub fn increment_download(paper: &Paper) -> Paper {
    Paper {
        download_count: paper.download_count.saturating_add(1),
        ..paper.clone()
    }
}

/// Returns a copy of `test` with one more recorded attempt.
pub fn increment_attempt(test: &MockTest) -> MockTest {
    MockTest {
        attempt_count: test.attempt_count.saturating_add(1),
        ..test.clone()
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

/// Groups by key, summing `weight`, preserving the order keys were first seen.
fn group_in_order<'a, K, W>(papers: &'a [Paper], key: K, weight: W) -> Vec<(String, u64)>
where
    K: Fn(&'a Paper) -> &'a String,
    W: Fn(&Paper) -> u64,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, u64)> = Vec::new();

    for paper in papers {
        let k = key(paper);
        match index.get(k.as_str()) {
            Some(&slot) => groups[slot].1 = groups[slot].1.saturating_add(weight(paper)),
            None => {
                index.insert(k.as_str(), groups.len());
                groups.push((k.clone(), weight(paper)));
            }
        }
    }

    groups
}
