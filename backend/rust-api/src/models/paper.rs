use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationError};

use super::selected;

pub const BRANCHES: &[&str] = &[
    "Computer Engineering",
    "Information Technology",
    "Electronics & Telecommunication",
    "Electronics Engineering",
    "Mechanical Engineering",
    "Civil Engineering",
    "Chemical Engineering",
    "Textile Engineering",
    "Production Engineering",
    "Instrumentation Engineering",
];

pub const EXAM_TYPES: &[&str] = &[
    "Internal Assessment",
    "External",
    "Practical",
    "Oral",
    "Project",
    "Viva",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Easy" => Ok(Difficulty::Easy),
            "Medium" => Ok(Difficulty::Medium),
            "Hard" => Ok(Difficulty::Hard),
            other => Err(format!(
                "Unknown difficulty '{}', expected Easy, Medium or Hard",
                other
            )),
        }
    }
}

/// A question paper row in the `papers` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub branch: String,
    pub semester: u8,
    pub year: i32,
    pub exam_type: String,
    pub question_paper_url: String,
    #[serde(default)]
    pub solution_url: Option<String>,
    pub upload_date: DateTime<Utc>,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub chapters: Vec<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert payload for a freshly uploaded paper. The record store assigns `id`.
#[derive(Debug, Clone, Serialize)]
pub struct NewPaper {
    pub title: String,
    pub subject: String,
    pub branch: String,
    pub semester: u8,
    pub year: i32,
    pub exam_type: String,
    pub difficulty: Difficulty,
    pub question_paper_url: String,
    pub solution_url: Option<String>,
    pub tags: Vec<String>,
    pub chapters: Vec<String>,
    pub upload_date: DateTime<Utc>,
    pub download_count: u64,
    pub verified: bool,
    pub rating: f64,
}

/// Text fields of the upload form. Files travel separately as [`UploadedFile`].
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaperUploadForm {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title must be between 1 and 200 characters"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 100,
        message = "Subject must be between 1 and 100 characters"
    ))]
    pub subject: String,

    #[validate(custom(function = "validate_branch"))]
    pub branch: String,

    #[validate(range(min = 1, max = 8, message = "Semester must be between 1 and 8"))]
    pub semester: u8,

    #[validate(range(min = 1990, max = 2100, message = "Year is out of range"))]
    pub year: i32,

    #[validate(custom(function = "validate_exam_type"))]
    pub exam_type: String,

    pub difficulty: Difficulty,

    /// Comma separated, e.g. "trees, graphs"
    #[serde(default)]
    pub tags: String,

    #[serde(default)]
    pub chapters: String,
}

fn validate_branch(branch: &str) -> Result<(), ValidationError> {
    if BRANCHES.contains(&branch) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_branch"))
    }
}

fn validate_exam_type(exam_type: &str) -> Result<(), ValidationError> {
    if EXAM_TYPES.contains(&exam_type) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_exam_type"))
    }
}

/// Splits comma separated form input, dropping blanks.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Query parameters accepted by the paper gallery.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PaperFilter {
    pub search: Option<String>,
    pub branch: Option<String>,
    pub subject: Option<String>,
    pub semester: Option<u8>,
    pub year: Option<i32>,
    pub exam_type: Option<String>,
    #[serde(default)]
    pub solutions_only: bool,
}

impl PaperFilter {
    pub fn branch(&self) -> Option<&str> {
        selected(&self.branch)
    }

    pub fn subject(&self) -> Option<&str> {
        selected(&self.subject)
    }

    pub fn exam_type(&self) -> Option<&str> {
        selected(&self.exam_type)
    }

    /// Case-insensitive substring match over title and subject.
    pub fn matches_search(&self, paper: &Paper) -> bool {
        match selected(&self.search) {
            None => true,
            Some(query) => {
                let query = query.to_lowercase();
                paper.title.to_lowercase().contains(&query)
                    || paper.subject.to_lowercase().contains(&query)
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub id: String,
    pub question_paper_url: String,
    pub solution_url: Option<String>,
    pub download_count: u64,
}

impl From<&Paper> for DownloadResponse {
    fn from(paper: &Paper) -> Self {
        Self {
            id: paper.id.clone(),
            question_paper_url: paper.question_paper_url.clone(),
            solution_url: paper.solution_url.clone(),
            download_count: paper.download_count,
        }
    }
}
