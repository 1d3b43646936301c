use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{paper::Difficulty, selected};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuestionType {
    Mcq,
    Short,
    Long,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub marks: u32,
    #[serde(default)]
    pub chapter: String,
}

/// A mock test row in the `mock_tests` table. Questions are stored inline,
/// in presentation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockTest {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub branch: String,
    pub semester: u8,
    #[serde(default)]
    pub questions: Vec<Question>,
    /// Minutes
    pub duration: u32,
    pub total_marks: u32,
    pub created_date: DateTime<Utc>,
    #[serde(default)]
    pub attempt_count: u64,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct MockTestFilter {
    pub branch: Option<String>,
    pub subject: Option<String>,
    pub semester: Option<u8>,
    pub difficulty: Option<Difficulty>,
}

impl MockTestFilter {
    pub fn branch(&self) -> Option<&str> {
        selected(&self.branch)
    }

    pub fn subject(&self) -> Option<&str> {
        selected(&self.subject)
    }
}

/// Gallery card: everything except the question bodies.
#[derive(Debug, Serialize)]
pub struct MockTestSummary {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub branch: String,
    pub semester: u8,
    pub question_count: usize,
    pub duration: u32,
    pub total_marks: u32,
    pub attempt_count: u64,
    pub difficulty: Difficulty,
    pub created_date: DateTime<Utc>,
}

impl From<&MockTest> for MockTestSummary {
    fn from(test: &MockTest) -> Self {
        Self {
            id: test.id.clone(),
            title: test.title.clone(),
            subject: test.subject.clone(),
            branch: test.branch.clone(),
            semester: test.semester,
            question_count: test.questions.len(),
            duration: test.duration,
            total_marks: test.total_marks,
            attempt_count: test.attempt_count,
            difficulty: test.difficulty,
            created_date: test.created_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mock_test_row_decodes_nested_questions() {
        let test: MockTest = serde_json::from_value(json!({
            "id": "t1",
            "title": "DBMS Mid-term",
            "subject": "DBMS",
            "branch": "Information Technology",
            "semester": 4,
            "questions": [
                {
                    "id": "q1",
                    "question": "What does ACID stand for?",
                    "type": "SHORT",
                    "correct_answer": "Atomicity, Consistency, Isolation, Durability",
                    "marks": 2,
                    "chapter": "Transactions"
                },
                {
                    "id": "q2",
                    "question": "Which normal form removes transitive dependencies?",
                    "type": "MCQ",
                    "options": ["1NF", "2NF", "3NF", "BCNF"],
                    "correct_answer": "3NF",
                    "marks": 1,
                    "chapter": "Normalization"
                }
            ],
            "duration": 120,
            "total_marks": 75,
            "created_date": "2024-01-12T00:00:00Z",
            "attempt_count": 980,
            "difficulty": "Easy"
        }))
        .unwrap();

        assert_eq!(test.questions.len(), 2);
        assert_eq!(test.questions[0].question_type, QuestionType::Short);
        assert_eq!(test.questions[1].question_type, QuestionType::Mcq);
        assert_eq!(test.questions[1].options.as_ref().map(Vec::len), Some(4));
        assert_eq!(test.difficulty, Difficulty::Easy);

        let summary = MockTestSummary::from(&test);
        assert_eq!(summary.question_count, 2);
        assert_eq!(summary.attempt_count, 980);
    }

    #[test]
    fn test_question_type_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(QuestionType::Long).unwrap(),
            json!("LONG")
        );
    }
}
