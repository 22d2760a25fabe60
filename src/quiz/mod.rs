// Quiz module
// Generation through the language model, deterministic scoring, and the
// generate / show / submit-once lifecycle


pub mod generator;
pub mod scorer;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::QuizSettings;
use crate::context::StudyContext;
use crate::database::{NewQuiz, Quiz, QuizStatus};
use crate::generation::{ExtractionError, GenerationError};
use crate::{Result, StudyError};

pub use generator::{QuizGenerator, normalize_questions};
pub use scorer::{QuizScore, score_quiz};

const MAX_LISTED_QUIZZES: i64 = 50;

/// A multiple-choice question with exactly four options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    /// Zero-based index into `options`
    pub correct_answer: i64,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAnswer {
    pub question_id: String,
    /// Zero-based index of the chosen option
    pub answer: i64,
}

/// Per-question outcome. The answer key is present only for missed questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizFeedback {
    pub question_id: String,
    pub correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizConfig {
    pub num_questions: u32,
    pub difficulty: String,
}

impl Default for QuizConfig {
    #[inline]
    fn default() -> Self {
        QuizSettings::default().into()
    }
}

impl From<QuizSettings> for QuizConfig {
    #[inline]
    fn from(settings: QuizSettings) -> Self {
        Self {
            num_questions: settings.default_questions,
            difficulty: settings.default_difficulty,
        }
    }
}

impl QuizConfig {
    /// Replace a zero count or blank difficulty with the configured defaults
    #[inline]
    pub fn normalized(&self, settings: &QuizSettings) -> Self {
        let difficulty = self.difficulty.trim();
        Self {
            num_questions: if self.num_questions == 0 {
                settings.default_questions
            } else {
                self.num_questions
            },
            difficulty: if difficulty.is_empty() {
                settings.default_difficulty.clone()
            } else {
                difficulty.to_string()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    #[error("no text to generate questions from")]
    EmptyText,

    #[error("model output contained no JSON array")]
    NoJsonArray,

    #[error("model output is not valid question JSON: {0}")]
    MalformedJson(String),

    #[error("model returned no questions")]
    EmptyQuestionSet,

    #[error("question {index} is invalid: {reason}")]
    InvalidQuestion { index: usize, reason: String },

    #[error("quiz generation failed: {0}")]
    Generation(#[from] GenerationError),
}

impl From<ExtractionError> for QuizError {
    #[inline]
    fn from(error: ExtractionError) -> Self {
        match error {
            ExtractionError::NoJsonArray => Self::NoJsonArray,
            ExtractionError::MalformedJson(e) => Self::MalformedJson(e.to_string()),
            ExtractionError::EmptyArray => Self::EmptyQuestionSet,
        }
    }
}

/// A question as shown to the quiz taker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A stored quiz with the answer key hidden until it has been submitted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizView {
    pub id: String,
    pub document_id: String,
    pub status: QuizStatus,
    pub total_questions: i64,
    pub questions: Vec<QuestionView>,
    pub score: Option<f64>,
    pub answers: Option<Vec<UserAnswer>>,
    pub attempted_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl From<Quiz> for QuizView {
    #[inline]
    fn from(quiz: Quiz) -> Self {
        let revealed = quiz.is_submitted();

        let questions = quiz
            .questions
            .0
            .into_iter()
            .map(|question| QuestionView {
                id: question.id,
                question: question.question,
                options: question.options,
                correct_answer: revealed.then_some(question.correct_answer),
                explanation: revealed.then_some(question.explanation),
            })
            .collect();

        Self {
            id: quiz.id,
            document_id: quiz.document_id,
            status: quiz.status,
            total_questions: quiz.total_questions,
            questions,
            score: quiz.score.filter(|_| revealed),
            answers: quiz.answers.map(|answers| answers.0).filter(|_| revealed),
            attempted_at: quiz.attempted_at.filter(|_| revealed),
            created_at: quiz.created_at,
        }
    }
}

/// Result returned to the quiz taker after a successful submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizSubmission {
    pub quiz_id: String,
    pub score: f64,
    pub correct_count: usize,
    pub total_questions: usize,
    pub feedback: Vec<QuizFeedback>,
    pub attempted_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct QuizService {
    context: StudyContext,
    generator: QuizGenerator,
}

impl QuizService {
    #[inline]
    pub fn new(context: StudyContext) -> Self {
        Self {
            generator: QuizGenerator::new(context.clone()),
            context,
        }
    }

    /// Generate and store a quiz over a processed document
    #[inline]
    pub async fn generate(
        &self,
        user_id: &str,
        document_id: &str,
        config: &QuizConfig,
    ) -> Result<QuizView> {
        let database = &self.context.database;

        let document = database
            .get_document_for_user(user_id, document_id)
            .await
            .map_err(StudyError::database)?
            .ok_or_else(|| StudyError::not_found("document", document_id))?;

        if !document.is_processed() {
            return Err(StudyError::Conflict(format!(
                "document {} is {}, not processed",
                document.id, document.status
            )));
        }

        let text = database
            .get_raw_text(document_id)
            .await
            .map_err(StudyError::database)?
            .map(|raw| raw.content)
            .unwrap_or_default();

        let questions = self.generator.generate(&text, config).await?;

        let quiz = database
            .create_quiz(&NewQuiz {
                user_id: user_id.to_string(),
                document_id: document_id.to_string(),
                questions,
            })
            .await
            .map_err(StudyError::database)?;

        info!(
            "Created quiz {} with {} questions for document {}",
            quiz.id, quiz.total_questions, document_id
        );
        Ok(quiz.into())
    }

    #[inline]
    pub async fn get(&self, user_id: &str, quiz_id: &str) -> Result<QuizView> {
        self.load(user_id, quiz_id).await.map(QuizView::from)
    }

    /// Score answers and record the submission. A quiz accepts exactly one submission.
    #[inline]
    pub async fn submit(
        &self,
        user_id: &str,
        quiz_id: &str,
        answers: &[UserAnswer],
    ) -> Result<QuizSubmission> {
        let quiz = self.load(user_id, quiz_id).await?;
        if quiz.is_submitted() {
            return Err(already_submitted(quiz_id));
        }

        let result = score_quiz(&quiz.questions.0, answers);

        let attempted_at = self
            .context
            .database
            .submit_quiz(user_id, quiz_id, answers, result.score)
            .await
            .map_err(StudyError::database)?
            .ok_or_else(|| already_submitted(quiz_id))?;

        info!(
            "Quiz {} submitted: {}/{} correct ({:.1}%)",
            quiz_id, result.correct_count, result.total_questions, result.score
        );

        Ok(QuizSubmission {
            quiz_id: quiz.id,
            score: result.score,
            correct_count: result.correct_count,
            total_questions: result.total_questions,
            feedback: result.feedback,
            attempted_at,
        })
    }

    /// Newest first, at most fifty
    #[inline]
    pub async fn list(&self, user_id: &str, document_id: Option<&str>) -> Result<Vec<QuizView>> {
        let quizzes = self
            .context
            .database
            .list_quizzes(user_id, document_id, MAX_LISTED_QUIZZES)
            .await
            .map_err(StudyError::database)?;

        Ok(quizzes.into_iter().map(QuizView::from).collect())
    }

    async fn load(&self, user_id: &str, quiz_id: &str) -> Result<Quiz> {
        self.context
            .database
            .get_quiz_for_user(user_id, quiz_id)
            .await
            .map_err(StudyError::database)?
            .ok_or_else(|| StudyError::not_found("quiz", quiz_id))
    }
}

fn already_submitted(quiz_id: &str) -> StudyError {
    StudyError::Conflict(format!("quiz {quiz_id} has already been submitted"))
}
