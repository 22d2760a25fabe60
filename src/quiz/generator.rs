use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::{Question, QuizConfig, QuizError};
use crate::context::StudyContext;
use crate::generation::extract_json_array;
use crate::generation::prompt::{quiz_prompt, truncate_chars};

pub const OPTIONS_PER_QUESTION: usize = 4;

/// Asks the language model for multiple-choice questions about a text
#[derive(Debug, Clone)]
pub struct QuizGenerator {
    context: StudyContext,
}

impl QuizGenerator {
    #[inline]
    pub fn new(context: StudyContext) -> Self {
        Self { context }
    }

    #[inline]
    pub async fn generate(&self, text: &str, config: &QuizConfig) -> Result<Vec<Question>, QuizError> {
        if text.trim().is_empty() {
            return Err(QuizError::EmptyText);
        }

        let settings = &self.context.config.quiz;
        let config = config.normalized(settings);
        let text = truncate_chars(text, settings.max_prompt_chars);

        debug!(
            "Requesting {} {} questions from {} characters",
            config.num_questions,
            config.difficulty,
            text.chars().count()
        );

        let raw = self
            .context
            .generate(quiz_prompt(&text, config.num_questions, &config.difficulty))
            .await?;

        let questions = normalize_questions(extract_json_array(&raw)?)?;

        if questions.len() != config.num_questions as usize {
            warn!(
                "Model returned {} questions, {} were requested",
                questions.len(),
                config.num_questions
            );
        }
        info!("Generated {} quiz questions", questions.len());

        Ok(questions)
    }
}

/// Check every question's shape and give each a unique id.
/// Blank or repeated ids become `q{n}` with `n` the 1-based position, or the
/// next free number when that id is taken.
#[inline]
pub fn normalize_questions(questions: Vec<Question>) -> Result<Vec<Question>, QuizError> {
    let mut seen = HashSet::with_capacity(questions.len());

    questions
        .into_iter()
        .enumerate()
        .map(|(index, mut question)| {
            if question.question.trim().is_empty() {
                return Err(QuizError::InvalidQuestion {
                    index,
                    reason: "question text is empty".to_string(),
                });
            }

            if question.options.len() != OPTIONS_PER_QUESTION {
                return Err(QuizError::InvalidQuestion {
                    index,
                    reason: format!(
                        "expected {} options, got {}",
                        OPTIONS_PER_QUESTION,
                        question.options.len()
                    ),
                });
            }

            if !(0..OPTIONS_PER_QUESTION as i64).contains(&question.correct_answer) {
                return Err(QuizError::InvalidQuestion {
                    index,
                    reason: format!(
                        "correct_answer {} is not an option index",
                        question.correct_answer
                    ),
                });
            }

            let id = question.id.trim().to_string();
            question.id = if id.is_empty() || seen.contains(&id) {
                let mut n = index + 1;
                while seen.contains(&format!("q{n}")) {
                    n += 1;
                }
                format!("q{n}")
            } else {
                id
            };
            seen.insert(question.id.clone());

            Ok(question)
        })
        .collect()
}
