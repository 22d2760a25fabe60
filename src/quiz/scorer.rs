use std::collections::HashMap;

use super::{Question, QuizFeedback, UserAnswer};

/// Result of scoring one set of answers
#[derive(Debug, Clone, PartialEq)]
pub struct QuizScore {
    /// Percentage of correct answers, in `0.0..=100.0`
    pub score: f64,
    pub correct_count: usize,
    pub total_questions: usize,
    /// One entry per question, in question order
    pub feedback: Vec<QuizFeedback>,
}

/// Score `answers` against `questions`.
///
/// Unanswered questions count as incorrect. When an id is answered more than
/// once the last answer wins; answers to unknown ids are ignored. The correct
/// option and explanation are revealed only for questions that were missed.
#[inline]
pub fn score_quiz(questions: &[Question], answers: &[UserAnswer]) -> QuizScore {
    let lookup: HashMap<&str, i64> = answers
        .iter()
        .map(|answer| (answer.question_id.as_str(), answer.answer))
        .collect();

    let feedback: Vec<QuizFeedback> = questions
        .iter()
        .map(|question| {
            let correct = lookup
                .get(question.id.as_str())
                .is_some_and(|&answer| answer == question.correct_answer);

            if correct {
                QuizFeedback {
                    question_id: question.id.clone(),
                    correct,
                    correct_answer: None,
                    explanation: None,
                }
            } else {
                QuizFeedback {
                    question_id: question.id.clone(),
                    correct,
                    correct_answer: Some(question.correct_answer),
                    explanation: Some(question.explanation.clone()),
                }
            }
        })
        .collect();

    let correct_count = feedback.iter().filter(|entry| entry.correct).count();
    let total_questions = questions.len();
    let score = if total_questions == 0 {
        0.0
    } else {
        correct_count as f64 / total_questions as f64 * 100.0
    };

    QuizScore {
        score,
        correct_count,
        total_questions,
        feedback,
    }
}
