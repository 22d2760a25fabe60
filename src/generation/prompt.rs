use std::borrow::Cow;

use crate::summary::{SummaryOptions, SummaryStyle};

/// Delimiter placed between retrieved chunks in an assembled context
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

const TRUNCATION_MARKER: &str = "...";

/// Cut `text` to at most `max_chars` code points, appending `...` when anything was dropped.
/// The cut is positional and may land mid-sentence.
#[inline]
pub fn truncate_chars(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => {
            let mut truncated = String::with_capacity(byte_index + TRUNCATION_MARKER.len());
            truncated.push_str(text.get(..byte_index).unwrap_or(text));
            truncated.push_str(TRUNCATION_MARKER);
            Cow::Owned(truncated)
        }
        None => Cow::Borrowed(text),
    }
}

/// Prompt that restricts the model to the supplied study material
#[inline]
pub fn grounded_answer_prompt(question: &str, context: &str) -> String {
    let context = if context.trim().is_empty() {
        "(no study material matched this question)"
    } else {
        context
    };

    format!(
        r#"You are a helpful study assistant. Use ONLY the context below (do not hallucinate).
If the context does not contain the answer, say that the uploaded material does not cover it.

Context:

{context}

Question: {question}

Answer concisely. If sources are relevant, mention them."#
    )
}

#[inline]
pub fn quiz_prompt(text: &str, num_questions: u32, difficulty: &str) -> String {
    format!(
        r#"You are a quiz generator. Generate {num_questions} multiple-choice questions from the following text.

Difficulty: {difficulty}

Text:
{text}

Return ONLY a valid JSON array of questions with this exact structure:
[
  {{
    "id": "q1",
    "question": "Question text here?",
    "options": ["Option A", "Option B", "Option C", "Option D"],
    "correct_answer": 0,
    "explanation": "Brief explanation of why this is correct"
  }}
]

Requirements:
- Each question must have exactly 4 options
- correct_answer is the index (0-3) of the correct option
- Questions should test understanding, not just memorization
- Return ONLY the JSON array, no other text"#
    )
}

#[inline]
pub fn summary_prompt(text: &str, options: &SummaryOptions) -> String {
    let target_length = options.length.word_range();

    match options.style {
        SummaryStyle::BulletPoints => format!(
            "Summarize the following document as bullet points. Length: {target_length}\n\n\
             Document:\n{text}\n\n\
             Format: Return key points as bullet points (•)."
        ),
        SummaryStyle::KeyPoints => format!(
            "Summarize the following document by extracting the key points. Length: {target_length}\n\n\
             Document:\n{text}\n\n\
             Format: List the main key points in a clear, organized manner."
        ),
        SummaryStyle::Paragraph => format!(
            "Summarize the following document in a clear, concise paragraph. Length: {target_length}\n\n\
             Document:\n{text}\n\n\
             Format: Write a comprehensive summary in paragraph form."
        ),
    }
}
