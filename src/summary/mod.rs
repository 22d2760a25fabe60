// Summary module
// Length and style options and the document summarizer


use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::StudyContext;
use crate::generation::GenerationError;
use crate::generation::prompt::{summary_prompt, truncate_chars};
use crate::{Result, StudyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl SummaryLength {
    /// Target length phrase used in the prompt
    #[inline]
    pub fn word_range(self) -> &'static str {
        match self {
            SummaryLength::Short => "100-150 words",
            SummaryLength::Medium => "200-300 words",
            SummaryLength::Long => "400-500 words",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStyle {
    #[default]
    Paragraph,
    BulletPoints,
    KeyPoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SummaryOptions {
    pub length: SummaryLength,
    pub style: SummaryStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub summary: String,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct Summarizer {
    context: StudyContext,
}

impl Summarizer {
    #[inline]
    pub fn new(context: StudyContext) -> Self {
        Self { context }
    }

    /// Summarize a processed document and store the result on it
    #[inline]
    pub async fn summarize(
        &self,
        user_id: &str,
        document_id: &str,
        options: SummaryOptions,
    ) -> Result<DocumentSummary> {
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

        if text.trim().is_empty() {
            return Err(StudyError::Validation(format!(
                "document {document_id} has no text to summarize"
            )));
        }

        let text = truncate_chars(&text, self.context.config.summary.max_prompt_chars);
        debug!(
            "Summarizing {} characters as {:?} / {:?}",
            text.chars().count(),
            options.length,
            options.style
        );

        let summary = self
            .context
            .generate(summary_prompt(&text, &options))
            .await?
            .trim()
            .to_string();

        if summary.is_empty() {
            return Err(GenerationError::EmptyResponse.into());
        }

        let generated_at = database
            .update_document_summary(document_id, &summary)
            .await
            .map_err(StudyError::database)?;

        info!("Stored summary for document {}", document_id);

        Ok(DocumentSummary {
            document_id: document.id,
            summary,
            generated_at,
        })
    }
}
