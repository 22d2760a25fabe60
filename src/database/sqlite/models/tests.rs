use chrono::Utc;

use super::*;

#[test]
fn document_status_display() {
    assert_eq!(DocumentStatus::Uploaded.to_string(), "uploaded");
    assert_eq!(DocumentStatus::Processed.to_string(), "processed");
    assert_eq!(DocumentStatus::Failed.to_string(), "failed");
}

#[test]
fn quiz_status_display() {
    assert_eq!(QuizStatus::Generated.to_string(), "generated");
    assert_eq!(QuizStatus::InProgress.to_string(), "in_progress");
    assert_eq!(QuizStatus::Submitted.to_string(), "submitted");
}

#[test]
fn quiz_status_serializes_like_the_column() {
    let json = serde_json::to_string(&QuizStatus::InProgress).expect("status should serialize");
    assert_eq!(json, "\"in_progress\"");
}

#[test]
fn document_state_helpers() {
    let mut document = Document {
        id: "doc-1".to_string(),
        user_id: "user-1".to_string(),
        filename: "notes.pdf".to_string(),
        status: DocumentStatus::Uploaded,
        summary: None,
        summary_generated_at: None,
        chunk_count: 0,
        error_message: None,
        upload_date: Utc::now().naive_utc(),
    };

    assert!(!document.is_processed());
    assert!(!document.is_failed());

    document.status = DocumentStatus::Processed;
    assert!(document.is_processed());

    document.status = DocumentStatus::Failed;
    assert!(document.is_failed());
}

#[test]
fn chat_message_without_sources() {
    let message = ChatMessage {
        id: "msg-1".to_string(),
        user_id: "user-1".to_string(),
        question: "What is ATP?".to_string(),
        answer: "An energy carrier.".to_string(),
        sources: None,
        created_at: Utc::now().naive_utc(),
    };

    assert!(message.sources().is_empty());
}
