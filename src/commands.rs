use console::style;
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::context::StudyContext;
use crate::database::{Database, Document, VectorStore};
use crate::ingestion::IngestionPipeline;
use crate::ollama::OllamaClient;
use crate::quiz::{QuizConfig, QuizService, QuizView, UserAnswer};
use crate::rag::ChatService;
use crate::summary::{SummaryOptions, Summarizer};
use crate::{Result, StudyError};

/// Read a file from disk and ingest it for `user_id`
#[inline]
pub async fn upload_document(context: &StudyContext, user_id: &str, path: &Path) -> Result<()> {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| StudyError::Validation(format!("not a file: {}", path.display())))?;

    let bytes = tokio::fs::read(path).await?;
    info!("Uploading {} ({} bytes)", path.display(), bytes.len());

    let report = IngestionPipeline::new(context.clone())
        .ingest(user_id, &filename, bytes)
        .await?;

    println!(
        "{} {} (ID: {})",
        style("✓ Uploaded").green(),
        report.document.filename,
        style(&report.document.id).cyan()
    );
    println!("  Status: {}", report.document.status);
    println!(
        "  Chunks: {} stored of {}",
        report.chunks_stored, report.chunks_total
    );
    if report.chunks_skipped > 0 {
        println!(
            "  {} {} chunk(s) skipped because embedding failed",
            style("⚠").yellow(),
            report.chunks_skipped
        );
    }

    Ok(())
}

/// List a user's documents, or show one in detail
#[inline]
pub async fn show_documents(
    context: &StudyContext,
    user_id: &str,
    document_id: Option<&str>,
) -> Result<()> {
    let pipeline = IngestionPipeline::new(context.clone());

    if let Some(document_id) = document_id {
        let document = pipeline.get_document(user_id, document_id).await?;
        print_document(&document);
        if let Some(summary) = &document.summary {
            println!();
            println!("{}", style("Summary:").bold());
            println!("{summary}");
        }
        return Ok(());
    }

    let documents = pipeline.list_documents(user_id).await?;
    if documents.is_empty() {
        println!("No documents have been uploaded yet.");
        println!("Use 'study-helper upload <file>' to add one.");
        return Ok(());
    }

    println!("Documents ({} total):", documents.len());
    println!();
    for document in &documents {
        print_document(document);
        println!();
    }

    Ok(())
}

fn print_document(document: &Document) {
    println!(
        "📄 {} (ID: {})",
        style(&document.filename).bold(),
        style(&document.id).cyan()
    );
    println!("   Status: {}", document.status);
    println!("   Chunks: {}", document.chunk_count);
    println!(
        "   Uploaded: {}",
        document.upload_date.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(generated_at) = document.summary_generated_at {
        println!(
            "   Summarized: {}",
            generated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    if let Some(error) = &document.error_message {
        println!("   {} Error: {}", style("⚠").yellow(), error);
    }
}

#[inline]
pub async fn reprocess_document(context: &StudyContext, user_id: &str, document_id: &str) -> Result<()> {
    let report = IngestionPipeline::new(context.clone())
        .reprocess(user_id, document_id)
        .await?;

    println!(
        "{} {}: {} of {} chunks stored",
        style("✓ Reprocessed").green(),
        report.document.id,
        report.chunks_stored,
        report.chunks_total
    );
    Ok(())
}

#[inline]
pub async fn summarize_document(
    context: &StudyContext,
    user_id: &str,
    document_id: &str,
    options: SummaryOptions,
) -> Result<()> {
    let summary = Summarizer::new(context.clone())
        .summarize(user_id, document_id, options)
        .await?;

    println!("{}", style("Summary").bold().cyan());
    println!();
    println!("{}", summary.summary);
    Ok(())
}

#[inline]
pub async fn generate_quiz(
    context: &StudyContext,
    user_id: &str,
    document_id: &str,
    config: &QuizConfig,
) -> Result<()> {
    let quiz = QuizService::new(context.clone())
        .generate(user_id, document_id, config)
        .await?;

    println!(
        "{} quiz {} with {} questions",
        style("✓ Generated").green(),
        style(&quiz.id).cyan(),
        quiz.total_questions
    );
    println!();
    print_quiz(&quiz);
    println!(
        "Submit with 'study-helper quiz submit {} --answer <question>=<option>'",
        quiz.id
    );
    Ok(())
}

#[inline]
pub async fn show_quiz(context: &StudyContext, user_id: &str, quiz_id: &str) -> Result<()> {
    let quiz = QuizService::new(context.clone()).get(user_id, quiz_id).await?;
    print_quiz(&quiz);
    Ok(())
}

fn print_quiz(quiz: &QuizView) {
    println!(
        "Quiz {} for document {} ({})",
        style(&quiz.id).cyan(),
        quiz.document_id,
        quiz.status
    );
    if let Some(score) = quiz.score {
        println!("Score: {}", style(format!("{score:.1}%")).bold());
    }
    println!();

    for question in &quiz.questions {
        println!("{}. {}", style(&question.id).bold(), question.question);
        for (index, option) in question.options.iter().enumerate() {
            let marker = if question.correct_answer == i64::try_from(index).ok() {
                style("✓").green().to_string()
            } else {
                " ".to_string()
            };
            println!("   {marker} [{index}] {option}");
        }
        if let Some(explanation) = question.explanation.as_deref().filter(|e| !e.is_empty()) {
            println!("     {}", style(explanation).dim());
        }
        println!();
    }
}

#[inline]
pub async fn submit_quiz(
    context: &StudyContext,
    user_id: &str,
    quiz_id: &str,
    answers: &[UserAnswer],
) -> Result<()> {
    let submission = QuizService::new(context.clone())
        .submit(user_id, quiz_id, answers)
        .await?;

    println!(
        "Score: {} ({}/{} correct)",
        style(format!("{:.1}%", submission.score)).bold(),
        submission.correct_count,
        submission.total_questions
    );
    println!();

    for entry in &submission.feedback {
        if entry.correct {
            println!("  {} {}", style("✓").green(), entry.question_id);
            continue;
        }

        let answer = entry
            .correct_answer
            .map_or_else(|| "?".to_string(), |index| index.to_string());
        println!(
            "  {} {} (correct option: {})",
            style("✗").red(),
            entry.question_id,
            answer
        );
        if let Some(explanation) = entry.explanation.as_deref().filter(|e| !e.is_empty()) {
            println!("      {}", style(explanation).dim());
        }
    }

    Ok(())
}

#[inline]
pub async fn list_quizzes(
    context: &StudyContext,
    user_id: &str,
    document_id: Option<&str>,
) -> Result<()> {
    let quizzes = QuizService::new(context.clone())
        .list(user_id, document_id)
        .await?;

    if quizzes.is_empty() {
        println!("No quizzes yet.");
        return Ok(());
    }

    for quiz in &quizzes {
        let score = quiz
            .score
            .map_or_else(|| "-".to_string(), |score| format!("{score:.1}%"));
        println!(
            "📝 {} document {} ({}, {} questions, score {}) {}",
            style(&quiz.id).cyan(),
            quiz.document_id,
            quiz.status,
            quiz.total_questions,
            score,
            quiz.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

/// Parse `<question_id>=<option>` as given on the command line
#[inline]
pub fn parse_answer(value: &str) -> std::result::Result<UserAnswer, String> {
    let (question_id, answer) = value
        .split_once('=')
        .ok_or_else(|| format!("expected <question>=<option>, got '{value}'"))?;

    let question_id = question_id.trim();
    if question_id.is_empty() {
        return Err(format!("missing question id in '{value}'"));
    }

    let answer = answer
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid option index in '{value}': {e}"))?;

    Ok(UserAnswer {
        question_id: question_id.to_string(),
        answer,
    })
}

/// Load answers from a JSON array of `{"question_id": ..., "answer": ...}`
#[inline]
pub async fn read_answers_file(path: &Path) -> Result<Vec<UserAnswer>> {
    let content = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&content).map_err(|e| {
        StudyError::Validation(format!("invalid answers file {}: {e}", path.display()))
    })
}

#[inline]
pub async fn ask_question(context: &StudyContext, user_id: &str, question: &str) -> Result<()> {
    let answer = ChatService::new(context.clone())
        .ask(user_id, question)
        .await?;

    println!("{}", answer.answer);

    if !answer.sources.is_empty() {
        println!();
        println!("{}", style("Sources:").dim());
        for source in &answer.sources {
            println!(
                "{}",
                style(format!(
                    "  document {} chunk {} (distance {:.3})",
                    source.document_id, source.chunk_index, source.distance
                ))
                .dim()
            );
        }
    }

    Ok(())
}

#[inline]
pub async fn show_history(context: &StudyContext, user_id: &str, limit: usize) -> Result<()> {
    let messages = ChatService::new(context.clone())
        .history(user_id, limit)
        .await?;

    if messages.is_empty() {
        println!("No questions asked yet.");
        return Ok(());
    }

    for message in &messages {
        println!(
            "{} {}",
            style(message.created_at.format("%Y-%m-%d %H:%M:%S")).dim(),
            style(&message.question).bold()
        );
        println!("{}", message.answer);
        println!(
            "{}",
            style(format!("({} sources)", message.sources().len())).dim()
        );
        println!();
    }

    Ok(())
}

/// Report store counts for a user and the health of each collaborator
#[inline]
pub async fn show_status(config: &Config, user_id: &str) -> Result<()> {
    println!("📊 Study Helper Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🗄️  Database Status:");
    let database = match Database::initialize_from_config_dir(config.get_base_dir()).await {
        Ok(database) => {
            println!("   ✅ SQLite: Connected");
            Some(database)
        }
        Err(e) => {
            println!("   ❌ SQLite: Failed to connect - {e:#}");
            None
        }
    };

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Embedding model: {}", config.ollama.embedding_model);
                println!("   📋 Generation model: {}", config.ollama.generation_model);
            }
            Err(e) => println!("   ⚠️  Ollama: Unhealthy - {e:#}"),
        },
        Err(e) => println!("   ❌ Ollama: Invalid configuration - {e:#}"),
    }

    println!("🔍 Vector Database Status:");
    let vectors = match VectorStore::new(config).await {
        Ok(store) => {
            println!(
                "   ✅ LanceDB: Connected ({} dimensions)",
                config.ollama.embedding_dimension
            );
            match store.count_embeddings().await {
                Ok(count) => Some(count),
                Err(e) => {
                    warn!("Could not count embeddings: {}", e);
                    None
                }
            }
        }
        Err(e) => {
            println!("   ❌ LanceDB: Failed to open - {e}");
            None
        }
    };

    if let Some(database) = database {
        let statistics = database
            .statistics(user_id)
            .await
            .map_err(StudyError::database)?;

        println!();
        println!("📚 Study Material for {}:", style(user_id).cyan());
        println!(
            "   📄 Documents: {} ({} processed)",
            statistics.documents, statistics.processed_documents
        );
        println!("   🧩 Chunks: {}", statistics.chunks);
        println!(
            "   📝 Quizzes: {} ({} submitted)",
            statistics.quizzes, statistics.submitted_quizzes
        );
        println!("   💬 Chat messages: {}", statistics.chat_messages);
    }

    if let Some(vectors) = vectors {
        println!("   🔢 Vectors (all users): {vectors}");
    }

    Ok(())
}

/// Compact both stores
#[inline]
pub async fn optimize_stores(config: &Config) -> Result<()> {
    let database = Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .map_err(StudyError::database)?;
    database.optimize().await.map_err(StudyError::database)?;
    println!("{}", style("✓ SQLite optimized").green());

    VectorStore::new(config).await?.optimize().await?;
    println!("{}", style("✓ Vector store optimized").green());

    Ok(())
}
