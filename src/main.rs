use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use study_helper::commands::{
    ask_question, generate_quiz, list_quizzes, optimize_stores, parse_answer, read_answers_file,
    reprocess_document, show_documents, show_history, show_quiz, show_status, submit_quiz,
    summarize_document, upload_document,
};
use study_helper::config::{Config, run_interactive_config, show_config};
use study_helper::context::StudyContext;
use study_helper::quiz::QuizConfig;
use study_helper::summary::{SummaryLength, SummaryOptions, SummaryStyle};
use study_helper::{Result, StudyError};

#[derive(Parser)]
#[command(name = "study-helper")]
#[command(about = "Upload study material, ask questions about it, and quiz yourself")]
#[command(version)]
struct Cli {
    /// User the command acts for
    #[arg(long, global = true, env = "STUDY_HELPER_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Upload a PDF, text or Markdown file and index it
    Upload {
        /// Path of the file to upload
        file: PathBuf,
    },
    /// List documents, or show one by ID
    Documents {
        /// Document ID to show
        id: Option<String>,
    },
    /// Re-run chunking and embedding from the stored document text
    Reprocess {
        /// Document ID
        id: String,
    },
    /// Summarize a processed document
    Summarize {
        /// Document ID
        id: String,
        #[arg(long, value_enum, default_value_t = SummaryLength::Medium)]
        length: SummaryLength,
        #[arg(long, value_enum, default_value_t = SummaryStyle::Paragraph)]
        style: SummaryStyle,
    },
    /// Generate, take and review quizzes
    #[command(subcommand)]
    Quiz(QuizCommands),
    /// Ask a question about your documents
    Ask {
        /// The question
        question: String,
    },
    /// Show recent questions and answers
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show store counts and service health
    Status,
    /// Compact the metadata database and the vector store
    Optimize,
}

#[derive(Subcommand)]
enum QuizCommands {
    /// Generate a quiz from a processed document
    Generate {
        /// Document ID
        document: String,
        /// Number of questions (defaults to the configured value)
        #[arg(long)]
        questions: Option<u32>,
        /// Difficulty, e.g. easy, medium or hard
        #[arg(long)]
        difficulty: Option<String>,
    },
    /// Show a quiz; answers stay hidden until it is submitted
    Show {
        /// Quiz ID
        quiz: String,
    },
    /// Submit answers to a quiz (only once)
    Submit(SubmitArgs),
    /// List quizzes
    List {
        /// Only quizzes for this document
        #[arg(long)]
        document: Option<String>,
    },
}

#[derive(Args)]
struct SubmitArgs {
    /// Quiz ID
    quiz: String,
    /// An answer as <question>=<option>, may be repeated
    #[arg(long = "answer", value_parser = parse_answer, conflicts_with = "file")]
    answers: Vec<study_helper::quiz::UserAnswer>,
    /// JSON file holding an array of {"question_id", "answer"} objects
    #[arg(long)]
    file: Option<PathBuf>,
}

fn require_user(user: Option<String>) -> Result<String> {
    user.map(|user| user.trim().to_string())
        .filter(|user| !user.is_empty())
        .ok_or_else(|| {
            StudyError::Validation(
                "a user is required: pass --user or set STUDY_HELPER_USER".to_string(),
            )
        })
}

async fn build_context(config: Config) -> Result<StudyContext> {
    StudyContext::initialize(config).await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Commands::Config { show } = cli.command {
        if show {
            show_config()?;
        } else {
            run_interactive_config()?;
        }
        return Ok(());
    }

    let user = require_user(cli.user)?;
    let config = Config::load_default().map_err(|e| StudyError::Config(format!("{e:#}")))?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Status => {
            show_status(&config, &user).await?;
        }
        Commands::Optimize => {
            optimize_stores(&config).await?;
        }
        Commands::Upload { file } => {
            let context = build_context(config).await?;
            upload_document(&context, &user, &file).await?;
        }
        Commands::Documents { id } => {
            let context = build_context(config).await?;
            show_documents(&context, &user, id.as_deref()).await?;
        }
        Commands::Reprocess { id } => {
            let context = build_context(config).await?;
            reprocess_document(&context, &user, &id).await?;
        }
        Commands::Summarize { id, length, style } => {
            let context = build_context(config).await?;
            summarize_document(&context, &user, &id, SummaryOptions { length, style }).await?;
        }
        Commands::Quiz(command) => {
            let context = build_context(config).await?;
            match command {
                QuizCommands::Generate {
                    document,
                    questions,
                    difficulty,
                } => {
                    let quiz_config = QuizConfig {
                        num_questions: questions.unwrap_or_default(),
                        difficulty: difficulty.unwrap_or_default(),
                    };
                    generate_quiz(&context, &user, &document, &quiz_config).await?;
                }
                QuizCommands::Show { quiz } => {
                    show_quiz(&context, &user, &quiz).await?;
                }
                QuizCommands::Submit(args) => {
                    let answers = match &args.file {
                        Some(path) => read_answers_file(path).await?,
                        None => args.answers,
                    };
                    submit_quiz(&context, &user, &args.quiz, &answers).await?;
                }
                QuizCommands::List { document } => {
                    list_quizzes(&context, &user, document.as_deref()).await?;
                }
            }
        }
        Commands::Ask { question } => {
            let context = build_context(config).await?;
            ask_question(&context, &user, &question).await?;
        }
        Commands::History { limit } => {
            let context = build_context(config).await?;
            show_history(&context, &user, limit).await?;
        }
    }

    Ok(())
}
