//! docvox application binary - composition root.
//!
//! Ties the docvox crates into one executable:
//! 1. Load `.env` and the TOML configuration
//! 2. Initialize tracing
//! 3. Build the embedder and the index service
//! 4. Dispatch the subcommand (embed, clear-index, status, ask, chat)

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use docvox_chat::{AnswerGenerator, ConversationMemory, MistralChatModel, RetrievalQa};
use docvox_core::config::DocvoxConfig;
use docvox_core::types::ConversationTurn;
use docvox_index::{DynEmbeddingService, HashedEmbedding, IndexService};
use docvox_session::{ChatLog, ConversationLoop, LoopState, SessionState};
use docvox_voice::{CommandSpeaker, ConsoleRecognizer, ConsoleSpeaker, Listener, SpeechOutput};

use cli::{CliArgs, Command};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

const SOURCE_PREVIEW_CHARS: usize = 300;

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    // A missing .env is normal; the API key may already be in the environment.
    let dotenv = dotenvy::dotenv();

    let config_file = args.resolve_config_path();
    let (mut config, config_error) = match DocvoxConfig::load(&config_file) {
        Ok(config) => (config, None),
        Err(e) => (DocvoxConfig::default(), Some(e)),
    };
    if let Some(ref data_dir) = args.data_dir {
        config.general.data_dir = data_dir.to_string_lossy().into_owned();
    }

    // Tracing. RUST_LOG wins over the flag and the config file.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting docvox v{}", env!("CARGO_PKG_VERSION"));
    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(e) => tracing::debug!(error = %e, "No .env loaded"),
    }
    match config_error {
        None => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
    }

    let embedder = build_embedder(&config);
    let service = Arc::new(IndexService::from_config(&config, embedder)?);
    tracing::debug!(service = ?service, "Index service ready");

    match args.command {
        Command::Embed { documents } => cmd_embed(&service, &documents).await,
        Command::ClearIndex => cmd_clear(&service),
        Command::Status => cmd_status(&config, &config_file, &service),
        Command::Ask { question } => cmd_ask(&config, &service, &question).await,
        Command::Chat { console_voice } => cmd_chat(&config, service, console_voice).await,
    }
}

/// Pick the embedding backend from configuration.
///
/// An empty `index.model_dir` selects the hashed embedder.
fn build_embedder(config: &DocvoxConfig) -> Arc<dyn DynEmbeddingService> {
    if config.index.model_dir.trim().is_empty() {
        tracing::info!(dims = config.index.embedding_dim, "Using hashed embeddings");
        return Arc::new(HashedEmbedding::new(config.index.embedding_dim));
    }

    #[cfg(feature = "onnx")]
    {
        let model_dir = config.resolve_path(&config.index.model_dir);
        match docvox_index::OnnxEmbeddingService::from_directory(
            &model_dir,
            &config.index.embedding_model,
        ) {
            Ok(service) => {
                tracing::info!(
                    model = %config.index.embedding_model,
                    dir = %model_dir.display(),
                    "ONNX embedding model loaded"
                );
                return Arc::new(service);
            }
            Err(e) => {
                tracing::warn!(error = %e, "ONNX embeddings unavailable, falling back to hashed embeddings");
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    tracing::warn!(
        model_dir = %config.index.model_dir,
        "Built without the onnx feature, falling back to hashed embeddings"
    );

    Arc::new(HashedEmbedding::new(config.index.embedding_dim))
}

async fn cmd_embed(service: &IndexService, documents: &[PathBuf]) -> AppResult<()> {
    let mut session = SessionState::new(service.index_exists());

    service.clear_index()?;
    let staged = service.stage_documents(documents)?;
    match service.build_index(&staged).await {
        Ok(report) => {
            session.index_rebuilt(true);
            println!(
                "Embedded {} document(s): {} page(s), {} chunk(s).",
                report.documents, report.pages, report.chunks
            );
            println!("{}", session.status_message());
            Ok(())
        }
        Err(e) => {
            session.index_rebuilt(false);
            eprintln!("{}", session.status_message());
            Err(e.into())
        }
    }
}

fn cmd_clear(service: &IndexService) -> AppResult<()> {
    service.clear_index()?;
    let mut session = SessionState::new(false);
    session.index_cleared();
    println!("Index cleared. {}", session.status_message());
    Ok(())
}

fn cmd_status(
    config: &DocvoxConfig,
    config_file: &std::path::Path,
    service: &IndexService,
) -> AppResult<()> {
    let session = SessionState::new(service.index_exists());
    println!("Config file: {}", config_file.display());
    println!(
        "Index:       {} ({})",
        service.index_dir().display(),
        if session.index_ready() { "ready" } else { "missing" }
    );
    println!("Uploads:     {}", config.upload_dir().display());
    println!("Chat log:    {}", config.log_path().display());
    println!("Model:       {} @ {}", config.llm.model, config.llm.base_url);
    println!("Stop words:  {}", config.speech.stop_phrases.join(", "));
    println!("{}", session.status_message());
    Ok(())
}

async fn cmd_ask(config: &DocvoxConfig, service: &IndexService, question: &str) -> AppResult<()> {
    let retriever = service.load_index()?;
    let model = MistralChatModel::from_config(&config.llm)?;
    let chain = RetrievalQa::new(Arc::new(model));
    let mut memory = ConversationMemory::new();

    let generated = chain.generate(question, &mut memory, &retriever).await?;
    println!("{}", generated.answer);
    for source in &generated.sources {
        println!();
        println!("Source: {}", source);
        println!("{}", source.preview(SOURCE_PREVIEW_CHARS));
    }
    Ok(())
}

async fn cmd_chat(
    config: &DocvoxConfig,
    service: Arc<IndexService>,
    console_voice: bool,
) -> AppResult<()> {
    let recognizer = Arc::new(ConsoleRecognizer::stdin()?);
    let listener = Listener::from_config(recognizer.clone(), &config.speech);
    let speaker: Arc<dyn SpeechOutput> = if console_voice {
        Arc::new(ConsoleSpeaker::new())
    } else {
        Arc::new(CommandSpeaker::from_config(&config.speech))
    };
    let model = MistralChatModel::from_config(&config.llm)?;

    let conversation = ConversationLoop::new(
        listener,
        speaker,
        Arc::new(RetrievalQa::new(Arc::new(model))),
        service.clone(),
        ChatLog::new(config.log_path()),
    )
    .with_max_error_chars(config.session.max_error_chars);

    let mut session = SessionState::new(service.index_exists());
    if let Err(e) = session.start_listening() {
        eprintln!("{}", session.status_message());
        return Err(e.into());
    }
    println!("{}", session.status_message());
    println!(
        "Type a question per line. Say one of [{}] to stop.",
        config.speech.stop_phrases.join(", ")
    );

    let mut shown_turns = 0;
    let mut last_status = session.status_message().to_string();
    let mut last_warning: Option<String> = None;
    loop {
        if recognizer.is_closed() && session.listening_active() && session.pending_query().is_none()
        {
            session.stop_listening();
        }

        let report = tokio::select! {
            report = conversation.step(&mut session) => report,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        };

        if session.status_message() != last_status {
            last_status = session.status_message().to_string();
            println!("[{}] {}", report.to, last_status);
        }
        for turn in session.history().iter().skip(shown_turns) {
            print_turn(turn);
        }
        shown_turns = session.history().len();
        if let Some(warning) = session.last_warning() {
            if last_warning.as_deref() != Some(warning) {
                eprintln!("warning: {}", warning);
                last_warning = Some(warning.to_string());
            }
        }

        if report.to == LoopState::Idle {
            break;
        }
    }

    println!(
        "Conversation ended after {} turn(s). Log: {}",
        session.history().len(),
        conversation.log().path().display()
    );
    Ok(())
}

fn print_turn(turn: &ConversationTurn) {
    println!("Q: {}", turn.question);
    println!("A: {}", turn.answer);
    for source in &turn.sources {
        println!("   - {}", source);
    }
}
