//! vecsync entry point.
//!
//! `vecsync chat` connects to the configured vector store and runs an
//! interactive loop. Type `exit` or press Ctrl+D to quit.
//!
//! # Streaming
//! Each answer is printed fragment by fragment as the assistant writes it;
//! citation markers are already rewritten to `[n]` and the list of cited
//! files follows the answer.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;

use vecsync_chat::{
    assistant_api::{AssistantApi, OpenAiClient},
    config::{load_config, settings_path_from_env, Config},
    error::ChatError,
    session::ChatClient,
    settings::Settings,
    store, ui,
};

#[derive(Debug, Parser)]
#[command(name = "vecsync", about = "Chat with the documents in your vector store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Chat with the assistant.
    Chat {
        /// Force the assistant to create a new thread.
        #[arg(short = 'n', long)]
        new_conversation: bool,
        /// Render answers as markdown, with the conversation history first.
        #[arg(short = 'm', long)]
        markdown: bool,
        /// Name of the vector store.
        #[arg(short = 's', long)]
        store_name: Option<String>,
    },
    /// Commands to manage the vector store.
    Store {
        #[command(subcommand)]
        command: StoreCommand,
    },
    /// Commands to manage application settings.
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Debug, Subcommand)]
enum StoreCommand {
    /// List files in the remote vector store.
    List {
        #[arg(short = 's', long)]
        store_name: Option<String>,
    },
    /// Delete all files in the remote vector store.
    Delete {
        #[arg(short = 's', long)]
        store_name: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum SettingsCommand {
    /// Clear the settings file.
    Clear,
}

#[tokio::main]
async fn main() {
    // Default level WARN keeps the chat output clean; override with RUST_LOG.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        eprintln!("❌ Error: {}", e);
        if matches!(e, ChatError::Config(_)) {
            eprintln!("Please check your .env file: OPENAI_API_KEY is required.");
        }
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<(), ChatError> {
    match command {
        Command::Settings {
            command: SettingsCommand::Clear,
        } => {
            let _ = dotenvy::dotenv();
            let settings = Settings::new(settings_path_from_env());
            settings.clear()?;
            println!("🧹 Settings cleared: {}", settings.path().display());
            Ok(())
        }
        Command::Store { command } => match command {
            StoreCommand::List { store_name } => {
                let config = config_for(store_name)?;
                let api = OpenAiClient::new(&config);
                let files = store::list_files(&api, &config.store_name).await?;
                println!("Files in store {}:", config.store_name);
                for file in files {
                    println!(" - {}", file.name);
                }
                Ok(())
            }
            StoreCommand::Delete { store_name } => {
                let config = config_for(store_name)?;
                let api = OpenAiClient::new(&config);
                let deleted = store::delete_all_files(&api, &config.store_name).await?;
                println!("🗑️ Deleted {} file(s) from store {}", deleted, config.store_name);
                Ok(())
            }
        },
        Command::Chat {
            new_conversation,
            markdown,
            store_name,
        } => chat(config_for(store_name)?, new_conversation, markdown).await,
    }
}

fn config_for(store_name: Option<String>) -> Result<Config, ChatError> {
    let config = load_config()?;
    Ok(match store_name {
        Some(name) => config.with_store_name(name),
        None => config,
    })
}

async fn chat(config: Config, new_conversation: bool, markdown: bool) -> Result<(), ChatError> {
    let api: Arc<dyn AssistantApi> = Arc::new(OpenAiClient::new(&config));
    let mut client = ChatClient::new(config, api, new_conversation);

    let connection = client.connect().await?;
    println!(
        "✅ Connected to store {} ({} files)",
        connection.store.name.as_deref().unwrap_or(&connection.store.id),
        connection.files.len()
    );
    println!("💬 Conversation: {}", connection.thread_id);

    if markdown {
        let history = client.load_history().await?;
        if !history.is_empty() {
            println!("\n{}", ui::render_history(&history));
        }
    }

    println!("Type \"exit\" to quit at any time.");

    let stdin = io::stdin();
    loop {
        print!("\n> ");
        io::stdout().flush().unwrap_or_default();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input.eq_ignore_ascii_case("exit") {
                    break;
                }

                let result = if markdown {
                    markdown_turn(&mut client, input).await
                } else {
                    client
                        .console_prompt(input, &mut io::stdout())
                        .await
                        .map(|_| ())
                };

                match result {
                    Ok(()) => println!(),
                    Err(ChatError::InputValidation(msg)) => eprintln!("⚠️  {}", msg),
                    Err(e) => eprintln!("\n❌ Error: {}", e),
                }
            }
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }
    }

    println!("\n👋 Goodbye!");
    Ok(())
}

/// Print only what each cumulative snapshot adds.
async fn markdown_turn(client: &mut ChatClient, input: &str) -> Result<(), ChatError> {
    let snapshots = client.ui_prompt(input).await?;
    let mut snapshots = std::pin::pin!(snapshots);

    let mut stdout = io::stdout();
    let mut shown = 0;
    while let Some(snapshot) = snapshots.next().await {
        stdout.write_all(ui::unseen_suffix(&snapshot, shown).as_bytes())?;
        stdout.flush()?;
        shown = snapshot.len();
    }
    Ok(())
}
