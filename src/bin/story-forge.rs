//! Story Forge CLI
//!
//! Generates stories with the stored settings, streaming the text to stdout
//! as it arrives.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use story_forge::{
    telemetry::default_log_dir, CredentialCheck, ProviderConfig, SettingKey, SettingsStore,
    StoryClient, Telemetry,
};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "story-forge")]
#[command(about = "Story Forge - generate stories with a hosted language model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API key - overrides the settings file and OPENROUTER_API_KEY
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Model to use - overrides the settings file
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Base URL for a custom OpenAI-compatible endpoint
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Settings file (default: STORY_FORGE_SETTINGS or <config dir>/story-forge/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log directory (default: <data dir>/story-forge/logs)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Do not write log files
    #[arg(long, global = true)]
    no_log: bool,

    /// Verbose logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a story
    Generate {
        /// Story prompt; read from stdin when omitted
        prompt: Option<String>,

        /// System instructions for this run only
        #[arg(short, long)]
        instructions: Option<String>,

        /// Wait for the complete story instead of streaming it
        #[arg(long)]
        no_stream: bool,

        /// Emit JSON (one event per line when streaming)
        #[arg(long)]
        json: bool,
    },

    /// Check that the API key is accepted by the provider
    Verify {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List models offered by the provider
    Models {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or change stored settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the stored settings (API key masked)
    Show,

    /// Store one setting (apiKey, selectedModel, systemInstructions)
    Set { key: SettingKey, value: String },

    /// Remove the stored API key
    ClearKey,

    /// Print the settings file location
    Path,
}

fn settings_store(cli: &Cli) -> Result<SettingsStore> {
    // 1. --settings <path> flag
    if let Some(path) = &cli.settings {
        return Ok(SettingsStore::open(path));
    }
    // 2. STORY_FORGE_SETTINGS env var
    if let Ok(path) = std::env::var("STORY_FORGE_SETTINGS") {
        return Ok(SettingsStore::open(path));
    }
    // 3. Platform config dir
    SettingsStore::open_default().context("set --settings or STORY_FORGE_SETTINGS")
}

fn provider_config(cli: &Cli) -> ProviderConfig {
    match &cli.base_url {
        Some(base_url) => ProviderConfig::openrouter().with_base_url(base_url),
        None => ProviderConfig::openrouter(),
    }
}

fn read_prompt(prompt: Option<String>) -> Result<String> {
    let prompt = match prompt {
        Some(p) => p,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read prompt from stdin")?;
            buf
        }
    };

    let prompt = prompt.trim().to_string();
    if prompt.is_empty() {
        anyhow::bail!("no prompt provided (pass it as an argument or on stdin)");
    }
    Ok(prompt)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let _telemetry = if cli.no_log {
        Telemetry::disabled()
    } else {
        let log_dir = cli.log_dir.clone().unwrap_or_else(default_log_dir);
        Telemetry::init(log_dir, cli.verbose).unwrap_or_else(|e| {
            eprintln!("Warning: logging disabled: {:#}", e);
            Telemetry::disabled()
        })
    };

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let store = settings_store(&cli)?;

    match cli.command {
        Commands::Generate {
            ref prompt,
            ref instructions,
            no_stream,
            json,
        } => {
            let settings = store.load()?;
            let provider = provider_config(&cli);
            let credential = settings.resolve_credential(cli.api_key.as_deref(), &provider.api_key_env);

            let mut request = settings.to_request(read_prompt(prompt.clone())?);
            if let Some(model) = &cli.model {
                request = request.with_model(model.as_str());
            }
            if let Some(instructions) = instructions {
                request = request.with_instructions(instructions.as_str());
            }

            let client = StoryClient::new(provider)?;

            if json {
                let result = if no_stream {
                    let result = client.generate_once(&request, &credential).await;
                    let line = match &result {
                        Ok(story) => serde_json::json!({ "success": true, "story": story }),
                        Err(e) => serde_json::json!({
                            "success": false,
                            "error": e.to_string(),
                            "statusCode": e.status_code(),
                        }),
                    };
                    println!("{}", line);
                    result
                } else {
                    let (tx, mut rx) = mpsc::unbounded_channel::<story_forge::StoryEvent>();
                    let printer = async {
                        while let Some(event) = rx.recv().await {
                            println!("{}", serde_json::to_string(&event)?);
                            if event.is_terminal() {
                                break;
                            }
                        }
                        Ok::<_, serde_json::Error>(())
                    };
                    let (result, printed) = tokio::join!(
                        client.generate_with_events(&request, &credential, tx),
                        printer
                    );
                    printed?;
                    result
                };
                return Ok(if result.is_ok() {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                });
            }

            if no_stream {
                let story = client.generate_once(&request, &credential).await?;
                println!("{}", story);
                return Ok(ExitCode::SUCCESS);
            }

            let mut printed = 0usize;
            let result = client
                .generate_streaming(&request, &credential, |text: &str| {
                    let mut out = std::io::stdout().lock();
                    let _ = write!(out, "{}", &text[printed..]);
                    let _ = out.flush();
                    printed = text.len();
                })
                .await;

            if printed > 0 {
                println!();
            }
            result?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Verify { json } => {
            let settings = store.load()?;
            let provider = provider_config(&cli);
            let credential = settings.resolve_credential(cli.api_key.as_deref(), &provider.api_key_env);

            let check = StoryClient::new(provider)?
                .verify_credential(&credential)
                .await;

            if json {
                println!("{}", check.to_json());
            } else {
                match &check {
                    CredentialCheck::Valid => println!("API key is valid"),
                    CredentialCheck::Invalid { error, .. } => {
                        eprintln!("API key is invalid: {}", error)
                    }
                }
            }

            Ok(if check.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Commands::Models { json } => {
            let settings = store.load()?;
            let provider = provider_config(&cli);
            let credential = settings.resolve_credential(cli.api_key.as_deref(), &provider.api_key_env);

            let models = StoryClient::new(provider)?.list_models(&credential).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&models)?);
            } else {
                for model in &models {
                    match &model.name {
                        Some(name) => println!("{}\t{}", model.id, name),
                        None => println!("{}", model.id),
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Config { ref command } => {
            match command {
                ConfigCommands::Show => {
                    let settings = store.load()?;
                    println!("settings: {}", store.path().display());
                    println!(
                        "{}: {}",
                        SettingKey::ApiKey.as_str(),
                        settings.masked_api_key().unwrap_or_else(|| "(not set)".to_string())
                    );
                    println!(
                        "{}: {}",
                        SettingKey::SelectedModel.as_str(),
                        settings.selected_model
                    );
                    println!(
                        "{}: {}",
                        SettingKey::SystemInstructions.as_str(),
                        if settings.system_instructions.is_empty() {
                            "(default storyteller persona)"
                        } else {
                            settings.system_instructions.as_str()
                        }
                    );
                }
                ConfigCommands::Set { key, value } => {
                    store.set(*key, value.as_str())?;
                    println!("Saved {} to {}", key.as_str(), store.path().display());
                }
                ConfigCommands::ClearKey => {
                    store.clear_credential()?;
                    println!("Removed {} from {}", SettingKey::ApiKey.as_str(), store.path().display());
                }
                ConfigCommands::Path => println!("{}", store.path().display()),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
