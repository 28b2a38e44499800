// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap, hands each subcommand to its use
// case in Layer 2, and prints the results. Terminal I/O (the chat
// prompt, summaries, the validation report) only happens here.
//
//   extract   → ExtractUseCase
//   curate    → CurateUseCase
//   validate  → ValidateUseCase
//   train     → TrainUseCase
//   modelfile → ModelfileUseCase
//   register  → RegisterUseCase
//   chat      → ChatSession over OllamaClient
//   generate  → GenerateUseCase
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::{bail, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};

use commands::{ChatArgs, Commands, TrainArgs};

use crate::application::{
    curate_use_case::CurateUseCase,
    extract_use_case::ExtractUseCase,
    generate_use_case::GenerateUseCase,
    modelfile_use_case::ModelfileUseCase,
    serve_use_case::{ChatInput, ChatSession, RegisterUseCase},
    train_use_case::{TrainConfig, TrainUseCase},
    validate_use_case::ValidateUseCase,
};
use crate::domain::traits::{Role, SamplingOptions};
use crate::infra::ollama::OllamaClient;

#[derive(Parser, Debug)]
#[command(
    name = "lora-kit",
    version,
    about = "Turn PDFs into an instruction dataset, train a LoRA adapter, and serve it with Ollama."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the use case. Nothing is computed here.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Extract(args) => {
                let summary = ExtractUseCase::new(args.into()).execute()?;
                println!(
                    "Extracted {} documents ({} pages, {} characters).",
                    summary.documents, summary.pages, summary.characters
                );
                for path in &summary.written {
                    println!("  {}", path.display());
                }
                Ok(())
            }
            Commands::Curate(args) => {
                let output = args.output.clone();
                let summary = CurateUseCase::new(args.into()).execute()?;
                println!(
                    "{} records in '{}' ({} new from {} documents, {} duplicates skipped).",
                    summary.total, output.display(), summary.added, summary.documents, summary.duplicates
                );
                println!("Review and edit the file by hand before training.");
                Ok(())
            }
            Commands::Validate(args) => {
                let report = ValidateUseCase::new(&args.dataset).execute()?;
                for (line, issue) in &report.issues {
                    println!("{}:{}: {}", args.dataset.display(), line, issue);
                }
                println!("{} of {} records valid.", report.valid, report.total);
                if !report.is_ok() {
                    bail!("Dataset '{}' failed validation", args.dataset.display());
                }
                Ok(())
            }
            Commands::Train(args) => run_train(args),
            Commands::Modelfile(args) => {
                let output = args.output.clone();
                let modelfile = ModelfileUseCase::new(args.into()).execute()?;
                print!("{modelfile}");
                println!("Written to '{}'.", output.display());
                Ok(())
            }
            Commands::Register(args) => {
                let name = args.name.clone();
                let out = RegisterUseCase::new(args.into()).execute()?;
                print!("{out}");
                println!("Registered '{name}'. Try: lora-kit chat {name}");
                Ok(())
            }
            Commands::Chat(args) => run_chat(args),
            Commands::Generate(args) => {
                let text = GenerateUseCase::new(args.into()).execute()?;
                println!("{text}");
                Ok(())
            }
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            tracing::info!("Loading training config from '{}'", path.display());
            TrainConfig::from_file(path)?
        }
        None => args.into(),
    };
    let adapter_dir = config.adapter_dir.clone();

    let report = TrainUseCase::new(config).execute()?;
    println!(
        "Training complete: {} steps, {} trainable parameters, final train_loss={:.4}{}",
        report.steps,
        report.trainable_params,
        report.final_train_loss,
        report.final_val_loss.map(|v| format!(", val_loss={v:.4}")).unwrap_or_default(),
    );
    println!("Adapter saved to '{}'.", adapter_dir.display());
    Ok(())
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let client = OllamaClient::new(&args.host, args.timeout)?;
    let version = client.version()?;
    tracing::info!("Connected to Ollama {} at {}", version, client.base_url());

    let options = SamplingOptions { temperature: args.temperature, top_p: args.top_p };
    let mut session = ChatSession::new(client, args.model.clone(), options, args.system);

    println!("Chatting with '{}'. /reset clears the history, /exit quits.", args.model);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!(">>> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            return Ok(());
        };
        match ChatInput::parse(&line?) {
            ChatInput::Exit => return Ok(()),
            ChatInput::Empty => continue,
            ChatInput::Reset => {
                let dropped = session.history().iter().filter(|m| m.role != Role::System).count();
                session.reset();
                println!("(history cleared, {dropped} messages dropped)");
            }
            ChatInput::Message(text) => match session.send(&text) {
                Ok(reply) => println!("{}\n", reply.trim()),
                Err(e) => eprintln!("error: {e:#}"),
            },
        }
    }
}
