// ============================================================
// Layer 2 — Serving: register and chat
// ============================================================
//   RegisterUseCase → parse + check the Modelfile, then
//                     `ollama create <name> -f <Modelfile>`
//   ChatSession     → one conversation with a registered model;
//                     keeps the history so every turn sees the
//                     earlier ones
//
// The interactive loop itself lives in the CLI layer; ChatSession
// only decides what each input line means.

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::modelfile::Modelfile;
use crate::domain::traits::{ChatBackend, ChatMessage, Role, SamplingOptions};
use crate::infra::checkpoint::{weights_file, ADAPTER_WEIGHTS};
use crate::infra::ollama::create_model;

// ─── Register ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct RegisterConfig {
    pub name:      String,
    pub modelfile: PathBuf,
}

pub struct RegisterUseCase {
    config: RegisterConfig,
}

/// ADAPTER paths are relative to the directory holding the Modelfile.
pub fn resolve_adapter(modelfile_path: &Path, adapter: &str) -> PathBuf {
    let adapter = Path::new(adapter);
    if adapter.is_absolute() {
        return adapter.to_path_buf();
    }
    match modelfile_path.parent() {
        Some(dir) => dir.join(adapter),
        None => adapter.to_path_buf(),
    }
}

impl RegisterUseCase {
    pub fn new(config: RegisterConfig) -> Self {
        Self { config }
    }

    /// Everything `execute` checks before handing over to the tool.
    pub fn check(&self) -> Result<Modelfile> {
        let path = &self.config.modelfile;
        if self.config.name.trim().is_empty() {
            bail!("Model name is empty");
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read Modelfile '{}'", path.display()))?;
        let modelfile = Modelfile::parse(&text)
            .with_context(|| format!("Invalid Modelfile '{}'", path.display()))?;
        modelfile.validate()?;
        tracing::debug!(
            "Modelfile: FROM {} temperature={:?} top_p={:?} system={}",
            modelfile.base(),
            modelfile.temperature()?,
            modelfile.top_p()?,
            modelfile.system().is_some(),
        );

        if let Some(adapter) = modelfile.adapter() {
            let resolved = resolve_adapter(path, adapter);
            if !resolved.exists() {
                bail!(
                    "Adapter '{}' does not exist (resolved to '{}'). Run 'train' first.",
                    adapter,
                    resolved.display()
                );
            }
            if resolved.join(weights_file(ADAPTER_WEIGHTS)).exists() {
                tracing::warn!(
                    "'{}' holds a burn-format adapter; Ollama only imports Safetensors or GGUF adapters",
                    resolved.display()
                );
            }
        } else {
            tracing::warn!("Modelfile has no ADAPTER; registering the base model as is");
        }
        Ok(modelfile)
    }

    pub fn execute(&self) -> Result<String> {
        let modelfile = self.check()?;
        tracing::info!("Registering '{}' from base '{}'", self.config.name, modelfile.base());
        create_model(&self.config.name, &self.config.modelfile)
    }
}

// ─── Chat ─────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Exit,
    Reset,
    Empty,
    Message(String),
}

impl ChatInput {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => ChatInput::Empty,
            "/exit" | "/quit" | "/bye" => ChatInput::Exit,
            "/reset" | "/clear" => ChatInput::Reset,
            text => ChatInput::Message(text.to_string()),
        }
    }
}

pub struct ChatSession<C: ChatBackend> {
    backend: C,
    model:   String,
    options: SamplingOptions,
    system:  Option<String>,
    history: Vec<ChatMessage>,
}

impl<C: ChatBackend> ChatSession<C> {
    pub fn new(backend: C, model: impl Into<String>, options: SamplingOptions, system: Option<String>) -> Self {
        let mut session = Self {
            backend,
            model: model.into(),
            options,
            system,
            history: Vec::new(),
        };
        session.reset();
        session
    }

    pub fn reset(&mut self) {
        self.history.clear();
        if let Some(system) = &self.system {
            self.history.push(ChatMessage::new(Role::System, system.clone()));
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Send one user turn. On failure the turn is dropped from the
    /// history so the user can simply retry.
    pub fn send(&mut self, text: &str) -> Result<String> {
        self.history.push(ChatMessage::new(Role::User, text));
        match self.backend.chat(&self.model, &self.history, self.options) {
            Ok(reply) => {
                self.history.push(ChatMessage::new(Role::Assistant, reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                self.history.pop();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Replies with the number of messages it was sent.
    struct Counting {
        calls: RefCell<Vec<usize>>,
        fail:  bool,
    }

    impl ChatBackend for &Counting {
        fn chat(&self, _model: &str, messages: &[ChatMessage], _options: SamplingOptions) -> Result<String> {
            if self.fail {
                bail!("server down");
            }
            self.calls.borrow_mut().push(messages.len());
            Ok(format!("{} messages", messages.len()))
        }
    }

    #[test]
    fn test_chat_input_commands() {
        assert_eq!(ChatInput::parse("  /exit "), ChatInput::Exit);
        assert_eq!(ChatInput::parse("/reset"), ChatInput::Reset);
        assert_eq!(ChatInput::parse("   "), ChatInput::Empty);
        assert_eq!(ChatInput::parse(" hi "), ChatInput::Message("hi".into()));
    }

    #[test]
    fn test_history_grows_and_resets() {
        let backend = Counting { calls: RefCell::new(Vec::new()), fail: false };
        let mut session = ChatSession::new(&backend, "m", SamplingOptions::default(), Some("Be brief.".into()));

        assert_eq!(session.send("first").unwrap(), "2 messages");
        assert_eq!(session.send("second").unwrap(), "4 messages");
        assert_eq!(session.history().len(), 5);

        session.reset();
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].role, Role::System);
        assert_eq!(*backend.calls.borrow(), vec![2, 4]);
    }

    #[test]
    fn test_failed_turn_is_not_kept() {
        let backend = Counting { calls: RefCell::new(Vec::new()), fail: true };
        let mut session = ChatSession::new(&backend, "m", SamplingOptions::default(), None);
        assert!(session.send("hello").is_err());
        assert!(session.history().is_empty());
    }

    fn write_modelfile(dir: &Path, adapter: &str) -> PathBuf {
        let path = dir.join("Modelfile");
        fs::write(&path, format!("FROM llama3.2:3b\nADAPTER {adapter}\nPARAMETER temperature 0.7\n")).unwrap();
        path
    }

    #[test]
    fn test_register_requires_existing_adapter() {
        let dir = tempfile::tempdir().unwrap();
        let modelfile = write_modelfile(dir.path(), "./adapter_model");
        let use_case = RegisterUseCase::new(RegisterConfig { name: "handbook".into(), modelfile });

        let err = use_case.check().unwrap_err().to_string();
        assert!(err.contains("does not exist"), "{err}");

        fs::create_dir_all(dir.path().join("adapter_model")).unwrap();
        assert_eq!(use_case.check().unwrap().adapter(), Some("./adapter_model"));
    }

    #[test]
    fn test_register_rejects_invalid_modelfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Modelfile");
        fs::write(&path, "ADAPTER ./a\n").unwrap();
        let use_case = RegisterUseCase::new(RegisterConfig { name: "x".into(), modelfile: path });
        assert!(use_case.check().is_err());
    }

    #[test]
    fn test_resolve_adapter_paths() {
        assert_eq!(
            resolve_adapter(Path::new("/work/Modelfile"), "./adapter_model"),
            PathBuf::from("/work/./adapter_model")
        );
        assert_eq!(resolve_adapter(Path::new("/work/Modelfile"), "/abs/a"), PathBuf::from("/abs/a"));
        assert_eq!(resolve_adapter(Path::new("Modelfile"), "a"), PathBuf::from("a"));
    }
}
