// ============================================================
// Layer 2 — ModelfileUseCase
// ============================================================
// Writes the Modelfile that tells the serving tool which base to
// start FROM, which ADAPTER to apply and which generation
// PARAMETERs to use:
//
//   FROM llama3.2:3b
//   ADAPTER ./adapter_model
//   PARAMETER temperature 0.7
//   PARAMETER top_p 0.9

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

use crate::domain::modelfile::Modelfile;

#[derive(Debug, Clone)]
pub struct ModelfileConfig {
    pub output:      PathBuf,
    pub base:        String,
    pub adapter:     String,
    pub temperature: f32,
    pub top_p:       f32,
    pub system:      Option<String>,
}

impl Default for ModelfileConfig {
    fn default() -> Self {
        Self {
            output:      PathBuf::from("Modelfile"),
            base:        "llama3.2:3b".to_string(),
            adapter:     "./adapter_model".to_string(),
            temperature: 0.7,
            top_p:       0.9,
            system:      None,
        }
    }
}

pub struct ModelfileUseCase {
    config: ModelfileConfig,
}

impl ModelfileUseCase {
    pub fn new(config: ModelfileConfig) -> Self {
        Self { config }
    }

    pub fn build(&self) -> Result<Modelfile> {
        let cfg = &self.config;
        let mut modelfile = Modelfile::new(&cfg.base)
            .with_adapter(&cfg.adapter)
            .with_parameter("temperature", cfg.temperature)
            .with_parameter("top_p", cfg.top_p);
        if let Some(system) = cfg.system.as_deref().filter(|s| !s.trim().is_empty()) {
            modelfile = modelfile.with_system(system);
        }
        modelfile.validate()?;
        Ok(modelfile)
    }

    pub fn execute(&self) -> Result<Modelfile> {
        let modelfile = self.build()?;
        let path = &self.config.output;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        fs::write(path, modelfile.to_string())
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::info!("Wrote '{}'", path.display());
        Ok(modelfile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_modelfile_text() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("Modelfile");
        ModelfileUseCase::new(ModelfileConfig { output: output.clone(), ..ModelfileConfig::default() })
            .execute()
            .unwrap();

        let text = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![
            "FROM llama3.2:3b",
            "ADAPTER ./adapter_model",
            "PARAMETER temperature 0.7",
            "PARAMETER top_p 0.9",
        ]);

        let parsed = Modelfile::parse(&text).unwrap();
        assert_eq!(parsed.temperature().unwrap(), Some(0.7));
    }

    #[test]
    fn test_system_prompt_and_bad_top_p() {
        let with_system = ModelfileUseCase::new(ModelfileConfig {
            system: Some("Answer from the handbook.\nBe brief.".into()),
            ..ModelfileConfig::default()
        })
        .build()
        .unwrap();
        assert_eq!(with_system.system(), Some("Answer from the handbook.\nBe brief."));

        let bad = ModelfileUseCase::new(ModelfileConfig { top_p: 1.5, ..ModelfileConfig::default() });
        assert!(bad.build().is_err());
    }
}
