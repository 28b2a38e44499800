// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// One subcommand per workflow step. Defaults reproduce the
// reference recipe, so `lora-kit train` with no flags trains on
// ./dataset.jsonl into ./results and ./adapter_model.
//
// clap types stop here: every Args struct converts into a plain
// application config with From.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::{
    curate_use_case::CurateConfig,
    extract_use_case::ExtractConfig,
    generate_use_case::GenerateConfig,
    modelfile_use_case::ModelfileConfig,
    serve_use_case::RegisterConfig,
    train_use_case::{ComputeDevice, TrainConfig},
};
use crate::data::curator::Strategy;
use crate::domain::traits::SamplingOptions;
use crate::infra::ollama::DEFAULT_HOST;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract text from PDFs into one .txt file per document
    Extract(ExtractArgs),

    /// Turn extracted text into an instruction/response JSONL dataset
    Curate(CurateArgs),

    /// Check every line of a JSONL dataset
    Validate(ValidateArgs),

    /// Train a LoRA adapter on the dataset
    Train(TrainArgs),

    /// Write a Modelfile pointing at the base model and the adapter
    Modelfile(ModelfileArgs),

    /// Register the Modelfile with Ollama (`ollama create`)
    Register(RegisterArgs),

    /// Chat with a registered model through the Ollama server
    Chat(ChatArgs),

    /// Sample a response locally from the base model plus adapter
    Generate(GenerateArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum StrategyArg {
    /// Section headings become questions
    Headings,
    /// First sentence of each passage prompts the rest
    Passages,
}

impl From<StrategyArg> for Strategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Headings => Strategy::Headings,
            StrategyArg::Passages => Strategy::Passages,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DeviceArg {
    Wgpu,
    Cpu,
}

impl From<DeviceArg> for ComputeDevice {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Wgpu => ComputeDevice::Wgpu,
            DeviceArg::Cpu => ComputeDevice::Cpu,
        }
    }
}

// ─── extract ──────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Directory containing .pdf files
    #[arg(long, default_value = "pdfs")]
    pub input_dir: PathBuf,

    /// Directory to write .txt files into
    #[arg(long, default_value = "extracted")]
    pub output_dir: PathBuf,
}

impl From<ExtractArgs> for ExtractConfig {
    fn from(a: ExtractArgs) -> Self {
        ExtractConfig { input_dir: a.input_dir, output_dir: a.output_dir }
    }
}

// ─── curate ───────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct CurateArgs {
    /// Directory of .txt files (output of `extract`)
    #[arg(long, default_value = "extracted")]
    pub input_dir: PathBuf,

    /// Dataset file to write
    #[arg(long, default_value = "dataset.jsonl")]
    pub output: PathBuf,

    #[arg(long, value_enum, default_value_t = StrategyArg::Headings)]
    pub strategy: StrategyArg,

    /// Responses shorter than this many words are dropped
    #[arg(long, default_value_t = 8)]
    pub min_words: usize,

    /// Responses are cut at this many words
    #[arg(long, default_value_t = 200)]
    pub max_words: usize,

    /// Keep the records already in the output file
    #[arg(long)]
    pub append: bool,
}

impl From<CurateArgs> for CurateConfig {
    fn from(a: CurateArgs) -> Self {
        CurateConfig {
            input_dir: a.input_dir,
            output:    a.output,
            strategy:  a.strategy.into(),
            min_words: a.min_words,
            max_words: a.max_words,
            append:    a.append,
        }
    }
}

// ─── validate ─────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Dataset file to check
    #[arg(default_value = "dataset.jsonl")]
    pub dataset: PathBuf,
}

// ─── train ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Load every setting from this JSON file instead of the flags below
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = "dataset.jsonl")]
    pub dataset: PathBuf,

    /// Checkpoints, metrics.csv and train_config.json go here
    #[arg(long, default_value = "results")]
    pub output_dir: PathBuf,

    /// Final adapter directory
    #[arg(long, default_value = "adapter_model")]
    pub adapter_dir: PathBuf,

    /// Base model directory; created on first run
    #[arg(long, default_value = "base_model")]
    pub base_dir: PathBuf,

    /// Base model name recorded in adapter_config.json
    #[arg(long, default_value = "llama3.2:3b")]
    pub base_model: String,

    /// Samples per optimiser step
    #[arg(long, default_value_t = 2)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 3)]
    pub epochs: usize,

    #[arg(long, default_value_t = 2e-4)]
    pub learning_rate: f64,

    /// Log the mean loss every N steps
    #[arg(long, default_value_t = 10)]
    pub logging_steps: usize,

    /// Save an adapter checkpoint every N steps (0 disables)
    #[arg(long, default_value_t = 500)]
    pub save_steps: usize,

    /// Fraction of samples used for training; the rest validates
    #[arg(long, default_value_t = 0.9)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Tokens per sample: [BOS] instruction [SEP] response [EOS] + padding
    #[arg(long, default_value_t = 128)]
    pub max_seq_len: usize,

    /// Tokenizer vocabulary size for a new base
    #[arg(long, default_value_t = 8000)]
    pub vocab_size: usize,

    #[arg(long, default_value_t = 128)]
    pub d_model: usize,

    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 4)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 2)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 512)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// LoRA rank r
    #[arg(long, default_value_t = 16)]
    pub lora_r: usize,

    /// LoRA alpha; updates are scaled by alpha / r
    #[arg(long, default_value_t = 32.0)]
    pub lora_alpha: f64,

    #[arg(long, default_value_t = 0.05)]
    pub lora_dropout: f64,

    /// Attention projections that get adapters
    #[arg(long, value_delimiter = ',', default_value = "q_proj,v_proj")]
    pub target_modules: Vec<String>,

    #[arg(long, value_enum, default_value_t = DeviceArg::Wgpu)]
    pub device: DeviceArg,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            dataset:        a.dataset,
            output_dir:     a.output_dir,
            adapter_dir:    a.adapter_dir,
            base_dir:       a.base_dir,
            base_model:     a.base_model,
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            learning_rate:  a.learning_rate,
            logging_steps:  a.logging_steps,
            save_steps:     a.save_steps,
            train_fraction: a.train_fraction,
            seed:           a.seed,
            max_seq_len:    a.max_seq_len,
            vocab_size:     a.vocab_size,
            d_model:        a.d_model,
            num_heads:      a.num_heads,
            num_layers:     a.num_layers,
            d_ff:           a.d_ff,
            dropout:        a.dropout,
            lora_r:         a.lora_r,
            lora_alpha:     a.lora_alpha,
            lora_dropout:   a.lora_dropout,
            target_modules: a.target_modules,
            device:         a.device.into(),
        }
    }
}

// ─── modelfile ────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ModelfileArgs {
    /// File to write
    #[arg(long, default_value = "Modelfile")]
    pub output: PathBuf,

    /// Base model tag the serving tool starts FROM
    #[arg(long, default_value = "llama3.2:3b")]
    pub base: String,

    /// Adapter path, relative to the Modelfile's directory
    #[arg(long, default_value = "./adapter_model")]
    pub adapter: String,

    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    #[arg(long, default_value_t = 0.9)]
    pub top_p: f32,

    /// Optional SYSTEM prompt
    #[arg(long)]
    pub system: Option<String>,
}

impl From<ModelfileArgs> for ModelfileConfig {
    fn from(a: ModelfileArgs) -> Self {
        ModelfileConfig {
            output:      a.output,
            base:        a.base,
            adapter:     a.adapter,
            temperature: a.temperature,
            top_p:       a.top_p,
            system:      a.system,
        }
    }
}

// ─── register ─────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Name to register the model under
    pub name: String,

    #[arg(long, short = 'f', default_value = "Modelfile")]
    pub modelfile: PathBuf,
}

impl From<RegisterArgs> for RegisterConfig {
    fn from(a: RegisterArgs) -> Self {
        RegisterConfig { name: a.name, modelfile: a.modelfile }
    }
}

// ─── chat ─────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Registered model name
    pub model: String,

    /// Ollama server address
    #[arg(long, env = "OLLAMA_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    #[arg(long, default_value_t = 0.9)]
    pub top_p: f32,

    /// System message sent at the start of every conversation
    #[arg(long)]
    pub system: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,
}

// ─── generate ─────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Instruction to respond to
    pub prompt: String,

    #[arg(long, default_value = "base_model")]
    pub base_dir: PathBuf,

    #[arg(long, default_value = "adapter_model")]
    pub adapter_dir: PathBuf,

    #[arg(long, default_value_t = 64)]
    pub max_new_tokens: usize,

    /// 0 means greedy decoding
    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    #[arg(long, default_value_t = 0.9)]
    pub top_p: f32,

    /// Fix the sampling seed for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = DeviceArg::Wgpu)]
    pub device: DeviceArg,
}

impl From<GenerateArgs> for GenerateConfig {
    fn from(a: GenerateArgs) -> Self {
        GenerateConfig {
            base_dir:       a.base_dir,
            adapter_dir:    a.adapter_dir,
            prompt:         a.prompt,
            max_new_tokens: a.max_new_tokens,
            options:        SamplingOptions { temperature: a.temperature, top_p: a.top_p },
            seed:           a.seed,
            device:         a.device.into(),
        }
    }
}
