// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Builds, saves and loads the word-level tokenizer shared by
// training and generation. The tokenizer lives next to the base
// model weights, so every adapter trained on that base sees the
// same vocabulary.
//
// The vocabulary is written straight into HuggingFace tokenizer
// JSON and loaded back with Tokenizer::from_file, which avoids
// the trainer/ModelWrapper type juggling of tokenizers 0.15.
// Words are counted through the same BertNormalizer + Whitespace
// pipeline the JSON declares, so every vocabulary key is a token
// that encode can actually produce.
//
// Reference: Sennrich et al. (2016) BPE paper

use anyhow::{Context, Result};
use serde_json::json;
use std::{collections::HashMap, path::PathBuf};
use tokenizers::{
    normalizers::BertNormalizer, pre_tokenizers::whitespace::Whitespace, Normalizer,
    OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer, Tokenizer,
};

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const BOS_ID: u32 = 2;
pub const EOS_ID: u32 = 3;
pub const SEP_ID: u32 = 4;

pub const SPECIAL_TOKEN_COUNT: usize = 5;

const SPECIAL_TOKENS: [(&str, u32); SPECIAL_TOKEN_COUNT] = [
    ("[PAD]", PAD_ID),
    ("[UNK]", UNK_ID),
    ("[BOS]", BOS_ID),
    ("[EOS]", EOS_ID),
    ("[SEP]", SEP_ID),
];

pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// clean_text, handle_chinese_chars, strip_accents (None follows
/// lowercase), lowercase. Must match the "normalizer" JSON below.
fn normalizer() -> BertNormalizer {
    BertNormalizer::new(true, true, None, true)
}

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn exists(&self) -> bool {
        self.dir.join(TOKENIZER_FILE).exists()
    }

    /// Load the existing tokenizer or build one from `texts`.
    pub fn load_or_build(&self, texts: &[&str], vocab_size: usize) -> Result<Tokenizer> {
        if self.exists() {
            tracing::info!("Loading existing tokenizer from '{}'", self.dir.display());
            self.load()
        } else {
            tracing::info!("Building new tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(texts, vocab_size)
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.dir.join(TOKENIZER_FILE);
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    fn build_and_save(&self, texts: &[&str], vocab_size: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // ── Step 1: Word frequencies ──────────────────────────────────────────
        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in pre_tokenize(text)? {
                *freq.entry(word).or_insert(0) += 1;
            }
        }

        // Most frequent first; ties broken alphabetically so the ids are
        // stable across runs.
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(SPECIAL_TOKENS.len()));

        // ── Step 2: Vocab JSON ────────────────────────────────────────────────
        let mut vocab = serde_json::Map::new();
        for (token, id) in SPECIAL_TOKENS {
            vocab.insert(token.to_string(), json!(id));
        }
        let mut next_id = SPECIAL_TOKENS.len() as u32;
        for (word, _) in &words {
            if !vocab.contains_key(word) {
                vocab.insert(word.clone(), json!(next_id));
                next_id += 1;
            }
        }

        // ── Step 3: Tokenizer JSON in HuggingFace format ──────────────────────
        let added_tokens: Vec<_> = SPECIAL_TOKENS
            .iter()
            .map(|(content, id)| {
                json!({
                    "id": id, "content": content, "single_word": false,
                    "lstrip": false, "rstrip": false, "normalized": false, "special": true
                })
            })
            .collect();

        let tokenizer_json = json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        });

        let tok_path = self.dir.join(TOKENIZER_FILE);
        std::fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write '{}'", tok_path.display()))?;

        tracing::info!(
            "Tokenizer built with {} tokens, saved to '{}'",
            next_id,
            tok_path.display()
        );

        self.load()
    }
}

/// Normalised words of `text`, exactly as the saved tokenizer sees them.
pub fn pre_tokenize(text: &str) -> Result<Vec<String>> {
    let normalizer = normalizer();
    let mut pretokenized = PreTokenizedString::from(text);
    pretokenized
        .normalize(|s| normalizer.normalize(s))
        .map_err(|e| anyhow::anyhow!("Normalisation error: {e}"))?;
    Whitespace::default()
        .pre_tokenize(&mut pretokenized)
        .map_err(|e| anyhow::anyhow!("Pre-tokenisation error: {e}"))?;

    Ok(pretokenized
        .get_splits(OffsetReferential::Original, OffsetType::Byte)
        .into_iter()
        .map(|(word, _, _)| word.to_string())
        .collect())
}

pub fn encode(tokenizer: &Tokenizer, text: &str) -> Result<Vec<u32>> {
    let enc = tokenizer
        .encode(text, false)
        .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
    Ok(enc.get_ids().to_vec())
}

/// Decode ids to text, dropping special tokens.
pub fn decode(tokenizer: &Tokenizer, ids: &[u32]) -> Result<String> {
    tokenizer
        .decode(ids, true)
        .map_err(|e| anyhow::anyhow!("Decode error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pre_tokenize_splits_words_and_punctuation() {
        assert_eq!(
            pre_tokenize("What's LoRA?  r=16").unwrap(),
            vec!["what", "'", "s", "lora", "?", "r", "=", "16"]
        );
    }

    #[test]
    fn test_accented_words_are_in_vocabulary() {
        assert_eq!(pre_tokenize("Café Résumé").unwrap(), vec!["cafe", "resume"]);

        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path())
            .load_or_build(&["café résumé café"], 50)
            .unwrap();
        let ids = encode(&tok, "café").unwrap();
        assert_eq!(ids.len(), 1);
        assert_ne!(ids[0], UNK_ID);
        assert_eq!(encode(&tok, "CAFE").unwrap(), ids);
        assert_ne!(encode(&tok, "résumé").unwrap(), vec![UNK_ID]);
    }

    #[test]
    fn test_build_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        assert!(!store.exists());

        let tok = store
            .load_or_build(&["the adapter trains", "the base is frozen"], 100)
            .unwrap();
        assert!(store.exists());

        let ids = encode(&tok, "The adapter").unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|&id| id >= SPECIAL_TOKENS.len() as u32));

        // "the" is the most frequent word and gets the first free id.
        assert_eq!(ids[0], SPECIAL_TOKENS.len() as u32);

        let unknown = encode(&tok, "quantization").unwrap();
        assert_eq!(unknown, vec![UNK_ID]);

        let reloaded = store.load_or_build(&[], 100).unwrap();
        assert_eq!(encode(&reloaded, "The adapter").unwrap(), ids);
    }

    #[test]
    fn test_vocab_size_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path())
            .load_or_build(&["a b c d e f g h"], 8)
            .unwrap();
        assert_eq!(tok.get_vocab_size(false), 8);
    }

    #[test]
    fn test_decode_skips_special_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path())
            .load_or_build(&["hello world"], 50)
            .unwrap();
        let mut ids = vec![BOS_ID];
        ids.extend(encode(&tok, "hello world").unwrap());
        ids.push(EOS_ID);
        assert_eq!(decode(&tok, &ids).unwrap(), "hello world");
    }
}
