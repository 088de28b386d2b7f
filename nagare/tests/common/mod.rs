#![allow(dead_code)]
use std::{path::Path, sync::Arc};

use nagare::{
    TokenId,
    backends::{
        CompileOptions, CompiledModel, Model,
        reference::{ReferenceCompiledModel, ReferenceModel, ReferenceModelConfig},
    },
    generator::GenerationSession,
    session::{
        GenerationController, config::ControllerConfig, types::Error,
    },
    tokenizer::{Encoding, TextCodec},
};
use tempfile::TempDir;

pub const UNK: TokenId = 0;
pub const BOS: TokenId = 1;
pub const EOS: TokenId = 2;
pub const HELLO: TokenId = 3;
pub const WORLD: TokenId = 4;
pub const BANG: TokenId = 5;
pub const NEWLINE: TokenId = 6;
pub const GLYPH_HEAD: TokenId = 7;
pub const GLYPH_TAIL: TokenId = 8;
pub const AGAIN: TokenId = 9;
pub const VOCAB_SIZE: usize = 10;

/// Byte-level codec with sentencepiece-like quirks: special tokens decode
/// to nothing, a leading space is stripped from the decoded text, and a
/// split two-byte glyph decodes to U+FFFD until its tail arrives.
pub struct PieceCodec;

impl PieceCodec {
    fn piece(token_id: TokenId) -> &'static [u8] {
        match token_id {
            HELLO => b"Hello",
            WORLD => b" world",
            BANG => b"!",
            NEWLINE => b"\n",
            GLYPH_HEAD => &[0xC3],
            GLYPH_TAIL => &[0xA9],
            AGAIN => b" again",
            _ => b"",
        }
    }

    pub fn shared() -> Arc<dyn TextCodec> {
        Arc::new(PieceCodec)
    }
}

impl TextCodec for PieceCodec {
    fn encode(
        &self,
        text: &str,
    ) -> Result<Encoding, Error> {
        let mut ids = Vec::new();
        let mut rest = text.as_bytes();
        while !rest.is_empty() {
            let matched = (HELLO..VOCAB_SIZE as TokenId)
                .map(|id| (id, Self::piece(id)))
                .filter(|(_, piece)| !piece.is_empty() && rest.starts_with(piece))
                .max_by_key(|(_, piece)| piece.len());
            match matched {
                Some((id, piece)) => {
                    ids.push(id);
                    rest = &rest[piece.len()..];
                },
                None => {
                    ids.push(UNK);
                    rest = &rest[1..];
                },
            }
        }
        let attention_mask = vec![1; ids.len()];
        Ok(Encoding {
            ids,
            attention_mask,
        })
    }

    fn decode(
        &self,
        token_ids: &[TokenId],
    ) -> Result<String, Error> {
        let bytes: Vec<u8> = token_ids
            .iter()
            .flat_map(|&id| Self::piece(id).iter().copied())
            .collect();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(text.strip_prefix(' ').map(str::to_string).unwrap_or(text))
    }
}

/// `Hello world!` then `EOS`.
pub fn stopping_model() -> ReferenceModelConfig {
    ReferenceModelConfig::new(2, 2, 4, VOCAB_SIZE)
        .transition(HELLO, WORLD, 5.0)
        .transition(WORLD, BANG, 5.0)
        .transition(BANG, EOS, 5.0)
}

/// `Hello world! again! again! ...` without ever producing `EOS`.
pub fn looping_model() -> ReferenceModelConfig {
    ReferenceModelConfig::new(2, 2, 4, VOCAB_SIZE)
        .transition(HELLO, WORLD, 5.0)
        .transition(WORLD, BANG, 5.0)
        .transition(BANG, AGAIN, 5.0)
        .transition(AGAIN, BANG, 5.0)
}

pub fn write_model(config: &ReferenceModelConfig) -> TempDir {
    let directory = tempfile::tempdir().unwrap();
    config.save(directory.path()).unwrap();
    directory
}

pub fn build_session(
    config: ReferenceModelConfig,
    context_length: Option<usize>,
) -> GenerationSession {
    let model = ReferenceCompiledModel::new(config);
    GenerationSession::new(&model, context_length).unwrap()
}

pub fn compile(path: &Path) -> Box<dyn CompiledModel> {
    ReferenceModel::new()
        .compile(path, &CompileOptions::default())
        .unwrap()
}

/// Controller over the reference backend with the model at `model_dir`
/// and [`PieceCodec`] loaded.
pub fn ready_controller(model_dir: &Path) -> GenerationController {
    let mut controller = GenerationController::new(
        Box::new(ReferenceModel::new()),
        ControllerConfig::default(),
    );
    controller.load_model(model_dir, None).unwrap();
    controller.set_tokenizer(PieceCodec::shared());
    controller
}
