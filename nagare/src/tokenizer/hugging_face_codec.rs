use std::path::Path;

use tokenizers::Tokenizer;

use super::text_codec::{Encoding, TextCodec};
use crate::{TokenId, session::types::Error};

pub const TOKENIZER_FILE_NAME: &str = "tokenizer.json";

/// [`TextCodec`] backed by a `tokenizer.json` from the `tokenizers` crate.
pub struct HuggingFaceCodec {
    tokenizer: Tokenizer,
}

impl HuggingFaceCodec {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self {
            tokenizer,
        }
    }

    /// Accepts either a model directory or the tokenizer file itself.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let tokenizer_path = if path.is_dir() {
            path.join(TOKENIZER_FILE_NAME)
        } else {
            path.to_path_buf()
        };
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|err| {
            tracing::warn!(
                path = %tokenizer_path.display(),
                error = %err,
                "failed to load tokenizer"
            );
            Error::UnableToLoadTokenizer
        })?;
        Ok(Self::new(tokenizer))
    }

    pub fn token_to_id(
        &self,
        token: &str,
    ) -> Option<TokenId> {
        self.tokenizer.token_to_id(token).map(TokenId::from)
    }
}

impl TextCodec for HuggingFaceCodec {
    fn encode(
        &self,
        text: &str,
    ) -> Result<Encoding, Error> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|_| Error::UnableToEncodeText)?;
        Ok(Encoding {
            ids: encoding.get_ids().iter().map(|&id| TokenId::from(id)).collect(),
            attention_mask: encoding
                .get_attention_mask()
                .iter()
                .map(|&mask| i64::from(mask))
                .collect(),
        })
    }

    fn decode(
        &self,
        token_ids: &[TokenId],
    ) -> Result<String, Error> {
        let ids = token_ids
            .iter()
            .map(|&id| u32::try_from(id).map_err(|_| Error::UnableToDecodeText))
            .collect::<Result<Vec<u32>, Error>>()?;
        self.tokenizer
            .decode(&ids, true)
            .map_err(|_| Error::UnableToDecodeText)
    }
}
