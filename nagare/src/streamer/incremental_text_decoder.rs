use std::sync::Arc;

use crate::{TokenId, session::types::Error, tokenizer::TextCodec};

const REPLACEMENT_CHARACTER: char = '\u{FFFD}';

/// Turns a growing token sequence into printable text chunks.
///
/// Decoding a token on its own loses word boundaries, so every call
/// re-decodes the whole pending cache and emits only the new suffix.
/// Text ending in U+FFFD is held back until the glyph completes.
pub struct IncrementalTextDecoder {
    codec: Arc<dyn TextCodec>,
    token_cache: Vec<TokenId>,
    printed_length: usize,
}

impl IncrementalTextDecoder {
    pub fn new(codec: Arc<dyn TextCodec>) -> Self {
        Self {
            codec,
            token_cache: Vec::new(),
            printed_length: 0,
        }
    }

    /// Returns the newly revealed text, if any.
    pub fn put(
        &mut self,
        token_id: TokenId,
    ) -> Result<Option<String>, Error> {
        self.token_cache.push(token_id);
        let text = self.codec.decode(&self.token_cache)?;

        if text.ends_with('\n') {
            let chunk = self.unprinted(&text);
            self.clear();
            return Ok(Some(chunk));
        }
        if text.ends_with(REPLACEMENT_CHARACTER) {
            return Ok(None);
        }

        let chunk = self.unprinted(&text);
        self.printed_length = text.len();
        Ok((!chunk.is_empty()).then_some(chunk))
    }

    /// Flushes what remains, followed by a newline.
    pub fn end(&mut self) -> Result<String, Error> {
        let text = self.codec.decode(&self.token_cache)?;
        let mut chunk = self.unprinted(&text);
        chunk.push('\n');
        self.clear();
        Ok(chunk)
    }

    pub fn clear(&mut self) {
        self.token_cache.clear();
        self.printed_length = 0;
    }

    pub fn pending_tokens(&self) -> &[TokenId] {
        &self.token_cache
    }

    fn unprinted(
        &self,
        text: &str,
    ) -> String {
        match text.get(self.printed_length..) {
            Some(suffix) => suffix.to_string(),
            None => {
                tracing::warn!(
                    printed_length = self.printed_length,
                    text_length = text.len(),
                    "decoded text no longer extends printed text"
                );
                String::new()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Encoding;

    /// Each id maps to a fixed piece; `9` alone is half a glyph.
    struct PieceCodec;

    impl TextCodec for PieceCodec {
        fn encode(
            &self,
            _text: &str,
        ) -> Result<Encoding, Error> {
            Ok(Encoding::default())
        }

        fn decode(
            &self,
            token_ids: &[TokenId],
        ) -> Result<String, Error> {
            let mut text = String::new();
            let mut index = 0;
            while index < token_ids.len() {
                match (token_ids[index], token_ids.get(index + 1)) {
                    (9, Some(10)) => {
                        text.push('é');
                        index += 1;
                    },
                    (9, _) => text.push(REPLACEMENT_CHARACTER),
                    (1, _) => text.push_str("Hello"),
                    (2, _) => text.push_str(" world"),
                    (3, _) => text.push('\n'),
                    _ => text.push('?'),
                }
                index += 1;
            }
            Ok(text)
        }
    }

    fn decoder() -> IncrementalTextDecoder {
        IncrementalTextDecoder::new(Arc::new(PieceCodec))
    }

    #[test]
    fn test_emits_new_suffix_only() {
        let mut decoder = decoder();
        assert_eq!(decoder.put(1).unwrap().as_deref(), Some("Hello"));
        assert_eq!(decoder.put(2).unwrap().as_deref(), Some(" world"));
        assert_eq!(decoder.end().unwrap(), "\n");
    }

    #[test]
    fn test_incomplete_glyph_is_held_back() {
        let mut decoder = decoder();
        decoder.put(1).unwrap();
        assert_eq!(decoder.put(9).unwrap(), None);
        assert_eq!(decoder.put(10).unwrap().as_deref(), Some("é"));
    }

    #[test]
    fn test_newline_flushes_and_clears_cache() {
        let mut decoder = decoder();
        decoder.put(1).unwrap();
        assert_eq!(decoder.put(3).unwrap().as_deref(), Some("\n"));
        assert!(decoder.pending_tokens().is_empty());
        assert_eq!(decoder.put(2).unwrap().as_deref(), Some(" world"));
    }

    #[test]
    fn test_end_flushes_unprinted_glyph_placeholder() {
        let mut decoder = decoder();
        decoder.put(9).unwrap();
        assert_eq!(decoder.end().unwrap(), "\u{FFFD}\n");
        assert!(decoder.pending_tokens().is_empty());
    }
}
