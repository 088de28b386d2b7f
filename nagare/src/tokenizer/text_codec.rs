use crate::{TokenId, session::types::Error};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Encoding {
    pub ids: Vec<TokenId>,
    pub attention_mask: Vec<i64>,
}

/// Converts between text and token ids.
///
/// `decode` is only required to be correct on whole prefixes of a sequence.
/// Implementations may strip a leading space when decoding a suffix alone,
/// and may end the text in U+FFFD while a multi-token glyph is incomplete.
pub trait TextCodec: Send + Sync {
    fn encode(
        &self,
        text: &str,
    ) -> Result<Encoding, Error>;

    fn decode(
        &self,
        token_ids: &[TokenId],
    ) -> Result<String, Error>;
}
