mod hugging_face_codec;
mod text_codec;

pub use hugging_face_codec::{HuggingFaceCodec, TOKENIZER_FILE_NAME};
pub use text_codec::{Encoding, TextCodec};
