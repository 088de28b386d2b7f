mod incremental_text_decoder;

pub use incremental_text_decoder::IncrementalTextDecoder;
