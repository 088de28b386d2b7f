mod config;
mod request;

use std::{path::Path, sync::Arc};

pub use config::{MODEL_FILE_NAME, ReferenceModelConfig, ScoredToken};
pub use request::ReferenceRequest;

use super::{
    BackendError, CompileOptions, CompiledModel, InferRequest, Model, ModelShape,
};

/// CPU model driven by a bigram score table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceModel;

impl ReferenceModel {
    pub fn new() -> Self {
        Self
    }
}

impl Model for ReferenceModel {
    fn compile(
        &self,
        path: &Path,
        options: &CompileOptions,
    ) -> Result<Box<dyn CompiledModel>, BackendError> {
        let config = ReferenceModelConfig::load(path)?;
        tracing::debug!(
            path = %path.display(),
            device = ?options.device,
            thread_count = ?options.thread_count,
            layers = config.layer_count,
            vocab_size = config.vocab_size,
            "compiled reference model"
        );
        let mut compiled = ReferenceCompiledModel::new(config);
        compiled.thread_count = options.thread_count;
        Ok(Box::new(compiled))
    }
}

/// Runs on the calling thread; `thread_count` is recorded but not used.
pub struct ReferenceCompiledModel {
    config: Arc<ReferenceModelConfig>,
    thread_count: Option<usize>,
}

impl ReferenceCompiledModel {
    pub fn new(config: ReferenceModelConfig) -> Self {
        Self {
            config: Arc::new(config),
            thread_count: None,
        }
    }
}

impl CompiledModel for ReferenceCompiledModel {
    fn shape(&self) -> ModelShape {
        self.config.shape()
    }

    fn thread_count(&self) -> Option<usize> {
        self.thread_count
    }

    fn create_request(&self) -> Result<Box<dyn InferRequest>, BackendError> {
        Ok(Box::new(ReferenceRequest::new(self.config.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{CancellationToken, Tensor, TensorName};

    fn feed(
        request: &mut dyn InferRequest,
        shape: ModelShape,
        token_ids: &[i64],
        past_length: usize,
    ) {
        let total = past_length + token_ids.len();
        let positions: Vec<i64> = (past_length as i64..total as i64).collect();
        request.set_tensor(TensorName::InputIds, Tensor::i64_row(token_ids)).unwrap();
        request
            .set_tensor(TensorName::AttentionMask, Tensor::i64_row(&vec![1; total]))
            .unwrap();
        request.set_tensor(TensorName::PositionIds, Tensor::i64_row(&positions)).unwrap();
        if past_length == 0 {
            for layer in 0..shape.layer_count {
                let empty = Tensor::f32_zeros(&shape.kv_shape(0));
                request.set_tensor(TensorName::PastKey(layer), empty.clone()).unwrap();
                request.set_tensor(TensorName::PastValue(layer), empty).unwrap();
            }
        }
    }

    fn compiled() -> ReferenceCompiledModel {
        ReferenceCompiledModel::new(
            ReferenceModelConfig::new(2, 2, 3, 6).transition(1, 4, 5.0).transition(4, 2, 5.0),
        )
    }

    #[test]
    fn test_prefill_produces_logits_and_present_cache() {
        let model = compiled();
        let shape = model.shape();
        let mut request = model.create_request().unwrap();
        feed(request.as_mut(), shape, &[3, 1], 0);
        request.infer(&CancellationToken::new()).unwrap();

        let logits = request.tensor(TensorName::Logits).unwrap();
        assert_eq!(logits.shape(), &[1, 2, 6]);
        assert_eq!(logits.as_f32().unwrap()[[0, 1, 4]], 5.0);

        let key = request.tensor(TensorName::PresentKey(1)).unwrap();
        assert_eq!(key.shape(), &[1, 2, 2, 3]);
        assert_eq!(key.as_f32().unwrap()[[0, 1, 1, 2]], 1.0);
    }

    #[test]
    fn test_mismatched_position_ids_are_rejected() {
        let model = compiled();
        let shape = model.shape();
        let mut request = model.create_request().unwrap();
        feed(request.as_mut(), shape, &[3], 0);
        request.set_tensor(TensorName::PositionIds, Tensor::i64_row(&[7])).unwrap();

        let error = request.infer(&CancellationToken::new()).unwrap_err();
        assert!(matches!(error, BackendError::InvalidInput(_)));
    }

    #[test]
    fn test_missing_layer_cache_is_reported() {
        let model = compiled();
        let mut request = model.create_request().unwrap();
        request.set_tensor(TensorName::InputIds, Tensor::i64_row(&[1])).unwrap();
        request.set_tensor(TensorName::AttentionMask, Tensor::i64_row(&[1])).unwrap();
        request.set_tensor(TensorName::PositionIds, Tensor::i64_row(&[0])).unwrap();

        let error = request.infer(&CancellationToken::new()).unwrap_err();
        assert!(matches!(error, BackendError::MissingTensor(TensorName::PastKey(0))));
    }

    #[test]
    fn test_cancelled_token_aborts_inference() {
        let model = compiled();
        let shape = model.shape();
        let mut request = model.create_request().unwrap();
        feed(request.as_mut(), shape, &[1], 0);
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        assert!(matches!(request.infer(&cancellation), Err(BackendError::Cancelled)));
        assert!(request.tensor(TensorName::Logits).is_err());
    }

    #[test]
    fn test_compile_records_thread_count() {
        let directory = tempfile::tempdir().unwrap();
        ReferenceModelConfig::new(2, 1, 2, 4).save(directory.path()).unwrap();

        let options = CompileOptions {
            thread_count: Some(3),
            ..CompileOptions::default()
        };
        let model = ReferenceModel::new().compile(directory.path(), &options).unwrap();
        assert_eq!(model.thread_count(), Some(3));
        assert_eq!(model.shape().layer_count, 2);

        let model = ReferenceModel::new()
            .compile(directory.path(), &CompileOptions::default())
            .unwrap();
        assert_eq!(model.thread_count(), None);
    }

    #[test]
    fn test_outputs_cannot_be_bound_as_inputs() {
        let model = compiled();
        let mut request = model.create_request().unwrap();
        let result = request.set_tensor(TensorName::Logits, Tensor::f32_zeros(&[1]));
        assert!(matches!(result, Err(BackendError::InvalidInput(_))));
    }
}
