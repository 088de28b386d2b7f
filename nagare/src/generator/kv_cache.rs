use ndarray::{ArrayD, IxDyn};

use super::error::GeneratorError;
use crate::backends::{
    BackendError, InferRequest, ModelShape, Tensor, TensorName,
};

/// Cached key and value for one decoder layer, `[1, kv_heads, positions, head_dim]`.
#[derive(Debug, Clone, PartialEq)]
pub struct KvLayer {
    pub key: ArrayD<f32>,
    pub value: ArrayD<f32>,
}

impl KvLayer {
    fn empty(shape: &ModelShape) -> Self {
        let empty = ArrayD::zeros(IxDyn(&shape.kv_shape(0)));
        Self {
            key: empty.clone(),
            value: empty,
        }
    }
}

/// Per-layer cache owned by one session, indexed by layer.
#[derive(Debug, Clone, PartialEq)]
pub struct KvCache {
    shape: ModelShape,
    layers: Vec<KvLayer>,
}

impl KvCache {
    pub fn new(shape: ModelShape) -> Self {
        let layers =
            (0..shape.layer_count).map(|_| KvLayer::empty(&shape)).collect();
        Self {
            shape,
            layers,
        }
    }

    pub fn layers(&self) -> &[KvLayer] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Positions held by the cache.
    pub fn length(&self) -> usize {
        self.layers
            .first()
            .and_then(|layer| layer.key.shape().get(2).copied())
            .unwrap_or(0)
    }

    /// Reallocates every layer at zero length.
    pub fn reset(&mut self) {
        let shape = self.shape;
        for layer in &mut self.layers {
            *layer = KvLayer::empty(&shape);
        }
    }

    /// Moves the cache into `request` as the `past` inputs of the next call.
    ///
    /// The layers stay with the request until [`KvCache::absorb`] replaces
    /// them or [`KvCache::reclaim`] takes them back.
    pub fn bind(
        &mut self,
        request: &mut dyn InferRequest,
    ) -> Result<(), BackendError> {
        let shape = self.shape;
        for (index, layer) in self.layers.iter_mut().enumerate() {
            let KvLayer {
                key,
                value,
            } = std::mem::replace(layer, KvLayer::empty(&shape));
            request.set_tensor(TensorName::PastKey(index), Tensor::F32(key))?;
            request.set_tensor(TensorName::PastValue(index), Tensor::F32(value))?;
        }
        Ok(())
    }

    /// Takes every layer's `present` outputs, which must hold exactly
    /// `length` positions, as the cache for the next call.
    ///
    /// Nothing is taken if any layer fails validation.
    pub fn absorb(
        &mut self,
        request: &mut dyn InferRequest,
        length: usize,
    ) -> Result<(), GeneratorError> {
        let layer_count = self.layers.len();
        let present_count = (0..)
            .take_while(|&index| request.tensor(TensorName::PresentKey(index)).is_ok())
            .count();
        if present_count != layer_count {
            return Err(GeneratorError::LayerCountMismatch {
                expected: layer_count,
                actual: present_count,
            });
        }

        let expected = self.shape.kv_shape(length);
        for index in 0..layer_count {
            for name in [TensorName::PresentKey(index), TensorName::PresentValue(index)]
            {
                Self::check_present(&*request, name, &expected)?;
            }
        }
        for (index, layer) in self.layers.iter_mut().enumerate() {
            layer.key = Self::take_f32(request, TensorName::PresentKey(index))?;
            layer.value = Self::take_f32(request, TensorName::PresentValue(index))?;
        }
        Ok(())
    }

    /// Takes the bound `past` inputs back after a failed call.
    pub fn reclaim(
        &mut self,
        request: &mut dyn InferRequest,
    ) -> Result<(), BackendError> {
        for (index, layer) in self.layers.iter_mut().enumerate() {
            layer.key = Self::take_f32(request, TensorName::PastKey(index))?;
            layer.value = Self::take_f32(request, TensorName::PastValue(index))?;
        }
        Ok(())
    }

    fn check_present(
        request: &dyn InferRequest,
        name: TensorName,
        expected: &[usize],
    ) -> Result<(), BackendError> {
        let array = request
            .tensor(name)?
            .as_f32()
            .ok_or(BackendError::TypeMismatch(name))?;
        if array.shape() != expected {
            return Err(BackendError::ShapeMismatch {
                name,
                expected: expected.to_vec(),
                actual: array.shape().to_vec(),
            });
        }
        Ok(())
    }

    fn take_f32(
        request: &mut dyn InferRequest,
        name: TensorName,
    ) -> Result<ArrayD<f32>, BackendError> {
        request
            .take_tensor(name)?
            .into_f32()
            .ok_or(BackendError::TypeMismatch(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{
        CancellationToken, CompiledModel,
        reference::{ReferenceCompiledModel, ReferenceModelConfig},
    };

    fn run_once(
        cache: &mut KvCache,
        request: &mut dyn InferRequest,
        token_ids: &[i64],
    ) {
        let past_length = cache.length();
        let total = past_length + token_ids.len();
        let positions: Vec<i64> = (past_length as i64..total as i64).collect();
        request.set_tensor(TensorName::InputIds, Tensor::i64_row(token_ids)).unwrap();
        request
            .set_tensor(TensorName::AttentionMask, Tensor::i64_row(&vec![1; total]))
            .unwrap();
        request.set_tensor(TensorName::PositionIds, Tensor::i64_row(&positions)).unwrap();
        cache.bind(request).unwrap();
        request.infer(&CancellationToken::new()).unwrap();
    }

    fn shape() -> ModelShape {
        ModelShape {
            layer_count: 3,
            kv_head_count: 2,
            head_dim: 4,
            vocab_size: 8,
        }
    }

    #[test]
    fn test_new_cache_is_zero_length_for_every_layer() {
        let cache = KvCache::new(shape());
        assert_eq!(cache.layer_count(), 3);
        assert_eq!(cache.length(), 0);
        for layer in cache.layers() {
            assert_eq!(layer.key.shape(), &[1, 2, 0, 4]);
            assert_eq!(layer.value.shape(), &[1, 2, 0, 4]);
        }
    }

    #[test]
    fn test_layers_move_through_the_request_without_copies() {
        let model = ReferenceCompiledModel::new(ReferenceModelConfig::new(3, 2, 4, 8));
        let mut request = model.create_request().unwrap();
        let mut cache = KvCache::new(model.shape());

        run_once(&mut cache, request.as_mut(), &[1, 2]);
        assert_eq!(cache.length(), 0);
        cache.absorb(request.as_mut(), 2).unwrap();
        assert_eq!(cache.length(), 2);
        assert!(matches!(
            request.tensor(TensorName::PresentKey(0)),
            Err(BackendError::MissingTensor(_))
        ));

        run_once(&mut cache, request.as_mut(), &[5]);
        cache.absorb(request.as_mut(), 3).unwrap();
        for layer in cache.layers() {
            assert_eq!(layer.key.shape(), &[1, 2, 3, 4]);
            assert_eq!(layer.key[[0, 1, 2, 3]], 5.0);
            assert_eq!(layer.value[[0, 0, 2, 0]], 2.0);
        }
    }

    #[test]
    fn test_rejected_outputs_are_not_taken_and_cache_is_reclaimed() {
        let model = ReferenceCompiledModel::new(ReferenceModelConfig::new(3, 2, 4, 8));
        let mut request = model.create_request().unwrap();
        let mut cache = KvCache::new(model.shape());
        run_once(&mut cache, request.as_mut(), &[1, 2]);
        cache.absorb(request.as_mut(), 2).unwrap();
        let before = cache.clone();

        run_once(&mut cache, request.as_mut(), &[3]);
        let error = cache.absorb(request.as_mut(), 4).unwrap_err();
        assert!(matches!(
            error,
            GeneratorError::Backend(BackendError::ShapeMismatch { .. })
        ));
        assert!(request.tensor(TensorName::PresentKey(2)).is_ok());

        cache.reclaim(request.as_mut()).unwrap();
        assert_eq!(cache, before);
        assert!(request.tensor(TensorName::PastKey(0)).is_err());
    }
}
