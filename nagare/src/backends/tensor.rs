use std::fmt;

use ndarray::{Array1, ArrayD, Axis, IxDyn};

/// Typed address of a model input or output.
///
/// Per-layer cache tensors are addressed by index. `Display` renders the
/// conventional string names for engines that bind tensors by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TensorName {
    InputIds,
    AttentionMask,
    PositionIds,
    Logits,
    PastKey(usize),
    PastValue(usize),
    PresentKey(usize),
    PresentValue(usize),
}

impl fmt::Display for TensorName {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            TensorName::InputIds => write!(f, "input_ids"),
            TensorName::AttentionMask => write!(f, "attention_mask"),
            TensorName::PositionIds => write!(f, "position_ids"),
            TensorName::Logits => write!(f, "logits"),
            TensorName::PastKey(layer) => {
                write!(f, "past_key_values.{layer}.key")
            },
            TensorName::PastValue(layer) => {
                write!(f, "past_key_values.{layer}.value")
            },
            TensorName::PresentKey(layer) => write!(f, "present.{layer}.key"),
            TensorName::PresentValue(layer) => {
                write!(f, "present.{layer}.value")
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
}

impl Tensor {
    /// `[1, values.len()]` row of integers, the batch-of-one layout every
    /// integer input uses.
    pub fn i64_row(values: &[i64]) -> Self {
        let row = Array1::from_vec(values.to_vec());
        Tensor::I64(row.insert_axis(Axis(0)).into_dyn())
    }

    pub fn f32_zeros(shape: &[usize]) -> Self {
        Tensor::F32(ArrayD::zeros(IxDyn(shape)))
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Tensor::I64(array) => array.shape(),
            Tensor::F32(array) => array.shape(),
        }
    }

    pub fn as_i64(&self) -> Option<&ArrayD<i64>> {
        match self {
            Tensor::I64(array) => Some(array),
            Tensor::F32(_) => None,
        }
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Tensor::F32(array) => Some(array),
            Tensor::I64(_) => None,
        }
    }

    pub fn into_f32(self) -> Option<ArrayD<f32>> {
        match self {
            Tensor::F32(array) => Some(array),
            Tensor::I64(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_names_render_engine_conventions() {
        assert_eq!(TensorName::InputIds.to_string(), "input_ids");
        assert_eq!(
            TensorName::PastKey(3).to_string(),
            "past_key_values.3.key"
        );
        assert_eq!(TensorName::PresentValue(0).to_string(), "present.0.value");
    }

    #[test]
    fn test_i64_row_is_batch_of_one() {
        let tensor = Tensor::i64_row(&[4, 5, 6]);
        assert_eq!(tensor.shape(), &[1, 3]);
        assert!(tensor.as_f32().is_none());
        assert_eq!(tensor.as_i64().unwrap()[[0, 2]], 6);
    }

    #[test]
    fn test_zero_length_cache_tensor() {
        let tensor = Tensor::f32_zeros(&[1, 4, 0, 64]);
        assert_eq!(tensor.shape(), &[1, 4, 0, 64]);
        assert_eq!(tensor.as_f32().unwrap().len(), 0);
    }
}
