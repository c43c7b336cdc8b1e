//! Tensor containers exchanged with the inference backend.
//!
//! These types carry data and metadata only. All tensor math happens inside
//! the wrapped engine; the adapter just moves buffers across the seam.

use crate::error::{EngineError, EngineResult};

/// A dense f32 tensor handed to, or received from, the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Builds a tensor, checking that `data` has exactly as many elements as
    /// `shape` calls for. An empty shape denotes a scalar (one element).
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> EngineResult<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(EngineError::ElementCount {
                expected,
                got: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// A tensor of the given shape filled with zeros. Handy for warm-up and
    /// demo inputs.
    #[must_use]
    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }

    /// A scalar tensor (empty shape, single element).
    #[must_use]
    pub fn scalar(value: f32) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// The tensor's shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The raw element buffer, row-major.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Number of elements held.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.data.len()
    }

    /// Consumes the tensor and returns `(shape, data)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<usize>, Vec<f32>) {
        (self.shape, self.data)
    }
}

/// Engine-reported metadata for a single model input or output.
///
/// Dimensions come straight from the loaded graph; a negative value means
/// the engine left that dimension dynamic (batch size, image size, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    /// The blob name the engine knows this tensor by.
    pub name: String,
    /// Declared dimensions, `-1` for dynamic ones.
    pub dims: Vec<i64>,
}

impl TensorSpec {
    /// Creates a spec from a name and declared dimensions.
    pub fn new(name: impl Into<String>, dims: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            dims,
        }
    }

    /// `true` if any dimension is dynamic.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.dims.iter().any(|d| *d < 0)
    }

    /// Checks a concrete shape against the declaration: the rank must match
    /// and every static dimension must agree. Dynamic dimensions accept
    /// anything.
    #[must_use]
    pub fn is_compatible(&self, shape: &[usize]) -> bool {
        if shape.len() != self.dims.len() {
            return false;
        }
        self.dims
            .iter()
            .zip(shape)
            .all(|(declared, actual)| *declared < 0 || *declared as usize == *actual)
    }

    /// Concrete dimensions with every dynamic one pinned to 1, for building
    /// placeholder inputs.
    #[must_use]
    pub fn concrete_dims(&self) -> Vec<usize> {
        self.dims
            .iter()
            .map(|d| if *d < 0 { 1 } else { *d as usize })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_rejects_wrong_element_count() {
        let err = Tensor::new(vec![2, 3], vec![0.0; 5]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::ElementCount {
                expected: 6,
                got: 5
            }
        ));
    }

    #[test]
    fn scalar_has_one_element_and_empty_shape() {
        let t = Tensor::scalar(7.5);
        assert!(t.shape().is_empty());
        assert_eq!(t.element_count(), 1);
        assert_eq!(t.data(), &[7.5]);
    }

    #[test]
    fn zeros_matches_shape_product() {
        let t = Tensor::zeros(vec![1, 3, 4, 4]);
        assert_eq!(t.element_count(), 48);
        assert!(t.data().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn spec_compatibility_honours_static_dims() {
        let spec = TensorSpec::new("data", vec![1, 3, 224, 224]);
        assert!(spec.is_compatible(&[1, 3, 224, 224]));
        assert!(!spec.is_compatible(&[1, 3, 224, 225]));
        assert!(!spec.is_compatible(&[1, 3, 224]));
    }

    #[test]
    fn spec_compatibility_lets_dynamic_dims_float() {
        let spec = TensorSpec::new("data", vec![-1, 3, -1, -1]);
        assert!(spec.is_dynamic());
        assert!(spec.is_compatible(&[8, 3, 320, 544]));
        assert!(!spec.is_compatible(&[8, 4, 320, 544]));
    }

    #[test]
    fn concrete_dims_pins_dynamic_to_one() {
        let spec = TensorSpec::new("data", vec![-1, 3, 224, -1]);
        assert_eq!(spec.concrete_dims(), vec![1, 3, 224, 1]);
    }

    proptest! {
        #[test]
        fn new_accepts_exactly_matching_buffers(shape in proptest::collection::vec(1usize..5, 0..4)) {
            let len: usize = shape.iter().product();
            prop_assert!(Tensor::new(shape.clone(), vec![0.0; len]).is_ok());
            prop_assert!(Tensor::new(shape, vec![0.0; len + 1]).is_err());
        }

        #[test]
        fn concrete_dims_are_always_compatible(dims in proptest::collection::vec(-1i64..6, 0..4)) {
            let spec = TensorSpec::new("t", dims);
            let concrete = spec.concrete_dims();
            prop_assert!(spec.is_compatible(&concrete));
        }
    }
}
