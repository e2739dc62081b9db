//! Host tensors passed to and from executables.

use crate::error::{ExecError, Result};
use bytemuck::Pod;
use tessel_core::{ElementType, HostScalar, PartialShape, checked_element_count};

/// Tensor bound to an executable call.
///
/// A tensor has a partial shape, which is what call validation sees, and
/// optionally host data with concrete dimensions. Tensors built from data
/// have a static partial shape equal to their dimensions. Output tensors
/// for results with unknown dimensions keep the declared partial shape for
/// their whole life and take whatever concrete dimensions the backend
/// writes, so the same tensor can be bound to call after call.
///
/// Backends clear the written flag of every output before a call and check
/// it afterwards: zero-filled or stale data from an earlier call does not
/// count as output.
#[derive(Debug, Clone)]
pub struct Tensor {
    data: TensorData,
    shape: PartialShape,
    element_type: ElementType,
    written: bool,
}

impl Tensor {
    /// Create a tensor from a vector with a given shape.
    ///
    /// # Example
    /// ```
    /// # use tessel_runtime::Tensor;
    /// let data = vec![1.0f32, 2.0, 3.0, 4.0];
    /// let tensor = Tensor::from_vec(data, &[2, 2]);
    /// assert_eq!(tensor.shape(), Some(&[2, 2][..]));
    /// ```
    ///
    /// # Panics
    /// Panics if the data length doesn't match the shape.
    pub fn from_vec<T: HostScalar + Pod>(data: Vec<T>, shape: &[usize]) -> Self {
        let expected_len = checked_element_count(shape);
        assert_eq!(
            Some(data.len()),
            expected_len,
            "Data length {} doesn't match shape {:?} (expected {:?})",
            data.len(),
            shape,
            expected_len
        );

        Self {
            data: TensorData::host(bytemuck::cast_slice::<T, u8>(&data).to_vec(), shape),
            shape: PartialShape::from_static(shape),
            element_type: T::ELEMENT_TYPE,
            written: false,
        }
    }

    /// Create a tensor over caller-supplied bytes.
    ///
    /// # Errors
    /// Returns an error if the element type is dynamic or the byte length
    /// doesn't match the shape.
    pub fn from_bytes(data: Vec<u8>, shape: &[usize], element_type: ElementType) -> Result<Self> {
        let expected = byte_len(element_type, shape)?;
        if data.len() != expected {
            return Err(ExecError::Tensor(format!(
                "{} bytes supplied for {element_type} tensor of shape {:?} (expected {expected})",
                data.len(),
                shape
            )));
        }

        Ok(Self {
            data: TensorData::host(data, shape),
            shape: PartialShape::from_static(shape),
            element_type,
            written: false,
        })
    }

    /// Create a zero-filled tensor.
    ///
    /// # Errors
    /// Returns an error if the element type is dynamic.
    pub fn zeros(element_type: ElementType, shape: &[usize]) -> Result<Self> {
        let len = byte_len(element_type, shape)?;
        Ok(Self {
            data: TensorData::host(vec![0; len], shape),
            shape: PartialShape::from_static(shape),
            element_type,
            written: false,
        })
    }

    /// Create a tensor with no data yet, to be written by a backend.
    pub fn unallocated(element_type: ElementType, shape: PartialShape) -> Self {
        Self {
            data: TensorData::Unallocated,
            shape,
            element_type,
            written: false,
        }
    }

    /// Get the element type.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Get the partial shape this tensor admits.
    pub fn partial_shape(&self) -> &PartialShape {
        &self.shape
    }

    /// Get the concrete shape of the current data, if any.
    pub fn shape(&self) -> Option<&[usize]> {
        match &self.data {
            TensorData::Host { dims, .. } => Some(dims),
            TensorData::Unallocated => None,
        }
    }

    /// Get the number of elements currently held.
    pub fn len(&self) -> usize {
        self.shape().map_or(0, |dims| dims.iter().product())
    }

    /// Check if the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the tensor has host data.
    pub fn is_allocated(&self) -> bool {
        matches!(self.data, TensorData::Host { .. })
    }

    /// Check if [`write`](Tensor::write) succeeded since the current call began.
    pub fn is_written(&self) -> bool {
        self.written
    }

    /// Mark the start of a call that will write this tensor.
    pub(crate) fn begin_call(&mut self) {
        self.written = false;
    }

    /// Get raw bytes of the tensor data.
    ///
    /// # Errors
    /// Returns an error if the tensor has not been written.
    pub fn as_bytes(&self) -> Result<&[u8]> {
        match &self.data {
            TensorData::Host { bytes, .. } => Ok(bytes),
            TensorData::Unallocated => Err(ExecError::Tensor(format!(
                "tensor of shape {} has no data",
                self.shape
            ))),
        }
    }

    /// Get a typed slice view of the tensor data.
    ///
    /// # Errors
    /// Returns an error if the type doesn't match, the tensor has no data or
    /// the storage is not aligned for `T`.
    pub fn as_slice<T: HostScalar + Pod>(&self) -> Result<&[T]> {
        self.check_type::<T>()?;
        bytemuck::try_cast_slice(self.as_bytes()?)
            .map_err(|e| ExecError::Tensor(format!("cannot view tensor data: {e}")))
    }

    /// Convert tensor data to a Vec.
    ///
    /// # Errors
    /// Returns an error if the type doesn't match or the tensor has no data.
    pub fn to_vec<T: HostScalar + Pod>(&self) -> Result<Vec<T>> {
        self.check_type::<T>()?;
        Ok(bytemuck::pod_collect_to_vec(self.as_bytes()?))
    }

    /// Replace the tensor data with `data` of the given concrete shape.
    ///
    /// The partial shape is left untouched; `shape` must be one of its
    /// instantiations.
    ///
    /// # Errors
    /// Returns an error if the type doesn't match, the data length doesn't
    /// match `shape`, or `shape` is not admitted by the partial shape.
    pub fn write<T: HostScalar + Pod>(&mut self, data: &[T], shape: &[usize]) -> Result<()> {
        self.check_type::<T>()?;

        let concrete = PartialShape::from_static(shape);
        if !self.shape.relaxes(&concrete) {
            return Err(ExecError::Tensor(format!(
                "cannot write shape {concrete} into tensor of shape {}",
                self.shape
            )));
        }

        let expected_len = checked_element_count(shape).ok_or_else(|| {
            ExecError::Tensor(format!("element count of shape {concrete} overflows"))
        })?;
        if data.len() != expected_len {
            return Err(ExecError::Tensor(format!(
                "{} elements supplied for shape {concrete} (expected {expected_len})",
                data.len()
            )));
        }

        self.data = TensorData::host(bytemuck::cast_slice::<T, u8>(data).to_vec(), shape);
        self.written = true;
        Ok(())
    }

    fn check_type<T: HostScalar>(&self) -> Result<()> {
        if T::ELEMENT_TYPE != self.element_type {
            return Err(ExecError::Tensor(format!(
                "requested {} from a {} tensor",
                T::ELEMENT_TYPE,
                self.element_type
            )));
        }
        Ok(())
    }
}

/// Internal tensor data representation.
#[derive(Debug, Clone)]
enum TensorData {
    /// Data in host memory with its concrete dimensions.
    Host { bytes: Vec<u8>, dims: Vec<usize> },

    /// Not yet written.
    Unallocated,
}

impl TensorData {
    fn host(bytes: Vec<u8>, dims: &[usize]) -> Self {
        TensorData::Host {
            bytes,
            dims: dims.to_vec(),
        }
    }
}

pub(crate) fn byte_len(element_type: ElementType, shape: &[usize]) -> Result<usize> {
    if element_type.is_dynamic() {
        return Err(ExecError::Tensor(
            "cannot store data for a dynamic element type".to_string(),
        ));
    }
    checked_element_count(shape)
        .and_then(|count| count.checked_mul(element_type.size()))
        .ok_or_else(|| ExecError::Tensor(format!("byte size of shape {shape:?} overflows")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::Dimension;

    #[test]
    fn test_tensor_from_vec() {
        let data = vec![1.0f32, 2.0, 3.0, 4.0];
        let tensor = Tensor::from_vec(data, &[2, 2]);

        assert_eq!(tensor.shape(), Some(&[2, 2][..]));
        assert_eq!(tensor.partial_shape(), &PartialShape::from_static(&[2, 2]));
        assert_eq!(tensor.element_type(), ElementType::F32);
        assert_eq!(tensor.len(), 4);
        assert!(!tensor.is_empty());
        assert!(tensor.is_allocated());
    }

    #[test]
    fn test_tensor_to_vec() {
        let data = vec![1i64, -2, 3];
        let tensor = Tensor::from_vec(data.clone(), &[3]);

        assert_eq!(tensor.to_vec::<i64>().unwrap(), data);
        assert!(tensor.to_vec::<f32>().is_err());
    }

    #[test]
    #[should_panic(expected = "doesn't match shape")]
    fn test_tensor_shape_mismatch() {
        let data = vec![1.0f32, 2.0, 3.0];
        Tensor::from_vec(data, &[2, 2]); // Should panic
    }

    #[test]
    fn test_from_bytes_checks_length() {
        let ok = Tensor::from_bytes(vec![0; 16], &[2, 2], ElementType::F32);
        assert!(ok.is_ok());

        let short = Tensor::from_bytes(vec![0; 12], &[2, 2], ElementType::F32);
        assert!(matches!(short, Err(ExecError::Tensor(_))));

        let dynamic = Tensor::from_bytes(vec![], &[0], ElementType::Dynamic);
        assert!(dynamic.is_err());
    }

    #[test]
    fn test_zeros() {
        let tensor = Tensor::zeros(ElementType::I32, &[3]).unwrap();
        assert_eq!(tensor.to_vec::<i32>().unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn test_write_into_partial_tensor() {
        let declared = PartialShape::new(vec![Dimension::Dynamic, Dimension::Static(2)]);
        let mut tensor = Tensor::unallocated(ElementType::F32, declared.clone());
        assert!(!tensor.is_allocated());
        assert!(tensor.as_bytes().is_err());
        assert_eq!(tensor.shape(), None);
        assert_eq!(tensor.len(), 0);

        tensor.write(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2]).unwrap();
        assert_eq!(tensor.shape(), Some(&[3, 2][..]));
        assert_eq!(tensor.partial_shape(), &declared);
        assert_eq!(
            tensor.to_vec::<f32>().unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );

        // A later write may pick different concrete dimensions.
        tensor.write(&[9.0f32, 9.0], &[1, 2]).unwrap();
        assert_eq!(tensor.shape(), Some(&[1, 2][..]));
        assert!(tensor.write(&[1.0f32, 2.0, 3.0], &[1, 3]).is_err());
    }

    #[test]
    fn test_write_rejects_incompatible_data() {
        let mut tensor = Tensor::zeros(ElementType::F32, &[2]).unwrap();
        assert!(tensor.write(&[1.0f32, 2.0, 3.0], &[3]).is_err());
        assert!(tensor.write(&[1.0f32], &[2]).is_err());
        assert!(tensor.write(&[1i32, 2], &[2]).is_err());
        assert!(tensor.write(&[7.0f32, 8.0], &[2]).is_ok());
        assert_eq!(tensor.to_vec::<f32>().unwrap(), vec![7.0, 8.0]);
    }

    #[test]
    fn test_written_flag() {
        let mut tensor = Tensor::zeros(ElementType::F32, &[2]).unwrap();
        assert!(tensor.is_allocated());
        assert!(!tensor.is_written()); // zero fill is not a write

        tensor.write(&[1.0f32, 2.0], &[2]).unwrap();
        assert!(tensor.is_written());

        tensor.begin_call();
        assert!(!tensor.is_written());
        assert_eq!(tensor.to_vec::<f32>().unwrap(), vec![1.0, 2.0]);

        // A rejected write leaves the flag alone.
        assert!(tensor.write(&[1.0f32], &[1]).is_err());
        assert!(!tensor.is_written());
    }

    #[test]
    fn test_overflowing_shapes_rejected() {
        let huge = [usize::MAX / 2 + 1, 4];
        assert!(matches!(
            Tensor::zeros(ElementType::F32, &huge),
            Err(ExecError::Tensor(_))
        ));
        assert!(Tensor::from_bytes(vec![], &huge, ElementType::U8).is_err());
        // Element count fits, byte count does not.
        assert!(Tensor::zeros(ElementType::F64, &[usize::MAX / 4]).is_err());

        let mut open = Tensor::unallocated(ElementType::F32, PartialShape::dynamic());
        assert!(matches!(
            open.write::<f32>(&[], &huge),
            Err(ExecError::Tensor(_))
        ));
    }

    #[test]
    #[should_panic(expected = "doesn't match shape")]
    fn test_from_vec_overflowing_shape() {
        Tensor::from_vec(Vec::<u8>::new(), &[usize::MAX, 2]);
    }
}
