mod array;

pub use array::{Shape, Strides, Tensor, TensorError};
