//! Error types for dense kernel operations.
//!
//! Structured error values carrying a kind and context; kernels never
//! identify themselves through global strings.

use std::fmt;

/// Error type for dense kernel operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Two buffers that must match in length do not.
    LengthMismatch {
        operation: String,
        expected: usize,
        got: usize,
    },

    /// A loop program would step past the end of a buffer.
    StrideOverrun {
        operation: String,
        operand: &'static str,
        required: usize,
        actual: usize,
    },

    /// A kernel was handed a read-only argument where it must write.
    NotWritable { operation: String, argument: usize },

    /// A kernel was invoked with the wrong number of block arguments.
    ArgCount {
        operation: String,
        expected: usize,
        got: usize,
    },

    /// Generic operation error with context.
    OperationError { operation: String, message: String },
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::LengthMismatch {
                operation,
                expected,
                got,
            } => write!(
                f,
                "{}: length mismatch - expected {}, got {}",
                operation, expected, got
            ),

            KernelError::StrideOverrun {
                operation,
                operand,
                required,
                actual,
            } => write!(
                f,
                "{}: loop program requires {} elements of {}, buffer holds {}",
                operation, required, operand, actual
            ),

            KernelError::NotWritable {
                operation,
                argument,
            } => write!(
                f,
                "{}: block argument {} is read-only but must be written",
                operation, argument
            ),

            KernelError::ArgCount {
                operation,
                expected,
                got,
            } => write!(
                f,
                "{}: expected {} block arguments, got {}",
                operation, expected, got
            ),

            KernelError::OperationError { operation, message } => {
                write!(f, "{}: {}", operation, message)
            }
        }
    }
}

impl std::error::Error for KernelError {}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Create a length mismatch error.
    pub fn length_mismatch(operation: impl Into<String>, expected: usize, got: usize) -> Self {
        KernelError::LengthMismatch {
            operation: operation.into(),
            expected,
            got,
        }
    }

    /// Create a stride overrun error.
    pub fn stride_overrun(
        operation: impl Into<String>,
        operand: &'static str,
        required: usize,
        actual: usize,
    ) -> Self {
        KernelError::StrideOverrun {
            operation: operation.into(),
            operand,
            required,
            actual,
        }
    }

    /// Create a not-writable error.
    pub fn not_writable(operation: impl Into<String>, argument: usize) -> Self {
        KernelError::NotWritable {
            operation: operation.into(),
            argument,
        }
    }

    /// Create an argument count error.
    pub fn arg_count(operation: impl Into<String>, expected: usize, got: usize) -> Self {
        KernelError::ArgCount {
            operation: operation.into(),
            expected,
            got,
        }
    }

    /// Create a generic operation error.
    pub fn operation_error(operation: impl Into<String>, message: impl Into<String>) -> Self {
        KernelError::OperationError {
            operation: operation.into(),
            message: message.into(),
        }
    }
}
