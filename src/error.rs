use ristretto_classfile as jvm;
use thiserror::Error;

/// Failures raised while rewriting or emitting a compilation unit.
///
/// Every variant except `Config` is an internal-compiler error: it means an
/// earlier phase handed over a tree this core cannot express, and the unit
/// being compiled must be abandoned.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Cannot generate bytecode for constant: {value} of type: {class_name}")]
    UnsupportedLiteral { value: String, class_name: String },

    #[error("cannot encode pseudo-type {ty} in {context}")]
    UnsupportedType { ty: String, context: String },

    #[error("malformed generics on {ty} in {context}")]
    MalformedGenerics { ty: String, context: String },

    #[error("{construct} is not compiled here ({context})")]
    Unsupported { construct: String, context: String },

    #[error("operand stack underflow at instruction {index}: {instruction}")]
    StackUnderflow { index: usize, instruction: String },

    #[error("operand stack mismatch at instruction {index}: expected {expected}, found {found}")]
    StackMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("internal compiler error in {context}: {message}")]
    Internal { context: String, message: String },

    #[error("invalid compiler options: {0}")]
    Config(#[from] serde_json::Error),

    #[error("class file error: {0:?}")]
    ClassFile(#[from] jvm::Error),
}

impl CompileError {
    pub fn internal(context: impl Into<String>, message: impl Into<String>) -> Self {
        CompileError::Internal {
            context: context.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
