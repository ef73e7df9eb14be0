//! JVM bytecode emission.
//!
//! Descriptors, conversions and literal loading work against a
//! [`code::CodeBuilder`] and a [`pool::PoolCache`]; the [`writer`] walks
//! rewritten expression trees on top of them and [`jvm_gen`] assembles the
//! class file.

pub mod adapter;
pub mod code;
pub mod consts;
pub mod descriptor;
pub mod helpers;
pub mod jvm_gen;
pub mod pool;
pub mod signature;
pub mod stack;
pub mod writer;

pub use code::{CodeBuilder, Label};
pub use jvm_gen::{MethodCode, compile_class, compile_method, emit_method_body};
pub use pool::PoolCache;
pub use writer::ExpressionWriter;
