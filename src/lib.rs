#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

//! Static compilation core for a dynamic JVM language.
//!
//! Two stages over a type-checked tree:
//! [`transform`] rewrites dynamically dispatched nodes into statically bound
//! ones using the checker's metadata, and [`bytecode`] lowers the result to
//! JVM instructions and class files.

pub mod ast;
pub mod bytecode;
pub mod config;
pub mod error;
pub mod transform;

use ast::{ClassNode, ClassTable, Expression, MethodNode};
use bytecode::{MethodCode, PoolCache};
use config::CompilerOptions;
use error::Result;
use transform::StaticCompilationTransformer;

/// Rewrites a single expression tree.
pub fn transform_expression(
    expr: Expression,
    classes: &ClassTable,
    options: &CompilerOptions,
) -> Result<Expression> {
    StaticCompilationTransformer::new(classes, options).transform(expr)
}

/// Rewrites and emits one method of `class`, returning its code together
/// with the constant pool the code refers to.
pub fn compile_method(
    class: &ClassNode,
    mut method: MethodNode,
    classes: &ClassTable,
    options: &CompilerOptions,
) -> Result<(MethodCode, PoolCache)> {
    StaticCompilationTransformer::new(classes, options).transform_method(&mut method)?;
    let mut pool = PoolCache::new();
    let code = bytecode::emit_method_body(class, &method, classes, &mut pool)?;
    Ok((code, pool))
}

/// Rewrites every method of `class` and returns the class-file bytes.
pub fn compile_class(class: &ClassNode, classes: &ClassTable, options: &CompilerOptions) -> Result<Vec<u8>> {
    bytecode::compile_class(class, classes, options)
}
