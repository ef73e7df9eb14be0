//! Static compilation rewrite.
//!
//! Walks a type-checked expression tree and replaces dynamically dispatched
//! nodes by statically bound ones wherever the type checker left the
//! metadata to do so. A node without usable metadata is rebuilt around its
//! transformed children and otherwise left alone.

pub mod binary;
pub mod boolean;
pub mod closure;
pub mod constructor_call;
pub mod method_call;
pub mod static_call;
pub mod variable;

use crate::ast::class::{ClassTable, MethodNode};
use crate::ast::{ExprKind, Expression, MapEntry, PropertyInit, Statement};
use crate::config::CompilerOptions;
use crate::error::Result;

pub(crate) const LOG_CHANNEL: &str = "sc-transform";

pub struct StaticCompilationTransformer<'a> {
    classes: &'a ClassTable,
    options: &'a CompilerOptions,
}

impl<'a> StaticCompilationTransformer<'a> {
    pub fn new(classes: &'a ClassTable, options: &'a CompilerOptions) -> Self {
        StaticCompilationTransformer { classes, options }
    }

    pub fn classes(&self) -> &'a ClassTable {
        self.classes
    }

    pub fn options(&self) -> &'a CompilerOptions {
        self.options
    }

    /// Rewrites one expression, dispatching on its kind.
    pub fn transform(&self, expr: Expression) -> Result<Expression> {
        match &expr.kind {
            ExprKind::StaticMethodCall { .. } => static_call::transform_static_method_call(self, expr),
            ExprKind::Binary { .. } => binary::transform_binary_expression(self, expr),
            ExprKind::MethodCall(_) => method_call::transform_method_call(self, expr),
            ExprKind::Closure { .. } => closure::transform_closure_expression(self, expr),
            ExprKind::ConstructorCall { .. } => {
                constructor_call::transform_constructor_call(self, expr)
            }
            ExprKind::Boolean(_) => boolean::transform_boolean_expression(self, expr),
            ExprKind::Variable(_) | ExprKind::DynamicVariable(_) => {
                variable::transform_variable_expression(self, expr)
            }
            _ => self.super_transform(expr),
        }
    }

    pub fn transform_all(&self, exprs: Vec<Expression>) -> Result<Vec<Expression>> {
        exprs.into_iter().map(|e| self.transform(e)).collect()
    }

    pub fn transform_statement(&self, statement: Statement) -> Result<Statement> {
        Ok(match statement {
            Statement::Expression(e) => Statement::Expression(self.transform(e)?),
            Statement::Return(e) => Statement::Return(e.map(|e| self.transform(e)).transpose()?),
        })
    }

    pub fn transform_body(&self, body: Vec<Statement>) -> Result<Vec<Statement>> {
        body.into_iter().map(|s| self.transform_statement(s)).collect()
    }

    /// Rewrites a method's body and its parameter default values in place.
    pub fn transform_method(&self, method: &mut MethodNode) -> Result<()> {
        for parameter in &mut method.parameters {
            if let Some(default) = parameter.default_value.take() {
                parameter.default_value = Some(self.transform(default)?);
            }
        }
        let body = std::mem::take(&mut method.body);
        method.body = self.transform_body(body)?;
        breadcrumbs::log!(
            breadcrumbs::LogLevel::Info,
            LOG_CHANNEL,
            format!("Transformed method {}", method.name)
        );
        Ok(())
    }

    /// Structural revisit: transforms the children, keeps the node itself.
    pub fn super_transform(&self, expr: Expression) -> Result<Expression> {
        let Expression {
            kind,
            position,
            metadata,
        } = expr;
        let kind = match kind {
            ExprKind::Property {
                object,
                property,
                safe,
                implicit_this,
            } => ExprKind::Property {
                object: Box::new(self.transform(*object)?),
                property,
                safe,
                implicit_this,
            },
            ExprKind::Binary { left, op, right } => ExprKind::Binary {
                left: Box::new(self.transform(*left)?),
                op,
                right: Box::new(self.transform(*right)?),
            },
            ExprKind::MethodCall(mut call) => {
                call.receiver = Box::new(self.transform(*call.receiver)?);
                call.arguments = self.transform_all(call.arguments)?;
                ExprKind::MethodCall(call)
            }
            ExprKind::StaticMethodCall {
                owner,
                name,
                arguments,
            } => ExprKind::StaticMethodCall {
                owner,
                name,
                arguments: self.transform_all(arguments)?,
            },
            ExprKind::ConstructorCall { ty, arguments } => ExprKind::ConstructorCall {
                ty,
                arguments: self.transform_all(arguments)?,
            },
            ExprKind::Closure { parameters, body } => ExprKind::Closure {
                parameters,
                body: self.transform_body(body)?,
            },
            ExprKind::Boolean(inner) => ExprKind::Boolean(Box::new(self.transform(*inner)?)),
            ExprKind::Not(inner) => ExprKind::Not(Box::new(self.transform(*inner)?)),
            ExprKind::Ternary {
                condition,
                then,
                otherwise,
            } => ExprKind::Ternary {
                condition: Box::new(self.transform(*condition)?),
                then: Box::new(self.transform(*then)?),
                otherwise: Box::new(self.transform(*otherwise)?),
            },
            ExprKind::List(elements) => ExprKind::List(self.transform_all(elements)?),
            ExprKind::Map(entries) => ExprKind::Map(
                entries
                    .into_iter()
                    .map(|entry| {
                        Ok(MapEntry {
                            key: self.transform(entry.key)?,
                            value: self.transform(entry.value)?,
                        })
                    })
                    .collect::<Result<_>>()?,
            ),
            ExprKind::Cast { ty, expr } => ExprKind::Cast {
                ty,
                expr: Box::new(self.transform(*expr)?),
            },
            ExprKind::TruthTest { expr, strategy } => ExprKind::TruthTest {
                expr: Box::new(self.transform(*expr)?),
                strategy,
            },
            ExprKind::CompareToNull { expr, equal } => ExprKind::CompareToNull {
                expr: Box::new(self.transform(*expr)?),
                equal,
            },
            ExprKind::MapStyleConstructor { ty, entries } => ExprKind::MapStyleConstructor {
                ty,
                entries: entries
                    .into_iter()
                    .map(|entry| {
                        Ok(PropertyInit {
                            value: self.transform(entry.value)?,
                            ..entry
                        })
                    })
                    .collect::<Result<_>>()?,
            },
            leaf @ (ExprKind::Constant(_)
            | ExprKind::Variable(_)
            | ExprKind::DynamicVariable(_)
            | ExprKind::This
            | ExprKind::ClassRef(_)) => leaf,
        };
        Ok(Expression {
            kind,
            position,
            metadata,
        })
    }
}
