use super::{LOG_CHANNEL, StaticCompilationTransformer};
use crate::ast::{ExprKind, Expression};
use crate::error::Result;

pub(crate) fn transform_closure_expression(
    t: &StaticCompilationTransformer<'_>,
    expr: Expression,
) -> Result<Expression> {
    let Expression {
        kind,
        position,
        metadata,
    } = expr;
    let kind = match kind {
        ExprKind::Closure {
            mut parameters,
            body,
        } => {
            for parameter in &mut parameters {
                if let Some(default) = parameter.default_value.take() {
                    parameter.default_value = Some(t.transform(default)?);
                }
            }
            breadcrumbs::log!(
                breadcrumbs::LogLevel::Info,
                LOG_CHANNEL,
                format!("Rewriting closure body at line {}", position.line)
            );
            ExprKind::Closure {
                parameters,
                body: t.transform_body(body)?,
            }
        }
        other => {
            return t.super_transform(Expression {
                kind: other,
                position,
                metadata,
            });
        }
    };
    Ok(Expression {
        kind,
        position,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::class::{ClassTable, Parameter};
    use crate::ast::types::TypeRef;
    use crate::ast::{BinaryOp, Statement, Variable};
    use crate::config::CompilerOptions;

    #[test]
    fn defaults_and_body_are_rewritten() {
        let x = Expression::variable(Variable::new("x", TypeRef::object(), 1));
        let null_test = Expression::binary(x.clone(), BinaryOp::Equal, Expression::null());
        let closure = Expression::new(ExprKind::Closure {
            parameters: vec![Parameter {
                default_value: Some(null_test.clone()),
                ..Parameter::new("flag", TypeRef::boolean())
            }],
            body: vec![Statement::Return(Some(null_test))],
        });
        let classes = ClassTable::new();
        let options = CompilerOptions::default();
        let out = StaticCompilationTransformer::new(&classes, &options)
            .transform(closure)
            .unwrap();
        let ExprKind::Closure { parameters, body } = out.kind else {
            panic!("closure must survive");
        };
        let expected = ExprKind::CompareToNull {
            expr: Box::new(x),
            equal: true,
        };
        assert_eq!(parameters[0].default_value.as_ref().unwrap().kind, expected);
        assert_eq!(body[0].expression().unwrap().kind, expected);
    }
}
