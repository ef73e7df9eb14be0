use super::{LOG_CHANNEL, StaticCompilationTransformer};
use crate::ast::types::{PrimitiveKind, TypeRef};
use crate::ast::{
    BinaryOp, ExprKind, Expression, Literal, MetaKey, Metadata, MethodCall, SourcePosition,
};
use crate::bytecode::adapter::{
    SCRIPT_BYTECODE_ADAPTER, adapter_method, comparison_adapter, is_comparison_adapter,
};
use crate::error::{CompileError, Result};

pub(crate) fn transform_binary_expression(
    t: &StaticCompilationTransformer<'_>,
    expr: Expression,
) -> Result<Expression> {
    let op = match &expr.kind {
        ExprKind::Binary { op, .. } => *op,
        _ => return t.super_transform(expr),
    };

    if matches!(op, BinaryOp::Equal | BinaryOp::NotEqual) {
        if let Some(compare) = try_compare_to_null(t, &expr, op == BinaryOp::Equal)? {
            return Ok(compare);
        }
    }

    let Some(target) = expr.metadata.binary_operator_target().cloned() else {
        return t.super_transform(expr);
    };

    let Expression {
        kind,
        position,
        metadata,
    } = expr;
    let ExprKind::Binary { left, right, .. } = kind else {
        return Err(CompileError::internal("binary transform", "expected a binary node"));
    };
    let left = t.transform(*left)?;
    let right = t.transform(*right)?;

    if let Some(optimized) =
        try_optimize_char_comparison(op, left.clone(), right.clone(), position, &metadata)
    {
        return Ok(optimized);
    }

    let adapter = if is_comparison_adapter(&target.name) {
        Some(adapter_method(&target.name)?)
    } else {
        comparison_adapter(op)?
    };

    let call = match adapter {
        Some(adapter) => {
            breadcrumbs::log!(
                breadcrumbs::LogLevel::Info,
                LOG_CHANNEL,
                format!("Operator {} bound to adapter {}", op.symbol(), adapter.name)
            );
            MethodCall {
                receiver: Box::new(Expression::class_ref(TypeRef::class(SCRIPT_BYTECODE_ADAPTER))),
                name: adapter.name.clone(),
                arguments: vec![left.clone(), right],
                implicit_this: false,
                safe: false,
                target: Some(adapter),
            }
        }
        None => {
            breadcrumbs::log!(
                breadcrumbs::LogLevel::Info,
                LOG_CHANNEL,
                format!("Operator {} bound to {}.{}", op.symbol(), target.owner, target.name)
            );
            MethodCall {
                receiver: Box::new(left.clone()),
                name: target.name.clone(),
                arguments: vec![right],
                implicit_this: false,
                safe: false,
                target: Some(target),
            }
        }
    };
    let call = Expression::new(ExprKind::MethodCall(call)).at(position);

    if op.compound_base().is_some() {
        // the call only computes the new value; store it back
        return Ok(Expression::binary(left, BinaryOp::Assign, call).at(position));
    }
    Ok(call)
}

fn try_compare_to_null(
    t: &StaticCompilationTransformer<'_>,
    expr: &Expression,
    equal: bool,
) -> Result<Option<Expression>> {
    let ExprKind::Binary { left, right, .. } = &expr.kind else {
        return Ok(None);
    };
    let operand = if right.is_null_constant() {
        left
    } else if left.is_null_constant() {
        right
    } else {
        return Ok(None);
    };
    let operand = t.transform(operand.as_ref().clone())?;
    Ok(Some(
        Expression::new(ExprKind::CompareToNull {
            expr: Box::new(operand),
            equal,
        })
        .at(expr.position),
    ))
}

/// A string literal holding exactly one UTF-16 code unit.
fn one_char_constant(expr: &Expression) -> Option<char> {
    match &expr.kind {
        ExprKind::Constant(Literal::String(s)) if s.encode_utf16().count() == 1 => s.chars().next(),
        _ => None,
    }
}

fn has_char_type(expr: &Expression) -> bool {
    expr.static_type().is_some_and(|ty| {
        ty.primitive_kind() == Some(PrimitiveKind::Char)
            || ty.unwrapped_kind() == Some(PrimitiveKind::Char)
    })
}

fn char_constant(c: char, original: &Expression) -> Expression {
    Expression::constant(Literal::Char(c))
        .with_type(TypeRef::Primitive(PrimitiveKind::Char))
        .at(original.position)
}

/// `c == 'x'` with `c` a char: compare chars instead of going through the
/// comparison helper on a one-character string.
fn try_optimize_char_comparison(
    op: BinaryOp,
    left: Expression,
    right: Expression,
    position: SourcePosition,
    metadata: &Metadata,
) -> Option<Expression> {
    if !op.is_comparison() && op != BinaryOp::CompareTo {
        return None;
    }
    let (left, right) = match (one_char_constant(&left), one_char_constant(&right)) {
        (Some(c), None) if has_char_type(&right) => (char_constant(c, &left), right),
        (None, Some(c)) if has_char_type(&left) => (left, char_constant(c, &right)),
        _ => return None,
    };
    let mut metadata = metadata.clone();
    metadata.remove(&MetaKey::BinaryOperatorTarget);
    metadata.remove(&MetaKey::DirectCallTarget);
    Some(Expression {
        kind: ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        position,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::class::ClassTable;
    use crate::ast::types::MethodDescriptor;
    use crate::ast::{InvokeKind, MetaValue, MethodRef, Variable};
    use crate::config::CompilerOptions;

    fn with_target(expr: Expression, target: MethodRef) -> Expression {
        expr.with_meta(MetaKey::BinaryOperatorTarget, MetaValue::Method(target))
    }

    fn rewrite(expr: Expression) -> Expression {
        let classes = ClassTable::new();
        let options = CompilerOptions::default();
        StaticCompilationTransformer::new(&classes, &options)
            .transform(expr)
            .unwrap()
    }

    fn var(name: &str, ty: TypeRef, index: u16) -> Expression {
        Expression::variable(Variable::new(name, ty, index))
    }

    fn equals_target() -> MethodRef {
        MethodRef::new(
            "java.lang.Object",
            "equals",
            MethodDescriptor::new(vec![TypeRef::object()], TypeRef::boolean()),
            InvokeKind::Virtual,
        )
    }

    #[test]
    fn comparison_goes_through_the_adapter() {
        let a = var("a", TypeRef::string(), 1);
        let b = var("b", TypeRef::string(), 2);
        let expr = with_target(Expression::binary(a.clone(), BinaryOp::Equal, b.clone()), equals_target())
            .at(SourcePosition::at(3, 9));
        let out = rewrite(expr);
        assert_eq!(out.position, SourcePosition::at(3, 9));
        let ExprKind::MethodCall(call) = out.kind else {
            panic!("expected a method call, got {:?}", out.kind);
        };
        assert_eq!(call.name, "compareEqual");
        assert_eq!(call.target.as_ref().unwrap().owner, SCRIPT_BYTECODE_ADAPTER);
        assert_eq!(call.arguments, vec![a, b]);
        assert!(matches!(call.receiver.kind, ExprKind::ClassRef(_)));
    }

    #[test]
    fn adapter_named_target_is_substituted_for_any_operator() {
        let target = MethodRef::new(
            "java.lang.Comparable",
            "compareTo",
            MethodDescriptor::new(vec![TypeRef::object()], TypeRef::int()),
            InvokeKind::Interface,
        );
        let expr = with_target(
            Expression::binary(
                var("a", TypeRef::object(), 1),
                BinaryOp::CompareTo,
                var("b", TypeRef::object(), 2),
            ),
            target,
        );
        let ExprKind::MethodCall(call) = rewrite(expr).kind else {
            panic!("expected a method call");
        };
        assert_eq!(call.name, "compareTo");
        assert_eq!(call.target.unwrap().owner, SCRIPT_BYTECODE_ADAPTER);
    }

    #[test]
    fn compound_assignment_stores_the_call_result() {
        let plus = MethodRef::new(
            "java.math.BigDecimal",
            "add",
            MethodDescriptor::new(
                vec![TypeRef::class("java.math.BigDecimal")],
                TypeRef::class("java.math.BigDecimal"),
            ),
            InvokeKind::Virtual,
        );
        let total = var("total", TypeRef::class("java.math.BigDecimal"), 1);
        let step = var("step", TypeRef::class("java.math.BigDecimal"), 2);
        let expr = with_target(
            Expression::binary(total.clone(), BinaryOp::PlusAssign, step.clone()),
            plus,
        );
        let out = rewrite(expr);
        let ExprKind::Binary { left, op, right } = out.kind else {
            panic!("expected an assignment");
        };
        assert_eq!(op, BinaryOp::Assign);
        assert_eq!(*left, total);
        let ExprKind::MethodCall(call) = right.kind else {
            panic!("expected the operator call on the right");
        };
        assert_eq!(call.name, "add");
        assert_eq!(*call.receiver, total);
        assert_eq!(call.arguments, vec![step]);
    }

    #[test]
    fn null_comparison_becomes_compare_to_null() {
        let x = var("x", TypeRef::object(), 1);
        let out = rewrite(Expression::binary(Expression::null(), BinaryOp::NotEqual, x.clone()));
        assert_eq!(
            out.kind,
            ExprKind::CompareToNull {
                expr: Box::new(x),
                equal: false
            }
        );
    }

    #[test]
    fn one_char_string_against_char_keeps_the_binary() {
        let c = var("c", TypeRef::Primitive(PrimitiveKind::Char), 1);
        let expr = with_target(
            Expression::binary(
                c.clone(),
                BinaryOp::Equal,
                Expression::constant(Literal::String("x".into())),
            ),
            equals_target(),
        );
        let out = rewrite(expr);
        assert!(out.metadata.binary_operator_target().is_none());
        let ExprKind::Binary { left, right, .. } = out.kind else {
            panic!("expected the binary to survive");
        };
        assert_eq!(*left, c);
        assert_eq!(right.kind, ExprKind::Constant(Literal::Char('x')));
    }

    #[test]
    fn supplementary_character_string_keeps_the_call() {
        let c = var("c", TypeRef::Primitive(PrimitiveKind::Char), 1);
        let expr = with_target(
            Expression::binary(
                c,
                BinaryOp::Equal,
                Expression::constant(Literal::String("\u{1F600}".into())),
            ),
            equals_target(),
        );
        let ExprKind::MethodCall(call) = rewrite(expr).kind else {
            panic!("a two-unit string is not a char");
        };
        assert_eq!(call.name, "compareEqual");
        assert_eq!(
            call.arguments[1].kind,
            ExprKind::Constant(Literal::String("\u{1F600}".into()))
        );
    }

    #[test]
    fn without_a_target_nothing_is_bound() {
        let expr = Expression::binary(
            var("a", TypeRef::int(), 1),
            BinaryOp::Minus,
            var("b", TypeRef::int(), 2),
        );
        assert_eq!(rewrite(expr.clone()), expr);
    }
}
