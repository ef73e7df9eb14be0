use super::{LOG_CHANNEL, StaticCompilationTransformer};
use crate::ast::types::{PrimitiveKind, TypeRef};
use crate::ast::{BinaryOp, ExprKind, Expression, MethodCall, SourcePosition};
use crate::error::Result;

pub(crate) fn transform_method_call(
    t: &StaticCompilationTransformer<'_>,
    expr: Expression,
) -> Result<Expression> {
    let Expression {
        kind,
        position,
        metadata,
    } = expr;
    let ExprKind::MethodCall(mut call) = kind else {
        return t.super_transform(Expression {
            kind,
            position,
            metadata,
        });
    };

    if call.target.is_none() {
        call.target = metadata.direct_call_target().cloned();
    }
    call.receiver = Box::new(t.transform(*call.receiver)?);
    call.arguments = t.transform_all(call.arguments)?;

    if t.options().array_index_rewrite {
        match try_array_access(call, position) {
            Ok(rewritten) => {
                breadcrumbs::log!(
                    breadcrumbs::LogLevel::Info,
                    LOG_CHANNEL,
                    "Rewrote array index call to direct element access"
                );
                return Ok(rewritten);
            }
            Err(original) => call = original,
        }
    }

    Ok(Expression {
        kind: ExprKind::MethodCall(call),
        position,
        metadata,
    })
}

fn is_int_index(index: &Expression) -> bool {
    if let Some(ty) = index.static_type() {
        if ty.primitive_kind() == Some(PrimitiveKind::Int)
            || ty.unwrapped_kind() == Some(PrimitiveKind::Int)
        {
            return true;
        }
    }
    // an enum constant's ordinal() is an int whatever the call was inferred as
    matches!(
        &index.kind,
        ExprKind::MethodCall(call)
            if call.name == "ordinal"
                && call.arguments.is_empty()
                && call.receiver.static_type().is_some_and(|ty| ty.is_enum())
    )
}

fn element_access(array: Expression, index: Expression, component: TypeRef) -> Expression {
    Expression::binary(array, BinaryOp::Index, index).with_type(component)
}

/// `arr.getAt(i)` / `arr.putAt(i, v)` on an array with an int index.
/// Hands the call back unchanged when it does not qualify.
fn try_array_access(
    call: MethodCall,
    position: SourcePosition,
) -> std::result::Result<Expression, MethodCall> {
    let Some(component) = call
        .receiver
        .static_type()
        .and_then(|ty| ty.component().cloned())
    else {
        return Err(call);
    };
    let qualifies = match (call.name.as_str(), call.arguments.as_slice()) {
        ("getAt", [index]) => is_int_index(index),
        ("putAt", [index, _]) => is_int_index(index),
        _ => false,
    };
    if !qualifies || call.safe {
        return Err(call);
    }

    let MethodCall {
        receiver,
        name,
        arguments,
        implicit_this,
        safe,
        target,
    } = call;
    let rewritten = match <[Expression; 2]>::try_from(arguments) {
        Ok([index, value]) => Expression::binary(
            element_access(*receiver, index, component.clone()),
            BinaryOp::Assign,
            value,
        )
        .with_type(component),
        Err(arguments) => match <[Expression; 1]>::try_from(arguments) {
            Ok([index]) => element_access(*receiver, index, component),
            Err(arguments) => {
                return Err(MethodCall {
                    receiver,
                    name,
                    arguments,
                    implicit_this,
                    safe,
                    target,
                });
            }
        },
    };
    Ok(rewritten.at(position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::class::ClassTable;
    use crate::ast::types::MethodDescriptor;
    use crate::ast::{InvokeKind, Literal, MetaKey, MetaValue, MethodRef, Variable};
    use crate::config::CompilerOptions;

    fn rewrite_with(options: &CompilerOptions, expr: Expression) -> Expression {
        let classes = ClassTable::new();
        StaticCompilationTransformer::new(&classes, options)
            .transform(expr)
            .unwrap()
    }

    fn rewrite(expr: Expression) -> Expression {
        rewrite_with(&CompilerOptions::default(), expr)
    }

    fn int_array() -> Expression {
        Expression::variable(Variable::new("arr", TypeRef::array_of(TypeRef::int()), 1))
    }

    #[test]
    fn get_at_with_boxed_int_index_becomes_element_access() {
        let i = Expression::variable(Variable::new("i", TypeRef::wrapper(PrimitiveKind::Int), 2));
        let call = Expression::method_call(int_array(), "getAt", vec![i.clone()])
            .at(SourcePosition::at(7, 5));
        let out = rewrite(call);
        assert_eq!(out.position, SourcePosition::at(7, 5));
        assert_eq!(out.metadata.inferred_type(), Some(&TypeRef::int()));
        assert_eq!(
            out.kind,
            ExprKind::Binary {
                left: Box::new(int_array()),
                op: BinaryOp::Index,
                right: Box::new(i),
            }
        );
    }

    #[test]
    fn put_at_becomes_element_assignment() {
        let value = Expression::constant(Literal::Int(9)).with_type(TypeRef::int());
        let call = Expression::method_call(
            int_array(),
            "putAt",
            vec![Expression::constant(Literal::Int(0)), value.clone()],
        );
        let ExprKind::Binary { left, op, right } = rewrite(call).kind else {
            panic!("expected an assignment");
        };
        assert_eq!(op, BinaryOp::Assign);
        assert_eq!(*right, value);
        assert!(matches!(left.kind, ExprKind::Binary { op: BinaryOp::Index, .. }));
    }

    #[test]
    fn enum_ordinal_index_qualifies() {
        let colour = Expression::variable(Variable::new("c", TypeRef::enumeration("p.Colour"), 2));
        let ordinal = Expression::method_call(colour, "ordinal", vec![]);
        let out = rewrite(Expression::method_call(int_array(), "getAt", vec![ordinal]));
        assert!(matches!(out.kind, ExprKind::Binary { op: BinaryOp::Index, .. }));
    }

    #[test]
    fn non_int_index_keeps_the_call() {
        let key = Expression::variable(Variable::new("k", TypeRef::string(), 2));
        let call = Expression::method_call(int_array(), "getAt", vec![key]);
        assert_eq!(rewrite(call.clone()), call);

        let list = Expression::variable(Variable::new("l", TypeRef::interface("java.util.List"), 3));
        let call = Expression::method_call(list, "getAt", vec![Expression::constant(Literal::Int(0))]);
        assert_eq!(rewrite(call.clone()), call);
    }

    #[test]
    fn option_disables_the_array_rewrite() {
        let options = CompilerOptions {
            array_index_rewrite: false,
            ..CompilerOptions::default()
        };
        let call = Expression::method_call(int_array(), "getAt", vec![Expression::constant(Literal::Int(0))]);
        assert!(matches!(rewrite_with(&options, call).kind, ExprKind::MethodCall(_)));
    }

    #[test]
    fn direct_call_target_is_bound() {
        let size = MethodRef::new(
            "java.util.List",
            "size",
            MethodDescriptor::new(vec![], TypeRef::int()),
            InvokeKind::Interface,
        );
        let list = Expression::variable(Variable::new("l", TypeRef::interface("java.util.List"), 1));
        let call = Expression::method_call(list, "size", vec![])
            .with_meta(MetaKey::DirectCallTarget, MetaValue::Method(size.clone()));
        let ExprKind::MethodCall(out) = rewrite(call).kind else {
            panic!("expected a method call");
        };
        assert_eq!(out.target, Some(size));
    }
}
