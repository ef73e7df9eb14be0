use super::StaticCompilationTransformer;
use crate::ast::{ExprKind, Expression, MethodCall};
use crate::error::Result;

/// A static call the type checker resolved becomes a bound call on the
/// declaring class, then goes through the method call rewrite.
pub(crate) fn transform_static_method_call(
    t: &StaticCompilationTransformer<'_>,
    expr: Expression,
) -> Result<Expression> {
    let Some(target) = expr.metadata.direct_call_target().cloned() else {
        return t.super_transform(expr);
    };
    let Expression {
        kind,
        position,
        metadata,
    } = expr;
    let ExprKind::StaticMethodCall {
        owner,
        name,
        arguments,
    } = kind
    else {
        return t.super_transform(Expression {
            kind,
            position,
            metadata,
        });
    };
    let call = Expression {
        kind: ExprKind::MethodCall(MethodCall {
            receiver: Box::new(Expression::class_ref(owner).at(position)),
            name,
            arguments,
            implicit_this: false,
            safe: false,
            target: Some(target),
        }),
        position,
        metadata,
    };
    t.transform(call)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::class::ClassTable;
    use crate::ast::types::{MethodDescriptor, TypeRef};
    use crate::ast::{InvokeKind, Literal, MetaKey, MetaValue, MethodRef, SourcePosition};
    use crate::config::CompilerOptions;

    fn static_call(arguments: Vec<Expression>) -> Expression {
        Expression::new(ExprKind::StaticMethodCall {
            owner: TypeRef::class("java.lang.Math"),
            name: "abs".into(),
            arguments,
        })
        .at(SourcePosition::at(2, 1))
    }

    #[test]
    fn resolved_static_call_is_bound_on_its_class() {
        let abs = MethodRef::new(
            "java.lang.Math",
            "abs",
            MethodDescriptor::new(vec![TypeRef::int()], TypeRef::int()),
            InvokeKind::Static,
        );
        let arg = Expression::constant(Literal::Int(-3)).with_type(TypeRef::int());
        let expr = static_call(vec![arg.clone()])
            .with_meta(MetaKey::DirectCallTarget, MetaValue::Method(abs.clone()));
        let classes = ClassTable::new();
        let options = CompilerOptions::default();
        let out = StaticCompilationTransformer::new(&classes, &options)
            .transform(expr)
            .unwrap();
        assert_eq!(out.position, SourcePosition::at(2, 1));
        assert_eq!(out.metadata.direct_call_target(), Some(&abs));
        let ExprKind::MethodCall(call) = out.kind else {
            panic!("expected a bound call");
        };
        assert_eq!(call.target, Some(abs));
        assert_eq!(call.arguments, vec![arg]);
        assert!(!call.implicit_this);
        assert_eq!(call.receiver.kind, ExprKind::ClassRef(TypeRef::class("java.lang.Math")));
    }

    #[test]
    fn unresolved_static_call_stays_dynamic() {
        let expr = static_call(vec![Expression::constant(Literal::Int(1))]);
        let classes = ClassTable::new();
        let options = CompilerOptions::default();
        let out = StaticCompilationTransformer::new(&classes, &options)
            .transform(expr.clone())
            .unwrap();
        assert_eq!(out, expr);
    }
}
