use super::{LOG_CHANNEL, StaticCompilationTransformer};
use crate::ast::types::{MAP_CLASS, MethodDescriptor, TypeRef};
use crate::ast::{ExprKind, Expression, InvokeKind, Literal, MethodRef, PropertyInit};
use crate::error::Result;

pub(crate) fn transform_constructor_call(
    t: &StaticCompilationTransformer<'_>,
    expr: Expression,
) -> Result<Expression> {
    let map_style = matches!(&expr.kind, ExprKind::ConstructorCall { ty, arguments }
        if is_map_style(t, ty, arguments, expr.metadata.direct_call_target()));
    if !map_style {
        return t.super_transform(expr);
    }

    let Expression {
        kind,
        position,
        metadata,
    } = expr;
    let ExprKind::ConstructorCall { ty, arguments } = kind else {
        return t.super_transform(Expression {
            kind,
            position,
            metadata,
        });
    };
    let entries = match arguments.into_iter().next().map(|a| a.kind) {
        Some(ExprKind::Map(entries)) => entries,
        _ => Vec::new(),
    };
    let class_name = ty.class_name().unwrap_or_default().to_string();

    let mut inits = Vec::with_capacity(entries.len());
    for entry in entries {
        let ExprKind::Constant(Literal::String(name)) = entry.key.kind else {
            continue;
        };
        let setter = t
            .classes()
            .find_property(&class_name, &name)
            .map(|(owner, property)| {
                MethodRef::new(
                    owner,
                    property.setter_name(),
                    MethodDescriptor::new(vec![property.ty.clone()], TypeRef::void()),
                    InvokeKind::Virtual,
                )
            });
        inits.push(PropertyInit {
            name,
            value: t.transform(entry.value)?,
            setter,
        });
    }
    breadcrumbs::log!(
        breadcrumbs::LogLevel::Info,
        LOG_CHANNEL,
        format!("Map-style construction of {} with {} properties", ty, inits.len())
    );
    Ok(Expression {
        kind: ExprKind::MapStyleConstructor { ty, entries: inits },
        position,
        metadata,
    })
}

/// `new Foo(a: 1, b: 2)` bound to the checker's synthetic map constructor
/// that the class does not actually declare.
fn is_map_style(
    t: &StaticCompilationTransformer<'_>,
    ty: &TypeRef,
    arguments: &[Expression],
    target: Option<&MethodRef>,
) -> bool {
    let Some(target) = target else {
        return false;
    };
    let Some(class_name) = ty.class_name() else {
        return false;
    };
    let takes_map = matches!(target.descriptor.params.as_slice(), [param] if param.is_class(MAP_CLASS));
    if !target.synthetic
        || !takes_map
        || t.classes().declares_constructor(class_name, &target.descriptor)
    {
        return false;
    }
    match arguments {
        [Expression {
            kind: ExprKind::Map(entries),
            ..
        }] => entries
            .iter()
            .all(|e| matches!(e.key.kind, ExprKind::Constant(Literal::String(_)))),
        _ => false,
    }
}
