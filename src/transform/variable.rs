use super::{LOG_CHANNEL, StaticCompilationTransformer};
use crate::ast::types::TypeRef;
use crate::ast::{ExprKind, Expression, MetaKey, MetaValue};
use crate::error::Result;

pub const CLOSURE_CLASS: &str = "groovy.lang.Closure";

fn property(object: Expression, name: &str, implicit_this: bool) -> Expression {
    Expression::new(ExprKind::Property {
        object: Box::new(object),
        property: name.to_string(),
        safe: false,
        implicit_this,
    })
}

/// Inside a closure, a name the checker resolved through `owner`/`delegate`
/// is turned into the explicit property chain `this.owner.delegate.name`.
pub(crate) fn transform_variable_expression(
    t: &StaticCompilationTransformer<'_>,
    expr: Expression,
) -> Result<Expression> {
    let name = match &expr.kind {
        ExprKind::Variable(v) => v.name.clone(),
        ExprKind::DynamicVariable(name) => name.clone(),
        _ => return t.super_transform(expr),
    };
    let Some(path) = expr.metadata.implicit_receiver().map(str::to_string) else {
        return Ok(expr);
    };
    if path == name {
        return Ok(expr);
    }

    let closure = TypeRef::class(CLOSURE_CLASS);
    let segments: Vec<&str> = path.split('.').collect();
    let mut receiver = Expression::this().with_type(closure.clone());
    for (i, segment) in segments.iter().enumerate() {
        receiver = property(receiver, segment, i == 0);
        if i + 1 < segments.len() {
            receiver = receiver.with_type(closure.clone());
        }
    }
    let owner = expr.metadata.property_owner().cloned().unwrap_or(closure);
    let receiver = receiver
        .with_type(owner)
        .with_meta(MetaKey::ImplicitReceiver, MetaValue::Text(path.clone()));

    let mut metadata = expr.metadata;
    metadata.remove(&MetaKey::ImplicitReceiver);
    let mut rewritten = property(receiver, &name, true).at(expr.position);
    rewritten.metadata.copy_from(&metadata);
    breadcrumbs::log!(
        breadcrumbs::LogLevel::Info,
        LOG_CHANNEL,
        format!("Resolved {} through implicit receiver {}", name, path)
    );
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::class::ClassTable;
    use crate::ast::{SourcePosition, Variable};
    use crate::config::CompilerOptions;

    fn rewrite(expr: Expression) -> Expression {
        let classes = ClassTable::new();
        let options = CompilerOptions::default();
        StaticCompilationTransformer::new(&classes, &options)
            .transform(expr)
            .unwrap()
    }

    fn unpack(expr: &Expression) -> (&Expression, &str, bool) {
        match &expr.kind {
            ExprKind::Property {
                object,
                property,
                implicit_this,
                ..
            } => (object.as_ref(), property.as_str(), *implicit_this),
            other => panic!("expected a property, got {:?}", other),
        }
    }

    #[test]
    fn implicit_receiver_path_becomes_a_property_chain() {
        let expr = Expression::new(ExprKind::DynamicVariable("count".into()))
            .with_meta(MetaKey::ImplicitReceiver, MetaValue::Text("owner.delegate".into()))
            .with_meta(MetaKey::PropertyOwner, MetaValue::Type(TypeRef::class("p.Counter")))
            .with_type(TypeRef::int())
            .at(SourcePosition::at(12, 8));
        let out = rewrite(expr);
        assert_eq!(out.position, SourcePosition::at(12, 8));
        assert_eq!(out.metadata.inferred_type(), Some(&TypeRef::int()));
        assert!(out.metadata.implicit_receiver().is_none());

        let (delegate, name, implicit) = unpack(&out);
        assert_eq!(name, "count");
        assert!(implicit);
        assert_eq!(delegate.metadata.implicit_receiver(), Some("owner.delegate"));
        assert_eq!(delegate.metadata.inferred_type(), Some(&TypeRef::class("p.Counter")));

        let (owner, name, implicit) = unpack(delegate);
        assert_eq!(name, "delegate");
        assert!(!implicit);
        assert_eq!(owner.metadata.inferred_type(), Some(&TypeRef::class(CLOSURE_CLASS)));

        let (this, name, implicit) = unpack(owner);
        assert_eq!(name, "owner");
        assert!(implicit);
        assert_eq!(this.kind, ExprKind::This);
    }

    #[test]
    fn plain_variables_are_untouched() {
        let v = Expression::variable(Variable::new("x", TypeRef::int(), 1));
        assert_eq!(rewrite(v.clone()), v);
        let self_named = Expression::new(ExprKind::DynamicVariable("owner".into()))
            .with_meta(MetaKey::ImplicitReceiver, MetaValue::Text("owner".into()));
        assert_eq!(rewrite(self_named.clone()), self_named);
    }
}
