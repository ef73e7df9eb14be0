use super::{LOG_CHANNEL, StaticCompilationTransformer};
use crate::ast::class::{ClassTable, TruthMethod};
use crate::ast::types::{OBJECT_CLASS, PrimitiveKind, TypeRef};
use crate::ast::{ExprKind, Expression, TruthStrategy};
use crate::config::CompilerOptions;
use crate::error::Result;

pub(crate) fn transform_boolean_expression(
    t: &StaticCompilationTransformer<'_>,
    expr: Expression,
) -> Result<Expression> {
    let Expression {
        kind,
        position,
        metadata,
    } = expr;
    let ExprKind::Boolean(inner) = kind else {
        return t.super_transform(Expression {
            kind,
            position,
            metadata,
        });
    };
    // Composite conditions already produce a boolean; only their leaves need work.
    let composite = matches!(
        inner.kind,
        ExprKind::Not(_)
            | ExprKind::Binary { .. }
            | ExprKind::CompareToNull { .. }
            | ExprKind::TruthTest { .. }
    );
    let Some(ty) = inner.static_type().filter(|_| !composite) else {
        return t.super_transform(Expression {
            kind: ExprKind::Boolean(inner),
            position,
            metadata,
        });
    };

    let strategy = truth_strategy(t.classes(), t.options(), &ty);
    let operand = t.transform(*inner)?;
    let test = Expression::new(ExprKind::TruthTest {
        expr: Box::new(operand),
        strategy,
    })
    .at(position);
    Ok(Expression {
        kind: ExprKind::Boolean(Box::new(test)),
        position,
        metadata,
    })
}

/// Picks how a value of static type `ty` is turned into a truth value.
pub fn truth_strategy(
    classes: &ClassTable,
    options: &CompilerOptions,
    ty: &TypeRef,
) -> TruthStrategy {
    if ty.primitive_kind() == Some(PrimitiveKind::Boolean) {
        return TruthStrategy::Primitive(PrimitiveKind::Boolean);
    }
    if !options.optimize_truthiness || ty.is_void() {
        return TruthStrategy::Dynamic;
    }
    if let Some(kind) = ty.primitive_kind() {
        return TruthStrategy::Primitive(kind);
    }
    if let Some(kind) = ty.unwrapped_kind() {
        return TruthStrategy::Boxed(kind);
    }
    if let Some(name) = ty.class_name() {
        if null_check_is_sound(classes, name) {
            return TruthStrategy::NullCheck;
        }
    }
    breadcrumbs::log!(
        breadcrumbs::LogLevel::Warn,
        LOG_CHANNEL,
        format!("No inline truth test for {}, using runtime conversion", ty)
    );
    TruthStrategy::Dynamic
}

/// `x != null` equals `x.asBoolean()` only when the one applicable
/// `asBoolean` is `Object`'s and no subclass can bring another.
fn null_check_is_sound(classes: &ClassTable, name: &str) -> bool {
    let Some(info) = classes.get(name) else {
        return false;
    };
    // an unseen supertype may bring its own truth rule
    if !classes.is_hierarchy_resolved(name) {
        return false;
    }
    if classes.truth_methods(name) != [TruthMethod::Extension(OBJECT_CLASS.to_string())] {
        return false;
    }
    info.modifiers.is_final()
        || (info.modifiers.is_private()
            && info.outer.is_some()
            && !classes.is_extended_within_outer(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::class::{ClassNode, Modifiers};
    use crate::ast::{BinaryOp, Variable};

    fn strategy_for(classes: &ClassTable, ty: TypeRef) -> TruthStrategy {
        truth_strategy(classes, &CompilerOptions::default(), &ty)
    }

    fn class(name: &str, modifiers: u16, outer: Option<&str>) -> ClassNode {
        ClassNode {
            modifiers: Modifiers(modifiers),
            outer: outer.map(str::to_string),
            ..ClassNode::new(name)
        }
    }

    #[test]
    fn primitives_and_wrappers() {
        let classes = ClassTable::new();
        assert_eq!(
            strategy_for(&classes, TypeRef::boolean()),
            TruthStrategy::Primitive(PrimitiveKind::Boolean)
        );
        assert_eq!(
            strategy_for(&classes, TypeRef::long()),
            TruthStrategy::Primitive(PrimitiveKind::Long)
        );
        assert_eq!(
            strategy_for(&classes, TypeRef::wrapper(PrimitiveKind::Long)),
            TruthStrategy::Boxed(PrimitiveKind::Long)
        );
        assert_eq!(strategy_for(&classes, TypeRef::void()), TruthStrategy::Dynamic);
    }

    #[test]
    fn final_class_gets_a_null_check() {
        let classes = ClassTable::from_classes(&[
            class("p.Sealed", Modifiers::PUBLIC | Modifiers::FINAL, None),
            class("p.Open", Modifiers::PUBLIC, None),
        ]);
        assert_eq!(
            strategy_for(&classes, TypeRef::class("p.Sealed")),
            TruthStrategy::NullCheck
        );
        assert_eq!(strategy_for(&classes, TypeRef::class("p.Open")), TruthStrategy::Dynamic);
        assert_eq!(strategy_for(&classes, TypeRef::string()), TruthStrategy::Dynamic);
    }

    #[test]
    fn private_inner_class_only_when_not_extended() {
        let mut sub = class("p.Outer$Sub", Modifiers::PRIVATE, Some("p.Outer"));
        sub.superclass = TypeRef::class("p.Outer$Base");
        let classes = ClassTable::from_classes(&[
            class("p.Outer$Base", Modifiers::PRIVATE, Some("p.Outer")),
            sub,
            class("p.Outer$Leaf", Modifiers::PRIVATE, Some("p.Outer")),
        ]);
        assert_eq!(
            strategy_for(&classes, TypeRef::class("p.Outer$Base")),
            TruthStrategy::Dynamic
        );
        assert_eq!(
            strategy_for(&classes, TypeRef::class("p.Outer$Leaf")),
            TruthStrategy::NullCheck
        );
    }

    #[test]
    fn final_class_with_unknown_supertype_stays_dynamic() {
        let mut bag = class("p.Bag", Modifiers::PUBLIC | Modifiers::FINAL, None);
        bag.superclass = TypeRef::class("java.util.ArrayList");
        let mut tagged = class("p.Tagged", Modifiers::PUBLIC | Modifiers::FINAL, None);
        tagged.interfaces.push(TypeRef::interface("p.Unknown"));
        let classes = ClassTable::from_classes(&[bag, tagged]);
        assert_eq!(strategy_for(&classes, TypeRef::class("p.Bag")), TruthStrategy::Dynamic);
        assert_eq!(strategy_for(&classes, TypeRef::class("p.Tagged")), TruthStrategy::Dynamic);
    }

    #[test]
    fn declared_as_boolean_blocks_the_null_check() {
        let mut sealed = class("p.Flag", Modifiers::PUBLIC | Modifiers::FINAL, None);
        sealed.methods.push(crate::ast::MethodNode::new(
            "asBoolean",
            vec![],
            TypeRef::boolean(),
        ));
        let classes = ClassTable::from_classes(&[sealed]);
        assert_eq!(strategy_for(&classes, TypeRef::class("p.Flag")), TruthStrategy::Dynamic);
    }

    #[test]
    fn disabled_optimisation_falls_back_to_runtime() {
        let options = CompilerOptions {
            optimize_truthiness: false,
            ..CompilerOptions::default()
        };
        let classes = ClassTable::new();
        assert_eq!(
            truth_strategy(&classes, &options, &TypeRef::int()),
            TruthStrategy::Dynamic
        );
        assert_eq!(
            truth_strategy(&classes, &options, &TypeRef::boolean()),
            TruthStrategy::Primitive(PrimitiveKind::Boolean)
        );
    }

    #[test]
    fn rewrite_wraps_simple_operands_only() {
        let classes = ClassTable::new();
        let options = CompilerOptions::default();
        let t = StaticCompilationTransformer::new(&classes, &options);
        let n = Expression::variable(Variable::new("n", TypeRef::wrapper(PrimitiveKind::Long), 1));

        let out = t.transform(Expression::boolean(n.clone())).unwrap();
        let ExprKind::Boolean(inner) = out.kind else {
            panic!("boolean node must survive");
        };
        assert_eq!(
            inner.kind,
            ExprKind::TruthTest {
                expr: Box::new(n.clone()),
                strategy: TruthStrategy::Boxed(PrimitiveKind::Long),
            }
        );

        let comparison = Expression::boolean(Expression::binary(
            n.clone(),
            BinaryOp::LessThan,
            n.clone(),
        ));
        assert_eq!(t.transform(comparison.clone()).unwrap(), comparison);
        let negated = Expression::boolean(Expression::not(n));
        assert_eq!(t.transform(negated.clone()).unwrap(), negated);
    }
}
