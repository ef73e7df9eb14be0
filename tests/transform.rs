use sc_codegen_jvm::ast::{
    BinaryOp, ClassTable, ExprKind, Expression, InvokeKind, Literal, MetaKey, MetaValue,
    MethodCall, MethodDescriptor, MethodRef, PrimitiveKind, SourcePosition, TypeRef, Variable,
};
use sc_codegen_jvm::bytecode::adapter::SCRIPT_BYTECODE_ADAPTER;
use sc_codegen_jvm::config::CompilerOptions;
use sc_codegen_jvm::transform_expression;

fn rewrite(expr: Expression) -> Expression {
    transform_expression(expr, &ClassTable::new(), &CompilerOptions::default()).unwrap()
}

fn var(name: &str, ty: TypeRef, index: u16) -> Expression {
    Expression::variable(Variable::new(name, ty, index))
}

fn operator_target(name: &str, param: TypeRef, ret: TypeRef) -> MethodRef {
    MethodRef::new(
        "org.example.Money",
        name,
        MethodDescriptor::new(vec![param], ret),
        InvokeKind::Virtual,
    )
}

fn call_of(expr: &Expression) -> &MethodCall {
    match &expr.kind {
        ExprKind::MethodCall(call) => call,
        other => panic!("expected a method call, got {:?}", other),
    }
}

#[test]
fn every_comparison_adapter_name_is_substituted() {
    let adapters = [
        "compareEqual",
        "compareGreaterThan",
        "compareGreaterThanEqual",
        "compareLessThan",
        "compareLessThanEqual",
        "compareNotEqual",
        "compareTo",
    ];
    let money = TypeRef::class("org.example.Money");
    for name in adapters {
        let target = operator_target(name, TypeRef::object(), TypeRef::boolean());
        let expr = Expression::binary(
            var("a", money.clone(), 1),
            BinaryOp::LessThan,
            var("b", money.clone(), 2),
        )
        .with_meta(MetaKey::BinaryOperatorTarget, MetaValue::Method(target));

        let out = rewrite(expr);
        let call = call_of(&out);
        assert_eq!(call.name, name);
        assert_eq!(
            call.receiver.kind,
            ExprKind::ClassRef(TypeRef::class(SCRIPT_BYTECODE_ADAPTER)),
            "{} must be routed to the runtime helper",
            name
        );
        assert_eq!(call.arguments.len(), 2);
    }
}

#[test]
fn plus_assign_wraps_the_operator_call_in_an_assignment() {
    let money = TypeRef::class("org.example.Money");
    let total = var("total", money.clone(), 1);
    let plus = operator_target("plus", money.clone(), money.clone());
    let expr = Expression::binary(total.clone(), BinaryOp::PlusAssign, var("fee", money, 2))
        .with_meta(MetaKey::BinaryOperatorTarget, MetaValue::Method(plus.clone()))
        .at(SourcePosition::at(3, 5));

    let out = rewrite(expr);
    assert_eq!(out.position, SourcePosition::at(3, 5));
    let ExprKind::Binary { left, op, right } = &out.kind else {
        panic!("expected an assignment, got {:?}", out.kind);
    };
    assert_eq!(*op, BinaryOp::Assign);
    assert_eq!(**left, total);
    let call = call_of(right);
    assert_eq!(call.name, "plus");
    assert_eq!(call.target.as_ref(), Some(&plus));
}

#[test]
fn get_at_on_int_array_with_integer_index_becomes_element_access() {
    let arr = var("arr", TypeRef::array_of(TypeRef::int()), 1);
    let i = var("i", TypeRef::wrapper(PrimitiveKind::Int), 2);
    let out = rewrite(Expression::method_call(arr.clone(), "getAt", vec![i.clone()]));

    let ExprKind::Binary { left, op, right } = &out.kind else {
        panic!("expected element access, got {:?}", out.kind);
    };
    assert_eq!(*op, BinaryOp::Index);
    assert_eq!(**left, arr);
    assert_eq!(**right, i);
    assert_eq!(out.metadata.inferred_type(), Some(&TypeRef::int()));
}

#[test]
fn nodes_without_metadata_are_only_revisited() {
    let tree = Expression::new(ExprKind::Ternary {
        condition: Box::new(Expression::boolean(var("flag", TypeRef::object(), 1))),
        then: Box::new(Expression::binary(
            var("a", TypeRef::object(), 2),
            BinaryOp::Plus,
            Expression::constant(Literal::Int(1)),
        )),
        otherwise: Box::new(Expression::method_call(
            var("a", TypeRef::object(), 2),
            "size",
            vec![],
        )),
    })
    .at(SourcePosition::at(10, 1));

    let options = CompilerOptions {
        optimize_truthiness: false,
        ..CompilerOptions::default()
    };
    let out = transform_expression(tree.clone(), &ClassTable::new(), &options).unwrap();
    let ExprKind::Ternary {
        condition,
        then,
        otherwise,
    } = out.kind
    else {
        panic!("ternary must survive");
    };
    let ExprKind::Ternary {
        then: original_then,
        otherwise: original_otherwise,
        ..
    } = tree.kind
    else {
        unreachable!()
    };
    assert_eq!(then, original_then);
    assert_eq!(otherwise, original_otherwise);
    // truthiness optimisations disabled: the condition goes to the runtime
    assert!(matches!(
        condition.kind,
        ExprKind::Boolean(ref inner) if matches!(inner.kind, ExprKind::TruthTest { .. })
    ));
}
