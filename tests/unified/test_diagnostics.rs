use crate::util;
use aslc::{lex::Lexer, parse, source::consume, typecheck::typecheck};

#[test]
fn incompatible_assignment_points_at_the_assign_operator() {
    let errors = util::diagnostics("func main() var a:int a = true; endfunc");

    assert_eq!(
        errors,
        vec![(1, 25, "Assignment with incompatible types".to_string())]
    );
}

#[test]
fn undeclared_identifiers_report_once_and_absorb() {
    let errors = util::diagnostics("func main() var y:int y = (x + 1) * 2; endfunc");

    assert_eq!(errors.len(), 1);
    let (line, column, message) = &errors[0];
    assert_eq!((*line, *column), (1, 28));
    assert_eq!(message, "Identifier `x` is undeclared");
}

#[test]
fn conditions_must_be_boolean() {
    let errors = util::diagnostics("func main() if 1 then write 1; endif endfunc");

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].2, "Instruction requires a boolean condition");
    assert_eq!((errors[0].0, errors[0].1), (1, 13));
}

#[test]
fn arity_mismatches_point_at_the_callee() {
    let errors = util::diagnostics(
        "
        func f(x : int)
        endfunc

        func main()
          f();
        endfunc
        ",
    );

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].2, "Call to `f` with an incorrect number of parameters");
}

#[test]
fn incompatible_arguments_report_their_position() {
    let errors = util::diagnostics(
        "
        func f(x : int, c : char)
        endfunc

        func main()
          f(1, 2);
        endfunc
        ",
    );

    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].2,
        "Parameter #2 in call to `f` has an incompatible type"
    );
}

#[test]
fn missing_or_malformed_main_is_an_error() {
    let errors = util::diagnostics("func start() endfunc");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].2, "There is no `main` function properly declared");

    let errors = util::diagnostics("func main(x : int) endfunc");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].2, "There is no `main` function properly declared");
}

#[test]
fn redeclarations_inside_one_scope_are_rejected() {
    let errors = util::diagnostics("func main() var a:int var a:float a = 1; endfunc");

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].2, "Identifier `a` is already declared in this scope");
}

#[test]
fn array_accesses_validate_base_and_index() {
    let errors = util::diagnostics(
        "
        func main()
          var x : int
          var a : array[3] of int
          var f : float
          x[0] = 1;
          a[f] = 2;
        endfunc
        ",
    );

    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].2, "Array access over a non-array operand");
    assert_eq!(errors[1].2, "Array access with a non-integer index");
}

#[test]
fn return_statements_match_the_signature() {
    let errors = util::diagnostics(
        "
        func f() : int
          return true;
        endfunc

        func g()
          return 1;
        endfunc

        func main()
        endfunc
        ",
    );

    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|(_, _, message)| message == "Return statement incompatible with the function signature"));
}

#[test]
fn integer_return_widens_into_float_functions() {
    let errors = util::diagnostics(
        "
        func h() : float
          return 2;
        endfunc

        func main()
        endfunc
        ",
    );

    assert!(errors.is_empty(), "unexpected: {:?}", errors);
}

#[test]
fn void_calls_are_statements_not_expressions() {
    let errors = util::diagnostics(
        "
        func p()
        endfunc

        func main()
          var x : int
          p();
          x = p();
        endfunc
        ",
    );

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].2, "Call to `p` yields no value inside an expression");
}

#[test]
fn checking_twice_adds_no_new_diagnostics() {
    let mut analyzed = util::analyze("func main() var a:int a = true; endfunc");
    assert_eq!(analyzed.diagnostics.len(), 1);

    typecheck(
        &analyzed.program,
        &mut analyzed.types,
        &mut analyzed.symbols,
        &mut analyzed.decorations,
        &mut analyzed.diagnostics,
    );

    assert_eq!(analyzed.diagnostics.len(), 1);
}

#[test]
fn parse_errors_carry_their_location() {
    let (start, chars) = consume("func main() x = ; endfunc".as_bytes(), "test.asl");
    let tokens = Lexer::new(start.clone(), chars).try_exhaustive().unwrap();

    let error = parse::parse(start, tokens).err().expect("should not parse");
    assert_eq!(error.location().start().column(), 17);
    assert!(error.val().to_string().contains("an expression"));
}
