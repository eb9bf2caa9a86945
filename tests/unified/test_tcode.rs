use crate::util;
use aslc::tcode::Op;
use expect_test::expect;

#[test]
fn arithmetic_into_fresh_temporaries() {
    let dump = util::tcode_dump(
        "
        func main()
          var x : int
          x = 2 + 3;
          write x;
        endfunc
        ",
    );

    expect![[r#"
        FUNCTION main
          LOCAL x int 1
          ILOAD %1 2
          ILOAD %2 3
          ADD %3 %1 %2
          LOAD x %3
          WRITEI x
          RETURN
    "#]]
    .assert_eq(&dump);
}

#[test]
fn booleans_lower_through_iload_and_not() {
    let dump = util::tcode_dump(
        "
        func main()
          var b : bool
          b = 1 < 2 and not false;
          write b;
        endfunc
        ",
    );

    expect![[r#"
        FUNCTION main
          LOCAL b bool 1
          ILOAD %1 1
          ILOAD %2 2
          LT %3 %1 %2
          ILOAD %4 0
          NOT %5 %4
          AND %6 %3 %5
          LOAD b %6
          WRITEI b
          RETURN
    "#]]
    .assert_eq(&dump);
}

#[test]
fn array_copy_unrolls_back_to_front() {
    let dump = util::tcode_dump(
        "
        func main()
          var a, b : array[3] of int
          var i : int
          i = 0;
          while i < 3 do
            a[i] = i;
            i = i + 1;
          endwhile
          b = a;
          write b[1];
        endfunc
        ",
    );

    expect![[r#"
        FUNCTION main
          LOCAL a int 3
          LOCAL b int 3
          LOCAL i int 1
          ILOAD %1 0
          LOAD i %1
          LABEL While1
          ILOAD %2 3
          LT %3 i %2
          FJUMP %3 EndWhile1
          XLOAD a i i
          ILOAD %4 1
          ADD %5 i %4
          LOAD i %5
          UJUMP While1
          LABEL EndWhile1
          ILOAD %6 2
          LOADX %7 a %6
          XLOAD b %6 %7
          ILOAD %8 1
          LOADX %9 a %8
          XLOAD b %8 %9
          ILOAD %10 0
          LOADX %11 a %10
          XLOAD b %10 %11
          ILOAD %12 1
          LOADX %13 b %12
          WRITEI %13
          RETURN
    "#]]
    .assert_eq(&dump);
}

#[test]
fn by_reference_arrays_take_address_at_call_site_only() {
    let (_, code) = util::tcode(
        "
        func f(v : array[3] of int)
          v[0] = 7;
        endfunc

        func main()
          var a : array[3] of int
          f(a);
          write a[0];
        endfunc
        ",
    );

    let f = &code.subroutines[0];
    assert_eq!(f.name, "f");
    assert!(f.params[0].by_reference);
    assert!(f.instructions.iter().all(|i| i.op != Op::Aload));

    // Dentro de `f` el parámetro es un puntero que se carga antes de
    // indexar; la dirección se toma en el sitio de llamada
    assert!(f
        .instructions
        .iter()
        .any(|i| i.op == Op::Load && i.arg2 == "v"));

    let main = &code.subroutines[1];
    assert!(main
        .instructions
        .iter()
        .any(|i| i.op == Op::Aload && i.arg2 == "a"));
}

#[test]
fn integer_arguments_widen_for_float_parameters() {
    let dump = util::tcode_dump(
        "
        func g(x : float) : float
          return x + 1;
        endfunc

        func main()
          write g(2);
        endfunc
        ",
    );

    expect![[r#"
        FUNCTION g
          PARAM _result float
          PARAM x float
          ILOAD %1 1
          FLOAT %2 %1
          FADD %3 x %2
          LOAD _result %3
          RETURN

        FUNCTION main
          PUSH
          ILOAD %2 2
          FLOAT %3 %2
          PUSH %3
          CALL g
          POP
          POP %1
          WRITEF %1
          RETURN
    "#]]
    .assert_eq(&dump);
}

#[test]
fn call_protocol_balances_pushes_and_pops() {
    let (_, code) = util::tcode(
        "
        func add(a : int, b : int) : int
          return a + b;
        endfunc

        func main()
          var r : int
          r = add(1, 2);
          write r;
        endfunc
        ",
    );

    let main = &code.subroutines[1];
    let pushes = main.instructions.iter().filter(|i| i.op == Op::Push).count();
    let pops = main.instructions.iter().filter(|i| i.op == Op::Pop).count();

    // 2 argumentos más el slot de retorno, en ambas direcciones
    assert_eq!(pushes, 3);
    assert_eq!(pops, 3);
    assert_eq!(
        main.instructions
            .iter()
            .filter(|i| i.op == Op::Call)
            .count(),
        1
    );
}

#[test]
fn modulus_expands_to_three_temporaries() {
    let dump = util::tcode_dump(
        "
        func main()
          var m : int
          m = 7 % 3;
          write m;
        endfunc
        ",
    );

    expect![[r#"
        FUNCTION main
          LOCAL m int 1
          ILOAD %1 7
          ILOAD %2 3
          DIV %3 %1 %2
          MUL %4 %3 %2
          SUB %5 %1 %4
          LOAD m %5
          WRITEI m
          RETURN
    "#]]
    .assert_eq(&dump);
}

#[test]
fn negated_relationals_append_a_not() {
    let dump = util::tcode_dump(
        "
        func main()
          var b : bool
          b = 3 != 4;
          write b;
        endfunc
        ",
    );

    expect![[r#"
        FUNCTION main
          LOCAL b bool 1
          ILOAD %1 3
          ILOAD %2 4
          EQ %3 %1 %2
          NOT %4 %3
          LOAD b %4
          WRITEI b
          RETURN
    "#]]
    .assert_eq(&dump);
}

#[test]
fn if_else_uses_the_if_label_family() {
    let dump = util::tcode_dump(
        "
        func main()
          var x : int
          read x;
          if x < 0 then
            write 'n';
          else
            write 'p';
          endif
        endfunc
        ",
    );

    expect![[r#"
        FUNCTION main
          LOCAL x int 1
          READI x
          ILOAD %1 0
          LT %2 x %1
          FJUMP %2 If1
          CHLOAD %3 n
          WRITEC %3
          UJUMP Else1
          LABEL If1
          CHLOAD %4 p
          WRITEC %4
          LABEL Else1
          RETURN
    "#]]
    .assert_eq(&dump);
}

#[test]
fn empty_bodies_still_return() {
    let dump = util::tcode_dump("func main() endfunc");

    expect![[r#"
        FUNCTION main
          RETURN
    "#]]
    .assert_eq(&dump);
}

#[test]
fn every_temporary_is_assigned_once_per_function() {
    let sources = [
        "
        func swap(v : array[2] of int)
          var t : int
          t = v[0];
          v[0] = v[1];
          v[1] = t;
        endfunc

        func main()
          var a : array[2] of int
          a[0] = 1;
          a[1] = 2;
          swap(a);
          write a[0];
        endfunc
        ",
        "
        func main()
          var a, b : array[5] of float
          var i : int
          i = 0;
          while i < 5 do
            a[i] = i * 2;
            i = i + 1;
          endwhile
          b = a;
          write b[4];
        endfunc
        ",
    ];

    for source in sources {
        let (_, code) = util::tcode(source);

        for subroutine in &code.subroutines {
            let mut seen = std::collections::HashSet::new();
            for instruction in &subroutine.instructions {
                let defines = !matches!(
                    instruction.op,
                    Op::Label
                        | Op::Ujump
                        | Op::Fjump
                        | Op::Halt
                        | Op::Push
                        | Op::Return
                        | Op::Xload
                        | Op::Writei
                        | Op::Writef
                        | Op::Writec
                        | Op::Writes
                        | Op::Writeln
                        | Op::Noop
                );

                if defines && instruction.arg1.starts_with('%') {
                    assert!(
                        seen.insert(instruction.arg1.clone()),
                        "temporal {} defined twice in {}",
                        instruction.arg1,
                        subroutine.name
                    );
                }
            }
        }
    }
}

#[test]
fn labels_are_defined_once_and_jumps_resolve() {
    let (_, code) = util::tcode(
        "
        func main()
          var i : int
          i = 0;
          while i < 3 do
            if i % 2 == 0 then
              write i;
            else
              write '.';
            endif
            i = i + 1;
          endwhile
        endfunc
        ",
    );

    for subroutine in &code.subroutines {
        let mut defined = std::collections::HashSet::new();
        for instruction in &subroutine.instructions {
            if instruction.op == Op::Label {
                assert!(
                    defined.insert(instruction.arg1.clone()),
                    "label {} defined twice",
                    instruction.arg1
                );
            }
        }

        for instruction in &subroutine.instructions {
            match instruction.op {
                Op::Ujump => assert!(defined.contains(&instruction.arg1)),
                Op::Fjump => assert!(defined.contains(&instruction.arg2)),
                _ => {}
            }
        }
    }
}
