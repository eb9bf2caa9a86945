use crate::util;

/// Separa el IR en funciones `define … { … }` y verifica por bloque
/// que haya exactamente un terminador y que sea la última instrucción.
fn check_block_terminators(ir: &str) {
    let mut in_function = false;
    let mut block: Vec<&str> = Vec::new();

    let close_block = |block: &mut Vec<&str>| {
        if block.is_empty() {
            return;
        }

        let terminators: Vec<usize> = block
            .iter()
            .enumerate()
            .filter(|(_, line)| {
                let line = line.trim_start();
                line.starts_with("br ") || line.starts_with("ret ") || line.starts_with("call void @exit")
            })
            .map(|(i, _)| i)
            .collect();

        assert_eq!(
            terminators.len(),
            1,
            "block must contain exactly one terminator:\n{}",
            block.join("\n")
        );
        assert_eq!(
            terminators[0],
            block.len() - 1,
            "terminator must be the last instruction:\n{}",
            block.join("\n")
        );

        block.clear();
    };

    for line in ir.lines() {
        if line.starts_with("define ") {
            in_function = true;
            continue;
        }

        if !in_function {
            continue;
        }

        if line.starts_with('}') {
            close_block(&mut block);
            in_function = false;
        } else if line.starts_with("  ") && line.ends_with(':') && !line.starts_with("    ") {
            close_block(&mut block);
        } else if line.starts_with("    ") {
            block.push(line);
        }
    }
}

#[test]
fn scalar_program_lowers_to_allocas_and_typed_ssa() {
    let ir = util::llvm_dump(
        "
        func main()
          var x : int
          x = 2 + 3;
          write x;
        endfunc
        ",
    );

    assert!(ir.contains("@.str.i = constant [3 x i8] c\"%d\\00\""));
    assert!(ir.contains("define dso_local i32 @main() {"));
    assert!(ir.contains("  .entry:"));
    assert!(ir.contains("    %x.addr = alloca i32"));
    assert!(ir.contains("    %.temp.1 = trunc i64 2 to i32"));
    assert!(ir.contains("    %.temp.3 = add i32 %.temp.1, %.temp.2"));
    assert!(ir.contains("    store i32 %.temp.3, i32* %x.addr"));
    assert!(ir.contains("    %x.1 = load i32, i32* %x.addr"));
    assert!(ir.contains(
        "call i32 (i8*, ...) @printf(i8* getelementptr inbounds \
         ([3 x i8], [3 x i8]* @.str.i, i64 0, i64 0), i32 %x.1)"
    ));
    assert!(ir.contains("    ret i32 0"));
    assert!(ir.contains("declare dso_local i32 @printf(i8*, ...)"));

    // Exactamente un alloca por local
    assert_eq!(ir.matches("= alloca ").count(), 1);
    check_block_terminators(&ir);
}

#[test]
fn array_parameters_are_pointers_and_geps_differ_by_base() {
    let ir = util::llvm_dump(
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

    // El parámetro llega como puntero y se guarda en su celda
    assert!(ir.contains("define dso_local void @f(i32* %v) {"));
    assert!(ir.contains("    %v.addr = alloca i32*"));
    assert!(ir.contains("    store i32* %v, i32** %v.addr"));

    // Base puntero: GEP sin el índice mayor; base arreglo: con `i64 0`
    assert!(ir.contains("= getelementptr inbounds i32, i32* %.temp.2, i64 %.idx64.1"));
    assert!(ir.contains("= getelementptr inbounds [3 x i32], [3 x i32]* %a.addr, i64 0, i64 0"));

    assert!(ir.contains("    call void @f(i32* %.temp.1)"));
    assert!(ir.contains("    %a.addr = alloca [3 x i32]"));
    check_block_terminators(&ir);
}

#[test]
fn float_results_widen_to_double_for_printf() {
    let ir = util::llvm_dump(
        "
        func g(x : float) : float
          return x + 1;
        endfunc

        func main()
          write g(2);
        endfunc
        ",
    );

    assert!(ir.contains("@.str.f = constant [3 x i8] c\"%g\\00\""));
    assert!(ir.contains("define dso_local float @g(float %x) {"));
    assert!(ir.contains("    %_result.addr = alloca float"));
    assert!(ir.contains("= sitofp i32 %.temp.1 to float"));
    assert!(ir.contains("= fadd float"));
    assert!(ir.contains("    %_result.1 = load float, float* %_result.addr"));
    assert!(ir.contains("    ret float %_result.1"));

    assert!(ir.contains("%.temp.1 = call float @g(float %.temp.3)"));
    assert!(ir.contains("= fpext float %.temp.1 to double"));
    assert!(ir.contains(
        "call i32 (i8*, ...) @printf(i8* getelementptr inbounds \
         ([3 x i8], [3 x i8]* @.str.f, i64 0, i64 0), double %.wrtf.double.1)"
    ));
    check_block_terminators(&ir);
}

#[test]
fn control_flow_synthesizes_continuation_blocks() {
    let ir = util::llvm_dump(
        "
        func main()
          var i : int
          i = 0;
          while i < 3 do
            if i % 2 == 0 then
              write i;
            endif
            i = i + 1;
          endwhile
        endfunc
        ",
    );

    assert!(ir.contains("  While1:"));
    assert!(ir.contains("  EndWhile1:"));
    assert!(ir.contains("  Endif1:"));
    assert!(ir.contains("label %While1"));
    assert!(ir.contains("br i1 "));

    // El salto condicional que cae en una instrucción sin etiqueta
    // propia acuña un bloque de continuación
    assert!(ir.contains("  .br.cont.1:"));
    check_block_terminators(&ir);
}

#[test]
fn booleans_read_as_integers_through_the_global_cell() {
    let ir = util::llvm_dump(
        "
        func main()
          var b : bool
          read b;
          write b;
        endfunc
        ",
    );

    assert!(ir.contains("@.global.i.addr = common dso_local global i32 0"));
    assert!(ir.contains(
        "call i32 (i8*, ...) @__isoc99_scanf(i8* getelementptr inbounds \
         ([3 x i8], [3 x i8]* @.str.i, i64 0, i64 0), i32* @.global.i.addr)"
    ));
    assert!(ir.contains("= load i32, i32* @.global.i.addr"));
    assert!(ir.contains("= icmp eq i32 %.readi.global.i.1, 0"));
    assert!(ir.contains("= xor i1 %.readi.i1.cmp1.1, 1"));
    assert!(ir.contains("    store i1 %.readi.i1.not.1, i1* %b.addr"));

    // Al escribirse, el booleano se ensancha a i32
    assert!(ir.contains("= zext i1 %b.1 to i32"));
    assert!(ir.contains("declare dso_local i32 @__isoc99_scanf(i8*, ...)"));
    check_block_terminators(&ir);
}

#[test]
fn strings_intern_with_escapes_and_trailing_nul() {
    let ir = util::llvm_dump(
        "
        func main()
          write \"a\\nb\";
          write 'z';
        endfunc
        ",
    );

    assert!(ir.contains("@.str.s.1 = constant [4 x i8] c\"a\\0Ab\\00\""));
    assert!(ir.contains(
        "call i32 (i8*, ...) @printf(i8* getelementptr inbounds \
         ([4 x i8], [4 x i8]* @.str.s.1, i64 0, i64 0))"
    ));

    // El carácter se materializa por trunc y se escribe con putchar
    assert!(ir.contains("= trunc i32 122 to i8"));
    assert!(ir.contains("call i32 @putchar(i32 "));
    assert!(ir.contains("declare dso_local i32 @putchar(i32)"));
    check_block_terminators(&ir);
}
