use aslc::{
    ast::Program,
    codegen::codegen,
    collect::collect,
    decor::Decorations,
    diag::Diagnostics,
    lex::Lexer,
    llvm,
    parse::parse,
    source::consume,
    symbols::SymTable,
    tcode::Code,
    typecheck::typecheck,
    types::Types,
};

pub(crate) struct Analyzed {
    pub program: Program,
    pub types: Types,
    pub symbols: SymTable,
    pub decorations: Decorations,
    pub diagnostics: Diagnostics,
}

/// Corre lexer, parser y las dos pasadas semánticas sobre un fuente.
pub(crate) fn analyze(source: &str) -> Analyzed {
    let (start, chars) = consume(source.as_bytes(), "test.asl");
    let tokens = Lexer::new(start.clone(), chars)
        .try_exhaustive()
        .expect("lexical errors");
    let program = parse(start, tokens).expect("parse error");

    let mut types = Types::new();
    let mut symbols = SymTable::new();
    let mut decorations = Decorations::new(program.node_count);
    let mut diagnostics = Diagnostics::default();

    collect(
        &program,
        &mut types,
        &mut symbols,
        &mut decorations,
        &mut diagnostics,
    );
    typecheck(
        &program,
        &mut types,
        &mut symbols,
        &mut decorations,
        &mut diagnostics,
    );

    Analyzed {
        program,
        types,
        symbols,
        decorations,
        diagnostics,
    }
}

/// Compila hasta t-code; el fuente no debe tener errores semánticos.
pub(crate) fn tcode(source: &str) -> (Analyzed, Code) {
    let mut analyzed = analyze(source);
    assert!(
        analyzed.diagnostics.is_empty(),
        "unexpected diagnostics:\n{}",
        analyzed.diagnostics
    );

    let code = codegen(
        &analyzed.program,
        &analyzed.types,
        &mut analyzed.symbols,
        &analyzed.decorations,
    );

    (analyzed, code)
}

pub(crate) fn tcode_dump(source: &str) -> String {
    let (_, code) = tcode(source);
    code.to_string()
}

pub(crate) fn llvm_dump(source: &str) -> String {
    let (analyzed, code) = tcode(source);
    llvm::lower(&analyzed.types, &analyzed.symbols, &code).expect("lowering error")
}

/// Diagnósticos como tripletas (línea, columna, mensaje), ya ordenados.
pub(crate) fn diagnostics(source: &str) -> Vec<(u32, u32, String)> {
    let analyzed = analyze(source);
    analyzed
        .diagnostics
        .sorted()
        .iter()
        .map(|error| {
            let start = error.location().start();
            (start.line(), start.column(), error.source().to_string())
        })
        .collect()
}
