use anyhow::Context;
use clap::{crate_version, Arg, Command};

use aslc::{
    codegen::codegen,
    collect::collect,
    decor::Decorations,
    diag::Diagnostics,
    lex::Lexer,
    llvm, parse,
    source::consume,
    symbols::SymTable,
    typecheck::typecheck,
    types::Types,
};

use std::{fs::File, io::BufReader, process};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Command::new("aslc")
        .version(crate_version!())
        .about("ASL compiler")
        .arg(
            Arg::new("emit")
                .short('e')
                .long("emit")
                .value_name("FORMAT")
                .takes_value(true)
                .possible_values(["tcode", "llvm", "all"])
                .default_value("all")
                .help("Which artifacts to write to stdout"),
        )
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("FILE")
                .help("ASL source file"),
        )
        .get_matches();

    let emit = args.value_of("emit").unwrap();
    let path = args.value_of("input").unwrap();

    let file = File::open(path).with_context(|| format!("Failed to open for reading: {}", path))?;
    let (start, chars) = consume(BufReader::new(file), path);

    let tokens = match Lexer::new(start.clone(), chars).try_exhaustive() {
        Ok(tokens) => tokens,
        Err(errors) => abort(Diagnostics::from(errors)),
    };

    let program = match parse::parse(start, tokens) {
        Ok(program) => program,
        Err(error) => abort(Diagnostics::from(error)),
    };

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

    // Con errores semánticos no se emite ningún artefacto
    if !diagnostics.is_empty() {
        abort(diagnostics);
    }

    let tcode = codegen(&program, &types, &mut symbols, &decorations);

    if emit == "tcode" || emit == "all" {
        print!("{}", tcode);
    }

    if emit == "llvm" || emit == "all" {
        match llvm::lower(&types, &symbols, &tcode) {
            Ok(ir) => print!("{}", ir),
            Err(error) => {
                eprintln!();
                eprintln!(";;; *****************************************************************************");
                eprintln!(";;; {}", error);
                eprintln!(";;; *****************************************************************************");
                eprintln!();
                process::exit(2);
            }
        }
    }

    Ok(())
}

fn abort(diagnostics: Diagnostics) -> ! {
    eprint!("{}", diagnostics);
    process::exit(1);
}
