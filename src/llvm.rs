//! Lowering de t-code a LLVM IR textual.
//!
//! El lowering trabaja en dos subpasadas por subrutina:
//!
//! 1. **Tipado de valores**: una caminata sobre la lista de
//!    instrucciones asigna a cada valor simbólico (identificador local
//!    o temporal) una cadena de tipo LLVM. Los parámetros y locales se
//!    siembran desde la tabla de símbolos; cada instrucción aporta
//!    restricciones. Dos centinelas rastrean valores sin resolver
//!    (`tMiss`) y conflictivos (`tErr`); un `ILOAD` de 0/1 marca su
//!    destino como entero-o-booleano hasta que un uso posterior lo
//!    refina. Un residuo de `tMiss`/`tErr` al final es un error fatal
//!    de lowering.
//! 2. **Emisión**: cabecera, etiqueta de entrada, un `alloca` por
//!    parámetro y local, `store` de los parámetros entrantes, y las
//!    instrucciones en orden. Los identificadores fuente se
//!    materializan con `load` desde su celda `.addr` antes de usarse y
//!    el resultado se escribe de vuelta con `store` como última
//!    instrucción del grupo; los temporales y literales se usan
//!    directamente.
//!
//! El emisor exige t-code pseudo-SSA: una temporal asignada más de una
//! vez dentro de la misma función es un error fatal previo a todo lo
//! demás. Estos errores señalan defectos del generador o t-code
//! malformado a propósito, nunca errores del usuario.

use std::collections::HashMap;

use log::debug;
use thiserror::Error;

use crate::{
    symbols::SymTable,
    tcode::{Code, Instruction, Op, Subroutine},
    types::{TypeId, Types},
};

const INDENT_INSTR: &str = "    ";
const INDENT_LABEL: &str = "  ";

const LLVM_INT: &str = "i32";
const LLVM_FLOAT: &str = "float";
const LLVM_CHAR: &str = "i8";
const LLVM_BOOL: &str = "i1";
const LLVM_VOID: &str = "void";
const LLVM_LABEL: &str = "label";
const LLVM_TYERR: &str = "tErr";
const LLVM_TYMISS: &str = "tMiss";
const LLVM_INT_BOOL: &str = "tIntBool";

const LLVM_INT_PTR: &str = "i32*";
const LLVM_FLOAT_PTR: &str = "float*";
const LLVM_CHAR_PTR: &str = "i8*";

const LLVM_INT1: &str = "i1";
const LLVM_INT8: &str = "i8";
const LLVM_INT32: &str = "i32";
const LLVM_INT64: &str = "i64";
const LLVM_DOUBLE: &str = "double";

const LLVM_GLOBAL_INT_ADDR: &str = "@.global.i.addr";
const LLVM_GLOBAL_FLOAT_ADDR: &str = "@.global.f.addr";
const LLVM_GLOBAL_CHAR_ADDR: &str = "@.global.c.addr";

const LLVM_ZERO_INT: &str = "0";
const LLVM_ONE_INT: &str = "1";

const LLVM_ENTRY: &str = ".entry";

const LLVM_ZEXT: &str = "zext";
const LLVM_FPEXT: &str = "fpext";
const LLVM_TRUNC: &str = "trunc";
const LLVM_FPTRUNC: &str = "fptrunc";
const LLVM_SEXT: &str = "sext";

/// Violación de un invariante interno del lowering.
///
/// Nunca deben dispararse sobre t-code bien formado: representan un
/// defecto del compilador o una entrada deliberadamente malformada.
/// El driver los convierte en un cartel legible y un código de salida
/// distinto de cero.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LoweringError {
    #[error(
        "in order to generate LLVM code, this emitter imposes the following restriction: \
         the temporal variables in the t-code cannot be multiply defined inside a function. \
         This happens in function `{function}` with temporal `{temp}`"
    )]
    NonSsaTemporary { function: String, temp: String },

    #[error(
        "some local values of this function can not been binded to a valid type:\n\
         ++++++++++++++++++++++++++++++++ function: {function}\n{bindings}\
         --------------------------------"
    )]
    UntypedValue { function: String, bindings: String },

    #[error("reserved opcode `{0}` reached the LLVM emitter")]
    ReservedOpcode(String),
}

/// Traduce un programa t-code completo a LLVM IR textual.
pub fn lower(types: &Types, symbols: &SymTable, tcode: &Code) -> Result<String, LoweringError> {
    check_ssa(tcode)?;

    let mut lowerer = Lowerer {
        types,
        symbols,
        tcode,
        write_i: false,
        write_f: false,
        write_c: false,
        write_s: false,
        write_ln: false,
        read_i: false,
        read_f: false,
        read_c: false,
        halt_and_exit: false,
        global_i: false,
        global_f: false,
        global_c: false,
        writes_strings: Vec::new(),
        writes_sizes: Vec::new(),
        current_function: String::new(),
        is_main: false,
        prev_is_terminator: false,
        local_values: Vec::new(),
        local_types: HashMap::new(),
        global_types: HashMap::new(),
        value_counts: HashMap::new(),
        param_stack: Vec::new(),
        pending_ret_type: String::new(),
        pending_func: String::new(),
        pending_args: Vec::new(),
    };

    lowerer.dump_llvm()
}

/// Rechaza t-code cuyas temporales se asignen más de una vez por
/// función. Excepto los opcodes sin destino, `arg1` es el destino.
fn check_ssa(tcode: &Code) -> Result<(), LoweringError> {
    for subroutine in &tcode.subroutines {
        let mut definitions: HashMap<&str, u32> = HashMap::new();

        for instruction in &subroutine.instructions {
            match instruction.op {
                Op::Label
                | Op::Ujump
                | Op::Fjump
                | Op::Halt
                | Op::Push
                | Op::Return
                | Op::Xload
                | Op::Cload
                | Op::Writei
                | Op::Writef
                | Op::Writec
                | Op::Writes
                | Op::Writeln
                | Op::Noop => {}

                // En POP el destino es opcional; en el resto arg1
                // siempre existe
                _ => {
                    let arg1 = instruction.arg(1);
                    if is_temporal(arg1) {
                        *definitions.entry(arg1).or_insert(0) += 1;
                    }
                }
            }
        }

        for (temp, count) in definitions {
            if count > 1 {
                return Err(LoweringError::NonSsaTemporary {
                    function: subroutine.name.clone(),
                    temp: temp.to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Temporal del t-code: `%` seguido de un dígito.
fn is_temporal(arg: &str) -> bool {
    let mut chars = arg.chars();
    chars.next() == Some('%') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

/// Identificador del t-code: inicia con algo que no es `%` ni dígito.
///
/// Nunca debe aplicarse al segundo argumento de un `CHLOAD`, cuyo
/// contenido es un carácter arbitrario.
fn is_identifier(arg: &str) -> bool {
    match arg.chars().next() {
        Some(c) => c != '%' && !c.is_ascii_digit(),
        None => false,
    }
}

struct Lowerer<'a> {
    types: &'a Types,
    symbols: &'a SymTable,
    tcode: &'a Code,

    write_i: bool,
    write_f: bool,
    write_c: bool,
    write_s: bool,
    write_ln: bool,
    read_i: bool,
    read_f: bool,
    read_c: bool,
    halt_and_exit: bool,
    global_i: bool,
    global_f: bool,
    global_c: bool,
    writes_strings: Vec<String>,
    writes_sizes: Vec<usize>,

    current_function: String,
    is_main: bool,
    prev_is_terminator: bool,

    local_values: Vec<String>,
    local_types: HashMap<String, String>,
    global_types: HashMap<String, String>,
    value_counts: HashMap<String, u32>,

    param_stack: Vec<String>,
    pending_ret_type: String,
    pending_func: String,
    pending_args: Vec<String>,
}

impl Lowerer<'_> {
    fn dump_llvm(&mut self) -> Result<String, LoweringError> {
        debug!("lowering t-code to LLVM IR");

        let (begin, end) = self.scaffolding();
        self.bind_global_values();

        let tcode = self.tcode;
        let mut code = String::new();
        for subroutine in &tcode.subroutines {
            self.bind_local_symbols(subroutine)?;
            self.start_function(subroutine);
            code += &self.dump_subroutine(subroutine)?;
        }

        Ok(begin + &code + &end)
    }

    /// Releva qué soporte de runtime usa el programa: formatos de E/S,
    /// globales auxiliares de lectura y la declaración de `exit`.
    fn compute_read_write_halt_info(&mut self) {
        let tcode = self.tcode;
        for subroutine in &tcode.subroutines {
            for instruction in &subroutine.instructions {
                let arg1 = instruction.arg(1);

                match instruction.op {
                    Op::Writei => self.write_i = true,
                    Op::Writef => self.write_f = true,
                    Op::Writec => self.write_c = true,
                    Op::Writeln => self.write_ln = true,

                    Op::Writes => {
                        if !self.writes_strings.iter().any(|s| s == arg1) {
                            self.writes_strings.push(arg1.to_string());
                        }
                        self.write_s = true;
                    }

                    Op::Readi => {
                        self.read_i = true;
                        // La lectura pasa por la celda global cuando el
                        // destino es una temporal o un booleano
                        if is_temporal(arg1) || self.reads_into_boolean(subroutine, arg1) {
                            self.global_i = true;
                        }
                    }

                    Op::Readf => {
                        self.read_f = true;
                        if is_temporal(arg1) {
                            self.global_f = true;
                        }
                    }

                    Op::Readc => {
                        self.read_c = true;
                        if is_temporal(arg1) {
                            self.global_c = true;
                        }
                    }

                    Op::Halt => self.halt_and_exit = true,

                    _ => {}
                }
            }
        }
    }

    fn reads_into_boolean(&self, subroutine: &Subroutine, arg: &str) -> bool {
        if !is_identifier(arg) {
            return false;
        }

        match self.symbols.get_local_symbol_type(&subroutine.name, arg) {
            Some(ty) => self.types.is_boolean_ty(ty),
            None => false,
        }
    }

    /// Constantes de formato, globales auxiliares y `declare`s,
    /// emitidos solo cuando el programa los usa.
    fn scaffolding(&mut self) -> (String, String) {
        self.compute_read_write_halt_info();

        let mut begin = String::new();
        let mut end = String::new();

        let any_io = self.write_i
            || self.write_f
            || self.write_c
            || self.write_s
            || self.write_ln
            || self.read_i
            || self.read_f
            || self.read_c;
        let any_scalar_io = self.write_i
            || self.read_i
            || self.write_f
            || self.read_f
            || self.write_c
            || self.read_c;

        if any_io {
            begin += "\n";
        }
        if self.write_i || self.read_i {
            begin += "@.str.i = constant [3 x i8] c\"%d\\00\"\n";
        }
        if self.write_f || self.read_f {
            begin += "@.str.f = constant [3 x i8] c\"%g\\00\"\n";
        }
        if self.write_c || self.read_c {
            begin += "@.str.c = constant [3 x i8] c\"%c\\00\"\n";
        }

        self.writes_sizes = Vec::with_capacity(self.writes_strings.len());
        for i in 0..self.writes_strings.len() {
            let (llvm_string, size) = llvm_string_from_asl(&self.writes_strings[i]);
            begin += &format!(
                "@.str.s.{} = constant [{} x i8] c\"{}\\00\"\n",
                i + 1,
                size + 1,
                llvm_string
            );
            self.writes_sizes.push(size + 1);
        }

        if any_scalar_io {
            begin += "\n\n";
        }
        if self.global_i {
            begin += "@.global.i.addr = common dso_local global i32 0\n";
        }
        if self.global_f {
            begin += "@.global.f.addr = common dso_local global float 0.000000e+00\n";
        }
        if self.global_c {
            begin += "@.global.c.addr = common dso_local global i8 0\n";
        }
        if any_scalar_io {
            begin += "\n\n";
        }

        if any_scalar_io || self.write_ln || self.halt_and_exit {
            end += "\n";
        }
        if self.write_i || self.write_f || self.write_s {
            end += "declare dso_local i32 @printf(i8*, ...)\n";
        }
        if self.write_c || self.write_ln {
            end += "declare dso_local i32 @putchar(i32)\n";
        }
        if self.read_i || self.read_f || self.read_c {
            end += "declare dso_local i32 @__isoc99_scanf(i8*, ...)\n";
        }
        if self.halt_and_exit {
            end += "declare dso_local void @exit(i32) noreturn nounwind\n";
        }
        if any_scalar_io || self.write_s || self.write_ln || self.halt_and_exit {
            end += "\n";
        }

        (begin, end)
    }

    fn bind_global_values(&mut self) {
        if self.global_i {
            self.global_types
                .insert(LLVM_GLOBAL_INT_ADDR.into(), LLVM_INT_PTR.into());
        }
        if self.global_f {
            self.global_types
                .insert(LLVM_GLOBAL_FLOAT_ADDR.into(), LLVM_FLOAT_PTR.into());
        }
        if self.global_c {
            self.global_types
                .insert(LLVM_GLOBAL_CHAR_ADDR.into(), LLVM_CHAR_PTR.into());
        }
    }

    fn start_function(&mut self, subroutine: &Subroutine) {
        self.current_function = subroutine.name.clone();
        self.is_main = subroutine.name == "main";
        self.prev_is_terminator = false;
    }

    // ------------------------------------------------------------------
    // Subpasada 1: tipado de valores simbólicos

    fn bind_local_symbols(&mut self, subroutine: &Subroutine) -> Result<(), LoweringError> {
        self.local_values.clear();
        self.local_types.clear();
        self.value_counts.clear();

        let function = &subroutine.name;
        for param in &subroutine.params {
            let llvm_type = if param.name == "_result" {
                self.func_return_llvm_type(function)
            } else {
                self.local_symbol_llvm_type(function, &param.name, true)
            };
            self.bind_tcode_value(&param.name, &llvm_type);
        }

        for var in &subroutine.vars {
            let llvm_type = self.local_symbol_llvm_type(function, &var.name, false);
            self.bind_tcode_value(&var.name, &llvm_type);
        }

        for instruction in &subroutine.instructions {
            let arg1 = instruction.arg(1).to_string();
            let arg2 = instruction.arg(2).to_string();
            let arg3 = instruction.arg(3).to_string();

            match instruction.op {
                Op::Label | Op::Ujump => {
                    self.bind_tcode_value(&arg1, LLVM_LABEL);
                }

                Op::Fjump => {
                    self.bind_tcode_value(&arg1, LLVM_BOOL);
                    self.bind_tcode_value(&arg2, LLVM_LABEL);
                }

                Op::Halt | Op::Return | Op::Writes | Op::Writeln | Op::Noop => {}

                Op::Load => {
                    if is_identifier(&arg1) && is_temporal(&arg2) {
                        // a = %4
                        let ty = self.type_of_value(&llvm_value(&arg1));
                        self.bind_tcode_value(&arg2, &ty);
                    } else if is_temporal(&arg1) && is_identifier(&arg2) {
                        // %4 = a
                        let ty = self.type_of_value(&llvm_value(&arg2));
                        self.bind_tcode_value(&arg1, &ty);
                    } else if is_temporal(&arg1) && is_temporal(&arg2) {
                        // %4 = %6
                        let ty = self.type_of_value(&llvm_value(&arg2));
                        self.bind_tcode_value(&arg1, &ty);
                    }
                }

                Op::Iload => {
                    // Un 0 o 1 puede ser tanto entero como booleano;
                    // los usos posteriores refinan la decisión
                    let int_or_bool = matches!(arg2.as_str(), "0" | "1");
                    if int_or_bool {
                        self.bind_tcode_value(&arg1, LLVM_INT_BOOL);
                    } else {
                        self.bind_tcode_value(&arg1, LLVM_INT);
                    }
                }

                Op::Fload => {
                    self.bind_tcode_value(&arg1, LLVM_FLOAT);
                }

                Op::Chload => {
                    self.bind_tcode_value(&arg1, LLVM_CHAR);
                }

                Op::Push => {
                    if !arg1.is_empty() {
                        self.bind_tcode_value(&arg1, LLVM_TYMISS);
                        self.param_stack.push(arg1.clone());
                    }
                }

                Op::Pop => {
                    if !arg1.is_empty() {
                        let ty = self.pending_ret_type.clone();
                        self.bind_tcode_value(&arg1, &ty);
                    }
                }

                Op::Call => {
                    let param_types = self.func_params_llvm_types(&arg1);
                    for llvm_type in param_types.iter().rev() {
                        if let Some(param) = self.param_stack.pop() {
                            self.bind_tcode_value(&param, llvm_type);
                        }
                    }

                    let ret = self.func_return_llvm_type(&arg1);
                    if ret != LLVM_VOID {
                        self.pending_ret_type = ret;
                    }
                }

                Op::Aload => {
                    let ty2 = self.type_of_value(&llvm_value(&arg2));
                    let pointer = if is_array_type(&ty2) {
                        pointer_to(&array_element_type(&ty2))
                    } else {
                        ty2
                    };
                    self.bind_tcode_value(&arg1, &pointer);
                }

                Op::Xload => {
                    let ty1 = self.type_of_value(&llvm_value(&arg1));
                    let elem = if is_array_type(&ty1) {
                        array_element_type(&ty1)
                    } else if is_pointer_type(&ty1) {
                        pointed_type(&ty1)
                    } else {
                        LLVM_TYERR.to_string()
                    };

                    self.bind_tcode_value(&arg2, LLVM_INT);
                    self.bind_tcode_value(&arg3, &elem);
                }

                Op::Loadx => {
                    let ty2 = self.type_of_value(&llvm_value(&arg2));
                    let elem = if is_array_type(&ty2) {
                        array_element_type(&ty2)
                    } else if is_pointer_type(&ty2) {
                        pointed_type(&ty2)
                    } else {
                        LLVM_TYERR.to_string()
                    };

                    self.bind_tcode_value(&arg1, &elem);
                    self.bind_tcode_value(&arg3, LLVM_INT);
                }

                Op::Loadc => {
                    // reservado:  x = *t1
                    let ty1 = self.type_of_value(&llvm_value(&arg1));
                    self.bind_tcode_value(&arg2, &pointer_to(&ty1));
                }

                Op::Cload => {
                    // reservado:  *t1 = x
                    let ty2 = self.type_of_value(&llvm_value(&arg2));
                    self.bind_tcode_value(&arg1, &pointer_to(&ty2));
                }

                Op::Writei => {
                    self.bind_tcode_value(&arg1, LLVM_INT_BOOL);
                }

                Op::Writef => {
                    self.bind_tcode_value(&arg1, LLVM_FLOAT);
                }

                Op::Writec => {
                    self.bind_tcode_value(&arg1, LLVM_CHAR);
                }

                Op::Readi => {
                    self.bind_tcode_value(&arg1, LLVM_INT_BOOL);
                }

                Op::Readf => {
                    self.bind_tcode_value(&arg1, LLVM_FLOAT);
                }

                Op::Readc => {
                    self.bind_tcode_value(&arg1, LLVM_CHAR);
                }

                Op::Add | Op::Sub | Op::Mul | Op::Div => {
                    self.bind_tcode_value(&arg1, LLVM_INT);
                    self.bind_tcode_value(&arg2, LLVM_INT);
                    self.bind_tcode_value(&arg3, LLVM_INT);
                }

                Op::Eq | Op::Lt | Op::Le => {
                    self.bind_tcode_value(&arg1, LLVM_BOOL);

                    if is_identifier(&arg2) && is_temporal(&arg3) {
                        let ty = self.type_of_value(&llvm_value(&arg2));
                        self.bind_tcode_value(&arg3, &ty);
                    } else if is_temporal(&arg2) && is_identifier(&arg3) {
                        let ty = self.type_of_value(&llvm_value(&arg3));
                        self.bind_tcode_value(&arg2, &ty);
                    } else if is_temporal(&arg2) && is_temporal(&arg3) {
                        self.bind_pair_of_values(&arg2, &arg3);
                    }
                }

                Op::Feq | Op::Flt | Op::Fle => {
                    self.bind_tcode_value(&arg1, LLVM_BOOL);
                    self.bind_tcode_value(&arg2, LLVM_FLOAT);
                    self.bind_tcode_value(&arg3, LLVM_FLOAT);
                }

                Op::Neg => {
                    self.bind_tcode_value(&arg1, LLVM_INT);
                    self.bind_tcode_value(&arg2, LLVM_INT);
                }

                Op::Fadd | Op::Fsub | Op::Fmul | Op::Fdiv => {
                    self.bind_tcode_value(&arg1, LLVM_FLOAT);
                    self.bind_tcode_value(&arg2, LLVM_FLOAT);
                    self.bind_tcode_value(&arg3, LLVM_FLOAT);
                }

                Op::Fneg => {
                    self.bind_tcode_value(&arg1, LLVM_FLOAT);
                    self.bind_tcode_value(&arg2, LLVM_FLOAT);
                }

                Op::Float => {
                    self.bind_tcode_value(&arg1, LLVM_FLOAT);
                    self.bind_tcode_value(&arg2, LLVM_INT);
                }

                Op::And | Op::Or => {
                    self.bind_tcode_value(&arg1, LLVM_BOOL);
                    self.bind_tcode_value(&arg2, LLVM_BOOL);
                    self.bind_tcode_value(&arg3, LLVM_BOOL);
                }

                Op::Not => {
                    self.bind_tcode_value(&arg1, LLVM_BOOL);
                    self.bind_tcode_value(&arg2, LLVM_BOOL);
                }
            }
        }

        let unresolved = self
            .local_values
            .iter()
            .any(|value| matches!(self.local_types[value].as_str(), LLVM_TYERR | LLVM_TYMISS));

        if unresolved {
            let mut bindings = String::new();
            for value in &self.local_values {
                bindings += &format!("{}: \t{}\n", value, self.local_types[value]);
            }

            return Err(LoweringError::UntypedValue {
                function: function.clone(),
                bindings,
            });
        }

        // Lo que quedó ambiguo entre entero y booleano se resuelve a
        // entero
        for value in &self.local_values {
            if self.local_types[value] == LLVM_INT_BOOL {
                self.local_types.insert(value.clone(), LLVM_INT.into());
            }
        }

        Ok(())
    }

    /// Registra o refina el tipo de un valor simbólico del t-code.
    fn bind_tcode_value(&mut self, arg: &str, llvm_type: &str) {
        if !is_identifier(arg) && !is_temporal(arg) {
            return;
        }

        let value = llvm_value(arg);
        match self.local_types.get(&value).cloned() {
            None => {
                self.local_values.push(value.clone());
                self.local_types.insert(value.clone(), llvm_type.into());
                self.value_counts.insert(value, 0);
            }

            Some(current) => {
                if current != LLVM_TYERR && llvm_type != LLVM_TYMISS {
                    if current == LLVM_INT_BOOL {
                        if matches!(llvm_type, LLVM_INT | LLVM_BOOL | LLVM_INT_BOOL) {
                            self.local_types.insert(value, llvm_type.into());
                        } else {
                            self.local_types.insert(value, LLVM_TYERR.into());
                        }
                    } else if llvm_type == LLVM_INT_BOOL {
                        if current == LLVM_TYMISS {
                            self.local_types.insert(value, llvm_type.into());
                        } else if !matches!(current.as_str(), LLVM_INT | LLVM_BOOL) {
                            self.local_types.insert(value, LLVM_TYERR.into());
                        }
                    } else if current != LLVM_TYMISS && current != llvm_type {
                        self.local_types.insert(value, LLVM_TYERR.into());
                    } else if current == LLVM_TYMISS {
                        self.local_types.insert(value, llvm_type.into());
                    }
                }
            }
        }
    }

    /// Unifica los tipos de dos temporales comparadas entre sí.
    fn bind_pair_of_values(&mut self, arg1: &str, arg2: &str) {
        let value1 = llvm_value(arg1);
        let value2 = llvm_value(arg2);

        let ty1 = self.local_types.get(&value1).cloned();
        let ty2 = self.local_types.get(&value2).cloned();

        match (ty1, ty2) {
            (None, None) => {
                self.bind_tcode_value(arg1, LLVM_TYMISS);
                self.bind_tcode_value(arg2, LLVM_TYMISS);
            }

            (Some(ty1), None) => {
                if ty1 == LLVM_TYERR {
                    self.local_types.insert(value2, LLVM_TYMISS.into());
                } else {
                    self.local_types.insert(value2, ty1);
                }
            }

            (None, Some(ty2)) => {
                if ty2 == LLVM_TYERR {
                    self.local_types.insert(value1, LLVM_TYMISS.into());
                } else {
                    self.local_types.insert(value1, ty2);
                }
            }

            (Some(ty1), Some(ty2)) => {
                if ty1 == LLVM_TYERR || ty2 == LLVM_TYERR {
                    return;
                }

                if ty1 != LLVM_TYMISS && ty2 == LLVM_TYMISS {
                    self.local_types.insert(value2, ty1);
                } else if ty1 == LLVM_TYMISS && ty2 != LLVM_TYMISS {
                    self.local_types.insert(value1, ty2);
                } else if matches!(ty1.as_str(), LLVM_INT | LLVM_BOOL) && ty2 == LLVM_INT_BOOL {
                    self.local_types.insert(value2, ty1);
                } else if ty1 == LLVM_INT_BOOL && matches!(ty2.as_str(), LLVM_INT | LLVM_BOOL) {
                    self.local_types.insert(value1, ty2);
                } else if ty1 != LLVM_TYMISS && ty2 != LLVM_TYMISS && ty1 != ty2 {
                    self.local_types.insert(value1, LLVM_TYERR.into());
                    self.local_types.insert(value2, LLVM_TYERR.into());
                }
            }
        }
    }

    fn bind_llvm_value(&mut self, value: &str, llvm_type: &str) {
        self.local_values.push(value.to_string());
        self.local_types.insert(value.into(), llvm_type.into());
        self.value_counts.insert(value.into(), 0);
    }

    fn type_of_value(&self, value: &str) -> String {
        let table = if value.starts_with('@') {
            &self.global_types
        } else {
            &self.local_types
        };

        table.get(value).cloned().unwrap_or_else(|| LLVM_TYMISS.into())
    }

    // ------------------------------------------------------------------
    // Consultas de tipos fuente

    fn func_return_llvm_type(&self, function: &str) -> String {
        match self.symbols.get_global_function_type(function) {
            Some(ty) => self.type_id_to_llvm(self.types.get_func_return_type(ty), false),
            None => LLVM_TYERR.into(),
        }
    }

    fn func_params_llvm_types(&self, function: &str) -> Vec<String> {
        match self.symbols.get_global_function_type(function) {
            Some(ty) => self
                .types
                .get_func_params_types(ty)
                .into_iter()
                .map(|param| self.type_id_to_llvm(param, true))
                .collect(),
            None => Vec::new(),
        }
    }

    fn local_symbol_llvm_type(&self, function: &str, symbol: &str, is_parameter: bool) -> String {
        match self.symbols.get_local_symbol_type(function, symbol) {
            Some(ty) => self.type_id_to_llvm(ty, is_parameter),
            None => LLVM_TYERR.into(),
        }
    }

    fn type_id_to_llvm(&self, ty: TypeId, is_parameter: bool) -> String {
        if self.types.is_integer_ty(ty) {
            LLVM_INT.into()
        } else if self.types.is_float_ty(ty) {
            LLVM_FLOAT.into()
        } else if self.types.is_boolean_ty(ty) {
            LLVM_BOOL.into()
        } else if self.types.is_character_ty(ty) {
            LLVM_CHAR.into()
        } else if self.types.is_void_ty(ty) {
            LLVM_VOID.into()
        } else if self.types.is_array_ty(ty) {
            let elem = self.type_id_to_llvm(self.types.get_array_elem_type(ty), false);
            if is_parameter {
                pointer_to(&elem)
            } else {
                format!("[{} x {}]", self.types.get_array_size(ty), elem)
            }
        } else {
            LLVM_TYERR.into()
        }
    }

    // ------------------------------------------------------------------
    // Subpasada 2: emisión

    fn dump_subroutine(&mut self, subroutine: &Subroutine) -> Result<String, LoweringError> {
        let mut code = String::new();
        code += &self.dump_header(subroutine);
        code += "{\n";

        self.bind_llvm_value(LLVM_ENTRY, LLVM_LABEL);
        code += &create_label(LLVM_ENTRY);
        code += &self.dump_allocas(subroutine);
        code += &self.dump_store_params(subroutine);

        let instructions = &subroutine.instructions;
        let noop = Instruction::nullary(Op::Noop);
        for (i, instruction) in instructions.iter().enumerate() {
            let next = instructions.get(i + 1).unwrap_or(&noop);
            code += &self.dump_instruction(instruction, next)?;
        }

        code += "}\n\n";
        Ok(code)
    }

    fn dump_header(&self, subroutine: &Subroutine) -> String {
        let mut code = String::from("define dso_local ");
        let function = &subroutine.name;

        if self.is_main {
            code += &format!("{} @main() ", LLVM_INT);
        } else {
            code += &format!("{} @{}(", self.func_return_llvm_type(function), function);

            let mut first = true;
            for param in &subroutine.params {
                if param.name == "_result" {
                    continue;
                }

                let value = llvm_value(&param.name);
                let llvm_type = self.local_symbol_llvm_type(function, &param.name, true);
                if !first {
                    code += ", ";
                }
                first = false;
                code += &format!("{} {}", llvm_type, value);
            }

            code += ") ";
        }

        code
    }

    /// Una celda `.addr` por parámetro (incluido `_result`) y por local.
    fn dump_allocas(&mut self, subroutine: &Subroutine) -> String {
        let mut code = String::new();
        let function = &subroutine.name;

        for param in &subroutine.params {
            let value = llvm_value(&param.name);
            let llvm_type = if param.name == "_result" {
                self.func_return_llvm_type(function)
            } else {
                self.local_symbol_llvm_type(function, &param.name, true)
            };

            let addr = value_addr(&value);
            self.bind_llvm_value(&addr, &pointer_to(&llvm_type));
            code += &create_alloca(&addr, &llvm_type);
        }

        for var in &subroutine.vars {
            let value = llvm_value(&var.name);
            let llvm_type = self.local_symbol_llvm_type(function, &var.name, false);

            let addr = value_addr(&value);
            self.bind_llvm_value(&addr, &pointer_to(&llvm_type));
            code += &create_alloca(&addr, &llvm_type);
        }

        code
    }

    fn dump_store_params(&self, subroutine: &Subroutine) -> String {
        let mut code = String::new();
        for param in &subroutine.params {
            if param.name != "_result" {
                let value = llvm_value(&param.name);
                let addr = value_addr(&value);
                code += &self.create_store(&value, &addr);
            }
        }

        code
    }

    fn dump_instruction(
        &mut self,
        instruction: &Instruction,
        next: &Instruction,
    ) -> Result<String, LoweringError> {
        let mut code = String::new();

        let arg1 = instruction.arg(1).to_string();
        let arg2 = instruction.arg(2).to_string();
        let arg3 = instruction.arg(3).to_string();

        match instruction.op {
            Op::Label => {
                let llvm_label = llvm_value(&arg1);
                if !self.prev_is_terminator {
                    code += &create_br(&llvm_label);
                }
                code += &create_label(&arg1);
            }

            Op::Ujump => {
                let llvm_label = llvm_value(&arg1);
                code += &create_br(&llvm_label);

                // El código que sigue a un salto sin etiqueta propia es
                // inalcanzable, pero necesita un bloque que lo contenga
                if next.op != Op::Label && next.op != Op::Noop {
                    let dead = self.new_prefixed_value("%.dead.cont", LLVM_LABEL);
                    code += &create_label(&dead[1..]);
                }
            }

            Op::Fjump => {
                let (value1, access1) = self.access_value(&arg1);
                code += &access1;

                let label_jump = llvm_value(&arg2);
                if next.op != Op::Label && next.op != Op::Noop {
                    let label_cont = self.new_prefixed_value("%.br.cont", LLVM_LABEL);
                    code += &create_br_cond(&value1, &label_cont, &label_jump);
                    code += &create_label(&label_cont[1..]);
                } else {
                    let label_cont = llvm_value(next.arg(1));
                    code += &create_br_cond(&value1, &label_cont, &label_jump);
                }
            }

            Op::Halt => {
                code += &create_halt();
            }

            Op::Load => {
                let value1 = llvm_value(&arg1);
                let value2 = llvm_value(&arg2);

                if is_identifier(&arg1) {
                    //  a = %4   o   a = b
                    let (value2, access2) = self.access_value(&arg2);
                    let addr1 = value_addr(&value1);
                    code += &access2;
                    code += &self.create_store(&value2, &addr1);
                } else if is_identifier(&arg2) {
                    // %4 = a
                    let addr2 = value_addr(&value2);
                    code += &self.create_load(&value1, &addr2);
                } else {
                    // %4 = %6: la copia exacta entre temporales se
                    // expresa como extensión seguida de truncamiento
                    let llvm_type = self.type_of_value(&value2);
                    if is_any_integer_type(&llvm_type) {
                        let wider = integer_type_one_up(&llvm_type);
                        let prefix = format!("%.temp.{}.{}", &arg1[1..], wider);
                        let extended = self.new_prefixed_value(&prefix, &wider);
                        code += &self.create_conversion(LLVM_ZEXT, &extended, &value2, &wider);
                        code += &self.create_conversion(LLVM_TRUNC, &value1, &extended, &llvm_type);
                    } else {
                        let prefix = format!("%.temp.{}.double", &arg1[1..]);
                        let extended = self.new_prefixed_value(&prefix, LLVM_DOUBLE);
                        code += &self.create_conversion(LLVM_FPEXT, &extended, &value2, LLVM_DOUBLE);
                        code +=
                            &self.create_conversion(LLVM_FPTRUNC, &value1, &extended, &llvm_type);
                    }
                }
            }

            Op::Iload => {
                let value1 = llvm_value(&arg1);
                let value2 = llvm_value(&arg2);
                if is_temporal(&arg1) {
                    code += &self.create_conversion(LLVM_TRUNC, &value1, &value2, LLVM_INT64);
                } else {
                    let addr1 = value_addr(&value1);
                    code += &self.create_store(&value2, &addr1);
                }
            }

            Op::Fload => {
                let value1 = llvm_value(&arg1);
                let value2 = llvm_value(&arg2);
                if is_temporal(&arg1) {
                    code += &self.create_conversion(LLVM_FPTRUNC, &value1, &value2, LLVM_DOUBLE);
                } else {
                    let addr1 = value_addr(&value1);
                    code += &self.create_store(&value2, &addr1);
                }
            }

            Op::Chload => {
                let value1 = llvm_value(&arg1);
                let value2 = ascii_code(&arg2).to_string();
                if is_temporal(&arg1) {
                    code += &self.create_conversion(LLVM_TRUNC, &value1, &value2, LLVM_INT32);
                } else {
                    let addr1 = value_addr(&value1);
                    code += &self.create_store(&value2, &addr1);
                }
            }

            Op::Push => {
                if !arg1.is_empty() {
                    let (value1, access1) = self.access_value(&arg1);
                    code += &access1;
                    self.param_stack.push(value1);
                } else {
                    self.param_stack.push(String::new());
                }
            }

            Op::Pop => {
                if let Some(param) = self.param_stack.pop() {
                    if !param.is_empty() {
                        self.pending_args.push(param);
                    }
                }

                if !arg1.is_empty() {
                    let (value1, modify1) = self.modify_value(&arg1);
                    code += &self.create_call_with_result(&value1);
                    code += &modify1;
                } else if self.param_stack.is_empty() {
                    code += &self.create_call_void();
                }
            }

            Op::Call => {
                self.pending_func = arg1.clone();
                self.pending_args.clear();
                if self.param_stack.is_empty() {
                    code += &self.create_call_void();
                }
            }

            Op::Return => {
                let ret_type = self.func_return_llvm_type(&self.current_function);
                if ret_type == LLVM_VOID {
                    if self.is_main {
                        code += &create_ret(LLVM_ZERO_INT, LLVM_INT);
                    } else {
                        code += &create_ret_void();
                    }
                } else {
                    let (value1, access1) = self.access_value("_result");
                    code += &access1;
                    let llvm_type = self.type_of_value(&value1);
                    code += &create_ret(&value1, &llvm_type);
                }

                if next.op != Op::Label && next.op != Op::Noop {
                    let dead = self.new_prefixed_value("%.dead.code", LLVM_LABEL);
                    code += &create_label(&dead[1..]);
                }
            }

            Op::Xload => {
                // base[idx] = val
                let value1 = llvm_value(&arg1);
                let (value2, access2) = self.access_value(&arg2);
                let (value3, access3) = self.access_value(&arg3);

                let llvm_type = self.type_of_value(&value1);
                let elem = if is_array_type(&llvm_type) {
                    array_element_type(&llvm_type)
                } else {
                    pointed_type(&llvm_type)
                };

                let index64 = self.new_prefixed_value("%.idx64", LLVM_INT64);
                let pointer = self.new_prefixed_value("%.arrPtr", &pointer_to(&elem));

                let addr1 = if is_identifier(&arg1) {
                    value_addr(&value1)
                } else {
                    value1
                };

                code += &access2;
                code += &access3;
                code += &self.create_conversion(LLVM_SEXT, &index64, &value2, LLVM_INT);
                code += &self.create_getelementptr(&pointer, &addr1, &index64);
                code += &self.create_store(&value3, &pointer);
            }

            Op::Loadx => {
                // dst = base[idx]
                let (value1, modify1) = self.modify_value(&arg1);
                let value2 = llvm_value(&arg2);
                let (value3, access3) = self.access_value(&arg3);

                let llvm_type = self.type_of_value(&value2);
                let elem = if is_array_type(&llvm_type) {
                    array_element_type(&llvm_type)
                } else {
                    pointed_type(&llvm_type)
                };

                let index64 = self.new_prefixed_value("%.idx64", LLVM_INT64);
                let pointer = self.new_prefixed_value("%.arrPtr", &pointer_to(&elem));

                let addr2 = if is_identifier(&arg2) {
                    value_addr(&value2)
                } else {
                    value2
                };

                code += &access3;
                code += &self.create_conversion(LLVM_SEXT, &index64, &value3, LLVM_INT);
                code += &self.create_getelementptr(&pointer, &addr2, &index64);
                code += &self.create_load(&value1, &pointer);
                code += &modify1;
            }

            Op::Aload => {
                // dst = &base
                let value1 = llvm_value(&arg1);
                let value2 = llvm_value(&arg2);
                let ty2 = self.type_of_value(&value2);
                let addr2 = value_addr(&value2);

                if is_array_type(&ty2) {
                    code += &self.create_getelementptr(&value1, &addr2, LLVM_ZERO_INT);
                } else if is_pointer_type(&ty2) {
                    code += &self.create_load(&value1, &addr2);
                }
            }

            Op::Loadc | Op::Cload => {
                // Reservados para un futuro lowering de deref de
                // punteros; el camino primario nunca los produce
                return Err(LoweringError::ReservedOpcode(instruction.op.to_string()));
            }

            Op::Writei => {
                let (value1, access1) = self.access_value(&arg1);
                let ty1 = self.type_of_value(&value1);
                code += &access1;

                let printed = if ty1 == LLVM_INT1 {
                    let widened = self.new_prefixed_value("%.wrti.i32", LLVM_INT32);
                    code += &self.create_conversion(LLVM_ZEXT, &widened, &value1, LLVM_INT1);
                    widened
                } else {
                    value1
                };

                code += &create_printf(&printed, LLVM_INT);
            }

            Op::Writef => {
                let (value1, access1) = self.access_value(&arg1);
                code += &access1;

                let widened = self.new_prefixed_value("%.wrtf.double", LLVM_DOUBLE);
                code += &self.create_conversion(LLVM_FPEXT, &widened, &value1, LLVM_FLOAT);
                code += &create_printf(&widened, LLVM_DOUBLE);
            }

            Op::Writec => {
                let (value1, access1) = self.access_value(&arg1);
                code += &access1;

                let widened = self.new_prefixed_value("%.wrtc.i32", LLVM_INT32);
                code += &self.create_conversion(LLVM_ZEXT, &widened, &value1, LLVM_INT8);
                code += &create_putchar(&widened);
            }

            Op::Writes => {
                let index = self
                    .writes_strings
                    .iter()
                    .position(|s| *s == arg1)
                    .unwrap_or(0);
                let format = format!("@.str.s.{}", index + 1);
                code += &create_prints(&format, self.writes_sizes[index]);
            }

            Op::Writeln => {
                code += &create_putchar("10");
            }

            Op::Readi => {
                let value1 = llvm_value(&arg1);
                let ty1 = self.type_of_value(&value1);

                if !is_temporal(&arg1) {
                    let addr1 = value_addr(&value1);
                    if ty1 == LLVM_INT1 {
                        // Un booleano se lee como entero y se normaliza
                        // a `valor != 0`
                        let global = self.new_prefixed_value("%.readi.global.i", LLVM_INT32);
                        let compare = self.new_prefixed_value("%.readi.i1.cmp1", LLVM_INT1);
                        let negated = self.new_prefixed_value("%.readi.i1.not", LLVM_INT1);
                        code += &self.create_scanf(LLVM_GLOBAL_INT_ADDR);
                        code += &self.create_load(&global, LLVM_GLOBAL_INT_ADDR);
                        code += &create_comparison(Op::Eq, &compare, &global, LLVM_ZERO_INT, LLVM_INT);
                        code += &create_not(&negated, &compare);
                        code += &self.create_store(&negated, &addr1);
                    } else {
                        code += &self.create_scanf(&addr1);
                    }
                } else if ty1 == LLVM_INT1 {
                    let global = self.new_prefixed_value("%.readi.global.i", LLVM_INT32);
                    let compare = self.new_prefixed_value("%.readi.i1.cmp1", LLVM_INT1);
                    code += &self.create_scanf(LLVM_GLOBAL_INT_ADDR);
                    code += &self.create_load(&global, LLVM_GLOBAL_INT_ADDR);
                    code += &create_comparison(Op::Eq, &compare, &global, LLVM_ZERO_INT, LLVM_INT);
                    code += &create_not(&value1, &compare);
                } else {
                    code += &self.create_scanf(LLVM_GLOBAL_INT_ADDR);
                    code += &self.create_load(&value1, LLVM_GLOBAL_INT_ADDR);
                }
            }

            Op::Readf => {
                let value1 = llvm_value(&arg1);
                if !is_temporal(&arg1) {
                    let addr1 = value_addr(&value1);
                    code += &self.create_scanf(&addr1);
                } else {
                    code += &self.create_scanf(LLVM_GLOBAL_FLOAT_ADDR);
                    code += &self.create_load(&value1, LLVM_GLOBAL_FLOAT_ADDR);
                }
            }

            Op::Readc => {
                let value1 = llvm_value(&arg1);
                if !is_temporal(&arg1) {
                    let addr1 = value_addr(&value1);
                    code += &self.create_scanf(&addr1);
                } else {
                    code += &self.create_scanf(LLVM_GLOBAL_CHAR_ADDR);
                    code += &self.create_load(&value1, LLVM_GLOBAL_CHAR_ADDR);
                }
            }

            Op::Add | Op::Sub | Op::Mul | Op::Div => {
                let (value1, modify1) = self.modify_value(&arg1);
                let (value2, access2) = self.access_value(&arg2);
                let (value3, access3) = self.access_value(&arg3);
                code += &access2;
                code += &access3;
                code += &create_arithmetic(instruction.op, &value1, &value2, &value3, LLVM_INT);
                code += &modify1;
            }

            Op::Eq | Op::Lt | Op::Le => {
                let (value1, modify1) = self.modify_value(&arg1);
                let (value2, access2) = self.access_value(&arg2);
                let (value3, access3) = self.access_value(&arg3);

                let mut operand_type = LLVM_INT.to_string();
                if is_identifier(&arg2) || is_temporal(&arg2) {
                    operand_type = self.type_of_value(&llvm_value(&arg2));
                } else if is_identifier(&arg3) || is_temporal(&arg3) {
                    operand_type = self.type_of_value(&llvm_value(&arg3));
                }

                code += &access2;
                code += &access3;
                code += &create_comparison(instruction.op, &value1, &value2, &value3, &operand_type);
                code += &modify1;
            }

            Op::Feq | Op::Flt | Op::Fle => {
                let (value1, modify1) = self.modify_value(&arg1);
                let (value2, access2) = self.access_value(&arg2);
                let (value3, access3) = self.access_value(&arg3);
                code += &access2;
                code += &access3;
                code += &create_comparison(instruction.op, &value1, &value2, &value3, LLVM_FLOAT);
                code += &modify1;
            }

            Op::Neg => {
                let (value1, modify1) = self.modify_value(&arg1);
                let (value2, access2) = self.access_value(&arg2);
                code += &access2;
                code += &create_arithmetic(Op::Sub, &value1, LLVM_ZERO_INT, &value2, LLVM_INT);
                code += &modify1;
            }

            Op::Fadd | Op::Fsub | Op::Fmul | Op::Fdiv => {
                let (value1, modify1) = self.modify_value(&arg1);
                let (value2, access2) = self.access_value(&arg2);
                let (value3, access3) = self.access_value(&arg3);
                code += &access2;
                code += &access3;
                code += &create_arithmetic(instruction.op, &value1, &value2, &value3, LLVM_FLOAT);
                code += &modify1;
            }

            Op::Fneg => {
                let (value1, modify1) = self.modify_value(&arg1);
                let (value2, access2) = self.access_value(&arg2);
                code += &access2;
                code += &create_fneg(&value1, &value2);
                code += &modify1;
            }

            Op::Float => {
                let (value1, modify1) = self.modify_value(&arg1);
                let (value2, access2) = self.access_value(&arg2);
                code += &access2;
                code += &self.create_sitofp(&value1, &value2, LLVM_INT);
                code += &modify1;
            }

            Op::And | Op::Or => {
                let (value1, modify1) = self.modify_value(&arg1);
                let (value2, access2) = self.access_value(&arg2);
                let (value3, access3) = self.access_value(&arg3);
                code += &access2;
                code += &access3;
                code += &create_logical(instruction.op, &value1, &value2, &value3);
                code += &modify1;
            }

            Op::Not => {
                let (value1, modify1) = self.modify_value(&arg1);
                let (value2, access2) = self.access_value(&arg2);
                code += &access2;
                code += &create_not(&value1, &value2);
                code += &modify1;
            }

            Op::Noop => {
                code += ";   noop\n";
            }
        }

        self.prev_is_terminator =
            matches!(instruction.op, Op::Ujump | Op::Fjump | Op::Return);

        Ok(code)
    }

    // ------------------------------------------------------------------
    // Materialización de operandos

    /// Para un identificador fuente, acuña un valor SSA nuevo y el
    /// `load` que lo materializa desde su celda; temporales y literales
    /// se usan directamente.
    fn access_value(&mut self, arg: &str) -> (String, String) {
        if is_identifier(arg) {
            let value = llvm_value(arg);
            let llvm_type = self.type_of_value(&value);
            let addr = value_addr(&value);
            let out = self.new_prefixed_value(&value, &llvm_type);
            let load = self.create_load(&out, &addr);
            (out, load)
        } else {
            (llvm_value(arg), String::new())
        }
    }

    /// Para un identificador fuente destino, acuña el valor SSA nuevo y
    /// el `store` de escritura de vuelta; el `store` debe emitirse
    /// después de la instrucción productora.
    fn modify_value(&mut self, arg: &str) -> (String, String) {
        if is_identifier(arg) {
            let value = llvm_value(arg);
            let llvm_type = self.type_of_value(&value);
            let addr = value_addr(&value);
            let out = self.new_prefixed_value(&value, &llvm_type);
            let store = self.create_store(&out, &addr);
            (out, store)
        } else {
            (llvm_value(arg), String::new())
        }
    }

    /// Acuña un valor fresco `prefijo.N` y lo registra con su tipo.
    fn new_prefixed_value(&mut self, prefix: &str, llvm_type: &str) -> String {
        let count = self.value_counts.entry(prefix.to_string()).or_insert(0);
        *count += 1;
        let value = format!("{}.{}", prefix, count);

        self.bind_llvm_value(&value, llvm_type);
        value
    }

    // ------------------------------------------------------------------
    // Constructores de instrucciones con estado

    fn create_store(&self, value: &str, addr: &str) -> String {
        let pointer_type = self.type_of_value(addr);
        let pointee = pointed_type(&pointer_type);
        format!(
            "{}store {} {}, {} {}\n",
            INDENT_INSTR, pointee, value, pointer_type, addr
        )
    }

    fn create_load(&self, value: &str, addr: &str) -> String {
        let pointer_type = self.type_of_value(addr);
        let pointee = pointed_type(&pointer_type);
        format!(
            "{}{} = load {}, {} {}\n",
            INDENT_INSTR, value, pointee, pointer_type, addr
        )
    }

    fn create_conversion(&self, instr: &str, value1: &str, value2: &str, type2: &str) -> String {
        let type1 = self.type_of_value(value1);
        format!(
            "{}{} = {} {} {} to {}\n",
            INDENT_INSTR, value1, instr, type2, value2, type1
        )
    }

    fn create_sitofp(&self, value1: &str, value2: &str, type2: &str) -> String {
        let type1 = self.type_of_value(value1);
        format!(
            "{}{} = sitofp {} {} to {}\n",
            INDENT_INSTR, value1, type2, value2, type1
        )
    }

    fn create_scanf(&self, addr: &str) -> String {
        let pointer_type = self.type_of_value(addr);
        let pointee = pointed_type(&pointer_type);
        let format = if pointee == LLVM_INT {
            "@.str.i"
        } else if pointee == LLVM_FLOAT {
            "@.str.f"
        } else {
            "@.str.c"
        };

        format!(
            "{}call i32 (i8*, ...) @__isoc99_scanf(i8* getelementptr inbounds \
             ([3 x i8], [3 x i8]* {}, i64 0, i64 0), {} {})\n",
            INDENT_INSTR, format, pointer_type, addr
        )
    }

    fn create_call_with_result(&self, value1: &str) -> String {
        let ret = self.func_return_llvm_type(&self.pending_func);
        format!(
            "{}{} = call {} @{}({})\n",
            INDENT_INSTR,
            value1,
            ret,
            self.pending_func,
            self.call_args()
        )
    }

    fn create_call_void(&self) -> String {
        let ret = self.func_return_llvm_type(&self.pending_func);
        format!(
            "{}call {} @{}({})\n",
            INDENT_INSTR,
            ret,
            self.pending_func,
            self.call_args()
        )
    }

    /// Los argumentos se apilaron en orden y se recogieron en orden
    /// inverso; recorrerlos de atrás hacia adelante los restituye.
    fn call_args(&self) -> String {
        let mut rendered = Vec::with_capacity(self.pending_args.len());
        for arg in self.pending_args.iter().rev() {
            let ty = self.type_of_value(arg);
            rendered.push(format!("{} {}", ty, arg));
        }

        rendered.join(", ")
    }

    fn create_getelementptr(&self, pointer: &str, base: &str, index: &str) -> String {
        let base_pointer_type = self.type_of_value(base);
        let pointee = pointed_type(&base_pointer_type);

        if is_array_type(&pointee) {
            format!(
                "{}{} = getelementptr inbounds {}, {} {}, i64 0, i64 {}\n",
                INDENT_INSTR, pointer, pointee, base_pointer_type, base, index
            )
        } else {
            format!(
                "{}{} = getelementptr inbounds {}, {} {}, i64 {}\n",
                INDENT_INSTR, pointer, pointee, base_pointer_type, base, index
            )
        }
    }
}

// ----------------------------------------------------------------------
// Constructores de instrucciones sin estado

fn llvm_value(tcode_ident: &str) -> String {
    match tcode_ident.chars().next() {
        None => String::new(),
        Some('%') => format!("%.temp.{}", &tcode_ident[1..]),
        Some(c) if c.is_ascii_digit() => tcode_ident.to_string(),
        Some(_) => format!("%{}", tcode_ident),
    }
}

fn value_addr(llvm_value: &str) -> String {
    format!("{}.addr", llvm_value)
}

fn create_alloca(addr: &str, llvm_type: &str) -> String {
    format!("{}{} = alloca {}\n", INDENT_INSTR, addr, llvm_type)
}

fn create_label(label: &str) -> String {
    format!("{}{}:\n", INDENT_LABEL, label)
}

fn create_br(label: &str) -> String {
    format!("{}br label {}\n", INDENT_INSTR, label)
}

fn create_br_cond(cond: &str, label_cont: &str, label_jump: &str) -> String {
    format!(
        "{}br i1 {}, label {}, label {}\n",
        INDENT_INSTR, cond, label_cont, label_jump
    )
}

fn create_ret(value: &str, llvm_type: &str) -> String {
    format!("{}ret {} {}\n", INDENT_INSTR, llvm_type, value)
}

fn create_ret_void() -> String {
    format!("{}ret void\n", INDENT_INSTR)
}

fn create_halt() -> String {
    format!("{}call void @exit(i32 1)\n", INDENT_INSTR)
}

fn create_arithmetic(op: Op, value1: &str, value2: &str, value3: &str, ty: &str) -> String {
    format!(
        "{}{} = {} {} {}, {}\n",
        INDENT_INSTR,
        value1,
        llvm_instr(op),
        ty,
        value2,
        value3
    )
}

fn create_comparison(op: Op, value1: &str, value2: &str, value3: &str, ty: &str) -> String {
    format!(
        "{}{} = {} {} {}, {}\n",
        INDENT_INSTR,
        value1,
        llvm_instr(op),
        ty,
        value2,
        value3
    )
}

fn create_logical(op: Op, value1: &str, value2: &str, value3: &str) -> String {
    format!(
        "{}{} = {} {} {}, {}\n",
        INDENT_INSTR,
        value1,
        llvm_instr(op),
        LLVM_BOOL,
        value2,
        value3
    )
}

fn create_not(value1: &str, value2: &str) -> String {
    format!(
        "{}{} = xor {} {}, {}\n",
        INDENT_INSTR, value1, LLVM_BOOL, value2, LLVM_ONE_INT
    )
}

fn create_fneg(value1: &str, value2: &str) -> String {
    format!("{}{} = fneg {} {}\n", INDENT_INSTR, value1, LLVM_FLOAT, value2)
}

fn create_printf(value: &str, llvm_type: &str) -> String {
    let format = if llvm_type == LLVM_INT {
        "@.str.i"
    } else {
        "@.str.f"
    };

    format!(
        "{}call i32 (i8*, ...) @printf(i8* getelementptr inbounds \
         ([3 x i8], [3 x i8]* {}, i64 0, i64 0), {} {})\n",
        INDENT_INSTR, format, llvm_type, value
    )
}

fn create_prints(format: &str, size: usize) -> String {
    format!(
        "{}call i32 (i8*, ...) @printf(i8* getelementptr inbounds \
         ([{size} x i8], [{size} x i8]* {format}, i64 0, i64 0))\n",
        INDENT_INSTR
    )
}

fn create_putchar(value: &str) -> String {
    format!("{}call i32 @putchar(i32 {})\n", INDENT_INSTR, value)
}

fn llvm_instr(op: Op) -> &'static str {
    match op {
        Op::Add => "add",
        Op::Sub => "sub",
        Op::Mul => "mul",
        Op::Div => "sdiv",
        Op::Fadd => "fadd",
        Op::Fsub => "fsub",
        Op::Fmul => "fmul",
        Op::Fdiv => "fdiv",
        Op::Eq => "icmp eq",
        Op::Lt => "icmp slt",
        Op::Le => "icmp sle",
        Op::Feq => "fcmp oeq",
        Op::Flt => "fcmp olt",
        Op::Fle => "fcmp ole",
        Op::And => "and",
        Op::Or => "or",
        _ => "tErr",
    }
}

fn is_any_integer_type(llvm_type: &str) -> bool {
    matches!(llvm_type, LLVM_INT | LLVM_INT8 | LLVM_INT1)
}

fn integer_type_one_up(llvm_type: &str) -> String {
    match llvm_type {
        LLVM_INT => LLVM_INT64.into(),
        LLVM_INT8 => LLVM_INT32.into(),
        LLVM_INT1 => LLVM_INT8.into(),
        _ => LLVM_TYERR.into(),
    }
}

fn is_array_type(llvm_type: &str) -> bool {
    llvm_type.contains(" x ")
}

fn array_element_type(llvm_type: &str) -> String {
    match llvm_type.split_once(" x ") {
        Some((_, rest)) => rest.trim_end_matches(']').to_string(),
        None => LLVM_TYERR.into(),
    }
}

fn is_pointer_type(llvm_type: &str) -> bool {
    llvm_type.ends_with('*')
}

fn pointer_to(llvm_type: &str) -> String {
    format!("{}*", llvm_type)
}

fn pointed_type(llvm_type: &str) -> String {
    llvm_type.strip_suffix('*').unwrap_or(llvm_type).to_string()
}

/// Traduce el contenido de un literal de cadena del fuente (comillas
/// incluidas) a su forma LLVM, con el tamaño en caracteres resultante.
/// Solo `\n`, `\t` y `\\` se traducen; cada uno cuenta como un carácter.
fn llvm_string_from_asl(asl_string: &str) -> (String, usize) {
    let inner = &asl_string[1..asl_string.len().saturating_sub(1)];

    let mut out = String::new();
    let mut size = 0;
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => {
                    out.push_str("\\0A");
                    size += 1;
                }
                Some('t') => {
                    out.push_str("\\09");
                    size += 1;
                }
                Some('\\') => {
                    out.push_str("\\\\");
                    size += 1;
                }
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                    size += 2;
                }
                None => {
                    out.push('\\');
                    size += 1;
                }
            }
        } else {
            out.push(c);
            size += 1;
        }
    }

    (out, size)
}

/// Código ASCII del contenido de un literal de carácter.
fn ascii_code(text: &str) -> i32 {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c as i32,
        (Some('\\'), Some('n')) => '\n' as i32,
        (Some('\\'), Some('t')) => '\t' as i32,
        (Some('\\'), Some('\\')) => '\\' as i32,
        (Some('\\'), Some('"')) => '"' as i32,
        (Some('\\'), Some('\'')) => '\'' as i32,
        (_, Some(second)) => second as i32,
        (None, _) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporals_and_identifiers_are_told_apart() {
        assert!(is_temporal("%1"));
        assert!(is_temporal("%42"));
        assert!(!is_temporal("%x"));
        assert!(!is_temporal("x"));

        assert!(is_identifier("x"));
        assert!(is_identifier("_result"));
        assert!(!is_identifier("%1"));
        assert!(!is_identifier("3"));
    }

    #[test]
    fn llvm_values_rename_by_kind() {
        assert_eq!(llvm_value("%5"), "%.temp.5");
        assert_eq!(llvm_value("x"), "%x");
        assert_eq!(llvm_value("10"), "10");
        assert_eq!(llvm_value(""), "");
    }

    #[test]
    fn string_escapes_translate_and_count_once() {
        let (text, size) = llvm_string_from_asl("\"ab\\n\"");
        assert_eq!(text, "ab\\0A");
        assert_eq!(size, 3);

        let (text, size) = llvm_string_from_asl("\"\\t\\\\\"");
        assert_eq!(text, "\\09\\\\");
        assert_eq!(size, 2);
    }

    #[test]
    fn array_type_strings_decompose() {
        assert!(is_array_type("[10 x i32]"));
        assert_eq!(array_element_type("[10 x i32]"), "i32");
        assert_eq!(pointed_type("float*"), "float");
        assert!(is_pointer_type("i8*"));
    }

    #[test]
    fn non_ssa_tcode_is_rejected() {
        let mut subroutine = Subroutine::new("f");
        subroutine.set_instructions(vec![
            Instruction::binary(Op::Iload, "%1", "0"),
            Instruction::binary(Op::Iload, "%1", "1"),
        ]);

        let mut code = Code::default();
        code.add_subroutine(subroutine);

        assert!(matches!(
            check_ssa(&code),
            Err(LoweringError::NonSsaTemporary { .. })
        ));
    }
}
