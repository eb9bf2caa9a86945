//! Representación intermedia de tres direcciones (t-code).
//!
//! Un programa t-code es una secuencia ordenada de subrutinas; cada
//! subrutina declara sus parámetros y locales y lleva una lista de
//! instrucciones. Cada instrucción tiene un código de operación y hasta
//! tres argumentos textuales. El alfabeto de argumentos distingue:
//!
//! - identificadores, que inician con letra (nombres del fuente más el
//!   sintético `_result`);
//! - temporales, `%` seguido de dígitos, con contador fresco por función;
//! - literales enteros, flotantes o de carácter;
//! - etiquetas, tokens alfabéticos usados por `LABEL` y los saltos.
//!
//! El dump textual emite una instrucción por línea y una línea en
//! blanco entre subrutinas.

use std::fmt::{self, Display};

/// Código de operación.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    // Aritmética entera y flotante
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
    Fneg,

    // Comparaciones; el resultado es un temporal booleano 0/1
    Eq,
    Lt,
    Le,
    Feq,
    Flt,
    Fle,

    // Lógicas
    And,
    Or,
    Not,

    // Conversión entero a flotante
    Float,

    // Cargas: copia, literales, arreglos y deref reservado
    Load,
    Iload,
    Fload,
    Chload,
    Aload,
    Xload,
    Loadx,
    Loadc,
    Cload,

    // Flujo de control
    Label,
    Ujump,
    Fjump,
    Return,
    Halt,

    // Protocolo de llamada
    Push,
    Pop,
    Call,

    // E/S
    Readi,
    Readf,
    Readc,
    Writei,
    Writef,
    Writec,
    Writes,
    Writeln,

    Noop,
}

impl Display for Op {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Op::*;

        fmt.write_str(match self {
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Neg => "NEG",
            Fadd => "FADD",
            Fsub => "FSUB",
            Fmul => "FMUL",
            Fdiv => "FDIV",
            Fneg => "FNEG",
            Eq => "EQ",
            Lt => "LT",
            Le => "LE",
            Feq => "FEQ",
            Flt => "FLT",
            Fle => "FLE",
            And => "AND",
            Or => "OR",
            Not => "NOT",
            Float => "FLOAT",
            Load => "LOAD",
            Iload => "ILOAD",
            Fload => "FLOAD",
            Chload => "CHLOAD",
            Aload => "ALOAD",
            Xload => "XLOAD",
            Loadx => "LOADX",
            Loadc => "LOADC",
            Cload => "CLOAD",
            Label => "LABEL",
            Ujump => "UJUMP",
            Fjump => "FJUMP",
            Return => "RETURN",
            Halt => "HALT",
            Push => "PUSH",
            Pop => "POP",
            Call => "CALL",
            Readi => "READI",
            Readf => "READF",
            Readc => "READC",
            Writei => "WRITEI",
            Writef => "WRITEF",
            Writec => "WRITEC",
            Writes => "WRITES",
            Writeln => "WRITELN",
            Noop => "NOOP",
        })
    }
}

/// Una instrucción de tres direcciones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub op: Op,
    pub arg1: String,
    pub arg2: String,
    pub arg3: String,
}

impl Instruction {
    pub fn nullary(op: Op) -> Self {
        Instruction {
            op,
            arg1: String::new(),
            arg2: String::new(),
            arg3: String::new(),
        }
    }

    pub fn unary(op: Op, arg1: impl Into<String>) -> Self {
        Instruction {
            op,
            arg1: arg1.into(),
            arg2: String::new(),
            arg3: String::new(),
        }
    }

    pub fn binary(op: Op, arg1: impl Into<String>, arg2: impl Into<String>) -> Self {
        Instruction {
            op,
            arg1: arg1.into(),
            arg2: arg2.into(),
            arg3: String::new(),
        }
    }

    pub fn ternary(
        op: Op,
        arg1: impl Into<String>,
        arg2: impl Into<String>,
        arg3: impl Into<String>,
    ) -> Self {
        Instruction {
            op,
            arg1: arg1.into(),
            arg2: arg2.into(),
            arg3: arg3.into(),
        }
    }

    /// Argumento por índice 1..=3; los ausentes se ven como `""`.
    pub fn arg(&self, i: usize) -> &str {
        match i {
            1 => &self.arg1,
            2 => &self.arg2,
            _ => &self.arg3,
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.op)?;

        for arg in [&self.arg1, &self.arg2, &self.arg3] {
            if !arg.is_empty() {
                write!(fmt, " {}", arg)?;
            }
        }

        Ok(())
    }
}

/// Parámetro formal de una subrutina en t-code.
#[derive(Clone, Debug)]
pub struct Param {
    pub name: String,
    /// Tipo escalar, o tipo del elemento si es un arreglo por referencia.
    pub ty: String,
    pub by_reference: bool,
}

/// Variable local de una subrutina en t-code.
#[derive(Clone, Debug)]
pub struct Var {
    pub name: String,
    pub ty: String,
    /// Celdas que ocupa: 1 para escalares, N para arreglos.
    pub size: usize,
}

/// Una subrutina: nombre, declaraciones e instrucciones.
#[derive(Clone, Debug, Default)]
pub struct Subroutine {
    pub name: String,
    pub params: Vec<Param>,
    pub vars: Vec<Var>,
    pub instructions: Vec<Instruction>,
}

impl Subroutine {
    pub fn new(name: impl Into<String>) -> Self {
        Subroutine {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_param(&mut self, name: impl Into<String>, ty: impl Into<String>, by_reference: bool) {
        self.params.push(Param {
            name: name.into(),
            ty: ty.into(),
            by_reference,
        });
    }

    pub fn add_var(&mut self, name: impl Into<String>, ty: impl Into<String>, size: usize) {
        self.vars.push(Var {
            name: name.into(),
            ty: ty.into(),
            size,
        });
    }

    pub fn set_instructions(&mut self, instructions: Vec<Instruction>) {
        self.instructions = instructions;
    }
}

impl Display for Subroutine {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(fmt, "FUNCTION {}", self.name)?;

        for param in &self.params {
            write!(fmt, "  PARAM {} {}", param.name, param.ty)?;
            if param.by_reference {
                write!(fmt, " reference")?;
            }
            writeln!(fmt)?;
        }

        for var in &self.vars {
            writeln!(fmt, "  LOCAL {} {} {}", var.name, var.ty, var.size)?;
        }

        for instruction in &self.instructions {
            writeln!(fmt, "  {}", instruction)?;
        }

        Ok(())
    }
}

/// Un programa completo en t-code.
#[derive(Clone, Debug, Default)]
pub struct Code {
    pub subroutines: Vec<Subroutine>,
}

impl Code {
    pub fn add_subroutine(&mut self, subroutine: Subroutine) {
        self.subroutines.push(subroutine);
    }
}

impl Display for Code {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for subroutine in &self.subroutines {
            if !first {
                writeln!(fmt)?;
            }
            first = false;

            write!(fmt, "{}", subroutine)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_is_line_oriented() {
        let mut subroutine = Subroutine::new("main");
        subroutine.add_var("x", "int", 1);
        subroutine.set_instructions(vec![
            Instruction::binary(Op::Iload, "%1", "2"),
            Instruction::binary(Op::Load, "x", "%1"),
            Instruction::unary(Op::Writei, "x"),
            Instruction::nullary(Op::Return),
        ]);

        let mut code = Code::default();
        code.add_subroutine(subroutine);

        let dump = code.to_string();
        let expected = "\
FUNCTION main
  LOCAL x int 1
  ILOAD %1 2
  LOAD x %1
  WRITEI x
  RETURN
";
        assert_eq!(dump, expected);
    }
}
