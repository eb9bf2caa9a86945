//! Acumulación y reporte de errores con ubicación.
//!
//! Los errores de toda fase se reportan como un valor de error con su
//! ubicación original. El recolector [`Diagnostics`] los conserva hasta
//! el final de la compilación y los imprime ordenados por posición en
//! el fuente, con un extracto de la línea señalada.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display},
};

use thiserror::Error;

/// Error semántico detectado por la recolección de símbolos o el
/// chequeo de tipos.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("Identifier `{0}` is already declared in this scope")]
    DeclaredIdent(String),

    #[error("Identifier `{0}` is undeclared")]
    UndeclaredIdent(String),

    #[error("Assignment with incompatible types")]
    IncompatibleAssignment,

    #[error("Left expression is not referenceable")]
    NonReferenceableLeftExpr,

    #[error("Instruction requires a boolean condition")]
    BooleanRequired,

    #[error("Operator `{0}` applied to incompatible operands")]
    IncompatibleOperator(String),

    #[error("Array access over a non-array operand")]
    NonArrayInArrayAccess,

    #[error("Array access with a non-integer index")]
    NonIntegerIndexInArrayAccess,

    #[error("Identifier `{0}` is not callable")]
    IsNotCallable(String),

    #[error("Call to `{0}` yields no value inside an expression")]
    IsNotFunction(String),

    #[error("Call to `{0}` with an incorrect number of parameters")]
    NumberOfParameters(String),

    #[error("Parameter #{number} in call to `{function}` has an incompatible type")]
    IncompatibleParameter { function: String, number: usize },

    #[error("Basic type required in read/write instruction")]
    ReadWriteRequireBasic,

    #[error("Expression is not referenceable")]
    NonReferenceableExpression,

    #[error("Return statement incompatible with the function signature")]
    IncompatibleReturn,

    #[error("There is no `main` function properly declared")]
    NoMainProperlyDeclared,
}

mod sealed {
    pub trait Sealed {}
}

/// Un error de cualquier dominio acompañado de su ubicación.
pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.val()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}

/// Recolector de errores de compilación.
#[derive(Default)]
pub struct Diagnostics(Vec<Box<dyn 'static + LocatedError>>);

impl Diagnostics {
    /// Agrega un error con su ubicación.
    ///
    /// El recolector se comporta como un conjunto con clave en la
    /// posición de inicio: un segundo error reportado sobre una
    /// posición ya ocupada se descarta. Esto colapsa repeticiones y
    /// hace que reejecutar una fase no acumule reportes nuevos.
    pub fn report<E: 'static + Error>(&mut self, error: E, location: Location) {
        let occupied = self
            .0
            .iter()
            .any(|previous| previous.location().start() == location.start());

        if !occupied {
            self.0.push(Box::new(Located::at(error, location)));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Errores en orden de posición original, con empates en orden
    /// de reporte.
    pub fn sorted(&self) -> Vec<&dyn LocatedError> {
        let mut errors: Vec<&dyn LocatedError> = self.0.iter().map(Box::as_ref).collect();
        errors.sort_by_key(|error| {
            let start = error.location().start();
            (start.line(), start.column())
        });

        errors
    }
}

impl<E: 'static + Error> From<Located<E>> for Diagnostics {
    fn from(error: Located<E>) -> Self {
        let mut diagnostics = Diagnostics::default();
        let (location, error) = error.split();
        diagnostics.report(error, location);
        diagnostics
    }
}

impl<E: 'static + Error> From<Vec<Located<E>>> for Diagnostics {
    fn from(errors: Vec<Located<E>>) -> Self {
        let mut diagnostics = Diagnostics::default();
        for error in errors {
            let (location, error) = error.split();
            diagnostics.report(error, location);
        }

        diagnostics
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in self.sorted() {
            writeln!(fmt, "error: {}", error.source())?;

            let location = error.location();
            writeln!(fmt, " --> {}", location)?;

            let digits = location.end().line().to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "")?;

            for line_number in location.start().line()..=location.end().line() {
                let echoed = location.source().with_line(line_number, |line| {
                    writeln!(fmt, "{:>digits$} | {}", line_number, line)
                });

                if let Some(echoed) = echoed {
                    echoed?;
                }
            }

            let (from, to) = (location.start().column(), location.end().column().max(2) - 1);
            let min = from.min(to);
            let max = from.max(to);

            let skip = (min - 1) as usize;
            let highlight = (max - min + 1) as usize;

            writeln!(
                fmt,
                "{:digits$} | {:skip$}{:^<highlight$}",
                "", "", "",
            )?;

            writeln!(fmt)?;
        }

        let error_or_errors = if self.0.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Build failed with {} {}",
            self.0.len(),
            error_or_errors
        )
    }
}
