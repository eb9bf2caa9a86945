//! Rastreo de ubicaciones originales en código fuente.
//!
//! Todos los objetos que el compilador deriva del programa fuente
//! (tokens, nodos del árbol, errores) llevan consigo un rango de
//! posiciones de origen. Esto permite señalar el punto exacto o
//! aproximado donde ocurre un error de cualquier fase.

use std::{
    cell::RefCell,
    fmt::{self, Debug, Display, Formatter},
    io::{self, BufRead},
    ops::Range,
    rc::Rc,
};

/// Ancho de los divisores de tabulador.
const TAB_STOP: u32 = 4;

/// Un flujo de entrada, carácter por carácter.
pub trait InputStream: Iterator<Item = Result<(char, Location), io::Error>> {}

impl<I: Iterator<Item = Result<(char, Location), io::Error>>> InputStream for I {}

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Transforma el valor con la misma ubicación.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            location: self.location,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Una ubicación está conformada por un origen y un rango de posiciones.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    position: Range<Position>,
}

impl Location {
    /// Unifica un rango de ubicaciones. Se asume el mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            from: from.from,
            position: from.position.start..to.position.end,
        }
    }

    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.position.start
    }

    /// Obtiene la posición de fin (exclusiva).
    pub fn end(&self) -> Position {
        self.position.end
    }

    /// Obtiene el origen.
    pub fn source(&self) -> &Source {
        &self.from
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.from.name)?;

        let Range { start, end } = self.position;
        if end == start.advance() {
            write!(formatter, "{}", start)
        } else {
            write!(formatter, "[{}-{}]", start, end.back())
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna en un archivo.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Incrementa el número de columna.
    pub fn advance(self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    /// Decrementa el número de columna.
    pub fn back(self) -> Position {
        Position {
            line: self.line,
            column: self.column.max(2) - 1,
        }
    }

    /// Ajusta la posición a la siguiente columna de tabulador.
    pub fn tab(self) -> Position {
        let column = 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP;
        Position {
            line: self.line,
            column,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

/// Nombre de origen e histórico interior de líneas ya consumidas.
pub struct Source {
    name: String,
    lines: RefCell<Vec<String>>,
}

impl Source {
    /// Obtiene el nombre del origen.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ejecuta un callback con el texto de una línea, si ya fue leída.
    pub fn with_line<F, R>(&self, line_number: u32, callback: F) -> Option<R>
    where
        F: FnOnce(&str) -> R,
    {
        let lines = self.lines.borrow();
        lines
            .get(line_number.saturating_sub(1) as usize)
            .map(|line| callback(line))
    }
}

/// Transforma un lector estándar en un flujo que itera por carácter.
///
/// Cada carácter emitido se acompaña de su propia ubicación. El
/// histórico de líneas queda registrado en el [`Source`] compartido,
/// lo cual permite reconstruir extractos al reportar errores. La
/// ubicación de retorno corresponde al inicio del archivo.
pub fn consume<R, S>(reader: R, name: S) -> (Location, impl InputStream)
where
    R: BufRead,
    S: Into<String>,
{
    let source = Rc::new(Source {
        name: name.into(),
        lines: Default::default(),
    });

    let start = Location {
        from: Rc::clone(&source),
        position: Position::default()..Position::default().advance(),
    };

    let chars = reader
        .lines()
        .enumerate()
        .flat_map(move |(line_index, line)| {
            let source = Rc::clone(&source);

            Fallible::new(line.map(move |line| {
                let line_chars: Vec<_> = line.chars().collect();
                source.lines.borrow_mut().push(line);

                let mut column = 1;
                line_chars
                    .into_iter()
                    .chain(std::iter::once('\n'))
                    .map(move |c| {
                        let here = Position {
                            line: line_index as u32 + 1,
                            column,
                        };

                        column = match c {
                            '\t' => here.tab().column(),
                            _ => here.advance().column(),
                        };

                        let location = Location {
                            from: Rc::clone(&source),
                            position: here..here.advance(),
                        };

                        (c, location)
                    })
            }))
        })
        .fuse();

    (start, chars)
}

/// Un iterador que emite un solo error o encapsula las salidas de
/// otro iterador en `Ok`, pero nunca ambas.
struct Fallible<I, E>(Result<I, std::iter::Once<E>>);

impl<I, E> Fallible<I, E> {
    fn new(result: Result<I, E>) -> Self {
        Fallible(result.map_err(std::iter::once))
    }
}

impl<I: Iterator, E> Iterator for Fallible<I, E> {
    type Item = Result<I::Item, E>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.0 {
            Ok(ok) => ok.next().map(Ok),
            Err(error) => error.next().map(Err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_follow_lines_and_columns() {
        let (start, chars) = consume("ab\ncd".as_bytes(), "test");
        assert_eq!(start.start(), Position { line: 1, column: 1 });

        let chars: Vec<_> = chars.map(Result::unwrap).collect();
        let (c, location) = &chars[3];
        assert_eq!(*c, 'c');
        assert_eq!(location.start(), Position { line: 2, column: 1 });
    }

    #[test]
    fn source_remembers_consumed_lines() {
        let (start, chars) = consume("x = 1;".as_bytes(), "mem");
        chars.for_each(drop);

        let text = start.source().with_line(1, str::to_owned);
        assert_eq!(text.as_deref(), Some("x = 1;"));
    }
}
