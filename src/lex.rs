//! Análisis léxico.
//!
//! # Tokenization
//! Primera fase del compilador. Descompone un [`InputStream`] (flujo de
//! caracteres) en unidades léxicas. Los espacios en blanco y los
//! comentarios `// …` se descartan durante esta operación. Cada token
//! emitido queda asociado a una ubicación en el código fuente original.
//!
//! # Contenido de un token
//! Operadores, puntuación y palabras clave se identifican por el hecho
//! de lo que son y no incluyen lexemas. Los identificadores conservan su
//! lexema original. Las constantes enteras se resuelven a su valor; las
//! constantes de punto flotante y los literales de cadena conservan su
//! lexema, ya que la generación de código lo reproduce textualmente.
//!
//! # Reglas importantes del lenguaje
//! - El lenguaje es case-sensitive: `Write` es un identificador, no la
//!   palabra clave `write`.
//! - Los identificadores son de estilo C: letra o `_` inicial, seguida
//!   de letras, dígitos o `_`.
//! - Las cadenas solo aparecen como argumento de `write` y no cruzan
//!   límites de línea.
//!
//! # Errores
//! El lexer se recupera parcialmente de condiciones de error: descarta
//! la línea en la que ocurrió el error y continúa acumulando errores,
//! pero un solo error impide el avance a las fases siguientes.

use crate::source::{InputStream, Located, Location};
use std::{
    fmt::{self, Display},
    str::FromStr,
};

use thiserror::Error;

/// Literal entero máximo.
const INT_MAX: i32 = i32::MAX;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Error de E/S originado por el [`InputStream`].
    #[error("I/O error")]
    Input(#[from] std::io::Error),

    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Se esperaba un carácter específico en esta posición.
    #[error("Expected {0:?}")]
    Expected(char),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {INT_MAX}]")]
    IntOverflow,

    /// Una constante de punto flotante sin dígitos tras el punto.
    #[error("Malformed float literal, expected digits after `.`")]
    MalformedFloat,

    /// Literal de carácter vacío, sin cierre o con un escape inválido.
    #[error("Bad character literal")]
    BadCharLiteral,

    /// Literal de cadena sin comilla de cierre en la misma línea.
    #[error("Unterminated string literal")]
    UnterminatedString,
}

/// Objeto resultante del análisis léxico.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identificador.
    Id(String),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal de entero.
    IntLiteral(i32),

    /// Literal de punto flotante, con su lexema original.
    FloatLiteral(String),

    /// Literal de carácter, sin las comillas que lo delimitan.
    CharLiteral(String),

    /// Literal de cadena, con las comillas que lo delimitan.
    StringLiteral(String),

    /// `=`
    Assign,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `<`
    Less,

    /// `<=`
    LessEqual,

    /// `>`
    Greater,

    /// `>=`
    GreaterEqual,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Slash,

    /// `%`
    Percent,

    /// `,`
    Comma,

    /// `:`
    Colon,

    /// `;`
    Semicolon,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `[`
    OpenBracket,

    /// `]`
    CloseBracket,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            IntLiteral(integer) => write!(fmt, "literal `{}`", integer),
            FloatLiteral(float) => write!(fmt, "literal `{}`", float),
            CharLiteral(c) => write!(fmt, "literal `'{}'`", c),
            StringLiteral(string) => write!(fmt, "string {}", string),
            Assign => fmt.write_str("`=`"),
            Equal => fmt.write_str("`==`"),
            NotEqual => fmt.write_str("`!=`"),
            Less => fmt.write_str("`<`"),
            LessEqual => fmt.write_str("`<=`"),
            Greater => fmt.write_str("`>`"),
            GreaterEqual => fmt.write_str("`>=`"),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            Slash => fmt.write_str("`/`"),
            Percent => fmt.write_str("`%`"),
            Comma => fmt.write_str("`,`"),
            Colon => fmt.write_str("`:`"),
            Semicolon => fmt.write_str("`;`"),
            OpenParen => fmt.write_str("`(`"),
            CloseParen => fmt.write_str("`)`"),
            OpenBracket => fmt.write_str("`[`"),
            CloseBracket => fmt.write_str("`]`"),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Var,
    Int,
    Bool,
    Float,
    Char,
    Array,
    Of,
    If,
    Then,
    Else,
    Endif,
    While,
    Do,
    Endwhile,
    Func,
    Endfunc,
    Read,
    Write,
    Return,
    And,
    Or,
    Not,
    True,
    False,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;

        let string = match self {
            Var => "var",
            Int => "int",
            Bool => "bool",
            Float => "float",
            Char => "char",
            Array => "array",
            Of => "of",
            If => "if",
            Then => "then",
            Else => "else",
            Endif => "endif",
            While => "while",
            Do => "do",
            Endwhile => "endwhile",
            Func => "func",
            Endfunc => "endfunc",
            Read => "read",
            Write => "write",
            Return => "return",
            And => "and",
            Or => "or",
            Not => "not",
            True => "true",
            False => "false",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        Ok(match string {
            "var" => Var,
            "int" => Int,
            "bool" => Bool,
            "float" => Float,
            "char" => Char,
            "array" => Array,
            "of" => Of,
            "if" => If,
            "then" => Then,
            "else" => Else,
            "endif" => Endif,
            "while" => While,
            "do" => Do,
            "endwhile" => Endwhile,
            "func" => Func,
            "endfunc" => Endfunc,
            "read" => Read,
            "write" => Write,
            "return" => Return,
            "and" => And,
            "or" => Or,
            "not" => Not,
            "true" => True,
            "false" => False,
            _ => return Err(()),
        })
    }
}

/// Máquina de estados para análisis léxico.
///
/// La salida del lexer, así como su siguiente estado, se define a
/// partir de la combinación de su estado actual y el siguiente
/// carácter en el flujo de entrada.
pub struct Lexer<S: Iterator> {
    source: std::iter::Peekable<S>,
    state: State,
    start: Location,
    last: Location,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de error; descarta el resto de la línea.
    Error,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Se encontró `/`: puede ser división o inicio de `//`.
    Division,

    /// Comentario de línea; vuelve a [`State::Start`] en `'\n'`.
    Comment,

    /// Se encontró `!`; solo puede seguir `=`.
    Bang,

    /// Se encontró `=`; puede seguir otro `=`.
    EqualSign,

    /// Se encontró `<`; puede seguir `=`.
    LessSign,

    /// Se encontró `>`; puede seguir `=`.
    GreaterSign,

    /// Constante entera en acumulación dígito a dígito.
    Integer(i32),

    /// Constante de punto flotante; el lexema incluye el punto.
    Float(String),

    /// Contenido interior de un literal de carácter.
    Character { text: String, escape: bool },

    /// Literal de cadena, comillas incluidas.
    Str { text: String, escape: bool },

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),
}

impl<S: InputStream> Lexer<S> {
    /// Crea un lexer en estado inicial a partir de un flujo.
    pub fn new(start: Location, source: S) -> Self {
        let last = start.clone();
        Lexer {
            source: source.peekable(),
            state: State::Start,
            start,
            last,
        }
    }

    /// Reduce la entrada a sea una secuencia completa de tokens o una
    /// secuencia de errores, pero nunca ambas.
    ///
    /// En caso de que ocurra al menos un error, el lexer deja de
    /// acumular tokens exitosos y se limita a recolectar los errores
    /// restantes, de modo que una misma ejecución reporte tantos
    /// errores léxicos como sea posible.
    pub fn try_exhaustive(mut self) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();

        while let Some(result) = self.next() {
            match result {
                Ok(token) => tokens.push(token),
                Err(error) => {
                    drop(tokens);

                    let mut errors = vec![error];
                    errors.extend(self.filter_map(Result::err));

                    return Err(errors);
                }
            }
        }

        Ok(tokens)
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<Token>, LexerError> {
        use {State::*, Token::*};

        let token = loop {
            // Se espera un siguiente carácter, fallando si hay error de E/S
            let next_char = match self.source.peek() {
                None => None,
                Some(Ok((c, _))) => Some(*c),
                Some(Err(_)) => break Err(self.source.next().unwrap().err().unwrap().into()),
            };

            // La posición de inicio se mueve junto al carácter en
            // observación mientras no haya una frontera de token abierta
            if let Start = self.state {
                if let Some(Ok((_, location))) = self.source.peek() {
                    self.start = location.clone();
                }
            }

            // Switch table principal: combinaciones de estado actual y
            // siguiente carácter
            match (&mut self.state, next_char) {
                // Condiciones de error: se descarta la línea donde
                // ocurrió el error y el lexer se reinicia
                (Error, None) => return Ok(None),
                (Error, Some('\n')) => self.state = Start,
                (Error, Some(_)) => (),

                // Tokens triviales
                (Start, None) => return Ok(None),
                (Start, Some(',')) => self.state = Complete(Comma),
                (Start, Some(':')) => self.state = Complete(Colon),
                (Start, Some(';')) => self.state = Complete(Semicolon),
                (Start, Some('(')) => self.state = Complete(OpenParen),
                (Start, Some(')')) => self.state = Complete(CloseParen),
                (Start, Some('[')) => self.state = Complete(OpenBracket),
                (Start, Some(']')) => self.state = Complete(CloseBracket),
                (Start, Some('+')) => self.state = Complete(Plus),
                (Start, Some('-')) => self.state = Complete(Minus),
                (Start, Some('*')) => self.state = Complete(Times),
                (Start, Some('%')) => self.state = Complete(Percent),
                (Start, Some('/')) => self.state = Division,
                (Start, Some('!')) => self.state = Bang,
                (Start, Some('=')) => self.state = EqualSign,
                (Start, Some('<')) => self.state = LessSign,
                (Start, Some('>')) => self.state = GreaterSign,

                (Start, Some('\'')) => {
                    self.state = Character {
                        text: String::new(),
                        escape: false,
                    }
                }

                (Start, Some('"')) => {
                    self.state = Str {
                        text: String::from('"'),
                        escape: false,
                    }
                }

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    self.state = Word(c.to_string())
                }

                // Inicio de una constante numérica. No se consume el
                // dígito: el caso de acumulación lo hará por sí mismo.
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Integer(0);
                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_ascii_whitespace() => (),
                (Start, Some(c)) => break Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(value), _) => break Ok(std::mem::replace(value, Plus)),

                // `/` inicia un comentario solo si sigue otro `/`
                (Division, Some('/')) => self.state = Comment,
                (Division, _) => break Ok(Slash),

                // Los comentarios descartan la línea donde ocurren
                (Comment, Some('\n')) | (Comment, None) => self.state = Start,
                (Comment, Some(_)) => (),

                // Operadores de dos caracteres
                (Bang, Some('=')) => self.state = Complete(NotEqual),
                (Bang, _) => break Err(LexerError::Expected('=')),
                (EqualSign, Some('=')) => self.state = Complete(Equal),
                (EqualSign, _) => break Ok(Assign),
                (LessSign, Some('=')) => self.state = Complete(LessEqual),
                (LessSign, _) => break Ok(Less),
                (GreaterSign, Some('=')) => self.state = Complete(GreaterEqual),
                (GreaterSign, _) => break Ok(Greater),

                // Acumulación dígito por dígito de constantes enteras
                (Integer(accumulated), Some(digit)) if digit.is_ascii_digit() => {
                    let digit = digit.to_digit(10).unwrap() as i32;

                    match accumulated
                        .checked_mul(10)
                        .and_then(|n| n.checked_add(digit))
                    {
                        Some(result) => *accumulated = result,
                        None => break Err(LexerError::IntOverflow),
                    }
                }

                // Un punto tras la parte entera forma un literal flotante
                (Integer(integer), Some('.')) => {
                    self.state = Float(format!("{}.", integer));
                }

                // Si sigue algo que no es dígito ni punto, la constante terminó
                (Integer(integer), _) => break Ok(IntLiteral(*integer)),

                (Float(text), Some(digit)) if digit.is_ascii_digit() => {
                    text.push(digit);
                }

                (Float(text), _) => {
                    if text.ends_with('.') {
                        break Err(LexerError::MalformedFloat);
                    }

                    break Ok(FloatLiteral(std::mem::take(text)));
                }

                // Literales de carácter
                (Character { text, escape }, Some(c)) => match (c, *escape) {
                    ('\n', _) => break Err(LexerError::BadCharLiteral),
                    ('\\', false) => {
                        text.push('\\');
                        *escape = true;
                    }
                    ('\'', false) => {
                        if char_literal_is_valid(text) {
                            self.state = Complete(CharLiteral(std::mem::take(text)));
                        } else {
                            break Err(LexerError::BadCharLiteral);
                        }
                    }
                    (c, _) => {
                        text.push(c);
                        *escape = false;
                    }
                },
                (Character { .. }, None) => break Err(LexerError::BadCharLiteral),

                // Literales de cadena; se preservan las comillas
                (Str { text, escape }, Some(c)) => match (c, *escape) {
                    ('\n', _) => break Err(LexerError::UnterminatedString),
                    ('\\', false) => {
                        text.push('\\');
                        *escape = true;
                    }
                    ('"', false) => {
                        text.push('"');
                        self.state = Complete(StringLiteral(std::mem::take(text)));
                    }
                    (c, _) => {
                        text.push(c);
                        *escape = false;
                    }
                },
                (Str { .. }, None) => break Err(LexerError::UnterminatedString),

                // Extensión de términos
                (Word(word), Some(c)) if is_word_char(c) => {
                    word.push(c);
                }

                // Si sigue algo que no puede formar parte del término, terminó
                (Word(word), _) => {
                    if let Ok(keyword) = self::Keyword::from_str(word) {
                        break Ok(Keyword(keyword));
                    } else {
                        break Ok(Id(std::mem::take(word)));
                    }
                }
            }

            // Si no hubo `continue`, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            if let Some(Ok((_, location))) = self.source.next() {
                self.last = location;
            }
        };

        token.map(Some)
    }
}

impl<S: InputStream> Iterator for Lexer<S> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) => None,
            Ok(Some(token)) => {
                self.state = State::Start;

                let location = Location::span(self.start.clone(), &self.last);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Error;

                let location = Location::span(self.start.clone(), &self.last);
                Some(Err(Located::at(error, location)))
            }
        }
    }
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c.is_ascii_digit() || c == '_'
}

/// Valida el contenido interior de un literal de carácter: un solo
/// carácter, o una secuencia de escape reconocida.
fn char_literal_is_valid(text: &str) -> bool {
    let single = text.chars().count() == 1 && !text.starts_with('\\');
    single || matches!(text, "\\n" | "\\t" | "\\\\" | "\\'" | "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::consume;

    fn tokens(source: &str) -> Vec<Token> {
        let (start, chars) = consume(source.as_bytes(), "test");
        Lexer::new(start, chars)
            .try_exhaustive()
            .expect("lexical error")
            .into_iter()
            .map(Located::into_inner)
            .collect()
    }

    fn errors(source: &str) -> Vec<LexerError> {
        let (start, chars) = consume(source.as_bytes(), "test");
        Lexer::new(start, chars)
            .try_exhaustive()
            .err()
            .expect("expected lexical errors")
            .into_iter()
            .map(Located::into_inner)
            .collect()
    }

    #[test]
    fn scans_statement_tokens() {
        use self::Keyword::*;
        use Token::*;

        assert_eq!(
            tokens("while i <= 10 do x = x + 1; endwhile"),
            vec![
                Keyword(While),
                Id("i".into()),
                LessEqual,
                IntLiteral(10),
                Keyword(Do),
                Id("x".into()),
                Assign,
                Id("x".into()),
                Plus,
                IntLiteral(1),
                Semicolon,
                Keyword(Endwhile),
            ]
        );
    }

    #[test]
    fn case_sensitivity_keeps_keywords_apart() {
        assert_eq!(
            tokens("write Write"),
            vec![Token::Keyword(Keyword::Write), Token::Id("Write".into())]
        );
    }

    #[test]
    fn scans_literals() {
        assert_eq!(
            tokens("3.25 'a' '\\n' \"hi\\n\""),
            vec![
                Token::FloatLiteral("3.25".into()),
                Token::CharLiteral("a".into()),
                Token::CharLiteral("\\n".into()),
                Token::StringLiteral("\"hi\\n\"".into()),
            ]
        );
    }

    #[test]
    fn comments_and_division_share_a_prefix() {
        assert_eq!(
            tokens("a / b // a slash b\n"),
            vec![Token::Id("a".into()), Token::Slash, Token::Id("b".into())]
        );
    }

    #[test]
    fn reports_overflow_and_keeps_scanning_errors() {
        let errors = errors("99999999999999999999\n@");
        assert!(matches!(errors[0], LexerError::IntOverflow));
        assert!(matches!(errors[1], LexerError::BadChar('@')));
    }
}
