use super::{fold, resolve};
use crate::backend::model::EncodeError;
use derive_more::Constructor;
use std::fmt::Display;

/*
    Phases:

        1.  Decomposition: Each compound `if (...) goto` condition is flattened into a sequence of
            primitive conditional jumps and synthetic skip labels (`decompose`). Constant subtrees
            are folded (`fold`) wherever code generation asks for them.

        2.  Emission: The (external) code generator walks the program and emits `Entry`s into the
            `InstructionStream`. Every entry has its final byte width at this point, but operands
            which depend on a label are left `Unresolved`.

        3.  Resolution: Once the whole program has been emitted the symbol table is complete, so
            every deferred operand is resolved exactly once against it (`resolve`).

        4.  Compilation: The resolved stream is encoded into a `ByteSink`, usually a `BinaryImage`
            which is sized by a reserve pass first, and then serialized (Intel HEX, raw binary).
            Alternatively each entry is rendered as text for an external assembler.
*/

#[derive(Debug, PartialEq, Clone, Copy, Eq, Constructor)]
pub struct Loc {
    line: usize,
    col: usize,
}

impl Loc {
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn col(&self) -> usize {
        self.col
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located<T: Sized> {
    loc: Option<Loc>,
    val: T,
}

impl Display for Loc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(line: {}, col: {})", self.line, self.col)
    }
}

impl<T: Display> Display for Located<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.loc {
            None => write!(f, "@<unknown location>: {}", self.val),
            Some(loc) => write!(f, "@{}: {}", loc, self.val),
        }
    }
}

impl<T> Located<T> {
    fn new(loc: Option<Loc>, val: T) -> Self {
        Located { loc, val }
    }

    pub fn with_loc(loc: Loc, val: T) -> Self {
        Located::new(Some(loc), val)
    }

    pub fn loc(&self) -> Option<Loc> {
        self.loc
    }

    pub fn value(self) -> T {
        self.val
    }

    pub fn as_value(&self) -> &T {
        &self.val
    }

    pub fn proximate_to_option_loc(self, loc: Option<Loc>) -> Self {
        match self.loc {
            None => Self { loc, ..self },
            Some(_) => self,
        }
    }

    pub fn proximate_to_loc(self, loc: Loc) -> Self {
        self.proximate_to_option_loc(Some(loc))
    }

    pub fn map<S, F>(self, f: F) -> Located<S>
    where
        F: FnOnce(T) -> S,
    {
        Located::new(self.loc, f(self.val))
    }

    pub fn transfer<S>(&self, s: S) -> Located<S> {
        Located::new(self.loc, s)
    }
}

impl<T> From<T> for Located<T> {
    fn from(val: T) -> Self {
        Located { loc: None, val }
    }
}

#[derive(Debug)]
pub enum Error {
    Arithmetic(Located<fold::ArithmeticError>),
    Resolve(Located<resolve::Error>),
    Encode(Located<EncodeError>),
    // An emitter defect rather than bad input.
    Internal(String),
    Io(std::io::Error),
}

impl From<Located<fold::ArithmeticError>> for Error {
    fn from(err: Located<fold::ArithmeticError>) -> Self {
        Error::Arithmetic(err)
    }
}

impl From<Located<resolve::Error>> for Error {
    fn from(err: Located<resolve::Error>) -> Self {
        Error::Resolve(err)
    }
}

impl From<Located<EncodeError>> for Error {
    fn from(err: Located<EncodeError>) -> Self {
        match err.as_value() {
            // Only reachable if the reserve and fill walks disagree.
            EncodeError::Sink(sink) => Error::Internal(sink.to_string()),
            _ => Error::Encode(err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl Error {
    pub fn loc(&self) -> Option<Loc> {
        match self {
            Error::Arithmetic(err) => err.loc(),
            Error::Resolve(err) => err.loc(),
            Error::Encode(err) => err.loc(),
            Error::Internal(_) | Error::Io(_) => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Compilation Error (in ")?;
        match self {
            Error::Arithmetic(_) => write!(f, "Evaluator"),
            Error::Resolve(_) => write!(f, "Resolver"),
            Error::Encode(_) => write!(f, "Encoder"),
            Error::Internal(_) => write!(f, "Internal"),
            Error::Io(_) => write!(f, "Output"),
        }?;
        write!(f, "): ")?;
        match self {
            Error::Arithmetic(err) => write!(f, "{}", err),
            Error::Resolve(err) => write!(f, "{}", err),
            Error::Encode(err) => write!(f, "{}", err),
            Error::Internal(msg) => write!(f, "{}", msg),
            Error::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {}
