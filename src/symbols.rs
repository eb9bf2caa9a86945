//! Tabla de símbolos.
//!
//! Los ámbitos forman una arena plana identificada por [`ScopeId`] más
//! una pila de ámbitos activos. La fase de recolección crea los ámbitos
//! con `push_new_scope`; las fases posteriores los reactivan con
//! `push_this_scope` a partir de la decoración de ámbito que quedó en
//! el árbol. La búsqueda de identificadores recorre la pila desde el
//! ámbito más profundo.

use crate::types::{TypeId, Types};
use std::collections::HashMap;

/// Nombre del ámbito raíz.
pub const GLOBAL_SCOPE_NAME: &str = "<global>";

/// Handle de un ámbito en la arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScopeId(usize);

/// Clase de un símbolo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    LocalVar,
    Parameter,
    Function,
}

/// Registro de un símbolo: clase y tipo.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub ty: TypeId,
}

struct Scope {
    name: String,
    symbols: HashMap<String, Symbol>,
}

/// Arena de ámbitos y pila de ámbitos activos.
pub struct SymTable {
    scopes: Vec<Scope>,
    stack: Vec<ScopeId>,
}

impl SymTable {
    pub fn new() -> Self {
        SymTable {
            scopes: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Crea un ámbito nuevo y lo activa.
    pub fn push_new_scope(&mut self, name: impl Into<String>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            name: name.into(),
            symbols: HashMap::new(),
        });

        self.stack.push(id);
        id
    }

    /// Reactiva un ámbito ya existente.
    pub fn push_this_scope(&mut self, id: ScopeId) {
        self.stack.push(id);
    }

    /// Desactiva el ámbito más profundo.
    pub fn pop_scope(&mut self) {
        self.stack.pop();
    }

    fn current(&self) -> ScopeId {
        *self.stack.last().expect("scope stack underflow")
    }

    /// Determina si el identificador ya existe en el ámbito activo.
    pub fn find_in_current_scope(&self, ident: &str) -> bool {
        let ScopeId(current) = self.current();
        self.scopes[current].symbols.contains_key(ident)
    }

    /// Busca el identificador de adentro hacia afuera por la pila.
    pub fn find_in_stack(&self, ident: &str) -> Option<&Symbol> {
        self.stack
            .iter()
            .rev()
            .find_map(|&ScopeId(scope)| self.scopes[scope].symbols.get(ident))
    }

    /// Tipo del símbolo visible con ese nombre, si existe.
    pub fn get_type(&self, ident: &str) -> Option<TypeId> {
        self.find_in_stack(ident).map(|symbol| symbol.ty)
    }

    pub fn add_local_var(&mut self, ident: impl Into<String>, ty: TypeId) {
        self.add(ident.into(), SymbolKind::LocalVar, ty);
    }

    pub fn add_parameter(&mut self, ident: impl Into<String>, ty: TypeId) {
        self.add(ident.into(), SymbolKind::Parameter, ty);
    }

    pub fn add_function(&mut self, ident: impl Into<String>, ty: TypeId) {
        self.add(ident.into(), SymbolKind::Function, ty);
    }

    fn add(&mut self, ident: String, kind: SymbolKind, ty: TypeId) {
        let ScopeId(current) = self.current();
        self.scopes[current].symbols.insert(ident, Symbol { kind, ty });
    }

    pub fn is_function_class(&self, ident: &str) -> bool {
        self.is_class(ident, SymbolKind::Function)
    }

    pub fn is_parameter_class(&self, ident: &str) -> bool {
        self.is_class(ident, SymbolKind::Parameter)
    }

    pub fn is_local_var_class(&self, ident: &str) -> bool {
        self.is_class(ident, SymbolKind::LocalVar)
    }

    fn is_class(&self, ident: &str, kind: SymbolKind) -> bool {
        matches!(self.find_in_stack(ident), Some(symbol) if symbol.kind == kind)
    }

    /// Tipo de una función registrada en el ámbito global.
    pub fn get_global_function_type(&self, name: &str) -> Option<TypeId> {
        let global = self.scopes.first()?;
        match global.symbols.get(name) {
            Some(symbol) if symbol.kind == SymbolKind::Function => Some(symbol.ty),
            _ => None,
        }
    }

    /// Tipo de un símbolo local (o parámetro) del ámbito de una función,
    /// buscada por nombre sin importar la pila activa.
    pub fn get_local_symbol_type(&self, function: &str, ident: &str) -> Option<TypeId> {
        self.scopes
            .iter()
            .find(|scope| scope.name == function)
            .and_then(|scope| scope.symbols.get(ident))
            .map(|symbol| symbol.ty)
    }

    /// Verifica la ausencia de un `main` bien declarado: función global
    /// sin parámetros y sin valor de retorno.
    pub fn no_main_properly_declared(&self, types: &Types) -> bool {
        match self.get_global_function_type("main") {
            Some(ty) => {
                !types.is_void_function(ty) || types.get_num_of_parameters(ty) != 0
            }
            None => true,
        }
    }
}

impl Default for SymTable {
    fn default() -> Self {
        SymTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_deepest_first() {
        let mut types = Types::new();
        let mut symbols = SymTable::new();

        symbols.push_new_scope(GLOBAL_SCOPE_NAME);
        symbols.add_function(
            "x",
            types.create_function_ty(Vec::new(), types.create_void_ty()),
        );

        symbols.push_new_scope("f");
        symbols.add_local_var("x", types.create_integer_ty());

        let symbol = symbols.find_in_stack("x").unwrap();
        assert_eq!(symbol.kind, SymbolKind::LocalVar);

        symbols.pop_scope();
        let symbol = symbols.find_in_stack("x").unwrap();
        assert_eq!(symbol.kind, SymbolKind::Function);
    }

    #[test]
    fn main_detection_requires_void_and_no_parameters() {
        let mut types = Types::new();
        let mut symbols = SymTable::new();

        symbols.push_new_scope(GLOBAL_SCOPE_NAME);
        assert!(symbols.no_main_properly_declared(&types));

        let bad = types.create_function_ty(vec![types.create_integer_ty()], types.create_void_ty());
        symbols.add_function("main", bad);
        assert!(symbols.no_main_properly_declared(&types));

        let good = types.create_function_ty(Vec::new(), types.create_void_ty());
        symbols.add_function("main", good);
        assert!(!symbols.no_main_properly_declared(&types));
    }
}
