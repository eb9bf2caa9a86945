//! Decoraciones del árbol.
//!
//! Las fases semánticas no mutan el árbol: anotan sus derivaciones en
//! tablas laterales densas indexadas por [`NodeId`]. La recolección de
//! símbolos escribe ámbitos y tipos de declaración; el chequeo de tipos
//! escribe tipo y condición de l-value de cada expresión. Las fases
//! posteriores solo leen.

use crate::ast::NodeId;
use crate::symbols::ScopeId;
use crate::types::TypeId;

/// Tablas laterales de atributos derivados.
pub struct Decorations {
    scopes: Vec<Option<ScopeId>>,
    types: Vec<Option<TypeId>>,
    lvalues: Vec<Option<bool>>,
}

impl Decorations {
    /// Reserva tablas para la cantidad de nodos que asignó el parser.
    pub fn new(node_count: u32) -> Self {
        let n = node_count as usize;
        Decorations {
            scopes: vec![None; n],
            types: vec![None; n],
            lvalues: vec![None; n],
        }
    }

    pub fn put_scope(&mut self, NodeId(node): NodeId, scope: ScopeId) {
        self.scopes[node as usize] = Some(scope);
    }

    pub fn get_scope(&self, NodeId(node): NodeId) -> ScopeId {
        self.scopes[node as usize].expect("node carries no scope decoration")
    }

    pub fn put_type(&mut self, NodeId(node): NodeId, ty: TypeId) {
        self.types[node as usize] = Some(ty);
    }

    pub fn get_type(&self, NodeId(node): NodeId) -> TypeId {
        self.types[node as usize].expect("node carries no type decoration")
    }

    pub fn put_is_lvalue(&mut self, NodeId(node): NodeId, is_lvalue: bool) {
        self.lvalues[node as usize] = Some(is_lvalue);
    }

    pub fn get_is_lvalue(&self, NodeId(node): NodeId) -> bool {
        self.lvalues[node as usize]
            .expect("node carries no l-value decoration")
    }

    /// Consulta sin pánico, para verificación en pruebas.
    pub fn try_get_type(&self, NodeId(node): NodeId) -> Option<TypeId> {
        self.types.get(node as usize).copied().flatten()
    }
}
