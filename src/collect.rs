//! Recolección de símbolos.
//!
//! Primera pasada semántica, de arriba hacia abajo. Construye la
//! jerarquía de ámbitos, registra cada entidad nombrada con su tipo y
//! decora los nodos de declaración con el tipo que resuelven. El nodo
//! de programa y cada nodo de función quedan decorados con el ámbito
//! que les corresponde; las fases posteriores reactivan esos ámbitos
//! sin volver a construirlos.

use log::debug;

use crate::{
    ast::{BasicType, Function, Program, TypeSpec, TypeSpecKind},
    decor::Decorations,
    diag::{Diagnostics, SemanticError},
    symbols::{SymTable, GLOBAL_SCOPE_NAME},
    types::{TypeId, Types},
};

/// Ejecuta la pasada de recolección sobre un programa completo.
pub fn collect(
    program: &Program,
    types: &mut Types,
    symbols: &mut SymTable,
    decorations: &mut Decorations,
    diagnostics: &mut Diagnostics,
) {
    debug!("collecting symbols");

    let mut collector = Collector {
        types,
        symbols,
        decorations,
        diagnostics,
    };

    collector.program(program);
}

struct Collector<'a> {
    types: &'a mut Types,
    symbols: &'a mut SymTable,
    decorations: &'a mut Decorations,
    diagnostics: &'a mut Diagnostics,
}

impl Collector<'_> {
    fn program(&mut self, program: &Program) {
        let scope = self.symbols.push_new_scope(GLOBAL_SCOPE_NAME);
        self.decorations.put_scope(program.id, scope);

        for function in &program.functions {
            self.function(function);
        }

        self.symbols.pop_scope();
    }

    fn function(&mut self, function: &Function) {
        debug!("collecting function `{}`", function.name.as_ref());

        let scope = self.symbols.push_new_scope(function.name.as_ref().clone());
        self.decorations.put_scope(function.id, scope);

        let mut param_types = Vec::new();
        for param in &function.params {
            let ty = self.type_spec(&param.ty);

            if self.symbols.find_in_current_scope(param.name.as_ref()) {
                self.diagnostics.report(
                    SemanticError::DeclaredIdent(param.name.as_ref().clone()),
                    param.name.location().clone(),
                );
            } else {
                self.symbols.add_parameter(param.name.as_ref().clone(), ty);
                param_types.push(ty);
            }
        }

        let ret = match &function.ret {
            Some(spec) => self.type_spec(spec),
            None => self.types.create_void_ty(),
        };

        // El nodo de función queda decorado con su tipo de retorno
        self.decorations.put_type(function.id, ret);

        for decl in &function.decls {
            let ty = self.type_spec(&decl.ty);

            for name in &decl.names {
                if self.symbols.find_in_current_scope(name.as_ref()) {
                    self.diagnostics.report(
                        SemanticError::DeclaredIdent(name.as_ref().clone()),
                        name.location().clone(),
                    );
                } else {
                    self.symbols.add_local_var(name.as_ref().clone(), ty);
                }
            }
        }

        self.symbols.pop_scope();

        // La función misma se registra en el ámbito que la contiene
        if self.symbols.find_in_current_scope(function.name.as_ref()) {
            self.diagnostics.report(
                SemanticError::DeclaredIdent(function.name.as_ref().clone()),
                function.name.location().clone(),
            );
        } else {
            let ty = self.types.create_function_ty(param_types, ret);
            self.symbols.add_function(function.name.as_ref().clone(), ty);
        }
    }

    /// Resuelve y decora una anotación de tipo.
    fn type_spec(&mut self, spec: &TypeSpec) -> TypeId {
        let ty = match &spec.kind {
            TypeSpecKind::Basic(basic) => self.basic(*basic),
            TypeSpecKind::Array { size, elem } => {
                let elem = self.basic(*elem);
                self.types.create_array_ty(*size as usize, elem)
            }
        };

        self.decorations.put_type(spec.id, ty);
        ty
    }

    fn basic(&mut self, basic: BasicType) -> TypeId {
        match basic {
            BasicType::Int => self.types.create_integer_ty(),
            BasicType::Float => self.types.create_float_ty(),
            BasicType::Bool => self.types.create_boolean_ty(),
            BasicType::Char => self.types.create_character_ty(),
        }
    }
}
