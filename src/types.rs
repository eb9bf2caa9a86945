//! Registro de tipos.
//!
//! Los tipos del lenguaje se internan estructuralmente en un registro
//! por unidad de compilación y se manipulan a través de handles opacos
//! [`TypeId`]. Dos tipos estructuralmente iguales reciben siempre el
//! mismo handle, por lo que la igualdad de tipos se reduce a igualdad
//! de ids. El interior del registro nunca se expone por referencia.

use crate::ast::RelOp;
use std::collections::HashMap;

/// Handle opaco de un tipo internado.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

/// Forma estructural de un tipo.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Type {
    Integer,
    Float,
    Boolean,
    Character,
    Void,
    Error,
    Array { size: usize, elem: TypeId },
    Function { params: Vec<TypeId>, ret: TypeId },
}

/// Registro de tipos de una unidad de compilación.
pub struct Types {
    interned: Vec<Type>,
    lookup: HashMap<Type, TypeId>,
    integer: TypeId,
    float: TypeId,
    boolean: TypeId,
    character: TypeId,
    void: TypeId,
    error: TypeId,
}

impl Types {
    pub fn new() -> Self {
        let mut types = Types {
            interned: Vec::new(),
            lookup: HashMap::new(),
            integer: TypeId(0),
            float: TypeId(0),
            boolean: TypeId(0),
            character: TypeId(0),
            void: TypeId(0),
            error: TypeId(0),
        };

        types.integer = types.intern(Type::Integer);
        types.float = types.intern(Type::Float);
        types.boolean = types.intern(Type::Boolean);
        types.character = types.intern(Type::Character);
        types.void = types.intern(Type::Void);
        types.error = types.intern(Type::Error);
        types
    }

    fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.lookup.get(&ty) {
            return id;
        }

        let id = TypeId(self.interned.len() as u32);
        self.interned.push(ty.clone());
        self.lookup.insert(ty, id);
        id
    }

    fn get(&self, id: TypeId) -> &Type {
        &self.interned[id.0 as usize]
    }

    pub fn create_integer_ty(&self) -> TypeId {
        self.integer
    }

    pub fn create_float_ty(&self) -> TypeId {
        self.float
    }

    pub fn create_boolean_ty(&self) -> TypeId {
        self.boolean
    }

    pub fn create_character_ty(&self) -> TypeId {
        self.character
    }

    pub fn create_void_ty(&self) -> TypeId {
        self.void
    }

    pub fn create_error_ty(&self) -> TypeId {
        self.error
    }

    pub fn create_array_ty(&mut self, size: usize, elem: TypeId) -> TypeId {
        self.intern(Type::Array { size, elem })
    }

    pub fn create_function_ty(&mut self, params: Vec<TypeId>, ret: TypeId) -> TypeId {
        self.intern(Type::Function { params, ret })
    }

    pub fn is_integer_ty(&self, id: TypeId) -> bool {
        id == self.integer
    }

    pub fn is_float_ty(&self, id: TypeId) -> bool {
        id == self.float
    }

    pub fn is_boolean_ty(&self, id: TypeId) -> bool {
        id == self.boolean
    }

    pub fn is_character_ty(&self, id: TypeId) -> bool {
        id == self.character
    }

    pub fn is_void_ty(&self, id: TypeId) -> bool {
        id == self.void
    }

    pub fn is_error_ty(&self, id: TypeId) -> bool {
        id == self.error
    }

    /// Escalares: entero, flotante, booleano o carácter.
    pub fn is_primitive_ty(&self, id: TypeId) -> bool {
        matches!(
            self.get(id),
            Type::Integer | Type::Float | Type::Boolean | Type::Character
        )
    }

    pub fn is_numeric_ty(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Integer | Type::Float)
    }

    pub fn is_array_ty(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Array { .. })
    }

    pub fn is_function_ty(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Function { .. })
    }

    pub fn is_void_function(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Function { ret, .. } if *ret == self.void)
    }

    /// La igualdad estructural se reduce a igualdad de handles.
    pub fn equal_types(&self, a: TypeId, b: TypeId) -> bool {
        a == b
    }

    /// Determina si un valor de tipo `source` puede almacenarse en un
    /// destino de tipo `target`: mismo tipo, o destino flotante con
    /// origen entero (coerción implícita).
    pub fn copyable_types(&self, target: TypeId, source: TypeId) -> bool {
        self.equal_types(target, source)
            || (self.is_float_ty(target) && self.is_integer_ty(source))
    }

    /// Determina si dos tipos admiten el operador relacional dado:
    /// los numéricos se comparan entre sí por promoción, los booleanos
    /// solo bajo `==` y `!=`, el resto exige el mismo tipo escalar.
    pub fn comparable_types(&self, a: TypeId, b: TypeId, op: RelOp) -> bool {
        if self.is_numeric_ty(a) && self.is_numeric_ty(b) {
            true
        } else if self.is_boolean_ty(a) && self.is_boolean_ty(b) {
            matches!(op, RelOp::Eq | RelOp::Neq)
        } else {
            self.equal_types(a, b) && self.is_primitive_ty(a)
        }
    }

    pub fn get_array_elem_type(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::Array { elem, .. } => *elem,
            _ => self.error,
        }
    }

    pub fn get_array_size(&self, id: TypeId) -> usize {
        match self.get(id) {
            Type::Array { size, .. } => *size,
            _ => 0,
        }
    }

    pub fn get_func_return_type(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::Function { ret, .. } => *ret,
            _ => self.error,
        }
    }

    pub fn get_num_of_parameters(&self, id: TypeId) -> usize {
        match self.get(id) {
            Type::Function { params, .. } => params.len(),
            _ => 0,
        }
    }

    pub fn get_parameter_type(&self, id: TypeId, i: usize) -> TypeId {
        match self.get(id) {
            Type::Function { params, .. } => params.get(i).copied().unwrap_or(self.error),
            _ => self.error,
        }
    }

    pub fn get_func_params_types(&self, id: TypeId) -> Vec<TypeId> {
        match self.get(id) {
            Type::Function { params, .. } => params.clone(),
            _ => Vec::new(),
        }
    }

    /// Celdas de memoria que ocupa un valor: 1 para escalares, el
    /// número de elementos para arreglos.
    pub fn get_size_of_type(&self, id: TypeId) -> usize {
        match self.get(id) {
            Type::Array { size, .. } => *size,
            Type::Integer | Type::Float | Type::Boolean | Type::Character => 1,
            _ => 0,
        }
    }

    /// Nombre textual de un tipo, tal como aparece en el dump de t-code.
    pub fn to_string(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Integer => "int".into(),
            Type::Float => "float".into(),
            Type::Boolean => "bool".into(),
            Type::Character => "char".into(),
            Type::Void => "void".into(),
            Type::Error => "<error>".into(),
            Type::Array { size, elem } => {
                format!("array[{}] of {}", size, self.to_string(*elem))
            }
            Type::Function { params, ret } => {
                let params: Vec<_> = params.iter().map(|p| self.to_string(*p)).collect();
                format!("func({}) : {}", params.join(", "), self.to_string(*ret))
            }
        }
    }
}

impl Default for Types {
    fn default() -> Self {
        Types::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_interning_deduplicates() {
        let mut types = Types::new();

        let a = types.create_array_ty(10, types.create_integer_ty());
        let b = types.create_array_ty(10, types.create_integer_ty());
        let c = types.create_array_ty(11, types.create_integer_ty());

        assert_eq!(a, b);
        assert_ne!(a, c);

        let f = types.create_function_ty(vec![a], types.create_void_ty());
        let g = types.create_function_ty(vec![b], types.create_void_ty());
        assert_eq!(f, g);
        assert!(types.is_void_function(f));
    }

    #[test]
    fn copyable_admits_integer_to_float() {
        let types = Types::new();

        assert!(types.copyable_types(types.create_float_ty(), types.create_integer_ty()));
        assert!(!types.copyable_types(types.create_integer_ty(), types.create_float_ty()));
        assert!(!types.copyable_types(types.create_integer_ty(), types.create_boolean_ty()));
    }

    #[test]
    fn comparable_restricts_booleans_to_equality() {
        let types = Types::new();
        let boolean = types.create_boolean_ty();

        assert!(types.comparable_types(types.create_integer_ty(), types.create_float_ty(), RelOp::Lt));
        assert!(types.comparable_types(boolean, boolean, RelOp::Neq));
        assert!(!types.comparable_types(boolean, boolean, RelOp::Lt));
        assert!(!types.comparable_types(types.create_character_ty(), types.create_integer_ty(), RelOp::Eq));
    }
}
