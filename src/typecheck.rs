//! Chequeo de tipos.
//!
//! Segunda pasada semántica. Completa la decoración de cada expresión
//! con su tipo y su condición de l-value, y reporta todo error
//! semántico con su ubicación. El tipo `Error` es absorbente: cuando un
//! operando ya es erróneo, los nodos que lo combinan no producen
//! diagnósticos nuevos, lo cual evita cascadas de errores derivados de
//! una sola causa.
//!
//! Al final de la pasada se verifica la presencia de un `main` global
//! sin parámetros y sin valor de retorno.

use log::debug;

use crate::{
    ast::*,
    decor::Decorations,
    diag::{Diagnostics, SemanticError},
    symbols::SymTable,
    types::{TypeId, Types},
};

/// Ejecuta el chequeo de tipos sobre un programa ya recolectado.
pub fn typecheck(
    program: &Program,
    types: &mut Types,
    symbols: &mut SymTable,
    decorations: &mut Decorations,
    diagnostics: &mut Diagnostics,
) {
    debug!("typechecking");

    let mut checker = Checker {
        types,
        symbols,
        decorations,
        diagnostics,
        current_function: None,
    };

    checker.program(program);
}

struct Checker<'a> {
    types: &'a mut Types,
    symbols: &'a mut SymTable,
    decorations: &'a mut Decorations,
    diagnostics: &'a mut Diagnostics,
    /// Tipo de la función en chequeo, para validar `return`.
    current_function: Option<TypeId>,
}

impl Checker<'_> {
    fn program(&mut self, program: &Program) {
        let scope = self.decorations.get_scope(program.id);
        self.symbols.push_this_scope(scope);

        for function in &program.functions {
            self.function(function);
        }

        if self.symbols.no_main_properly_declared(self.types) {
            self.diagnostics
                .report(SemanticError::NoMainProperlyDeclared, program.eof.clone());
        }

        self.symbols.pop_scope();
    }

    fn function(&mut self, function: &Function) {
        debug!("typechecking function `{}`", function.name.as_ref());

        let scope = self.decorations.get_scope(function.id);
        self.symbols.push_this_scope(scope);

        let ret = match &function.ret {
            Some(spec) => self.decorations.get_type(spec.id),
            None => self.types.create_void_ty(),
        };

        self.current_function = Some(self.types.create_function_ty(Vec::new(), ret));

        for statement in &function.body {
            self.statement(statement);
        }

        self.symbols.pop_scope();
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Assign { assign, lhs, rhs } => {
                self.left_expr(lhs);
                self.expr(rhs);

                let t1 = self.decorations.get_type(lhs.id);
                let t2 = self.decorations.get_type(rhs.id);

                if !self.types.is_error_ty(t1)
                    && !self.types.is_error_ty(t2)
                    && !self.types.is_void_ty(t2)
                    && !self.types.copyable_types(t1, t2)
                {
                    self.diagnostics
                        .report(SemanticError::IncompatibleAssignment, assign.clone());
                }

                if !self.types.is_error_ty(t1) && !self.decorations.get_is_lvalue(lhs.id) {
                    self.diagnostics
                        .report(SemanticError::NonReferenceableLeftExpr, lhs.location.clone());
                }
            }

            Statement::If {
                location,
                condition,
                then_body,
                else_body,
            } => {
                self.expr(condition);

                let t1 = self.decorations.get_type(condition.id);
                if !self.types.is_error_ty(t1) && !self.types.is_boolean_ty(t1) {
                    self.diagnostics
                        .report(SemanticError::BooleanRequired, location.clone());
                }

                for statement in then_body.iter().chain(else_body.iter().flatten()) {
                    self.statement(statement);
                }
            }

            Statement::While {
                location,
                condition,
                body,
            } => {
                self.expr(condition);

                let t1 = self.decorations.get_type(condition.id);
                if !self.types.is_error_ty(t1) && !self.types.is_boolean_ty(t1) {
                    self.diagnostics
                        .report(SemanticError::BooleanRequired, location.clone());
                }

                for statement in body {
                    self.statement(statement);
                }
            }

            Statement::ProcCall(call) => {
                // En posición de sentencia, un callee void es válido
                self.call(call, false);
            }

            Statement::Read { location, target } => {
                self.left_expr(target);

                let t1 = self.decorations.get_type(target.id);
                if !self.types.is_error_ty(t1)
                    && !self.types.is_primitive_ty(t1)
                    && !self.types.is_function_ty(t1)
                {
                    self.diagnostics
                        .report(SemanticError::ReadWriteRequireBasic, location.clone());
                }

                if !self.types.is_error_ty(t1) && !self.decorations.get_is_lvalue(target.id) {
                    self.diagnostics
                        .report(SemanticError::NonReferenceableExpression, location.clone());
                }
            }

            Statement::WriteExpr { location, expr } => {
                self.expr(expr);

                let t1 = self.decorations.get_type(expr.id);
                if !self.types.is_error_ty(t1) && !self.types.is_primitive_ty(t1) {
                    self.diagnostics
                        .report(SemanticError::ReadWriteRequireBasic, location.clone());
                }
            }

            Statement::WriteString { .. } => {}

            Statement::Return { location, expr } => {
                let function = self
                    .current_function
                    .expect("return statement outside of a function");

                match expr {
                    Some(expr) => {
                        self.expr(expr);

                        let t_expr = self.decorations.get_type(expr.id);
                        let t_ret = self.types.get_func_return_type(function);

                        if !self.types.is_error_ty(t_expr) && self.types.is_void_function(function)
                        {
                            self.diagnostics
                                .report(SemanticError::IncompatibleReturn, location.clone());
                        } else if !self.types.is_error_ty(t_expr)
                            && !self.types.equal_types(t_ret, t_expr)
                            && !(self.types.is_float_ty(t_ret) && self.types.is_integer_ty(t_expr))
                        {
                            self.diagnostics
                                .report(SemanticError::IncompatibleReturn, location.clone());
                        }
                    }

                    None => {
                        if !self.types.is_void_function(function) {
                            self.diagnostics
                                .report(SemanticError::IncompatibleReturn, location.clone());
                        }
                    }
                }
            }
        }
    }

    fn left_expr(&mut self, left: &LeftExpr) {
        match &left.kind {
            LeftExprKind::Ident(ident) => {
                self.ident(ident);

                let ty = self.decorations.get_type(ident.id);
                let is_lvalue = self.decorations.get_is_lvalue(ident.id);
                self.decorations.put_type(left.id, ty);
                self.decorations.put_is_lvalue(left.id, is_lvalue);
            }

            LeftExprKind::Index { base, index } => {
                self.ident(base);
                self.expr(index);

                let t_index = self.decorations.get_type(index.id);
                let t_base = self.decorations.get_type(base.id);
                let mut is_lvalue = self.decorations.get_is_lvalue(base.id);
                let mut is_array = !self.types.is_error_ty(t_base);
                let mut decoration = t_base;

                if !self.types.is_error_ty(t_base) && !self.types.is_array_ty(t_base) {
                    decoration = self.types.create_error_ty();
                    is_lvalue = false;
                    is_array = false;
                    self.diagnostics
                        .report(SemanticError::NonArrayInArrayAccess, left.location.clone());
                }

                if !self.types.is_error_ty(t_index) && !self.types.is_integer_ty(t_index) {
                    self.diagnostics.report(
                        SemanticError::NonIntegerIndexInArrayAccess,
                        index.location.clone(),
                    );
                }

                if is_array {
                    decoration = self.types.get_array_elem_type(t_base);
                }

                self.decorations.put_type(left.id, decoration);
                self.decorations.put_is_lvalue(left.id, is_lvalue);
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Value(literal) => {
                let ty = match literal {
                    Literal::Int(_) => self.types.create_integer_ty(),
                    Literal::Float(_) => self.types.create_float_ty(),
                    Literal::Char(_) => self.types.create_character_ty(),
                    Literal::Bool(_) => self.types.create_boolean_ty(),
                };

                self.decorations.put_type(expr.id, ty);
                self.decorations.put_is_lvalue(expr.id, false);
            }

            ExprKind::Ident(ident) => {
                self.ident(ident);

                let ty = self.decorations.get_type(ident.id);
                let is_lvalue = self.decorations.get_is_lvalue(ident.id);
                self.decorations.put_type(expr.id, ty);
                self.decorations.put_is_lvalue(expr.id, is_lvalue);
            }

            ExprKind::Index { base, index } => {
                self.ident(base);
                self.expr(index);

                let t_index = self.decorations.get_type(index.id);
                let t_base = self.decorations.get_type(base.id);

                if !self.types.is_error_ty(t_index) && !self.types.is_integer_ty(t_index) {
                    self.diagnostics.report(
                        SemanticError::NonIntegerIndexInArrayAccess,
                        index.location.clone(),
                    );
                }

                let decoration = if self.types.is_array_ty(t_base) {
                    self.types.get_array_elem_type(t_base)
                } else {
                    if !self.types.is_error_ty(t_base) {
                        self.diagnostics.report(
                            SemanticError::NonArrayInArrayAccess,
                            expr.location.clone(),
                        );
                    }
                    self.types.create_error_ty()
                };

                self.decorations.put_type(expr.id, decoration);
                let is_lvalue = self.decorations.get_is_lvalue(base.id);
                self.decorations.put_is_lvalue(expr.id, is_lvalue);
            }

            ExprKind::Call(call) => {
                self.call(call, true);

                let ty = self.decorations.get_type(call.id);
                self.decorations.put_type(expr.id, ty);
                self.decorations.put_is_lvalue(expr.id, false);
            }

            ExprKind::Paren(inner) => {
                self.expr(inner);

                let ty = self.decorations.get_type(inner.id);
                self.decorations.put_type(expr.id, ty);
                self.decorations.put_is_lvalue(expr.id, false);
            }

            ExprKind::Unary { op, expr: operand } => {
                self.expr(operand);

                let ty = self.decorations.get_type(operand.id);
                if !self.types.is_error_ty(ty) {
                    let incompatible = match op.as_ref() {
                        UnaryOp::Plus | UnaryOp::Minus => !self.types.is_numeric_ty(ty),
                        UnaryOp::Not => !self.types.is_boolean_ty(ty),
                    };

                    if incompatible {
                        self.diagnostics.report(
                            SemanticError::IncompatibleOperator(op.as_ref().to_string()),
                            op.location().clone(),
                        );
                    }
                }

                let decoration = match op.as_ref() {
                    UnaryOp::Not => self.types.create_boolean_ty(),
                    _ if self.types.is_float_ty(ty) => self.types.create_float_ty(),
                    _ => self.types.create_integer_ty(),
                };

                self.decorations.put_type(expr.id, decoration);
                self.decorations.put_is_lvalue(expr.id, false);
            }

            ExprKind::Arithmetic { op, lhs, rhs } => {
                self.expr(lhs);
                self.expr(rhs);

                let t1 = self.decorations.get_type(lhs.id);
                let t2 = self.decorations.get_type(rhs.id);

                let decoration = if let ArithOp::Mod = op.as_ref() {
                    // El módulo exige operandos enteros
                    if (!self.types.is_error_ty(t1) && !self.types.is_integer_ty(t1))
                        || (!self.types.is_error_ty(t2) && !self.types.is_integer_ty(t2))
                    {
                        self.diagnostics.report(
                            SemanticError::IncompatibleOperator(op.as_ref().to_string()),
                            op.location().clone(),
                        );
                    }

                    self.types.create_integer_ty()
                } else {
                    if (!self.types.is_error_ty(t1) && !self.types.is_numeric_ty(t1))
                        || (!self.types.is_error_ty(t2) && !self.types.is_numeric_ty(t2))
                    {
                        self.diagnostics.report(
                            SemanticError::IncompatibleOperator(op.as_ref().to_string()),
                            op.location().clone(),
                        );
                    }

                    if self.types.is_float_ty(t1) || self.types.is_float_ty(t2) {
                        self.types.create_float_ty()
                    } else {
                        self.types.create_integer_ty()
                    }
                };

                self.decorations.put_type(expr.id, decoration);
                self.decorations.put_is_lvalue(expr.id, false);
            }

            ExprKind::Relational { op, lhs, rhs } => {
                self.expr(lhs);
                self.expr(rhs);

                let t1 = self.decorations.get_type(lhs.id);
                let t2 = self.decorations.get_type(rhs.id);

                if !self.types.is_error_ty(t1)
                    && !self.types.is_error_ty(t2)
                    && !self.types.comparable_types(t1, t2, *op.as_ref())
                {
                    self.diagnostics.report(
                        SemanticError::IncompatibleOperator(op.as_ref().to_string()),
                        op.location().clone(),
                    );
                }

                let boolean = self.types.create_boolean_ty();
                self.decorations.put_type(expr.id, boolean);
                self.decorations.put_is_lvalue(expr.id, false);
            }

            ExprKind::Logic { op, lhs, rhs } => {
                self.expr(lhs);
                self.expr(rhs);

                let t1 = self.decorations.get_type(lhs.id);
                let t2 = self.decorations.get_type(rhs.id);

                if (!self.types.is_error_ty(t1) && !self.types.is_boolean_ty(t1))
                    || (!self.types.is_error_ty(t2) && !self.types.is_boolean_ty(t2))
                {
                    self.diagnostics.report(
                        SemanticError::IncompatibleOperator(op.as_ref().to_string()),
                        op.location().clone(),
                    );
                }

                let boolean = self.types.create_boolean_ty();
                self.decorations.put_type(expr.id, boolean);
                self.decorations.put_is_lvalue(expr.id, false);
            }
        }
    }

    /// Chequea una llamada, en posición de expresión o de sentencia.
    /// Solo en posición de expresión un callee void es un error.
    fn call(&mut self, call: &Call, expression_position: bool) {
        self.ident(&call.callee);
        let t = self.decorations.get_type(call.callee.id);

        let mut arg_types = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            self.expr(arg);
            arg_types.push(self.decorations.get_type(arg.id));
        }

        if self.types.is_error_ty(t) {
            let error = self.types.create_error_ty();
            self.decorations.put_type(call.id, error);
        } else if !self.types.is_function_ty(t) {
            self.diagnostics.report(
                SemanticError::IsNotCallable(call.callee.name.clone()),
                call.location.clone(),
            );

            let error = self.types.create_error_ty();
            self.decorations.put_type(call.id, error);
        } else {
            let ret = self.types.get_func_return_type(t);
            self.decorations.put_type(call.id, ret);

            if arg_types.len() != self.types.get_num_of_parameters(t) {
                self.diagnostics.report(
                    SemanticError::NumberOfParameters(call.callee.name.clone()),
                    call.callee.location.clone(),
                );

                self.decorations.put_is_lvalue(call.id, false);
                return;
            }

            // Un entero puede alimentar un parámetro flotante; cualquier
            // otra discrepancia es un error por argumento
            let param_types = self.types.get_func_params_types(t);
            for (i, (&arg, &param)) in arg_types.iter().zip(param_types.iter()).enumerate() {
                if !self.types.equal_types(arg, param)
                    && !self.types.is_error_ty(arg)
                    && !(self.types.is_integer_ty(arg) && self.types.is_float_ty(param))
                {
                    self.diagnostics.report(
                        SemanticError::IncompatibleParameter {
                            function: call.callee.name.clone(),
                            number: i + 1,
                        },
                        call.args[i].location.clone(),
                    );
                }
            }

            if expression_position && self.types.is_void_function(t) {
                self.diagnostics.report(
                    SemanticError::IsNotFunction(call.callee.name.clone()),
                    call.location.clone(),
                );
            }
        }

        self.decorations.put_is_lvalue(call.id, false);
    }

    fn ident(&mut self, ident: &Ident) {
        match self.symbols.get_type(&ident.name) {
            None => {
                self.diagnostics.report(
                    SemanticError::UndeclaredIdent(ident.name.clone()),
                    ident.location.clone(),
                );

                let error = self.types.create_error_ty();
                self.decorations.put_type(ident.id, error);
                // Se marca como l-value para no arrastrar un segundo
                // error de referenciabilidad sobre el mismo uso
                self.decorations.put_is_lvalue(ident.id, true);
            }

            Some(ty) => {
                self.decorations.put_type(ident.id, ty);
                self.decorations
                    .put_is_lvalue(ident.id, !self.symbols.is_function_class(&ident.name));
            }
        }
    }
}
