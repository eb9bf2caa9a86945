//! Generación de código de tres direcciones.
//!
//! Tercera pasada. Recorre el árbol ya decorado y produce una
//! subrutina t-code por función. Cada visita de expresión devuelve un
//! triple de atributos `(addr, offs, code)`: `addr` es el token que
//! nombra el valor (variable, temporal o literal), `offs` solo se
//! establece para expresiones izquierdas indexadas, y `code` son las
//! instrucciones que deben ejecutarse antes de poder usar `addr`.
//!
//! Los temporales `%1, %2, …` y los sufijos de etiqueta se emiten con
//! contadores frescos por función; el recorrido es en profundidad de
//! izquierda a derecha y ese orden de nombres es contractual. Toda
//! temporal se asigna exactamente una vez por función (pseudo-SSA),
//! condición que el lowering a LLVM verifica y exige.

use log::debug;

use crate::{
    ast::*,
    decor::Decorations,
    symbols::SymTable,
    tcode::{Code, Instruction, Op, Subroutine},
    types::{TypeId, Types},
};

/// Genera el programa t-code de un árbol sin errores semánticos.
pub fn codegen(
    program: &Program,
    types: &Types,
    symbols: &mut SymTable,
    decorations: &Decorations,
) -> Code {
    debug!("generating three-address code");

    let mut generator = Generator {
        types,
        symbols,
        decorations,
        counters: Counters::default(),
        current_ret: None,
    };

    generator.program(program)
}

/// Contadores de temporales y de familias de etiquetas, frescos por
/// función.
#[derive(Default)]
struct Counters {
    temp: u32,
    if_label: u32,
    while_label: u32,
}

impl Counters {
    fn reset(&mut self) {
        *self = Counters::default();
    }

    fn new_temp(&mut self) -> String {
        self.temp += 1;
        format!("%{}", self.temp)
    }

    fn new_if_label(&mut self) -> String {
        self.if_label += 1;
        self.if_label.to_string()
    }

    fn new_while_label(&mut self) -> String {
        self.while_label += 1;
        self.while_label.to_string()
    }
}

/// Triple de atributos de una expresión visitada.
struct Attrib {
    addr: String,
    offs: String,
    code: Vec<Instruction>,
}

impl Attrib {
    fn new(addr: impl Into<String>, offs: impl Into<String>, code: Vec<Instruction>) -> Self {
        Attrib {
            addr: addr.into(),
            offs: offs.into(),
            code,
        }
    }
}

struct Generator<'a> {
    types: &'a Types,
    symbols: &'a mut SymTable,
    decorations: &'a Decorations,
    counters: Counters,
    /// Tipo de retorno de la función en curso, para la coerción en
    /// sentencias `return`.
    current_ret: Option<TypeId>,
}

impl Generator<'_> {
    fn program(&mut self, program: &Program) -> Code {
        let scope = self.decorations.get_scope(program.id);
        self.symbols.push_this_scope(scope);

        let mut code = Code::default();
        for function in &program.functions {
            code.add_subroutine(self.function(function));
        }

        self.symbols.pop_scope();
        code
    }

    fn function(&mut self, function: &Function) -> Subroutine {
        debug!("generating function `{}`", function.name.as_ref());

        let scope = self.decorations.get_scope(function.id);
        self.symbols.push_this_scope(scope);
        self.counters.reset();

        let mut subroutine = Subroutine::new(function.name.as_ref().clone());

        // El slot de retorno viaja como el parámetro sintético `_result`
        if let Some(ret) = &function.ret {
            let ty = self.decorations.get_type(ret.id);
            subroutine.add_param("_result", self.types.to_string(ty), false);
        }
        self.current_ret = Some(self.decorations.get_type(function.id));

        for param in &function.params {
            let ty = self.decorations.get_type(param.ty.id);
            if self.types.is_array_ty(ty) {
                let elem = self.types.get_array_elem_type(ty);
                subroutine.add_param(param.name.as_ref().clone(), self.types.to_string(elem), true);
            } else {
                subroutine.add_param(param.name.as_ref().clone(), self.types.to_string(ty), false);
            }
        }

        for decl in &function.decls {
            let ty = self.decorations.get_type(decl.ty.id);
            let size = self.types.get_size_of_type(ty);

            for name in &decl.names {
                if self.types.is_array_ty(ty) {
                    let elem = self.types.get_array_elem_type(ty);
                    subroutine.add_var(name.as_ref().clone(), self.types.to_string(elem), size);
                } else {
                    subroutine.add_var(name.as_ref().clone(), self.types.to_string(ty), size);
                }
            }
        }

        let mut code = self.statements(&function.body);
        if code.last().map(|instruction| instruction.op) != Some(Op::Return) {
            code.push(Instruction::nullary(Op::Return));
        }

        subroutine.set_instructions(code);
        self.symbols.pop_scope();
        subroutine
    }

    fn statements(&mut self, statements: &[Statement]) -> Vec<Instruction> {
        let mut code = Vec::new();
        for statement in statements {
            code.extend(self.statement(statement));
        }

        code
    }

    fn statement(&mut self, statement: &Statement) -> Vec<Instruction> {
        match statement {
            Statement::Assign { lhs, rhs, .. } => self.assign(lhs, rhs),

            Statement::If {
                condition,
                then_body,
                else_body,
                ..
            } => {
                let cond = self.expr(condition);
                let mut code = cond.code;

                match else_body {
                    None => {
                        let then_code = self.statements(then_body);
                        let label_endif = format!("Endif{}", self.counters.new_if_label());

                        code.push(Instruction::binary(Op::Fjump, cond.addr, &label_endif));
                        code.extend(then_code);
                        code.push(Instruction::unary(Op::Label, label_endif));
                    }

                    Some(else_body) => {
                        let then_code = self.statements(then_body);
                        let else_code = self.statements(else_body);
                        let label = self.counters.new_if_label();
                        let label_else = format!("If{}", label);
                        let label_end = format!("Else{}", label);

                        code.push(Instruction::binary(Op::Fjump, cond.addr, &label_else));
                        code.extend(then_code);
                        code.push(Instruction::unary(Op::Ujump, &label_end));
                        code.push(Instruction::unary(Op::Label, label_else));
                        code.extend(else_code);
                        code.push(Instruction::unary(Op::Label, label_end));
                    }
                }

                code
            }

            Statement::While {
                condition, body, ..
            } => {
                let cond = self.expr(condition);
                let body_code = self.statements(body);
                let label = self.counters.new_while_label();
                let label_while = format!("While{}", label);
                let label_end = format!("EndWhile{}", label);

                let mut code = vec![Instruction::unary(Op::Label, &label_while)];
                code.extend(cond.code);
                code.push(Instruction::binary(Op::Fjump, cond.addr, &label_end));
                code.extend(body_code);
                code.push(Instruction::unary(Op::Ujump, label_while));
                code.push(Instruction::unary(Op::Label, label_end));
                code
            }

            Statement::ProcCall(call) => {
                let callee_ty = self.decorations.get_type(call.callee.id);
                let non_void = !self.types.is_void_function(callee_ty);

                let mut code = Vec::new();
                if non_void {
                    code.push(Instruction::nullary(Op::Push));
                }

                self.push_arguments(call, callee_ty, &mut code);
                code.push(Instruction::unary(Op::Call, call.callee.name.clone()));

                for _ in &call.args {
                    code.push(Instruction::nullary(Op::Pop));
                }

                // El resultado de un callee no void se descarta
                if non_void {
                    code.push(Instruction::nullary(Op::Pop));
                }

                code
            }

            Statement::Read { target, .. } => {
                let attrib = self.left_expr(target);
                let ty = self.decorations.get_type(target.id);
                let mut code = attrib.code;

                let op = if self.types.is_integer_ty(ty) || self.types.is_boolean_ty(ty) {
                    Op::Readi
                } else if self.types.is_float_ty(ty) {
                    Op::Readf
                } else {
                    Op::Readc
                };

                if attrib.offs.is_empty() {
                    code.push(Instruction::unary(op, attrib.addr));
                } else {
                    let temp = self.counters.new_temp();
                    code.push(Instruction::unary(op, &temp));
                    code.push(Instruction::ternary(Op::Xload, attrib.addr, attrib.offs, temp));
                }

                code
            }

            Statement::WriteExpr { expr, .. } => {
                let attrib = self.expr(expr);
                let ty = self.decorations.get_type(expr.id);
                let mut code = attrib.code;

                let op = if self.types.is_integer_ty(ty) || self.types.is_boolean_ty(ty) {
                    Op::Writei
                } else if self.types.is_float_ty(ty) {
                    Op::Writef
                } else {
                    Op::Writec
                };

                code.push(Instruction::unary(op, attrib.addr));
                code
            }

            Statement::WriteString { string, .. } => {
                vec![Instruction::unary(Op::Writes, string.clone())]
            }

            Statement::Return { expr, .. } => match expr {
                None => vec![Instruction::nullary(Op::Return)],

                Some(expr) => {
                    let attrib = self.expr(expr);
                    let ty = self.decorations.get_type(expr.id);
                    let mut code = attrib.code;
                    let mut addr = attrib.addr;

                    // Coerción implícita del valor de retorno
                    let widen = matches!(self.current_ret, Some(ret)
                        if self.types.is_float_ty(ret) && self.types.is_integer_ty(ty));
                    if widen {
                        let temp = self.counters.new_temp();
                        code.push(Instruction::binary(Op::Float, &temp, addr));
                        addr = temp;
                    }

                    code.push(Instruction::binary(Op::Load, "_result", addr));
                    code.push(Instruction::nullary(Op::Return));
                    code
                }
            },
        }
    }

    fn assign(&mut self, lhs: &LeftExpr, rhs: &Expr) -> Vec<Instruction> {
        let a1 = self.left_expr(lhs);
        let t1 = self.decorations.get_type(lhs.id);
        let a2 = self.expr(rhs);
        let t2 = self.decorations.get_type(rhs.id);

        let mut code = a1.code;
        code.extend(a2.code);

        let mut addr1 = a1.addr;
        let mut addr2 = a2.addr;

        if self.types.is_array_ty(t1) && self.types.is_array_ty(t2) {
            // Copia de arreglo completo. Un lado que no es variable
            // local es un parámetro por referencia y contiene un
            // puntero, que primero se carga a un temporal.
            if !self.symbols.is_local_var_class(&addr1) {
                let temp = self.counters.new_temp();
                code.push(Instruction::binary(Op::Load, &temp, addr1));
                addr1 = temp;
            }

            if !self.symbols.is_local_var_class(&addr2) {
                let temp = self.counters.new_temp();
                code.push(Instruction::binary(Op::Load, &temp, addr2));
                addr2 = temp;
            }

            // Un elemento por celda, del último hacia el primero, con
            // temporales frescos para preservar pseudo-SSA
            let count = self.types.get_array_size(t1);
            for index in (0..count).rev() {
                let idx = self.counters.new_temp();
                code.push(Instruction::binary(Op::Iload, &idx, index.to_string()));

                let elem = self.counters.new_temp();
                code.push(Instruction::ternary(Op::Loadx, &elem, &addr2, &idx));
                code.push(Instruction::ternary(Op::Xload, &addr1, idx, elem));
            }
        } else {
            if self.types.is_float_ty(t1) && self.types.is_integer_ty(t2) {
                let temp = self.counters.new_temp();
                code.push(Instruction::binary(Op::Float, &temp, addr2));
                addr2 = temp;
            }

            if a1.offs.is_empty() {
                code.push(Instruction::binary(Op::Load, addr1, addr2));
            } else {
                code.push(Instruction::ternary(Op::Xload, addr1, a1.offs, addr2));
            }
        }

        code
    }

    fn left_expr(&mut self, left: &LeftExpr) -> Attrib {
        match &left.kind {
            LeftExprKind::Ident(ident) => Attrib::new(ident.name.clone(), "", Vec::new()),

            LeftExprKind::Index { base, index } => {
                let idx = self.expr(index);
                let mut addr = base.name.clone();
                let mut code = idx.code;

                // Un arreglo recibido por parámetro es un puntero: se
                // carga para obtener la dirección real del arreglo
                if self.symbols.is_parameter_class(&base.name) {
                    let temp = self.counters.new_temp();
                    code.push(Instruction::binary(Op::Load, &temp, addr));
                    addr = temp;
                }

                Attrib::new(addr, idx.addr, code)
            }
        }
    }

    fn expr(&mut self, expr: &Expr) -> Attrib {
        match &expr.kind {
            ExprKind::Value(literal) => {
                let temp = self.counters.new_temp();
                let instruction = match literal {
                    Literal::Int(value) => {
                        Instruction::binary(Op::Iload, &temp, value.to_string())
                    }
                    Literal::Float(text) => Instruction::binary(Op::Fload, &temp, text.clone()),
                    Literal::Char(text) => Instruction::binary(Op::Chload, &temp, text.clone()),
                    Literal::Bool(value) => {
                        Instruction::binary(Op::Iload, &temp, if *value { "1" } else { "0" })
                    }
                };

                Attrib::new(temp, "", vec![instruction])
            }

            ExprKind::Ident(ident) => Attrib::new(ident.name.clone(), "", Vec::new()),

            ExprKind::Index { base, index } => {
                let idx = self.expr(index);
                let mut code = idx.code;
                let value = self.counters.new_temp();

                if self.symbols.is_parameter_class(&base.name) {
                    let temp = self.counters.new_temp();
                    code.push(Instruction::binary(Op::Load, &temp, base.name.clone()));
                    code.push(Instruction::ternary(Op::Loadx, &value, temp, idx.addr));
                } else {
                    code.push(Instruction::ternary(
                        Op::Loadx,
                        &value,
                        base.name.clone(),
                        idx.addr,
                    ));
                }

                Attrib::new(value, "", code)
            }

            ExprKind::Call(call) => {
                let temp = self.counters.new_temp();
                let callee_ty = self.decorations.get_type(call.callee.id);

                let mut code = vec![Instruction::nullary(Op::Push)];
                self.push_arguments(call, callee_ty, &mut code);
                code.push(Instruction::unary(Op::Call, call.callee.name.clone()));

                for _ in &call.args {
                    code.push(Instruction::nullary(Op::Pop));
                }

                code.push(Instruction::unary(Op::Pop, &temp));
                Attrib::new(temp, "", code)
            }

            ExprKind::Paren(inner) => self.expr(inner),

            ExprKind::Unary { op, expr: operand } => {
                let attrib = self.expr(operand);

                if let UnaryOp::Plus = op.as_ref() {
                    return attrib;
                }

                let ty = self.decorations.get_type(operand.id);
                let mut code = attrib.code;
                let temp = self.counters.new_temp();

                let instruction = match op.as_ref() {
                    UnaryOp::Not => Instruction::binary(Op::Not, &temp, attrib.addr),
                    UnaryOp::Minus if self.types.is_integer_ty(ty) => {
                        Instruction::binary(Op::Neg, &temp, attrib.addr)
                    }
                    _ => Instruction::binary(Op::Fneg, &temp, attrib.addr),
                };

                code.push(instruction);
                Attrib::new(temp, "", code)
            }

            ExprKind::Arithmetic { op, lhs, rhs } => self.arithmetic(expr, *op.as_ref(), lhs, rhs),

            ExprKind::Relational { op, lhs, rhs } => self.relational(*op.as_ref(), lhs, rhs),

            ExprKind::Logic { op, lhs, rhs } => {
                let a1 = self.expr(lhs);
                let a2 = self.expr(rhs);

                let mut code = a1.code;
                code.extend(a2.code);

                let temp = self.counters.new_temp();
                let op = match op.as_ref() {
                    LogicOp::And => Op::And,
                    LogicOp::Or => Op::Or,
                };

                code.push(Instruction::ternary(op, &temp, a1.addr, a2.addr));
                Attrib::new(temp, "", code)
            }
        }
    }

    fn arithmetic(&mut self, expr: &Expr, op: ArithOp, lhs: &Expr, rhs: &Expr) -> Attrib {
        let a1 = self.expr(lhs);
        let a2 = self.expr(rhs);

        let t1 = self.decorations.get_type(lhs.id);
        let t2 = self.decorations.get_type(rhs.id);
        let ty = self.decorations.get_type(expr.id);
        let is_float = self.types.is_float_ty(ty);

        let mut code = a1.code;
        code.extend(a2.code);

        let mut addr1 = a1.addr;
        let mut addr2 = a2.addr;

        if is_float {
            if !self.types.is_float_ty(t1) {
                let temp = self.counters.new_temp();
                code.push(Instruction::binary(Op::Float, &temp, addr1));
                addr1 = temp;
            }
            if !self.types.is_float_ty(t2) {
                let temp = self.counters.new_temp();
                code.push(Instruction::binary(Op::Float, &temp, addr2));
                addr2 = temp;
            }
        }

        if let ArithOp::Mod = op {
            // a % b se reduce a  d = a/b; m = d*b; r = a - m
            let quotient = self.counters.new_temp();
            code.push(Instruction::ternary(Op::Div, &quotient, &addr1, &addr2));

            let multiple = self.counters.new_temp();
            code.push(Instruction::ternary(Op::Mul, &multiple, quotient, addr2));

            let remainder = self.counters.new_temp();
            code.push(Instruction::ternary(Op::Sub, &remainder, addr1, multiple));

            return Attrib::new(remainder, "", code);
        }

        let opcode = match (op, is_float) {
            (ArithOp::Add, false) => Op::Add,
            (ArithOp::Add, true) => Op::Fadd,
            (ArithOp::Sub, false) => Op::Sub,
            (ArithOp::Sub, true) => Op::Fsub,
            (ArithOp::Mul, false) => Op::Mul,
            (ArithOp::Mul, true) => Op::Fmul,
            (ArithOp::Div, false) => Op::Div,
            (ArithOp::Div, true) => Op::Fdiv,
            (ArithOp::Mod, _) => unreachable!(),
        };

        let temp = self.counters.new_temp();
        code.push(Instruction::ternary(opcode, &temp, addr1, addr2));
        Attrib::new(temp, "", code)
    }

    fn relational(&mut self, op: RelOp, lhs: &Expr, rhs: &Expr) -> Attrib {
        let a1 = self.expr(lhs);
        let a2 = self.expr(rhs);

        let t1 = self.decorations.get_type(lhs.id);
        let t2 = self.decorations.get_type(rhs.id);

        let mut code = a1.code;
        code.extend(a2.code);

        let mut addr1 = a1.addr;
        let mut addr2 = a2.addr;

        let is_float = self.types.is_float_ty(t1) || self.types.is_float_ty(t2);
        if is_float {
            if !self.types.is_float_ty(t1) {
                let temp = self.counters.new_temp();
                code.push(Instruction::binary(Op::Float, &temp, addr1));
                addr1 = temp;
            }
            if !self.types.is_float_ty(t2) {
                let temp = self.counters.new_temp();
                code.push(Instruction::binary(Op::Float, &temp, addr2));
                addr2 = temp;
            }
        }

        // `!=`, `>` y `>=` se reducen a la negación de `==`, `<=` y `<`
        let (opcode, negated) = match (op, is_float) {
            (RelOp::Eq, false) => (Op::Eq, false),
            (RelOp::Neq, false) => (Op::Eq, true),
            (RelOp::Lt, false) => (Op::Lt, false),
            (RelOp::Ge, false) => (Op::Lt, true),
            (RelOp::Le, false) => (Op::Le, false),
            (RelOp::Gt, false) => (Op::Le, true),
            (RelOp::Eq, true) => (Op::Feq, false),
            (RelOp::Neq, true) => (Op::Feq, true),
            (RelOp::Lt, true) => (Op::Flt, false),
            (RelOp::Ge, true) => (Op::Flt, true),
            (RelOp::Le, true) => (Op::Fle, false),
            (RelOp::Gt, true) => (Op::Fle, true),
        };

        let temp = self.counters.new_temp();
        code.push(Instruction::ternary(opcode, &temp, addr1, addr2));

        if negated {
            let negation = self.counters.new_temp();
            code.push(Instruction::binary(Op::Not, &negation, temp));
            return Attrib::new(negation, "", code);
        }

        Attrib::new(temp, "", code)
    }

    /// Evalúa y apila los argumentos de una llamada, con coerción a
    /// flotante y toma de dirección de arreglos donde corresponde.
    fn push_arguments(&mut self, call: &Call, callee_ty: TypeId, code: &mut Vec<Instruction>) {
        let param_types = self.types.get_func_params_types(callee_ty);

        for (i, arg) in call.args.iter().enumerate() {
            let attrib = self.expr(arg);
            let arg_ty = self.decorations.get_type(arg.id);

            let mut arg_code = attrib.code;
            let mut addr = attrib.addr;

            let param_is_float = param_types
                .get(i)
                .is_some_and(|&param| self.types.is_float_ty(param));

            if param_is_float && self.types.is_integer_ty(arg_ty) {
                let temp = self.counters.new_temp();
                arg_code.push(Instruction::binary(Op::Float, &temp, addr));
                addr = temp;
            } else if self.types.is_array_ty(arg_ty) && !self.symbols.is_parameter_class(&addr) {
                // Un arreglo local viaja por referencia: se apila su
                // dirección. Si ya era parámetro, ya es un puntero.
                let temp = self.counters.new_temp();
                arg_code.push(Instruction::binary(Op::Aload, &temp, addr));
                addr = temp;
            }

            code.extend(arg_code);
            code.push(Instruction::unary(Op::Push, addr));
        }
    }
}
