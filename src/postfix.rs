use crate::{
    ir::{Ir, Register},
    Error,
};

/// Lower a postfix arithmetic expression (`"3 4 +"`) to IR. Every
/// number becomes a fresh virtual register; the final value is moved
/// into the return register and followed by an explicit return.
pub fn parse(expr: &str) -> Result<Ir, Error> {
    let tokens = tokenize(expr)?;
    let mut ir = Ir::new();
    let mut operands: Vec<Register> = Vec::new();

    for token in tokens {
        match token {
            Token::Number(value) => {
                let register = ir.new_virtual_register();
                ir.move_constant(register, value);
                operands.push(register);
            }
            Token::Operator(op) => {
                let src2 = pop(&mut operands, op)?;
                let src1 = pop(&mut operands, op)?;
                let dst = ir.new_virtual_register();
                match op {
                    '+' => ir.add_registers(dst, src1, src2),
                    '-' => ir.sub_registers(dst, src1, src2),
                    '*' => ir.mult_registers(dst, src1, src2),
                    '/' => ir.div_registers(dst, src1, src2),
                    _ => unreachable!("tokenizer only yields known operators"),
                }
                operands.push(dst);
            }
        }
    }

    let result = operands
        .pop()
        .ok_or_else(|| Error::Parse("empty expression".to_string()))?;
    if !operands.is_empty() {
        return Err(Error::Parse(format!(
            "{} operands left without an operator",
            operands.len() + 1
        )));
    }

    ir.set_return(result);
    ir.ret();
    Ok(ir)
}

fn pop(operands: &mut Vec<Register>, op: char) -> Result<Register, Error> {
    operands
        .pop()
        .ok_or_else(|| Error::Parse(format!("not enough operands for '{}'", op)))
}

enum Token {
    Number(i64),
    Operator(char),
}

fn tokenize(expr: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut number: Option<i64> = None;

    for c in expr.chars() {
        if let Some(digit) = c.to_digit(10) {
            number = Some(
                number
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|n| n.checked_add(digit as i64))
                    .ok_or_else(|| Error::Parse("numeric literal too large".to_string()))?,
            );
            continue;
        }
        if let Some(value) = number.take() {
            tokens.push(Token::Number(value));
        }
        match c {
            ' ' => {}
            '+' | '-' | '*' | '/' => tokens.push(Token::Operator(c)),
            other => return Err(Error::Parse(format!("unknown token '{}'", other))),
        }
    }
    if let Some(value) = number {
        tokens.push(Token::Number(value));
    }

    Ok(tokens)
}
