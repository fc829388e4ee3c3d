//! Operator arithmetic
//!
//! `&a + &b`, `&a - &b` and `&a * k` build the matching fields-container
//! operator on the left operand's server and connect the operands through
//! their outputs façades.

use std::ops::{Add, Mul, Sub};

use super::Operator;
use crate::error::Result;

fn binary(name: &str, lhs: &Operator, rhs: &Operator) -> Result<Operator> {
    let op = Operator::with_server(name, lhs.server())?;
    op.connect(0, lhs.outputs())?;
    op.connect(1, rhs.outputs())?;
    Ok(op)
}

impl Add<&Operator> for &Operator {
    type Output = Result<Operator>;

    fn add(self, rhs: &Operator) -> Self::Output {
        binary("add_fc", self, rhs)
    }
}

impl Sub<&Operator> for &Operator {
    type Output = Result<Operator>;

    fn sub(self, rhs: &Operator) -> Self::Output {
        binary("minus_fc", self, rhs)
    }
}

impl Mul<f64> for &Operator {
    type Output = Result<Operator>;

    fn mul(self, factor: f64) -> Self::Output {
        let op = Operator::with_server("scale_fc", self.server())?;
        op.connect(0, self.outputs())?;
        op.connect(1, factor)?;
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use crate::server::Server;
    use crate::types::SemanticTag;

    use super::*;

    fn constant(server: &std::sync::Arc<Server>, data: &[f64]) -> Operator {
        let field = server.new_field(data).unwrap();
        let container = server.new_fields_container(&[field]).unwrap();
        let op = Operator::with_server("forward_fields_container", server).unwrap();
        op.connect(0, container).unwrap();
        op
    }

    fn first_field(server: &std::sync::Arc<Server>, op: &Operator) -> Vec<f64> {
        let fc = op.get_output(0, SemanticTag::FieldsContainer).unwrap();
        let fields = server.fields_container_fields(fc.as_object().unwrap()).unwrap();
        server.field_data(&fields[0]).unwrap()
    }

    #[test]
    fn test_add_and_scale_build_operators() {
        let server = Server::in_process();
        let a = constant(&server, &[1.0, 2.0]);
        let b = constant(&server, &[10.0, 20.0]);

        let sum = (&a + &b).unwrap();
        assert_eq!(sum.name(), "add_fc");
        assert_eq!(first_field(&server, &sum), vec![11.0, 22.0]);

        let scaled = (&sum * 2.0).unwrap();
        assert_eq!(scaled.name(), "scale_fc");
        assert_eq!(first_field(&server, &scaled), vec![22.0, 44.0]);

        let diff = (&b - &a).unwrap();
        assert_eq!(first_field(&server, &diff), vec![9.0, 18.0]);
    }
}
