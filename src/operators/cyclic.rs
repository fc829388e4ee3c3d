use super::define_operators;

define_operators! {
    category: "cyclic";

    /// Expand a cyclic-sector result over the full model.
    ///
    /// The number of sectors is read from the `sectors` configuration option.
    CyclicExpansion(CyclicExpansionInputs, CyclicExpansionOutputs), cyclic_expansion => "cyclic_expansion" as "cyclic_expansion" {
        inputs {
            0 => time_scoping: [Scoping, Collection] [optional] = "",
            1 => mesh_scoping: [ScopingsContainer, Scoping] [optional] = "",
            2 => fields_container: [FieldsContainer] [] = "field container with the base and duplicate sectors",
            16 => cyclic_support: [CyclicSupport] [] = "",
        }
        outputs {
            0 => fields_container: [FieldsContainer] = "fields container with the expanded sectors",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DpfError;
    use crate::operator::OperatorConfig;
    use crate::types::SemanticTag;

    #[test]
    fn test_sectors_come_from_config() {
        let server = Server::in_process();
        let field = server.new_field(&[1.0, 2.0]).unwrap();
        let container = server.new_fields_container(&[field]).unwrap();

        let op = CyclicExpansion::with_server(&server).unwrap();
        op.set_config(&OperatorConfig::new().with_option("sectors", 3)).unwrap();
        op.inputs().fields_container().connect(container).unwrap();
        let out = op.outputs().fields_container().get_object().unwrap();
        assert_eq!(out.tag(), SemanticTag::FieldsContainer);
        assert_eq!(server.fields_container_fields(&out).unwrap().len(), 3);
    }

    #[test]
    fn test_cyclic_support_rejects_other_objects() {
        let server = Server::in_process();
        let op = CyclicExpansion::with_server(&server).unwrap();
        let mesh = server.new_field(&[0.0]).unwrap();
        let err = op.inputs().cyclic_support().connect(mesh).unwrap_err();
        assert!(matches!(err, DpfError::TypeMismatch(_)));
    }
}
