//! Result readers

use super::define_operators;

define_operators! {
    category: "result";

    /// Read the stress tensor from the result files of a simulation.
    Stress(StressInputs, StressOutputs), stress => "S" as "stress" {
        inputs {
            0 => time_scoping: [Scoping, Int32, Collection] [optional] = "time sets or frequencies to read, all by default",
            1 => mesh_scoping: [ScopingsContainer, Scoping] [optional] = "nodes or elements to read, the whole mesh by default",
            2 => fields_container: [FieldsContainer] [optional] = "fields container to update in place",
            3 => streams_container: [StreamsContainer] [optional] = "result file streams, kept open between reads",
            4 => data_sources: [DataSources] [] = "result file path",
            5 => bool_rotate_to_global: [Bool] [optional] = "rotate results to the global coordinate system",
            7 => mesh: [MeshedRegion, MeshesContainer] [optional] = "mesh to read the results on",
            9 => requested_location: [String] [optional] = "nodal, elemental or elemental_nodal",
            14 => read_cyclic: [Int32] [optional] = "cyclic expansion mode",
            17 => domain_id: [Int32] [optional] = "domain of a distributed result",
        }
        outputs {
            0 => fields_container: [FieldsContainer] = "one field per requested time set",
        }
    }

    /// Read the displacement vector from the result files of a simulation.
    Displacement(DisplacementInputs, DisplacementOutputs), displacement => "U" as "displacement" {
        inputs {
            0 => time_scoping: [Scoping, Int32, Collection] [optional] = "time sets or frequencies to read, all by default",
            1 => mesh_scoping: [ScopingsContainer, Scoping] [optional] = "nodes or elements to read, the whole mesh by default",
            2 => fields_container: [FieldsContainer] [optional] = "fields container to update in place",
            3 => streams_container: [StreamsContainer] [optional] = "result file streams, kept open between reads",
            4 => data_sources: [DataSources] [] = "result file path",
            5 => bool_rotate_to_global: [Bool] [optional] = "rotate results to the global coordinate system",
            7 => mesh: [MeshedRegion, MeshesContainer] [optional] = "mesh to read the results on",
            9 => requested_location: [String] [optional] = "nodal, elemental or elemental_nodal",
            14 => read_cyclic: [Int32] [optional] = "cyclic expansion mode",
            17 => domain_id: [Int32] [optional] = "domain of a distributed result",
        }
        outputs {
            0 => fields_container: [FieldsContainer] = "one field per requested time set",
        }
    }
}
