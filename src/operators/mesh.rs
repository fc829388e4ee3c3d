use super::define_operators;

define_operators! {
    category: "mesh";

    /// Read the mesh of a result file.
    MeshProvider(MeshProviderInputs, MeshProviderOutputs), mesh_provider => "MeshProvider" as "mesh_provider" {
        inputs {
            0 => time_scoping: [Int32] [optional] = "time set for remeshed results",
            3 => streams_container: [StreamsContainer] [optional] = "",
            4 => data_sources: [DataSources] [] = "result file path",
        }
        outputs {
            0 => mesh: [MeshedRegion] = "",
        }
    }
}
