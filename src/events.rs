//! Standard simulation events.

// CLUSTER STATE MUTATION EVENTS //
pub mod cluster {
    use serde::Serialize;
    use crate::node::Node;
    use crate::pod::Pod;

    #[derive(Clone, Serialize)]
    pub struct NodeCreated {
        pub node: Node,
    }

    /// Replaces the capacity and annotations of an existing node.
    #[derive(Clone, Serialize)]
    pub struct NodeUpdated {
        pub node: Node,
    }

    #[derive(Clone, Serialize)]
    pub struct NodeDeleted {
        pub node_id: u32,
    }

    #[derive(Clone, Serialize)]
    pub struct PodSubmitted {
        pub pod: Pod,
    }

    #[derive(Clone, Serialize)]
    pub struct PodDeleted {
        pub pod_id: u64,
    }
}

// DISRUPTION EVENTS //
pub mod disruption {
    use serde::Serialize;
    use crate::command::Command;

    #[derive(Clone, Serialize)]
    pub struct ConsolidationScan {
    }

    #[derive(Clone, Serialize)]
    pub struct ExecuteCommand {
        pub command: Command,
    }

    #[derive(Clone, Serialize)]
    pub struct ReplacementReady {
        pub command: Command,
    }

    #[derive(Clone, Serialize)]
    pub struct DrainNodes {
        pub command: Command,
        pub replacement_node_id: Option<u32>,
    }

    #[derive(Clone, Serialize)]
    pub struct CommandFinished {
        pub executed: bool,
    }
}

pub mod churn {
    use serde::Serialize;

    #[derive(Clone, Serialize)]
    pub struct ChurnTick {
    }
}
