//! Standard simulation events.

// VM ALLOCATION EVENTS ////////////////////////////////////////////////////////////////////////////

pub mod allocation {
    use serde::Serialize;

    #[derive(Serialize)]
    pub struct AllocationRequest {
        pub vm_id: u32,
    }
}

// VM LIFECYCLE EVENTS /////////////////////////////////////////////////////////////////////////////

pub mod vm {
    use serde::Serialize;

    #[derive(Serialize)]
    pub struct VmStarted {
        pub vm_id: u32,
    }
}

// COMPUTE EVENTS //////////////////////////////////////////////////////////////////////////////////

pub mod compute {
    use serde::Serialize;

    /// Internal event of host manager signalling the end of the task execution.
    #[derive(Serialize)]
    pub struct TaskFinished {
        pub task_id: u64,
        pub vm_id: u32,
    }

    /// Sent to the task requester when the task is completed.
    #[derive(Clone, Serialize)]
    pub struct TaskCompleted {
        pub task_id: u64,
        pub vm_id: u32,
        pub host_id: u32,
        pub instructions: u64,
    }
}

// DATA TRANSFER EVENTS ////////////////////////////////////////////////////////////////////////////

pub mod transfer {
    use serde::Serialize;

    use twin_core::Id;

    /// Represents a data transfer between two repositories.
    #[derive(Clone, Debug, Serialize)]
    pub struct DataTransfer {
        pub id: u64,
        pub src: String,
        pub dst: String,
        /// Data size in bytes.
        pub size: u64,
        /// Simulation component to notify when the transfer is over.
        pub notification_dest: Id,
    }

    #[derive(Serialize)]
    pub struct DataTransferFinished {
        pub transfer: DataTransfer,
    }

    #[derive(Clone, Serialize)]
    pub struct DataTransferCompleted {
        pub transfer: DataTransfer,
    }

    #[derive(Clone, Serialize)]
    pub struct DataTransferFailed {
        pub transfer: DataTransfer,
        pub reason: String,
    }
}
