#![doc = include_str!("../README.md")]

pub mod store;

pub use store::Store;

pub mod model {
    pub use sqlet_model::*;
}

pub mod sql {
    pub use sqlet_sql::*;
}

pub mod engine {
    pub use sqlet_engine::*;
}
