pub mod adapter;
pub mod clients;
pub mod revert;
pub mod types;

pub use adapter::EvmLedger;
pub use clients::RpcClient;
