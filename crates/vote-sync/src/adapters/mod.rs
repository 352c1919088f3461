//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound ports over real transports: JSON-RPC over HTTP and
//! websocket, and the registry and relayer HTTP APIs.

mod http;
mod registry;
mod relayer;
mod rpc_http;
mod rpc_ws;
mod wallet;

pub use registry::RegistryClient;
pub use relayer::RelayerGateway;
pub use rpc_http::HttpRpcClient;
pub use rpc_ws::WsLogSubscriber;
pub use wallet::RpcWallet;
