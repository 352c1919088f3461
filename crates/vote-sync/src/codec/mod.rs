//! # Codec
//!
//! Solidity ABI encoding for contract calls and strict decoding of return
//! data and `VoteCast` logs.

pub mod abi;
pub mod contract;

pub use abi::{decode_hex, encode_hex, parse_quantity, to_quantity, AbiError};
pub use contract::{decode_vote_cast, vote_cast_topic, LogId, RpcLog};
