#![forbid(unsafe_code)]

pub mod contracts;
pub mod error;
pub mod http;
pub mod memory;

pub use contracts::{
    CustomizationPayload, CustomizationResolver, Gateway, QuestionSupplier, RankingSupplier,
    SessionFinalizer, SessionValidator, WordSupplier,
};
pub use error::GatewayError;
pub use http::{HttpConfig, HttpGateway};
pub use memory::{CallLog, InMemoryBackend, Operation, Player};
