//! End-to-end transfer coordination.
//!
//! This crate implements the **state machine** that drives one relay from
//! a submitted link to a delivered document. It has no UI or Bot API
//! dependencies: the bot app supplies a `DeliveryTransport` and renders
//! the prompts between steps.
//!
//! # Pipeline
//!
//! 1. **Submit**: validate the link, probe metadata, store a session
//! 2. **Choose name**: accept the suggested name or a validated override
//! 3. **Download**: stream to disk with throttled progress updates
//! 4. **Size check**: refuse artifacts above the transport ceiling
//! 5. **Upload**: relay with retry and heartbeat
//! 6. **Cleanup**: always delete the artifact, then the session

pub mod coordinator;
pub mod error;
pub mod report;
pub mod session;
pub mod state;
pub mod types;

pub use coordinator::TransferCoordinator;
pub use error::PipelineError;
pub use session::{RequesterId, SessionStore, TransferSession};
pub use state::TransferState;
pub use types::{NameChoice, PipelineSettings, TransferEvent, TransferOutcome};
