//! Terminal input: event collection and the key state machine.

pub mod raw;
pub mod service;

pub use raw::{RawInputCollector, RawInputEvent, ScrollDirection};
pub use service::{InputAction, InputService, InputState, InputStateMachine, PromptKind};
