//! Configurable [`InstrumentationPort`] double for tests.
//!
//! A bundled, real-enough default implementation every consumer crate can
//! use without standing up the host VM's actual instrumentation API.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bytehot_ports::InstrumentationError;
use bytehot_ports::InstrumentationPort;

/// An [`InstrumentationPort`] that returns pre-programmed results in order,
/// falling back to a default once the queue is drained.
pub struct MockInstrumentationPort {
    can_redefine: bool,
    can_retransform: bool,
    queued: Mutex<VecDeque<Result<(), InstrumentationError>>>,
    default_result: Result<(), InstrumentationError>,
}

impl MockInstrumentationPort {
    /// A host that supports redefinition and always succeeds.
    pub fn always_succeeds() -> Self {
        Self {
            can_redefine: true,
            can_retransform: true,
            queued: Mutex::new(VecDeque::new()),
            default_result: Ok(()),
        }
    }

    /// A host that supports redefinition but always fails with `error`.
    pub fn always_fails(error: InstrumentationError) -> Self {
        Self {
            can_redefine: true,
            can_retransform: true,
            queued: Mutex::new(VecDeque::new()),
            default_result: Err(error),
        }
    }

    /// A host that reports no redefinition support at all.
    pub fn incapable() -> Self {
        Self {
            can_redefine: false,
            can_retransform: false,
            queued: Mutex::new(VecDeque::new()),
            default_result: Err(InstrumentationError::UnsupportedOperation),
        }
    }

    /// Queue `result` to be returned by the next `redefine_class` call,
    /// before falling back to the default result.
    pub fn queue_result(&self, result: Result<(), InstrumentationError>) {
        self.queued.lock().expect("mock lock poisoned").push_back(result);
    }
}

#[async_trait]
impl InstrumentationPort for MockInstrumentationPort {
    fn can_redefine(&self) -> bool {
        self.can_redefine
    }

    fn can_retransform(&self) -> bool {
        self.can_retransform
    }

    async fn redefine_class(&self, _class_name: &str, _new_bytecode: &[u8]) -> Result<(), InstrumentationError> {
        let mut queued = self.queued.lock().expect("mock lock poisoned");
        queued.pop_front().unwrap_or_else(|| self.default_result.clone())
    }
}
