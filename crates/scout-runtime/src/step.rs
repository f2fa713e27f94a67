//! The [`Step`] protocol.
//!
//! A step is one state of a task: it reads and writes [`UserData`] slots,
//! runs to completion and reports exactly one of its declared outcome
//! strings.  Expected negative results (nothing found, timeout, lost target)
//! are outcomes; an `Err` is reserved for contract violations such as an
//! unmapped status code or a slot holding the wrong type.

use async_trait::async_trait;
use scout_types::ScoutError;

use crate::userdata::UserData;

#[async_trait]
pub trait Step: Send + Sync {
    /// Name used in logs and as the default state name.
    fn name(&self) -> &str;

    /// Every outcome [`execute`][Step::execute] may return.
    fn outcomes(&self) -> &'static [&'static str];

    /// Run the step once.
    async fn execute(&self, userdata: &mut UserData) -> Result<&'static str, ScoutError>;
}
