//! Multi-step deployment wizard.
//!
//! - `form` / `steps`: field catalogue and the five-step layout
//! - `gate` / `validator`: verification flags and the Next predicate
//! - `controller`: pure event-to-transition map
//! - `session`: async driver running controller effects against the API

mod controller;
mod form;
mod gate;
mod payload;
mod session;
mod steps;
mod validator;

pub use controller::{transition, Effect, Notice, NoticeLevel, Outcome, WizardEvent, WizardState};
pub use form::{ChoiceGroup, FieldId, FieldKind, FormState, Section};
pub use gate::VerificationGate;
pub use payload::build_config;
pub use session::WizardSession;
pub use steps::{step, StepCheck, StepSpec, STEPS, TOTAL_STEPS};
pub use validator::{blockers, validate, Blocker};
