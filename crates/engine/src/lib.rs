//! Stepwise step engine
//!
//! Turns human-written test steps ("Type 'bob' into 'Username'", "If
//! 'Dashboard' visible then Click 'Logout'") into browser interactions and
//! reports a structured pass/fail result for every step and case.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Runner::execute(cases, config, target_url) -> RunReport    │
//! │    ├── BrowserEngine::launch -> BrowserSession              │
//! │    ├── open_page, authenticate?, goto(target_url)           │
//! │    └── for each case (sequential)                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CaseRunner::run(case, page) -> TestCaseResult              │
//! │    ├── VariableContext (fresh per case)                     │
//! │    ├── NetworkLog (attached per case, drained per step)     │
//! │    └── step loop raced against the case deadline            │
//! │          ├── VariableContext::substitute(text)              │
//! │          ├── Classifier::classify(text) -> Action           │
//! │          └── StepExecutor::execute(action) -> StepResult    │
//! │                └── SelectorResolver::resolve(hint, kind)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PlaywrightEngine: node driver over JSON lines              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod action;
pub mod auth;
pub mod browser;
pub mod case;
pub mod classifier;
pub mod error;
pub mod evidence;
pub mod executor;
pub mod playwright;
pub mod resolver;
pub mod runner;
pub mod variables;

pub use action::{Action, ActionKind, ConditionKind, TargetSpec, WaitState};
pub use browser::{BrowserEngine, BrowserSession, LaunchOptions, LoadState, NetworkLog, Page};
pub use case::{CaseRunner, StepProgress};
pub use classifier::Classifier;
pub use error::{EngineError, EngineResult, RunError, RunResult, StepError};
pub use executor::{ExecutorSettings, StepExecutor};
pub use playwright::PlaywrightEngine;
pub use resolver::{CandidateResolver, SelectorResolver};
pub use runner::Runner;
pub use variables::VariableContext;
