pub mod executor;
pub mod gateway;
pub mod plan;
pub mod shell;

pub use executor::{AgentCommandExecutor, CommandOutcome, DEFAULT_SETTLE};
pub use gateway::{AssistantGateway, QueryOutcome};
pub use plan::{extract_json, parse_plan, Action, ActionPlan, PlanError};
pub use shell::Shell;
