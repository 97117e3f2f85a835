mod common;
mod condition;
mod cookie;
mod job;
mod step;
mod var_from;

pub use common::{BasicAuth, Header};
pub use condition::{Condition, ConditionKind};
pub use cookie::Cookie;
pub use job::Job;
pub use step::{ForLoop, Method, Step};
pub use var_from::{VarFrom, VarSource};
