mod book;
mod ids;
mod plan;
mod session;

pub use ids::{BookId, ParseIdError, PlanId, SessionId, UserId};

pub use book::{Book, BookError};
pub use plan::{GoalMode, PlanError, PlanStatus, ReadingPlan};
pub use session::{ReadingSession, SessionDraft, SessionError};
