//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod activity_event_repo;
pub mod billing_plan_repo;
pub mod collaborator_repo;
pub mod comment_repo;
pub mod project_repo;
pub mod scene_object_repo;
pub mod scene_repo;
pub mod session_repo;
pub mod story_object_repo;
pub mod story_repo;
pub mod subscription_repo;
pub mod token_ledger_repo;
pub mod token_purchase_repo;
pub mod token_usage_repo;
pub mod user_repo;

pub use activity_event_repo::ActivityEventRepo;
pub use billing_plan_repo::BillingPlanRepo;
pub use collaborator_repo::CollaboratorRepo;
pub use comment_repo::CommentRepo;
pub use project_repo::{ProjectAccess, ProjectRepo};
pub use scene_object_repo::SceneObjectRepo;
pub use scene_repo::SceneRepo;
pub use session_repo::SessionRepo;
pub use story_object_repo::StoryObjectRepo;
pub use story_repo::StoryRepo;
pub use subscription_repo::SubscriptionRepo;
pub use token_ledger_repo::{ChargeOutcome, CreditKind, TokenLedgerRepo};
pub use token_purchase_repo::TokenPurchaseRepo;
pub use token_usage_repo::TokenUsageRepo;
pub use user_repo::UserRepo;
