//! Event kind names published on the bus.

pub const USER_REGISTERED: &str = "user.registered";

pub const PROJECT_CREATED: &str = "project.created";
pub const PROJECT_UPDATED: &str = "project.updated";
pub const PROJECT_DELETED: &str = "project.deleted";

pub const SCENE_CREATED: &str = "scene.created";
pub const SCENE_UPDATED: &str = "scene.updated";
pub const SCENE_DELETED: &str = "scene.deleted";
pub const SCENES_REORDERED: &str = "scene.reordered";

pub const OBJECT_CREATED: &str = "object.created";
pub const OBJECT_UPDATED: &str = "object.updated";
pub const OBJECT_DELETED: &str = "object.deleted";

pub const STORY_GENERATED: &str = "story.generated";
pub const STORY_UPDATED: &str = "story.updated";
pub const CHAPTER_REGENERATED: &str = "story.chapter_regenerated";

pub const TOKENS_CHARGED: &str = "tokens.charged";
pub const TOKENS_CREDITED: &str = "tokens.credited";

pub const SUBSCRIPTION_STARTED: &str = "subscription.started";
pub const SUBSCRIPTION_CHANGED: &str = "subscription.changed";
pub const SUBSCRIPTION_CANCELLED: &str = "subscription.cancelled";
pub const SUBSCRIPTION_RENEWED: &str = "subscription.renewed";
pub const PAYMENT_FAILED: &str = "payment.failed";

pub const COLLABORATOR_INVITED: &str = "collaborator.invited";
pub const COLLABORATOR_JOINED: &str = "collaborator.joined";
pub const COLLABORATOR_DECLINED: &str = "collaborator.declined";
pub const COLLABORATOR_UPDATED: &str = "collaborator.updated";
pub const COLLABORATOR_REMOVED: &str = "collaborator.removed";

pub const COMMENT_CREATED: &str = "comment.created";
pub const COMMENT_RESOLVED: &str = "comment.resolved";
pub const COMMENT_DELETED: &str = "comment.deleted";
