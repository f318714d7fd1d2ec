//! Pipeline build stages
//!
//! Each stage declares its inputs explicitly and is driven by the
//! orchestrator in dependency order: recipe → compile → verify → assets →
//! image assembly → publish coordination.

pub mod assets;
pub mod compile;
pub mod image;
pub mod publish;
pub mod recipe;
pub mod verify;

pub use assets::{AssetBuildStage, AssetBundle};
pub use compile::{Artifact, CompileStage, ARTIFACT_NAMES};
pub use image::{ImageAssembler, ImagePlan, ImageSpec};
pub use publish::{resolve_tags, PublishCoordinator, PublishOutcome};
pub use recipe::{Recipe, RecipeBuilder};
pub use verify::{VerifyReport, VerifyStage};
