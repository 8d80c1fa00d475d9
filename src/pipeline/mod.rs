pub mod orchestrator;
pub mod reconcile;

pub use orchestrator::Orchestrator;
pub use reconcile::Reconciler;
