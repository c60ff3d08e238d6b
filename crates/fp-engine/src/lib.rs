pub mod cascade;
pub mod engine;
pub mod fetch;
pub mod registry;

pub use cascade::{CascadeDispatcher, CascadeOutcome, MAX_CASCADE_DEPTH};
pub use engine::{ChangeOutcome, PanelEngine, SelectionUpdate};
pub use fetch::{FetchTicket, FetchTracker, OptionsState, execute};
pub use registry::{CustomRenderer, RenderCtx, RendererRegistry};
