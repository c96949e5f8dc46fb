mod backend;
mod backends;
mod registry;
mod result;

pub use backend::DetectorBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use backends::{ScriptedBackend, StubBackend, COCO_PERSON};
pub use registry::{BackendRegistry, SharedBackend};
pub use result::Detection;
