pub mod cdp;
pub mod cdp_surface;
pub mod compositor;
pub mod context;
pub mod events;
pub mod input;
pub mod launcher;
pub mod navigation;
pub mod registry;
pub mod surface;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use compositor::ViewCompositor;
pub use context::{ContextMessage, ConversationContext, Role};
pub use events::{Notifier, ShellEvent};
pub use launcher::{BrowserHost, LaunchOptions};
pub use navigation::NavigationController;
pub use registry::{Panel, Tab, TabFlags, TabId, ViewRegistry};
pub use surface::{
    Bounds, ContextMenuItem, RenderSurface, SurfaceEvent, SurfaceEventReceiver, SurfaceEventSender,
    SurfaceFactory,
};
