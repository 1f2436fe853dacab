/*!
# Crow Engine

Core types for the Crow rendering engine: frame pipelining, descriptor
management, render batching, and the frame-streaming protocol.

This crate is platform-agnostic. All GPU work goes through the trait
seam in [`gpu`]; backend implementations (Vulkan in
`crow_engine_renderer_vulkan`) provide the concrete types. The core
test suite runs entirely against an in-memory mock device.

## Architecture

- **gpu**: `GraphicsDevice` and resource traits the core records against
- **utils**: deletion queue and alignment helpers
- **descriptors**: growable pool allocator, layout cache, set builder
- **frame**: N-deep frame-slot ring and synchronization
- **render**: GPU data layouts, materials, registries, batch submitter
- **surface**: event queue fed by the window provider
- **stream**: TCP frame mirroring, decoupled from rendering

The CPU records frame K+1 while the GPU executes frame K; the only
blocking point is the frame ring's fence wait, which guarantees a
slot's mapped buffers are never overwritten while the GPU may still
read them.
*/

// Internal modules
pub mod error;
pub mod log;
pub mod utils;
pub mod gpu;
pub mod descriptors;
pub mod frame;
pub mod render;
pub mod surface;
pub mod stream;

// Main crow namespace module
pub mod crow {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // GPU seam
    pub mod gpu {
        pub use crate::gpu::*;
    }

    // Descriptor management
    pub mod descriptors {
        pub use crate::descriptors::*;
    }

    // Frame pipelining
    pub mod frame {
        pub use crate::frame::*;
    }

    // Render data model and batching
    pub mod render {
        pub use crate::render::*;
    }

    // Surface events
    pub use crate::surface::{SurfaceEvent, SurfaceEventQueue};

    // Frame streaming
    pub mod stream {
        pub use crate::stream::*;
    }

    // Utilities
    pub use crate::utils::{pad_uniform_size, DeletionQueue};
}

// Re-export math library at crate root
pub use glam;
