use bitflags::bitflags;

use crate::ImageType;

/// What a render pass does with an attachment's previous contents when the
/// pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

/// What a render pass does with an attachment's contents when the pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StoreOp {
    Store,
    Resolve,
    StoreAndResolve,
    DontCare,
}

/// RGBA or depth/stencil clear value; the renderer interprets whichever
/// fields apply to the attachment's format.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClearValue {
    pub color: [f64; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl Default for ClearValue {
    fn default() -> Self {
        Self {
            color: [0.0; 4],
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// Per-attachment descriptor within a [`RenderPassDescriptor`]. The depth
/// attachment is distinguished by `format.is_depth()`, not by a separate
/// field or slot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttachmentDescriptor {
    pub format: ImageType,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear_value: ClearValue,
    /// When set and `format` does not already carry `ImageTypeFlags::ARRAY`,
    /// the runtime builds a multi-view variant of this attachment's format
    /// internally rather than rejecting multi-view pass creation outright.
    pub automatic_multi_view_transformation: bool,
}

/// A render pass description: an ordered list of color attachments plus an
/// optional depth attachment, and whether the pass may be bound multi-view.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderPassDescriptor {
    pub attachments: Vec<AttachmentDescriptor>,
    pub multi_view: bool,
    pub label: Option<String>,
}

impl RenderPassDescriptor {
    /// A pass is multi-view capable iff it was requested multi-view and
    /// every attachment either already carries `ARRAY` or opts into the
    /// automatic transformation.
    pub fn is_multi_view_capable(&self) -> bool {
        self.multi_view
            && self
                .attachments
                .iter()
                .all(|a| a.format.is_array() || a.automatic_multi_view_transformation)
    }

    pub fn depth_attachment(&self) -> Option<&AttachmentDescriptor> {
        self.attachments.iter().find(|a| a.format.is_depth())
    }

    pub fn color_attachments(&self) -> impl Iterator<Item = &AttachmentDescriptor> {
        self.attachments.iter().filter(|a| !a.format.is_depth())
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveKind {
    Point,
    Line,
    LineStrip,
    Triangle,
    TriangleStrip,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Winding {
    Clockwise,
    CounterClockwise,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Sentinel used by [`Viewport`]/[`Scissor`] fields to mean "resolve against
/// the active render target's size at pipeline creation time".
pub const FULL_SIZE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: u32,
    pub height: u32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: FULL_SIZE,
            height: FULL_SIZE,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

impl Viewport {
    pub fn is_full_screen(&self) -> bool {
        self.width == FULL_SIZE || self.height == FULL_SIZE
    }

    /// Resolves a `FULL_SIZE` sentinel width/height against `target_size`.
    pub fn resolved(&self, target_size: [u32; 2]) -> Self {
        Self {
            width: if self.width == FULL_SIZE { target_size[0] } else { self.width },
            height: if self.height == FULL_SIZE { target_size[1] } else { self.height },
            ..*self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scissor {
    pub offset: [u32; 2],
    pub extent: [u32; 2],
}

impl Default for Scissor {
    fn default() -> Self {
        Self {
            offset: [0, 0],
            extent: [FULL_SIZE, FULL_SIZE],
        }
    }
}

impl Scissor {
    pub fn resolved(&self, viewport_extent: [u32; 2]) -> Self {
        Self {
            offset: self.offset,
            extent: [
                if self.extent[0] == FULL_SIZE { viewport_extent[0] } else { self.extent[0] },
                if self.extent[1] == FULL_SIZE { viewport_extent[1] } else { self.extent[1] },
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DepthState {
    pub write_enabled: bool,
    pub range: [f32; 2],
    pub compare: CompareFunc,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            write_enabled: true,
            range: [0.0, 1.0],
            compare: CompareFunc::Less,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlendState {
    pub enabled: bool,
    pub src_color_factor: BlendFactor,
    pub dst_color_factor: BlendFactor,
    pub color_op: BlendOp,
    pub src_alpha_factor: BlendFactor,
    pub dst_alpha_factor: BlendFactor,
    pub alpha_op: BlendOp,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            src_color_factor: BlendFactor::One,
            dst_color_factor: BlendFactor::Zero,
            color_op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
        }
    }
}

/// Per-attachment color+blend state, indexed the same as the owning
/// [`RenderPassDescriptor`]'s color attachment list.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorAttachmentState {
    pub blend: BlendState,
    pub write_mask: u8,
}

impl Default for ColorAttachmentState {
    fn default() -> Self {
        Self {
            blend: BlendState::default(),
            write_mask: 0b1111,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TessellationSpacing {
    Equal,
    FractionalOdd,
    FractionalEven,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TessellationState {
    pub max_factor: f32,
    pub vertex_attributes: Vec<u32>,
    pub spacing: TessellationSpacing,
    pub winding: Winding,
    pub indexed: bool,
    pub index_type: IndexType,
}

impl Default for TessellationState {
    fn default() -> Self {
        Self {
            max_factor: 1.0,
            vertex_attributes: Vec::new(),
            spacing: TessellationSpacing::Equal,
            winding: Winding::CounterClockwise,
            indexed: false,
            index_type: IndexType::U32,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IndexType {
    U16,
    U32,
}

bitflags! {
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct RenderPipelineFlags: u32 {
        const MULTI_VIEW        = 1 << 0;
        const INDIRECT_RENDERING = 1 << 1;
        const WIREFRAME         = 1 << 2;
    }
}

/// Everything fixing a render pipeline's shape, except the pass it will be
/// used against (passes and pipelines are bound together at `Renderer`
/// construction, not baked into one object).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderPipelineDescriptor {
    pub vertex_function: String,
    pub fragment_function: String,
    pub primitive_kind: PrimitiveKind,
    pub cull_mode: CullMode,
    pub front_face: Winding,
    /// Power-of-two in `[0, 64]`; 0 or 1 means no MSAA.
    pub sample_count: u32,
    pub viewport: Viewport,
    pub scissor: Scissor,
    pub depth_state: DepthState,
    pub blend_constants: [f32; 4],
    pub color_attachments: Vec<ColorAttachmentState>,
    pub depth_attachment_format: Option<ImageType>,
    pub tessellation: Option<TessellationState>,
    pub flags: RenderPipelineFlags,
    pub label: Option<String>,
}

impl RenderPipelineDescriptor {
    pub fn is_multi_view(&self) -> bool {
        self.flags.contains(RenderPipelineFlags::MULTI_VIEW)
    }

    pub fn supports_indirect_rendering(&self) -> bool {
        self.flags.contains(RenderPipelineFlags::INDIRECT_RENDERING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ImageChannelLayout, ImageDataType, ImageDim, ImageTypeFlags};

    fn color_format() -> ImageType {
        ImageType::new(ImageDim::D2, ImageChannelLayout::Rgba, ImageDataType::UnsignedNormalized, 8, ImageTypeFlags::empty())
    }

    fn depth_format() -> ImageType {
        ImageType::new(ImageDim::D2, ImageChannelLayout::R, ImageDataType::Float, 32, ImageTypeFlags::DEPTH)
    }

    #[test]
    fn multi_view_requires_array_or_auto_transform() {
        let pass = RenderPassDescriptor {
            attachments: vec![AttachmentDescriptor {
                format: color_format(),
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                clear_value: ClearValue::default(),
                automatic_multi_view_transformation: false,
            }],
            multi_view: true,
            label: None,
        };
        assert!(!pass.is_multi_view_capable());

        let mut auto_pass = pass.clone();
        auto_pass.attachments[0].automatic_multi_view_transformation = true;
        assert!(auto_pass.is_multi_view_capable());
    }

    #[test]
    fn depth_attachment_detected_by_format_flag() {
        let pass = RenderPassDescriptor {
            attachments: vec![
                AttachmentDescriptor {
                    format: color_format(),
                    load_op: LoadOp::Clear,
                    store_op: StoreOp::Store,
                    clear_value: ClearValue::default(),
                    automatic_multi_view_transformation: false,
                },
                AttachmentDescriptor {
                    format: depth_format(),
                    load_op: LoadOp::Clear,
                    store_op: StoreOp::DontCare,
                    clear_value: ClearValue::default(),
                    automatic_multi_view_transformation: false,
                },
            ],
            multi_view: false,
            label: None,
        };
        assert!(pass.depth_attachment().is_some());
        assert_eq!(pass.color_attachments().count(), 1);
    }

    #[test]
    fn viewport_resolves_full_screen_sentinel() {
        let vp = Viewport::default();
        assert!(vp.is_full_screen());
        let resolved = vp.resolved([1920, 1080]);
        assert_eq!(resolved.width, 1920);
        assert_eq!(resolved.height, 1080);
    }
}
