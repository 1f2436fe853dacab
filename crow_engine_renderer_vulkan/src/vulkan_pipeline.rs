/// Graphics pipeline construction
///
/// Pipelines are built against the surface's render pass with dynamic
/// viewport and scissor, so they survive window resizes untouched.

use ash::vk;
use crow_engine::crow::{Error, Result};
use crow_engine::engine_error;
use crow_engine::gpu::DescriptorSetLayout;
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_resources::{VulkanDescriptorSetLayout, VulkanPipeline};

const LOG_SOURCE: &str = "crow::vulkan";

/// Format of one vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexAttributeFormat {
    Float2,
    Float3,
    Float4,
}

impl VertexAttributeFormat {
    fn to_vk(self) -> vk::Format {
        match self {
            VertexAttributeFormat::Float2 => vk::Format::R32G32_SFLOAT,
            VertexAttributeFormat::Float3 => vk::Format::R32G32B32_SFLOAT,
            VertexAttributeFormat::Float4 => vk::Format::R32G32B32A32_SFLOAT,
        }
    }
}

/// One attribute in the vertex layout, all read from binding 0
#[derive(Debug, Clone, Copy)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexAttributeFormat,
    pub offset: u32,
}

/// Everything needed to build a graphics pipeline
///
/// Shader code is pre-compiled SPIR-V, loaded by the caller.
pub struct PipelineDesc<'a> {
    pub vertex_shader: &'a [u8],
    pub fragment_shader: &'a [u8],
    pub vertex_stride: u32,
    pub vertex_attributes: &'a [VertexAttribute],
    pub set_layouts: &'a [Arc<dyn DescriptorSetLayout>],
}

pub(crate) fn build_pipeline(
    ctx: &Arc<GpuContext>,
    render_pass: vk::RenderPass,
    desc: &PipelineDesc<'_>,
) -> Result<Arc<VulkanPipeline>> {
    unsafe {
        let vertex_module = create_shader_module(ctx, desc.vertex_shader)?;
        let fragment_module = match create_shader_module(ctx, desc.fragment_shader) {
            Ok(module) => module,
            Err(e) => {
                ctx.device.destroy_shader_module(vertex_module, None);
                return Err(e);
            }
        };

        let result = build_with_modules(ctx, render_pass, desc, vertex_module, fragment_module);

        // Modules are compiled into the pipeline and not needed after
        ctx.device.destroy_shader_module(vertex_module, None);
        ctx.device.destroy_shader_module(fragment_module, None);

        result
    }
}

unsafe fn build_with_modules(
    ctx: &Arc<GpuContext>,
    render_pass: vk::RenderPass,
    desc: &PipelineDesc<'_>,
    vertex_module: vk::ShaderModule,
    fragment_module: vk::ShaderModule,
) -> Result<Arc<VulkanPipeline>> {
    let entry_point = CString::new("main").map_err(|_| {
        Error::InitializationFailed("Invalid shader entry point".to_string())
    })?;

    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_module)
            .name(&entry_point),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment_module)
            .name(&entry_point),
    ];

    // Vertex input: one interleaved binding
    let vertex_bindings = [vk::VertexInputBindingDescription {
        binding: 0,
        stride: desc.vertex_stride,
        input_rate: vk::VertexInputRate::VERTEX,
    }];

    let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
        .vertex_attributes
        .iter()
        .map(|attribute| vk::VertexInputAttributeDescription {
            location: attribute.location,
            binding: 0,
            format: attribute.format.to_vk(),
            offset: attribute.offset,
        })
        .collect();

    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&vertex_bindings)
        .vertex_attribute_descriptions(&vertex_attributes);

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    // Viewport state (dynamic)
    let viewports = [vk::Viewport::default()];
    let scissors = [vk::Rect2D::default()];
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewports(&viewports)
        .scissors(&scissors);

    let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_bias_enable(false);

    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(true)
        .depth_write_enable(true)
        .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false);

    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(std::slice::from_ref(&color_blend_attachment));

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    // Pipeline layout from the cached descriptor-set layouts
    let set_layouts: Vec<vk::DescriptorSetLayout> = desc
        .set_layouts
        .iter()
        .map(|layout| {
            layout
                .as_any()
                .downcast_ref::<VulkanDescriptorSetLayout>()
                .map(|l| l.layout)
                .ok_or_else(|| {
                    Error::InvalidResource(
                        "Descriptor set layout was not created by this backend".to_string(),
                    )
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut layout_create_info = vk::PipelineLayoutCreateInfo::default();
    if !set_layouts.is_empty() {
        layout_create_info = layout_create_info.set_layouts(&set_layouts);
    }

    let layout = ctx
        .device
        .create_pipeline_layout(&layout_create_info, None)
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create pipeline layout: {:?}", e);
            Error::InitializationFailed(format!("Failed to create pipeline layout: {:?}", e))
        })?;

    let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .depth_stencil_state(&depth_stencil_state)
        .multisample_state(&multisample_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipelines = ctx
        .device
        .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
        .map_err(|e| {
            ctx.device.destroy_pipeline_layout(layout, None);
            engine_error!(LOG_SOURCE, "Failed to create graphics pipeline: {:?}", e.1);
            Error::InitializationFailed(format!("Failed to create graphics pipeline: {:?}", e.1))
        })?;

    Ok(Arc::new(VulkanPipeline::new(
        Arc::clone(ctx),
        pipelines[0],
        layout,
    )))
}

unsafe fn create_shader_module(ctx: &GpuContext, code: &[u8]) -> Result<vk::ShaderModule> {
    if code.len() % 4 != 0 {
        engine_error!(
            LOG_SOURCE,
            "Shader code not 4-byte aligned (size: {} bytes)",
            code.len()
        );
        return Err(Error::InvalidResource(
            "Shader code not 4-byte aligned".to_string(),
        ));
    }

    // SPIR-V words
    let code_u32 = std::slice::from_raw_parts(code.as_ptr() as *const u32, code.len() / 4);

    let create_info = vk::ShaderModuleCreateInfo::default().code(code_u32);

    ctx.device
        .create_shader_module(&create_info, None)
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create shader module: {:?}", e);
            Error::InitializationFailed(format!("Failed to create shader module: {:?}", e))
        })
}
