use super::*;
use ash::vk;

fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR {
        format,
        color_space,
    }
}

// ============================================================================
// Surface format selection
// ============================================================================

#[test]
fn test_prefers_srgb_format() {
    let formats = [
        surface_format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
    ];

    let chosen = choose_surface_format(&formats);
    assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
}

#[test]
fn test_falls_back_to_first_reported_format() {
    let formats = [
        surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
    ];

    let chosen = choose_surface_format(&formats);
    assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
}

#[test]
fn test_chosen_format_keeps_its_reported_color_space() {
    // A driver may pair the preferred format with a non-default color
    // space; the pair must be carried through intact so a swapchain
    // recreate reuses exactly what was selected at creation.
    let formats = [
        surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
    ];

    let chosen = choose_surface_format(&formats);
    assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    assert_eq!(chosen.color_space, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT);
}

// ============================================================================
// Extent selection
// ============================================================================

#[test]
fn test_uses_current_extent_when_fixed() {
    let capabilities = vk::SurfaceCapabilitiesKHR {
        current_extent: vk::Extent2D {
            width: 800,
            height: 600,
        },
        ..Default::default()
    };

    let extent = choose_extent(&capabilities, 1920, 1080);
    assert_eq!(extent.width, 800);
    assert_eq!(extent.height, 600);
}

#[test]
fn test_clamps_requested_extent_when_surface_is_flexible() {
    let capabilities = vk::SurfaceCapabilitiesKHR {
        current_extent: vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        },
        min_image_extent: vk::Extent2D {
            width: 64,
            height: 64,
        },
        max_image_extent: vk::Extent2D {
            width: 1280,
            height: 720,
        },
        ..Default::default()
    };

    let extent = choose_extent(&capabilities, 1920, 32);
    assert_eq!(extent.width, 1280);
    assert_eq!(extent.height, 64);
}
